pub(crate) mod helpers;
mod leaderboard;
mod reflect;
mod task;
mod user;

pub(crate) use leaderboard::cmd_leaderboard;
pub(crate) use reflect::{cmd_reflect_show, cmd_reflect_submit};
pub(crate) use task::{
    cmd_task_add, cmd_task_edit, cmd_task_remove, cmd_task_screen_time, cmd_task_show,
};
pub(crate) use user::{cmd_user_add, cmd_user_list, cmd_user_remove};
