use std::collections::HashSet;
use std::process;

use anyhow::Result;
use chrono::Local;

use tally_core::error::Error as CoreError;
use tally_core::models::{
    BodyMovementReflection, GoalReflection, NewReflection, ScreenTimeReflection, TaskView,
};
use tally_core::service::TallyService;

use super::helpers::{format_window, parse_index_list, resolve_identity};

pub(crate) fn cmd_reflect_show(
    service: &TallyService,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let identity = resolve_identity(service, user)?;
    let today = Local::now().date_naive();

    let task = match service.previous_week_task(identity.user_id, today) {
        Ok(task) => task,
        Err(CoreError::NotFound(_)) => {
            if json {
                println!("{}", serde_json::json!({ "task": null, "reflection": null }));
                return Ok(());
            }
            eprintln!("No goals were set for the previous week");
            process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };
    let reflection = service.previous_week_reflection(identity.user_id, today)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "task": TaskView::from(task),
                "reflection": reflection,
            }))?
        );
        return Ok(());
    }

    let window = format_window(task.week_start, task.week_end);
    println!("=== Reflection for week {window} ===\n");
    for (i, goal) in task.custom_goals.iter().enumerate() {
        let n = i + 1;
        let target = &goal.target;
        let input = &goal.input;
        println!("  [{n}] {target} — {input}");
    }
    if let Some(hours) = task.screen_time_target {
        println!("  Screen time target: {hours} h/week");
    }
    println!("  Body movement");
    println!();

    match reflection {
        Some(r) => {
            let pct = r.completion_percentage;
            println!("Already reflected: {pct}% complete");
        }
        None => {
            println!("Not yet reflected. Use `tally reflect submit --done 1,3 [--screen-time] [--moved]`");
        }
    }
    Ok(())
}

#[allow(clippy::fn_params_excessive_bools)]
pub(crate) fn cmd_reflect_submit(
    service: &TallyService,
    done: Option<&str>,
    screen_time: bool,
    moved: bool,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let identity = resolve_identity(service, user)?;
    let today = Local::now().date_naive();

    let task = service.previous_week_task(identity.user_id, today)?;

    let done_indices: HashSet<usize> = done
        .map(|s| parse_index_list(s, task.custom_goals.len()))
        .transpose()?
        .unwrap_or_default()
        .into_iter()
        .collect();

    let submission = NewReflection {
        custom_goal_reflections: task
            .custom_goals
            .iter()
            .enumerate()
            .map(|(i, goal)| GoalReflection {
                target: Some(goal.target.clone()),
                input: Some(goal.input.clone()),
                completed: done_indices.contains(&i),
                explanation: None,
            })
            .collect(),
        screen_time_reflection: ScreenTimeReflection {
            target: task.screen_time_target,
            completed: screen_time,
            explanation: None,
        },
        body_movement_reflection: BodyMovementReflection {
            completed: moved,
            explanation: None,
        },
    };

    let outcome = service.submit_reflection(&identity, today, &submission)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        let pct = outcome.completion_percentage;
        let score = outcome.leaderboard_score;
        println!("Week scored at {pct}%. Leaderboard total: {score}");
    }
    Ok(())
}
