use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::week::WeekWindow;

/// One custom goal on a weekly task: a target label ("Read books") plus the
/// user's numeric or free-text input ("3").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomGoal {
    pub target: String,
    pub input: String,
}

/// A user's task sheet for one calendar week. At most one per (user, week);
/// mutated in place during the current week, never deleted automatically.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    pub week_start: NaiveDateTime,
    pub week_end: NaiveDateTime,
    pub custom_goals: Vec<CustomGoal>,
    pub screen_time_target: Option<f64>,
    pub body_movement: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Current-week task as returned to callers: when no task has been saved yet
/// the store is left untouched and a blank placeholder carries the computed
/// window (`id` is None).
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub id: Option<i64>,
    pub week_start: NaiveDateTime,
    pub week_end: NaiveDateTime,
    pub custom_goals: Vec<CustomGoal>,
    pub screen_time_target: Option<f64>,
    pub body_movement: bool,
}

impl TaskView {
    #[must_use]
    pub fn placeholder(window: WeekWindow) -> Self {
        TaskView {
            id: None,
            week_start: window.start,
            week_end: window.end,
            custom_goals: Vec::new(),
            screen_time_target: None,
            body_movement: false,
        }
    }
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        TaskView {
            id: Some(task.id),
            week_start: task.week_start,
            week_end: task.week_end,
            custom_goals: task.custom_goals,
            screen_time_target: task.screen_time_target,
            body_movement: task.body_movement,
        }
    }
}

/// Completion record for one custom goal, as submitted by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalReflection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenTimeReflection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyMovementReflection {
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A submitted end-of-week reflection before it is scored and stored.
#[derive(Debug, Clone)]
pub struct NewReflection {
    pub custom_goal_reflections: Vec<GoalReflection>,
    pub screen_time_reflection: ScreenTimeReflection,
    pub body_movement_reflection: BodyMovementReflection,
}

/// A stored reflection. Exactly one per (user, week); immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct Reflection {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    pub week_start: NaiveDateTime,
    pub week_end: NaiveDateTime,
    pub custom_goal_reflections: Vec<GoalReflection>,
    pub screen_time_reflection: ScreenTimeReflection,
    pub body_movement_reflection: BodyMovementReflection,
    pub completion_percentage: i64,
    pub created_at: String,
}

/// One leaderboard row. Created lazily on a user's first reflection; the
/// score only ever grows.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub score: i64,
    pub last_updated: String,
}

/// Leaderboard row as served to callers, ranked and with the display name
/// falling back to the email when absent.
#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub name: String,
    pub email: String,
    pub score: i64,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub email: String,
    pub token: String,
    pub created_at: String,
}

/// The authenticated caller, as resolved by the identity boundary (bearer
/// token middleware or the CLI's local user). Trusted without re-validation.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user_id: i64,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserIdentity {
    fn from(user: &User) -> Self {
        UserIdentity {
            user_id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Validate a task save: every goal needs a non-empty target and input, a
/// screen-time target must not be negative, and the save must carry at least
/// one goal or a screen-time target.
pub fn validate_task_input(
    custom_goals: Option<&[CustomGoal]>,
    screen_time_target: Option<Option<f64>>,
) -> Result<()> {
    if let Some(goals) = custom_goals {
        for goal in goals {
            if goal.target.trim().is_empty() {
                return Err(Error::validation("Goal target must not be empty"));
            }
            if goal.input.trim().is_empty() {
                return Err(Error::validation("Goal input must not be empty"));
            }
        }
    }
    if let Some(Some(hours)) = screen_time_target {
        if hours < 0.0 {
            return Err(Error::validation("Screen time target must not be negative"));
        }
    }

    let has_goals = custom_goals.is_some_and(|g| !g.is_empty());
    let has_screen_time = matches!(screen_time_target, Some(Some(_)));
    if !has_goals && !has_screen_time {
        return Err(Error::validation(
            "At least one goal or a screen time target is required",
        ));
    }
    Ok(())
}

/// Validate a reflection submission: the custom-goal records must be present.
/// Completion flags are type-enforced by the deserializer. The record count
/// is deliberately not checked against the task's goal list — scoring counts
/// the submitted array as-is.
pub fn validate_reflection_input(submission: &NewReflection) -> Result<()> {
    if submission.custom_goal_reflections.is_empty() {
        return Err(Error::validation("Custom goal reflections are required"));
    }
    Ok(())
}
