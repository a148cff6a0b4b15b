use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    CustomGoal, NewReflection, RankedEntry, Reflection, Task, TaskView, User, UserIdentity,
    validate_reflection_input, validate_task_input,
};
use crate::scoring::completion_percentage;
use crate::week;

/// Result of a reflection submission: the percentage earned this week and
/// the new cumulative leaderboard score.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub reflection_id: i64,
    pub completion_percentage: i64,
    pub leaderboard_score: i64,
}

pub struct TallyService {
    db: Database,
}

impl TallyService {
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Database::open(Path::new(db_path))?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    #[must_use]
    pub fn from_db(db: Database) -> Self {
        Self { db }
    }

    /// Direct access to the underlying store.
    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    // --- Users ---

    pub fn create_user(&self, name: &str, email: &str, token: &str) -> Result<User> {
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.is_empty() {
            return Err(Error::validation("Name must not be empty"));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(Error::validation(format!("Invalid email '{email}'")));
        }
        self.db.insert_user(name, &email, token)
    }

    pub fn user_by_token(&self, token: &str) -> Result<Option<User>> {
        self.db.get_user_by_token(token)
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.db.get_user_by_email(&email.trim().to_lowercase())
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }

    pub fn remove_user(&self, email: &str) -> Result<bool> {
        self.db.delete_user(&email.trim().to_lowercase())
    }

    // --- Current-week tasks ---

    /// The caller's task for the editable week. Reads never write: when no
    /// task exists yet, a blank placeholder carries the computed window.
    pub fn current_week_task(&self, user_id: i64, today: NaiveDate) -> Result<TaskView> {
        let window = week::current_week(today);
        match self.db.find_task(user_id, week::current_week_key(today))? {
            Some(task) => Ok(TaskView::from(task)),
            None => Ok(TaskView::placeholder(window)),
        }
    }

    /// Create or update the current-week task. Provided fields replace the
    /// stored ones; a save must carry at least one goal or a screen-time
    /// target (an explicit null clears the target).
    pub fn save_current_week_task(
        &self,
        user_id: i64,
        today: NaiveDate,
        custom_goals: Option<Vec<CustomGoal>>,
        screen_time_target: Option<Option<f64>>,
    ) -> Result<Task> {
        validate_task_input(custom_goals.as_deref(), screen_time_target)?;
        let window = week::current_week(today);
        self.db
            .upsert_task(user_id, window, custom_goals.as_deref(), screen_time_target)
    }

    /// Update one goal of the current-week task in place.
    pub fn update_custom_goal(
        &self,
        user_id: i64,
        today: NaiveDate,
        index: usize,
        goal: CustomGoal,
    ) -> Result<CustomGoal> {
        if goal.target.trim().is_empty() || goal.input.trim().is_empty() {
            return Err(Error::validation("Goal target and input are required"));
        }
        let task = self
            .db
            .find_task(user_id, week::current_week_key(today))?
            .ok_or_else(|| Error::not_found("No task found for current week"))?;
        if index >= task.custom_goals.len() {
            return Err(Error::validation(format!("Invalid goal index {index}")));
        }
        let mut goals = task.custom_goals;
        goals[index] = goal.clone();
        self.db.set_task_goals(task.id, &goals)?;
        Ok(goal)
    }

    /// Remove one goal of the current-week task by position.
    pub fn remove_custom_goal(
        &self,
        user_id: i64,
        today: NaiveDate,
        index: usize,
    ) -> Result<()> {
        let task = self
            .db
            .find_task(user_id, week::current_week_key(today))?
            .ok_or_else(|| Error::not_found("No task found for current week"))?;
        if index >= task.custom_goals.len() {
            return Err(Error::validation(format!("Invalid goal index {index}")));
        }
        let mut goals = task.custom_goals;
        goals.remove(index);
        self.db.set_task_goals(task.id, &goals)?;
        Ok(())
    }

    // --- Previous-week reflection ---

    /// The task eligible for reflection (last week's, or this week's on a
    /// Sunday).
    pub fn previous_week_task(&self, user_id: i64, today: NaiveDate) -> Result<Task> {
        self.db
            .find_task(user_id, week::previous_week_key(today))?
            .ok_or_else(|| Error::not_found("No task found for previous week"))
    }

    /// The already-submitted reflection for the reflectable week, if any.
    pub fn previous_week_reflection(
        &self,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<Option<Reflection>> {
        self.db
            .find_reflection(user_id, week::previous_week_key(today))
    }

    /// Validate, score, and persist a reflection for the reflectable week,
    /// applying the earned percentage to the caller's leaderboard row in the
    /// same transaction. Exactly one submission per (user, week): a repeat
    /// fails with [`Error::DuplicateSubmission`] and changes nothing.
    pub fn submit_reflection(
        &self,
        identity: &UserIdentity,
        today: NaiveDate,
        submission: &NewReflection,
    ) -> Result<SubmissionOutcome> {
        validate_reflection_input(submission)?;

        let key = week::previous_week_key(today);
        if self.db.find_reflection(identity.user_id, key)?.is_some() {
            return Err(Error::DuplicateSubmission);
        }

        let task = self
            .db
            .find_task(identity.user_id, key)?
            .ok_or_else(|| Error::not_found("No task found for previous week"))?;

        let percentage = completion_percentage(&task, submission);
        let window = week::previous_week(today);
        let (reflection, score) =
            self.db
                .insert_reflection_scored(identity, window, submission, percentage)?;

        Ok(SubmissionOutcome {
            reflection_id: reflection.id,
            completion_percentage: percentage,
            leaderboard_score: score,
        })
    }

    // --- Leaderboard ---

    /// Top-N leaderboard, ranked by cumulative score; the display name falls
    /// back to the email when absent.
    pub fn leaderboard(&self, limit: i64) -> Result<Vec<RankedEntry>> {
        let entries = self.db.get_leaderboard(limit)?;
        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| RankedEntry {
                rank: i + 1,
                name: if e.name.is_empty() { e.email.clone() } else { e.name },
                email: e.email,
                score: e.score,
                last_updated: e.last_updated,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BodyMovementReflection, GoalReflection, ScreenTimeReflection};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn service_with_user() -> (TallyService, User) {
        let service = TallyService::new_in_memory().unwrap();
        let user = service
            .create_user("Ada", "ada@example.com", "token-ada")
            .unwrap();
        (service, user)
    }

    fn goals() -> Vec<CustomGoal> {
        vec![
            CustomGoal {
                target: "Read books".to_string(),
                input: "3".to_string(),
            },
            CustomGoal {
                target: "Run".to_string(),
                input: "10km".to_string(),
            },
        ]
    }

    fn submission(goal_flags: &[bool], screen: bool, movement: bool) -> NewReflection {
        NewReflection {
            custom_goal_reflections: goal_flags
                .iter()
                .map(|&completed| GoalReflection {
                    target: None,
                    input: None,
                    completed,
                    explanation: None,
                })
                .collect(),
            screen_time_reflection: ScreenTimeReflection {
                target: Some(20.0),
                completed: screen,
                explanation: None,
            },
            body_movement_reflection: BodyMovementReflection {
                completed: movement,
                explanation: None,
            },
        }
    }

    #[test]
    fn create_user_normalizes_email() {
        let service = TallyService::new_in_memory().unwrap();
        let user = service
            .create_user("  Ada ", " Ada@Example.COM ", "tok")
            .unwrap();
        assert_eq!(user.name, "Ada");
        assert_eq!(user.email, "ada@example.com");
        assert!(service.user_by_email("ADA@example.com").unwrap().is_some());
    }

    #[test]
    fn create_user_rejects_bad_input() {
        let service = TallyService::new_in_memory().unwrap();
        assert!(service.create_user("", "a@b.c", "t").is_err());
        assert!(service.create_user("Ada", "not-an-email", "t").is_err());
    }

    #[test]
    fn current_week_task_placeholder_before_first_save() {
        let (service, user) = service_with_user();
        let today = date(2024, 6, 12);

        let view = service.current_week_task(user.id, today).unwrap();
        assert!(view.id.is_none());
        assert_eq!(view.week_start.date(), date(2024, 6, 10));
        assert_eq!(view.week_end.date(), date(2024, 6, 16));

        // The placeholder read must not have created anything
        let again = service.current_week_task(user.id, today).unwrap();
        assert!(again.id.is_none());
    }

    #[test]
    fn save_and_read_back_current_week_task() {
        let (service, user) = service_with_user();
        let today = date(2024, 6, 12);

        let task = service
            .save_current_week_task(user.id, today, Some(goals()), Some(Some(15.0)))
            .unwrap();
        assert_eq!(task.week_start.date(), date(2024, 6, 10));

        let view = service.current_week_task(user.id, today).unwrap();
        assert_eq!(view.id, Some(task.id));
        assert_eq!(view.custom_goals.len(), 2);
        assert_eq!(view.screen_time_target, Some(15.0));

        // Later in the same week the same task is found
        let view = service.current_week_task(user.id, date(2024, 6, 15)).unwrap();
        assert_eq!(view.id, Some(task.id));
    }

    #[test]
    fn save_requires_goals_or_screen_time() {
        let (service, user) = service_with_user();
        let err = service
            .save_current_week_task(user.id, date(2024, 6, 12), None, None)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn sunday_save_targets_the_upcoming_week() {
        let (service, user) = service_with_user();
        let sunday = date(2024, 6, 16);

        let task = service
            .save_current_week_task(user.id, sunday, Some(goals()), None)
            .unwrap();
        assert_eq!(task.week_start.date(), date(2024, 6, 17));

        // Visible as current on the following Monday
        let view = service.current_week_task(user.id, date(2024, 6, 17)).unwrap();
        assert_eq!(view.id, Some(task.id));
    }

    #[test]
    fn goal_edit_and_removal_by_position() {
        let (service, user) = service_with_user();
        let today = date(2024, 6, 12);
        service
            .save_current_week_task(user.id, today, Some(goals()), None)
            .unwrap();

        let replacement = CustomGoal {
            target: "Read more books".to_string(),
            input: "5".to_string(),
        };
        let updated = service
            .update_custom_goal(user.id, today, 0, replacement.clone())
            .unwrap();
        assert_eq!(updated, replacement);

        let view = service.current_week_task(user.id, today).unwrap();
        assert_eq!(view.custom_goals[0], replacement);
        assert_eq!(view.custom_goals.len(), 2);

        service.remove_custom_goal(user.id, today, 1).unwrap();
        let view = service.current_week_task(user.id, today).unwrap();
        assert_eq!(view.custom_goals.len(), 1);

        let err = service.remove_custom_goal(user.id, today, 5).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn goal_edit_without_task_is_not_found() {
        let (service, user) = service_with_user();
        let err = service
            .update_custom_goal(
                user.id,
                date(2024, 6, 12),
                0,
                CustomGoal {
                    target: "x".to_string(),
                    input: "y".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn previous_week_task_found_midweek() {
        let (service, user) = service_with_user();

        // Saved during week of June 3rd...
        service
            .save_current_week_task(user.id, date(2024, 6, 5), Some(goals()), None)
            .unwrap();

        // ...is the reflectable task the following Wednesday
        let task = service.previous_week_task(user.id, date(2024, 6, 12)).unwrap();
        assert_eq!(task.week_start.date(), date(2024, 6, 3));

        let err = service
            .previous_week_task(user.id, date(2024, 6, 26))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn sunday_reflects_on_the_week_ending_today() {
        let (service, user) = service_with_user();

        // Saved midweek for the week of June 10th
        service
            .save_current_week_task(user.id, date(2024, 6, 12), Some(goals()), None)
            .unwrap();

        // On Sunday June 16th that same week is the reflectable one
        let sunday = date(2024, 6, 16);
        let task = service.previous_week_task(user.id, sunday).unwrap();
        assert_eq!(task.week_start.date(), date(2024, 6, 10));

        let identity = UserIdentity::from(&user);
        let outcome = service
            .submit_reflection(&identity, sunday, &submission(&[true, true], false, true))
            .unwrap();
        // denominator 3 (2 goals + movement), numerator 3 → 100
        assert_eq!(outcome.completion_percentage, 100);

        let stored = service
            .previous_week_reflection(user.id, sunday)
            .unwrap()
            .unwrap();
        assert_eq!(stored.completion_percentage, 100);

        // The next day (Monday) the same reflection is still the previous
        // week's, now matched by its start day
        let monday = date(2024, 6, 17);
        let stored = service
            .previous_week_reflection(user.id, monday)
            .unwrap()
            .unwrap();
        assert_eq!(stored.week_start.date(), date(2024, 6, 10));
    }

    #[test]
    fn submit_scores_and_updates_leaderboard() {
        let (service, user) = service_with_user();
        let identity = UserIdentity::from(&user);

        service
            .save_current_week_task(user.id, date(2024, 6, 5), Some(goals()), Some(Some(20.0)))
            .unwrap();

        let today = date(2024, 6, 12);
        let outcome = service
            .submit_reflection(&identity, today, &submission(&[true, false], true, false))
            .unwrap();
        // denominator 4, numerator 2 → 50
        assert_eq!(outcome.completion_percentage, 50);
        assert_eq!(outcome.leaderboard_score, 50);

        let board = service.leaderboard(10).unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].score, 50);
        assert_eq!(board[0].name, "Ada");
    }

    #[test]
    fn second_submission_is_rejected() {
        let (service, user) = service_with_user();
        let identity = UserIdentity::from(&user);
        service
            .save_current_week_task(user.id, date(2024, 6, 5), Some(goals()), None)
            .unwrap();

        let today = date(2024, 6, 12);
        service
            .submit_reflection(&identity, today, &submission(&[true, true], false, true))
            .unwrap();

        let err = service
            .submit_reflection(&identity, today, &submission(&[true, true], false, true))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateSubmission));

        let board = service.leaderboard(10).unwrap();
        assert_eq!(board[0].score, 100);
    }

    #[test]
    fn submit_without_task_is_not_found() {
        let (service, user) = service_with_user();
        let identity = UserIdentity::from(&user);
        let err = service
            .submit_reflection(
                &identity,
                date(2024, 6, 12),
                &submission(&[true], false, false),
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn submit_requires_goal_records() {
        let (service, user) = service_with_user();
        let identity = UserIdentity::from(&user);
        let err = service
            .submit_reflection(&identity, date(2024, 6, 12), &submission(&[], false, false))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn leaderboard_name_falls_back_to_email() {
        let service = TallyService::new_in_memory().unwrap();
        let user = service.create_user("Ada", "ada@example.com", "tok").unwrap();
        service
            .save_current_week_task(user.id, date(2024, 6, 5), Some(goals()), None)
            .unwrap();

        // Identity without a display name, as an external provider may supply
        let identity = UserIdentity {
            user_id: user.id,
            name: String::new(),
            email: user.email.clone(),
        };
        service
            .submit_reflection(
                &identity,
                date(2024, 6, 12),
                &submission(&[true, true], false, true),
            )
            .unwrap();

        let board = service.leaderboard(10).unwrap();
        assert_eq!(board[0].name, "ada@example.com");
    }
}
