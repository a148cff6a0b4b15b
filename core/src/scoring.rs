use crate::models::{NewReflection, Task};

/// Compute the completion percentage for a submitted reflection against the
/// week's task.
///
/// The denominator counts every slot the task carried: one per custom goal,
/// one for the screen-time target when set, and one for body movement —
/// always, whether or not the task flagged it. The numerator counts
/// `completed` records in the submission; the screen-time completion only
/// counts when the task actually had a screen-time target. The submitted
/// goal records are counted as-is, with no positional matching against the
/// task's goal list.
///
/// Returns a rounded integer percentage — [0, 100] for any submission whose
/// record count matches the task — or 0 when the denominator is 0
/// (unreachable while the body-movement slot is always counted, but guarded).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn completion_percentage(task: &Task, submission: &NewReflection) -> i64 {
    let mut total = task.custom_goals.len() as i64;
    let mut completed = submission
        .custom_goal_reflections
        .iter()
        .filter(|r| r.completed)
        .count() as i64;

    if task.screen_time_target.is_some() {
        total += 1;
        if submission.screen_time_reflection.completed {
            completed += 1;
        }
    }

    total += 1;
    if submission.body_movement_reflection.completed {
        completed += 1;
    }

    if total == 0 {
        return 0;
    }
    (completed as f64 / total as f64 * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BodyMovementReflection, CustomGoal, GoalReflection, ScreenTimeReflection,
    };

    fn task(goals: usize, screen_time: Option<f64>) -> Task {
        let week = crate::week::current_week(
            chrono::NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
        );
        Task {
            id: 1,
            uuid: "t".to_string(),
            user_id: 1,
            week_start: week.start,
            week_end: week.end,
            custom_goals: (0..goals)
                .map(|i| CustomGoal {
                    target: format!("goal {i}"),
                    input: "1".to_string(),
                })
                .collect(),
            screen_time_target: screen_time,
            body_movement: false,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn submission(
        goal_flags: &[bool],
        screen_time: bool,
        body_movement: bool,
    ) -> NewReflection {
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
                target: None,
                completed: screen_time,
                explanation: None,
            },
            body_movement_reflection: BodyMovementReflection {
                completed: body_movement,
                explanation: None,
            },
        }
    }

    #[test]
    fn two_goals_screen_time_and_movement() {
        // denominator 4: 2 goals + screen-time slot + body-movement slot;
        // numerator 2: 1 goal + screen time → 50
        let task = task(2, Some(20.0));
        let sub = submission(&[true, false], true, false);
        assert_eq!(completion_percentage(&task, &sub), 50);
    }

    #[test]
    fn body_movement_only() {
        // denominator 1 (body movement alone), completed → 100
        let task = task(0, None);
        let sub = submission(&[], false, true);
        assert_eq!(completion_percentage(&task, &sub), 100);
    }

    #[test]
    fn nothing_completed_is_zero() {
        let task = task(3, Some(10.0));
        let sub = submission(&[false, false, false], false, false);
        assert_eq!(completion_percentage(&task, &sub), 0);
    }

    #[test]
    fn everything_completed_is_hundred() {
        let task = task(3, Some(10.0));
        let sub = submission(&[true, true, true], true, true);
        assert_eq!(completion_percentage(&task, &sub), 100);
    }

    #[test]
    fn percentage_is_rounded() {
        // 1 of 3 slots (2 goals + movement, no screen time): 33.33 → 33
        let task = task(2, None);
        let sub = submission(&[true, false], false, false);
        assert_eq!(completion_percentage(&task, &sub), 33);

        // 2 of 3 slots: 66.67 → 67
        let sub = submission(&[true, true], false, false);
        assert_eq!(completion_percentage(&task, &sub), 67);
    }

    #[test]
    fn screen_time_completion_ignored_without_target() {
        // The task has no screen-time target, so the slot is absent from the
        // denominator and a claimed completion adds nothing
        let task = task(1, None);
        let sub = submission(&[false], true, false);
        assert_eq!(completion_percentage(&task, &sub), 0);
    }

    #[test]
    fn submitted_records_counted_as_is() {
        // More completed records than the task has goals: the numerator takes
        // the submitted array at face value, with no positional matching
        let task = task(1, None);
        let sub = submission(&[true, true, true], false, true);
        // denominator 2 (1 goal + movement), numerator 4 → 200
        assert_eq!(completion_percentage(&task, &sub), 200);
    }
}
