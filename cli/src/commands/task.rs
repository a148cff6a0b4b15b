use anyhow::{Result, bail};
use chrono::Local;
use std::process;

use tally_core::models::{CustomGoal, TaskView};
use tally_core::service::TallyService;

use super::helpers::{format_window, resolve_identity};

pub(crate) fn cmd_task_show(
    service: &TallyService,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let identity = resolve_identity(service, user)?;
    let today = Local::now().date_naive();
    let view = service.current_week_task(identity.user_id, today)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let window = format_window(view.week_start, view.week_end);
    println!("=== Week {window} ===\n");

    if view.custom_goals.is_empty() && view.screen_time_target.is_none() {
        eprintln!("No goals set for this week yet. Use `tally task add <target> <input>`.");
        process::exit(2);
    }

    for (i, goal) in view.custom_goals.iter().enumerate() {
        let n = i + 1;
        let target = &goal.target;
        let input = &goal.input;
        println!("  [{n}] {target} — {input}");
    }
    if let Some(hours) = view.screen_time_target {
        println!("  Screen time target: {hours} h/week");
    }

    Ok(())
}

pub(crate) fn cmd_task_add(
    service: &TallyService,
    target: &str,
    input: &str,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let identity = resolve_identity(service, user)?;
    let today = Local::now().date_naive();

    let view = service.current_week_task(identity.user_id, today)?;
    let mut goals = view.custom_goals;
    goals.push(CustomGoal {
        target: target.to_string(),
        input: input.to_string(),
    });

    let task = service.save_current_week_task(identity.user_id, today, Some(goals), None)?;
    let view = TaskView::from(task);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        let n = view.custom_goals.len();
        let window = format_window(view.week_start, view.week_end);
        println!("Added goal [{n}] for week {window}: {target} — {input}");
    }
    Ok(())
}

pub(crate) fn cmd_task_edit(
    service: &TallyService,
    number: usize,
    target: &str,
    input: &str,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let identity = resolve_identity(service, user)?;
    let today = Local::now().date_naive();

    let view = service.current_week_task(identity.user_id, today)?;
    check_goal_number(number, view.custom_goals.len())?;

    let goal = service.update_custom_goal(
        identity.user_id,
        today,
        number - 1,
        CustomGoal {
            target: target.to_string(),
            input: input.to_string(),
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goal)?);
    } else {
        println!("Updated goal [{number}]: {target} — {input}");
    }
    Ok(())
}

pub(crate) fn cmd_task_remove(
    service: &TallyService,
    number: usize,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let identity = resolve_identity(service, user)?;
    let today = Local::now().date_naive();

    let view = service.current_week_task(identity.user_id, today)?;
    check_goal_number(number, view.custom_goals.len())?;

    service.remove_custom_goal(identity.user_id, today, number - 1)?;

    if json {
        println!("{}", serde_json::json!({ "removed": number }));
    } else {
        println!("Removed goal [{number}]");
    }
    Ok(())
}

pub(crate) fn cmd_task_screen_time(
    service: &TallyService,
    hours: Option<f64>,
    clear: bool,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let identity = resolve_identity(service, user)?;
    let today = Local::now().date_naive();

    let value = if clear {
        Some(None)
    } else if let Some(hours) = hours {
        Some(Some(hours))
    } else {
        bail!("Provide a weekly target in hours, or --clear to remove it");
    };

    // Carry the stored goals along so the save stays valid
    let view = service.current_week_task(identity.user_id, today)?;
    let task = service.save_current_week_task(
        identity.user_id,
        today,
        Some(view.custom_goals),
        value,
    )?;
    let view = TaskView::from(task);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        match view.screen_time_target {
            Some(hours) => println!("Screen time target set to {hours} h/week"),
            None => println!("Screen time target cleared"),
        }
    }
    Ok(())
}

fn check_goal_number(number: usize, count: usize) -> Result<()> {
    if number == 0 || number > count {
        if count == 0 {
            bail!("No goals set for this week yet");
        }
        bail!("Goal number {number} out of range (1-{count})");
    }
    Ok(())
}
