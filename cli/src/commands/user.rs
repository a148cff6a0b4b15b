use anyhow::{Result, bail};
use std::process;
use tabled::{Table, Tabled, settings::Style};

use tally_core::service::TallyService;

use crate::config::generate_token;

pub(crate) fn cmd_user_add(
    service: &TallyService,
    name: &str,
    email: &str,
    json: bool,
) -> Result<()> {
    let token = generate_token();
    let user = service.create_user(name, email, &token)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
        return Ok(());
    }

    let name = &user.name;
    let email = &user.email;
    println!("Added user {name} <{email}>");
    println!("API token: {token}");
    println!("Include in requests: Authorization: Bearer {token}");
    Ok(())
}

pub(crate) fn cmd_user_list(service: &TallyService, json: bool) -> Result<()> {
    let users = service.list_users()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
        return Ok(());
    }

    if users.is_empty() {
        eprintln!("No users yet. Use `tally user add <name> <email>` to add one.");
        process::exit(2);
    }

    #[derive(Tabled)]
    struct UserRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Email")]
        email: String,
        #[tabled(rename = "Token")]
        token: String,
    }

    let rows: Vec<UserRow> = users
        .iter()
        .map(|u| UserRow {
            name: u.name.clone(),
            email: u.email.clone(),
            token: if u.token.len() > 8 {
                format!("{}...{}", &u.token[..4], &u.token[u.token.len() - 4..])
            } else {
                u.token.clone()
            },
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    eprintln!("Full tokens are shown once at `tally user add` (or with --json).");

    Ok(())
}

pub(crate) fn cmd_user_remove(service: &TallyService, email: &str, json: bool) -> Result<()> {
    let removed = service.remove_user(email)?;
    if !removed {
        bail!("No user with email '{email}'");
    }

    if json {
        println!("{}", serde_json::json!({ "removed": email }));
    } else {
        println!("Removed user {email}");
    }
    Ok(())
}
