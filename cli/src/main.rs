mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;

use crate::commands::{
    cmd_leaderboard, cmd_reflect_show, cmd_reflect_submit, cmd_task_add, cmd_task_edit,
    cmd_task_remove, cmd_task_screen_time, cmd_task_show, cmd_user_add, cmd_user_list,
    cmd_user_remove,
};
use crate::config::Config;
use tally_core::db::Database;
use tally_core::service::TallyService;

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "A simple weekly goals tracker CLI",
    long_about = "\n\n  ████████╗ █████╗ ██╗     ██╗  ██╗   ██╗
  ╚══██╔══╝██╔══██╗██║     ██║  ╚██╗ ██╔╝
     ██║   ███████║██║     ██║   ╚████╔╝
     ██║   ██╔══██║██║     ██║    ╚██╔╝
     ██║   ██║  ██║███████╗███████╗██║
     ╚═╝   ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝
        plan the week. keep the score.
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage this week's goals
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Reflect on the previous week and earn your score
    Reflect {
        #[command(subcommand)]
        command: ReflectCommands,
    },
    /// Show the leaderboard
    Leaderboard {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage users and their API tokens
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable token authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Show this week's goals
    Show {
        /// Act as this user (email; default: the local user)
        #[arg(long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a goal for this week
    Add {
        /// What to aim for (e.g. "Read books")
        target: String,
        /// The measure (e.g. "3" or "2 chapters")
        input: String,
        /// Act as this user (email; default: the local user)
        #[arg(long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a goal by its number (see `task show`)
    Edit {
        /// Goal number (1-based)
        number: usize,
        /// New target
        target: String,
        /// New input
        input: String,
        /// Act as this user (email; default: the local user)
        #[arg(long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a goal by its number
    Remove {
        /// Goal number (1-based)
        number: usize,
        /// Act as this user (email; default: the local user)
        #[arg(long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set or clear the weekly screen-time target
    ScreenTime {
        /// Weekly target in hours
        hours: Option<f64>,
        /// Clear the target
        #[arg(long)]
        clear: bool,
        /// Act as this user (email; default: the local user)
        #[arg(long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ReflectCommands {
    /// Show the previous week's goals and reflection status
    Show {
        /// Act as this user (email; default: the local user)
        #[arg(long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Submit the reflection for the previous week
    Submit {
        /// Comma-separated numbers of the goals you completed (e.g. "1,3")
        #[arg(long)]
        done: Option<String>,
        /// The screen-time target was met
        #[arg(long)]
        screen_time: bool,
        /// You moved your body this week
        #[arg(long)]
        moved: bool,
        /// Act as this user (email; default: the local user)
        #[arg(long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Add a user and print their API token
    Add {
        /// Display name
        name: String,
        /// Email (unique)
        email: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a user by email
    Remove {
        /// Email of the user to remove
        email: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::open(&config.db_path)?;
    let service = TallyService::from_db(db);

    match cli.command {
        Commands::Task { command } => match command {
            TaskCommands::Show { user, json } => cmd_task_show(&service, user.as_deref(), json),
            TaskCommands::Add {
                target,
                input,
                user,
                json,
            } => cmd_task_add(&service, &target, &input, user.as_deref(), json),
            TaskCommands::Edit {
                number,
                target,
                input,
                user,
                json,
            } => cmd_task_edit(&service, number, &target, &input, user.as_deref(), json),
            TaskCommands::Remove { number, user, json } => {
                cmd_task_remove(&service, number, user.as_deref(), json)
            }
            TaskCommands::ScreenTime {
                hours,
                clear,
                user,
                json,
            } => cmd_task_screen_time(&service, hours, clear, user.as_deref(), json),
        },
        Commands::Reflect { command } => match command {
            ReflectCommands::Show { user, json } => {
                cmd_reflect_show(&service, user.as_deref(), json)
            }
            ReflectCommands::Submit {
                done,
                screen_time,
                moved,
                user,
                json,
            } => cmd_reflect_submit(
                &service,
                done.as_deref(),
                screen_time,
                moved,
                user.as_deref(),
                json,
            ),
        },
        Commands::Leaderboard { limit, json } => cmd_leaderboard(&service, limit, json),
        Commands::User { command } => match command {
            UserCommands::Add { name, email, json } => {
                cmd_user_add(&service, &name, &email, json)
            }
            UserCommands::List { json } => cmd_user_list(&service, json),
            UserCommands::Remove { email, json } => cmd_user_remove(&service, &email, json),
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => server::start_server(service, port, &bind, !no_auth).await,
    }
}
