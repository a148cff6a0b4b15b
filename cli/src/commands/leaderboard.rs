use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use tally_core::service::TallyService;

pub(crate) fn cmd_leaderboard(service: &TallyService, limit: i64, json: bool) -> Result<()> {
    let board = service.leaderboard(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&board)?);
        return Ok(());
    }

    if board.is_empty() {
        eprintln!("Leaderboard is empty. Scores appear once reflections are submitted.");
        process::exit(2);
    }

    #[derive(Tabled)]
    struct BoardRow {
        #[tabled(rename = "#")]
        rank: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Score")]
        score: i64,
        #[tabled(rename = "Last updated")]
        last_updated: String,
    }

    let rows: Vec<BoardRow> = board
        .iter()
        .map(|e| BoardRow {
            rank: e.rank,
            name: e.name.clone(),
            score: e.score,
            // Keep just the date part of the RFC 3339 instant
            last_updated: e.last_updated.chars().take(10).collect(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
