//! Conflict review and resolution commands.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::ValueEnum;
use vellum_core::hunks::{build_diff_hunks, compose_resolved_from_hunks, HunkChoice, HunkKind};
use vellum_core::SyncStatus;

use crate::cli::ChoiceArg;
use crate::commands::common;
use crate::error::CliError;

pub fn run_conflict(data_dir: Option<PathBuf>, as_json: bool) -> Result<(), CliError> {
    let store = common::open_store(data_dir)?;
    let conflict = store.load_conflict()?.ok_or(CliError::NoConflict)?;
    let hunks = build_diff_hunks(&conflict.remote, &conflict.local);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&hunks)?);
        return Ok(());
    }

    println!("Conflict in '{}': {}", conflict.file_name, conflict.reason);
    println!();
    for hunk in &hunks {
        match hunk.kind {
            HunkKind::Equal => {
                for line in &hunk.local_lines {
                    println!("    {line}");
                }
            }
            HunkKind::Change => {
                println!("<<<<<<< local [hunk {}]", hunk.id);
                for line in &hunk.local_lines {
                    println!("{line}");
                }
                println!("=======");
                for line in &hunk.incoming_lines {
                    println!("{line}");
                }
                println!(">>>>>>> incoming");
            }
        }
    }
    println!();
    println!("Apply with `vellum resolve --take <choice>` (per-hunk: --hunk ID=CHOICE).");
    Ok(())
}

pub async fn run_resolve(
    data_dir: Option<PathBuf>,
    take: ChoiceArg,
    overrides: &[String],
) -> Result<(), CliError> {
    let store = common::open_store(data_dir.clone())?;
    let conflict = store.load_conflict()?.ok_or(CliError::NoConflict)?;

    let hunks = build_diff_hunks(&conflict.remote, &conflict.local);
    let mut choices: HashMap<usize, HunkChoice> = hunks
        .iter()
        .filter(|hunk| hunk.kind == HunkKind::Change)
        .map(|hunk| (hunk.id, to_hunk_choice(take)))
        .collect();
    for raw in overrides {
        let (id, choice) = parse_override(raw)?;
        choices.insert(id, choice);
    }

    let resolved = compose_resolved_from_hunks(&hunks, &choices);

    let (mut engine, _manifest) = common::engine(data_dir)?;
    engine.restore_conflict(conflict);
    let result = engine.resolve_conflict(resolved).await;

    match result.status {
        SyncStatus::Clean => {
            store.clear_conflict()?;
            println!("Conflict resolved and synced.");
            Ok(())
        }
        SyncStatus::Skipped => {
            println!(
                "{}",
                result.notice.as_deref().unwrap_or("Resolution was skipped")
            );
            Ok(())
        }
        SyncStatus::Conflict | SyncStatus::Error => Err(CliError::Sync(
            result
                .notice
                .unwrap_or_else(|| "Resolution failed".to_string()),
        )),
    }
}

fn to_hunk_choice(choice: ChoiceArg) -> HunkChoice {
    match choice {
        ChoiceArg::Local => HunkChoice::Local,
        ChoiceArg::Incoming => HunkChoice::Incoming,
        ChoiceArg::BothLocalFirst => HunkChoice::BothLocalFirst,
        ChoiceArg::BothIncomingFirst => HunkChoice::BothIncomingFirst,
    }
}

fn parse_override(raw: &str) -> Result<(usize, HunkChoice), CliError> {
    let invalid = || CliError::InvalidHunkOverride(raw.to_string());
    let (id, choice) = raw.split_once('=').ok_or_else(invalid)?;
    let id: usize = id.trim().parse().map_err(|_| invalid())?;
    let choice = ChoiceArg::from_str(choice.trim(), true).map_err(|_| invalid())?;
    Ok((id, to_hunk_choice(choice)))
}
