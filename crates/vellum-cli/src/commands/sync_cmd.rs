//! Sync and pull commands.

use std::path::PathBuf;

use vellum_core::{SyncResult, SyncStatus};

use crate::commands::common;
use crate::error::CliError;
use crate::store::JsonFileStore;

pub async fn run_sync(data_dir: Option<PathBuf>, id: Option<String>) -> Result<(), CliError> {
    let (mut engine, manifest) = common::engine(data_dir.clone())?;
    let result = match id {
        Some(query) => {
            let file_id = common::resolve_file_id(&manifest, &query)?;
            engine.sync_file(file_id).await
        }
        None => engine.sync_active().await,
    };

    let store = common::open_store(data_dir)?;
    report(&result, &store, "Sync completed")
}

pub async fn run_pull(data_dir: Option<PathBuf>, query: &str) -> Result<(), CliError> {
    let (mut engine, manifest) = common::engine(data_dir.clone())?;
    let file_id = common::resolve_file_id(&manifest, query)?;
    let result = engine.pull_file(file_id).await;

    let store = common::open_store(data_dir)?;
    report(&result, &store, "Pulled the remote copy")
}

fn report(result: &SyncResult, store: &JsonFileStore, done: &str) -> Result<(), CliError> {
    tracing::debug!(status = ?result.status, "sync attempt finished");
    match result.status {
        SyncStatus::Clean => {
            store.clear_conflict()?;
            println!("{}", result.notice.as_deref().unwrap_or(done));
            Ok(())
        }
        SyncStatus::Conflict => {
            if let Some(conflict) = &result.conflict {
                store.save_conflict(conflict)?;
                println!(
                    "Conflict in '{}': {}",
                    conflict.file_name, conflict.reason
                );
            }
            println!("Review with `vellum conflict`, then apply `vellum resolve`.");
            Ok(())
        }
        SyncStatus::Skipped => {
            println!("{}", result.notice.as_deref().unwrap_or("Nothing to do"));
            Ok(())
        }
        SyncStatus::Error => Err(CliError::Sync(
            result
                .notice
                .clone()
                .unwrap_or_else(|| "Sync failed".to_string()),
        )),
    }
}
