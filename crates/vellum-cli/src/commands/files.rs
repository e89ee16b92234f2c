//! Workspace document commands: list, new, show, edit, rename, delete, open.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use vellum_core::store::LocalStore;

use crate::commands::common;
use crate::error::CliError;

pub fn run_list(data_dir: Option<PathBuf>, as_json: bool) -> Result<(), CliError> {
    let store = common::open_store(data_dir)?;
    let manifest = store.get_workspace()?.unwrap_or_default();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&manifest.files)?);
        return Ok(());
    }

    if manifest.files.is_empty() {
        println!("No documents yet. Create one with `vellum new <name>`.");
        return Ok(());
    }

    for file in &manifest.files {
        let marker = if manifest.active_file_id.as_ref() == Some(&file.id) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {}  {}  (updated {})",
            common::short_id(&file.id),
            file.name,
            common::format_timestamp(file.updated_at)
        );
    }
    Ok(())
}

pub fn run_new(data_dir: Option<PathBuf>, name: &str) -> Result<(), CliError> {
    if name.trim().is_empty() {
        return Err(CliError::EmptyName);
    }
    let (engine, _manifest) = common::engine(data_dir)?;
    let meta = engine.create_file(name)?;
    println!("Created '{}' ({})", meta.name, common::short_id(&meta.id));
    Ok(())
}

pub fn run_show(data_dir: Option<PathBuf>, query: &str) -> Result<(), CliError> {
    let store = common::open_store(data_dir)?;
    let manifest = store.get_workspace()?.unwrap_or_default();
    let file_id = common::resolve_file_id(&manifest, query)?;

    let text = store
        .get_document(&file_id)?
        .map(|record| record.text)
        .unwrap_or_default();
    println!("{text}");
    Ok(())
}

pub fn run_edit(
    data_dir: Option<PathBuf>,
    query: &str,
    file: Option<PathBuf>,
) -> Result<(), CliError> {
    let (engine, manifest) = common::engine(data_dir)?;
    let file_id = common::resolve_file_id(&manifest, query)?;

    let text = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut stdin = io::stdin();
            if stdin.is_terminal() {
                println!("Reading new text from stdin; finish with Ctrl-D.");
            }
            let mut buffer = String::new();
            stdin.read_to_string(&mut buffer)?;
            buffer
        }
    };

    engine.record_local_edit(&file_id, &text)?;
    println!(
        "Updated '{}'. Run `vellum sync` to push it.",
        manifest.file_name(&file_id)
    );
    Ok(())
}

pub fn run_rename(data_dir: Option<PathBuf>, query: &str, name: &str) -> Result<(), CliError> {
    if name.trim().is_empty() {
        return Err(CliError::EmptyName);
    }
    let (engine, manifest) = common::engine(data_dir)?;
    let file_id = common::resolve_file_id(&manifest, query)?;
    let renamed = engine.rename_file(&file_id, name)?;
    println!("Renamed to '{}'", renamed.name);
    Ok(())
}

pub async fn run_delete(data_dir: Option<PathBuf>, query: &str) -> Result<(), CliError> {
    let (mut engine, manifest) = common::engine(data_dir)?;
    let file_id = common::resolve_file_id(&manifest, query)?;
    let name = manifest.file_name(&file_id);
    engine.delete_file(&file_id).await?;
    println!("Deleted '{name}'");
    Ok(())
}

pub fn run_open(data_dir: Option<PathBuf>, query: &str) -> Result<(), CliError> {
    let (mut engine, manifest) = common::engine(data_dir)?;
    let file_id = common::resolve_file_id(&manifest, query)?;
    engine.set_active_file(file_id.clone(), None)?;
    println!("Opened '{}'", manifest.file_name(&file_id));
    Ok(())
}
