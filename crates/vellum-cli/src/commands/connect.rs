//! Connect, disconnect, and status commands.

use std::path::PathBuf;

use serde::Serialize;
use vellum_core::auth::parse_redirect;
use vellum_core::store::LocalStore;

use crate::commands::common;
use crate::error::CliError;

pub async fn run_connect(
    data_dir: Option<PathBuf>,
    redirect: Option<String>,
) -> Result<(), CliError> {
    let store = common::open_store(data_dir)?;
    let client = common::oauth_client()?;

    match redirect {
        None => {
            let pending = client.begin_authorization();
            store.save_pending_authorization(&pending)?;

            println!("Open this URL in your browser and authorize Vellum:");
            println!();
            println!("  {}", pending.authorize_url);
            println!();
            println!("Afterwards, finish with:");
            println!("  vellum connect --redirect '<the URL your browser was sent to>'");
        }
        Some(raw) => {
            let pending = store
                .load_pending_authorization()?
                .ok_or(CliError::NoPendingAuthorization)?;
            let (code, state) = parse_redirect(&raw)?;
            let token = client.complete_authorization(&pending, &state, &code).await?;

            store.put_token(Some(&token))?;
            store.clear_pending_authorization()?;
            match &token.account_id {
                Some(account_id) => println!("Connected to Dropbox (account {account_id})."),
                None => println!("Connected to Dropbox."),
            }
        }
    }
    Ok(())
}

pub fn run_disconnect(data_dir: Option<PathBuf>) -> Result<(), CliError> {
    let store = common::open_store(data_dir)?;
    store.put_token(None)?;
    store.clear_pending_authorization()?;
    println!("Disconnected. The stored token was removed.");
    Ok(())
}

#[derive(Serialize)]
struct StatusItem {
    connected: bool,
    account_id: Option<String>,
    token_expires_at: Option<i64>,
    documents: usize,
    active_file: Option<String>,
    conflict_file: Option<String>,
}

pub fn run_status(data_dir: Option<PathBuf>, as_json: bool) -> Result<(), CliError> {
    let store = common::open_store(data_dir)?;
    let token = store.get_token()?;
    let manifest = store.get_workspace()?.unwrap_or_default();
    let conflict = store.load_conflict()?;

    let active_file = manifest
        .active_file_id
        .as_ref()
        .map(|file_id| manifest.file_name(file_id));

    let item = StatusItem {
        connected: token.is_some(),
        account_id: token.as_ref().and_then(|token| token.account_id.clone()),
        token_expires_at: token.as_ref().map(|token| token.expires_at),
        documents: manifest.files.len(),
        active_file,
        conflict_file: conflict.as_ref().map(|conflict| conflict.file_name.clone()),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    if item.connected {
        match &item.account_id {
            Some(account_id) => println!("Connected to Dropbox (account {account_id})."),
            None => println!("Connected to Dropbox."),
        }
    } else {
        println!("Not connected. Run `vellum connect` to start syncing.");
    }
    println!("Documents: {}", item.documents);
    if let Some(active_file) = &item.active_file {
        println!("Open document: {active_file}");
    }
    if let Some(conflict_file) = &item.conflict_file {
        println!("Unresolved conflict in '{conflict_file}'. See `vellum conflict`.");
    }
    Ok(())
}
