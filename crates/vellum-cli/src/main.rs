//! Vellum CLI - keep plain-text drafts in sync with Dropbox
//!
//! A thin companion to the editor: connect an account, inspect the
//! workspace, trigger syncs, and resolve conflicts from the terminal.

mod cli;
mod commands;
mod error;
mod store;

use std::io;

use clap::{CommandFactory, Parser};
use clap_complete::{generate, shells};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, CompletionShell};
use crate::commands::{conflict, connect, files, sync_cmd};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let data_dir = cli.data_dir;
    match cli.command {
        Commands::Connect { redirect } => connect::run_connect(data_dir, redirect).await,
        Commands::Disconnect => connect::run_disconnect(data_dir),
        Commands::Status { json } => connect::run_status(data_dir, json),
        Commands::List { json } => files::run_list(data_dir, json),
        Commands::New { name } => files::run_new(data_dir, &name),
        Commands::Show { id } => files::run_show(data_dir, &id),
        Commands::Edit { id, file } => files::run_edit(data_dir, &id, file),
        Commands::Rename { id, name } => files::run_rename(data_dir, &id, &name),
        Commands::Delete { id } => files::run_delete(data_dir, &id).await,
        Commands::Open { id } => files::run_open(data_dir, &id),
        Commands::Sync { id } => sync_cmd::run_sync(data_dir, id).await,
        Commands::Pull { id } => sync_cmd::run_pull(data_dir, &id).await,
        Commands::Conflict { json } => conflict::run_conflict(data_dir, json),
        Commands::Resolve { take, hunks } => {
            conflict::run_resolve(data_dir, take, &hunks).await
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            let mut stdout = io::stdout();
            match shell {
                CompletionShell::Bash => generate(shells::Bash, &mut command, "vellum", &mut stdout),
                CompletionShell::Zsh => generate(shells::Zsh, &mut command, "vellum", &mut stdout),
                CompletionShell::Fish => generate(shells::Fish, &mut command, "vellum", &mut stdout),
            }
            Ok(())
        }
    }
}
