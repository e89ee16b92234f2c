use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "vellum")]
#[command(about = "Keep plain-text drafts in sync with Dropbox")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local data directory
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to Dropbox (prints the authorization URL, or finishes with --redirect)
    Connect {
        /// Redirect URL (or bare query string) copied from the browser
        #[arg(long, value_name = "URL")]
        redirect: Option<String>,
    },
    /// Disconnect and forget the stored token
    Disconnect,
    /// Show connection, workspace, and conflict status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List documents in the workspace
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a new document
    New {
        /// Document name
        name: String,
    },
    /// Print a document's text
    Show {
        /// Document ID, unique ID prefix, or exact name
        id: String,
    },
    /// Replace a document's text from a file or stdin
    Edit {
        /// Document ID, unique ID prefix, or exact name
        id: String,
        /// Read new text from this file (stdin when omitted)
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
    /// Rename a document
    Rename {
        /// Document ID, unique ID prefix, or exact name
        id: String,
        /// New name
        name: String,
    },
    /// Delete a document locally and remotely
    Delete {
        /// Document ID, unique ID prefix, or exact name
        id: String,
    },
    /// Open a document (makes it the active one)
    Open {
        /// Document ID, unique ID prefix, or exact name
        id: String,
    },
    /// Sync the active document (or a specific one) and refresh the catalog
    Sync {
        /// Document ID, unique ID prefix, or exact name
        id: Option<String>,
    },
    /// Adopt the remote copy of a document, discarding the local draft
    Pull {
        /// Document ID, unique ID prefix, or exact name
        id: String,
    },
    /// Show the outstanding conflict as reviewable hunks
    Conflict {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve the outstanding conflict
    Resolve {
        /// Choice applied to every changed hunk
        #[arg(long, value_enum, default_value_t = ChoiceArg::Local)]
        take: ChoiceArg,
        /// Per-hunk overrides, e.g. --hunk 1=incoming --hunk 3=both-local-first
        #[arg(long = "hunk", value_name = "ID=CHOICE")]
        hunks: Vec<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ChoiceArg {
    Local,
    Incoming,
    BothLocalFirst,
    BothIncomingFirst,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
