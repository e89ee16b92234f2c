//! vellum-core - Core sync engine for Vellum
//!
//! Offline-first document synchronization against a Dropbox-backed remote
//! store: line diff, three-way merge, interactive conflict hunks, catalog
//! reconciliation, the OAuth token lifecycle, and the orchestrator that
//! sequences them. Interfaces (editor, CLI) consume this crate.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod diff;
pub mod error;
pub mod hunks;
pub mod merge;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{ConflictState, DocumentRecord, FileId};
pub use sync::{SyncOrchestrator, SyncResult, SyncStatus};
