//! Data models shared across the sync engine

mod conflict;
mod document;

pub use conflict::ConflictState;
pub use document::{DocumentRecord, FileId};
