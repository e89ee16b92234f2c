//! Conflict hunks for interactive review.
//!
//! Diffs the incoming (remote) text directly against the local draft and
//! groups the result into display-oriented hunks: equal stretches shown
//! verbatim and changed stretches the user picks a side for. This path is
//! deliberately independent of the base-anchored merge algorithm.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::diff::{diff_lines, split_lines, DiffOpKind};

/// Kind of a [`Hunk`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HunkKind {
    /// Both versions agree; shown verbatim, not choosable
    Equal,
    /// The versions differ; resolved by a [`HunkChoice`]
    Change,
}

/// A maximal contiguous block of equal or differing lines between the local
/// draft and the incoming remote copy. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub id: usize,
    pub kind: HunkKind,
    pub local_lines: Vec<String>,
    pub local_start: usize,
    pub incoming_lines: Vec<String>,
    pub incoming_start: usize,
}

/// Per-hunk resolution choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HunkChoice {
    /// Keep the local lines (the default)
    Local,
    /// Take the incoming remote lines
    Incoming,
    /// Keep both, local lines first
    BothLocalFirst,
    /// Keep both, incoming lines first
    BothIncomingFirst,
}

/// Build the hunk list for interactive review of `incoming` vs `local`.
#[must_use]
pub fn build_diff_hunks(incoming: &str, local: &str) -> Vec<Hunk> {
    let incoming_lines = split_lines(incoming);
    let local_lines = split_lines(local);
    let ops = diff_lines(&incoming_lines, &local_lines);

    let mut hunks: Vec<Hunk> = Vec::new();
    let mut incoming_line = 1usize;
    let mut local_line = 1usize;
    let mut index = 0usize;

    while index < ops.len() {
        if ops[index].kind == DiffOpKind::Equal {
            let lines = ops[index].lines.clone();
            hunks.push(Hunk {
                id: hunks.len(),
                kind: HunkKind::Equal,
                local_lines: lines.clone(),
                local_start: local_line,
                incoming_lines: lines,
                incoming_start: incoming_line,
            });
            local_line += ops[index].lines.len();
            incoming_line += ops[index].lines.len();
            index += 1;
            continue;
        }

        // consume the full run of consecutive insert/delete ops
        let local_start = local_line;
        let incoming_start = incoming_line;
        let mut local_side: Vec<String> = Vec::new();
        let mut incoming_side: Vec<String> = Vec::new();
        while index < ops.len() && ops[index].kind != DiffOpKind::Equal {
            match ops[index].kind {
                DiffOpKind::Insert => {
                    local_line += ops[index].lines.len();
                    local_side.extend(ops[index].lines.iter().cloned());
                }
                DiffOpKind::Delete => {
                    incoming_line += ops[index].lines.len();
                    incoming_side.extend(ops[index].lines.iter().cloned());
                }
                DiffOpKind::Equal => unreachable!("guarded by loop condition"),
            }
            index += 1;
        }
        hunks.push(Hunk {
            id: hunks.len(),
            kind: HunkKind::Change,
            local_lines: local_side,
            local_start,
            incoming_lines: incoming_side,
            incoming_start,
        });
    }

    hunks
}

/// Reassemble the final text from per-hunk choices.
///
/// Equal hunks are emitted verbatim; change hunks follow their entry in
/// `choices`, defaulting to [`HunkChoice::Local`] when unspecified.
#[must_use]
pub fn compose_resolved_from_hunks(hunks: &[Hunk], choices: &HashMap<usize, HunkChoice>) -> String {
    let mut lines: Vec<&str> = Vec::new();

    for hunk in hunks {
        match hunk.kind {
            HunkKind::Equal => lines.extend(hunk.local_lines.iter().map(String::as_str)),
            HunkKind::Change => {
                let choice = choices.get(&hunk.id).copied().unwrap_or(HunkChoice::Local);
                match choice {
                    HunkChoice::Local => {
                        lines.extend(hunk.local_lines.iter().map(String::as_str));
                    }
                    HunkChoice::Incoming => {
                        lines.extend(hunk.incoming_lines.iter().map(String::as_str));
                    }
                    HunkChoice::BothLocalFirst => {
                        lines.extend(hunk.local_lines.iter().map(String::as_str));
                        lines.extend(hunk.incoming_lines.iter().map(String::as_str));
                    }
                    HunkChoice::BothIncomingFirst => {
                        lines.extend(hunk.incoming_lines.iter().map(String::as_str));
                        lines.extend(hunk.local_lines.iter().map(String::as_str));
                    }
                }
            }
        }
    }

    lines.join("\n")
}
