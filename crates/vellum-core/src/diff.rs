//! Line-level diff between two text versions.
//!
//! The differ is the primitive under both the three-way merger and the
//! conflict hunk builder: a classic LCS dynamic program over exact line
//! equality, backtracked with a deterministic tie-break and compacted into
//! runs.

use serde::{Deserialize, Serialize};

/// Kind of edit represented by a [`DiffOp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffOpKind {
    /// Lines present in both versions
    Equal,
    /// Lines present only in the new version
    Insert,
    /// Lines present only in the old version
    Delete,
}

/// A maximal run of same-kind line edits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOp {
    pub kind: DiffOpKind,
    pub lines: Vec<String>,
}

/// A coarser view of a diff in old-text (base) line coordinates.
///
/// Replaces the half-open line range `start..end` of the old text with
/// `insert`. Pure insertions are zero-width (`start == end`); pure deletions
/// carry an empty `insert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub start: usize,
    pub end: usize,
    pub insert: Vec<String>,
}

impl Change {
    /// Whether this change inserts at a point without replacing any line.
    #[must_use]
    pub fn is_zero_width(&self) -> bool {
        self.start == self.end
    }
}

/// Split text into lines on `\n`, keeping the empty trailing element so that
/// `join("\n")` round-trips the input exactly.
#[must_use]
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}

/// Compute the ordered, compacted edit script transforming `old` into `new`.
///
/// O(n*m) time and space. When the LCS table is tied, insert is preferred
/// over delete so the output is deterministic and replacements always come
/// out as a delete run followed by an insert run.
#[must_use]
pub fn diff_lines(old: &[&str], new: &[&str]) -> Vec<DiffOp> {
    let n = old.len();
    let m = new.len();

    let mut table = vec![vec![0u32; m + 1]; n + 1];
    for i in 1..=n {
        for j in 1..=m {
            table[i][j] = if old[i - 1] == new[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i][j - 1].max(table[i - 1][j])
            };
        }
    }

    let mut reversed: Vec<(DiffOpKind, &str)> = Vec::with_capacity(n + m);
    let mut i = n;
    let mut j = m;
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && old[i - 1] == new[j - 1] {
            reversed.push((DiffOpKind::Equal, old[i - 1]));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[i][j - 1] >= table[i - 1][j]) {
            reversed.push((DiffOpKind::Insert, new[j - 1]));
            j -= 1;
        } else {
            reversed.push((DiffOpKind::Delete, old[i - 1]));
            i -= 1;
        }
    }
    reversed.reverse();

    compact(reversed)
}

/// Derive [`Change`] records in old-text coordinates from an edit script.
///
/// Equal runs advance the cursor and are dropped; a delete run immediately
/// followed by an insert run collapses into a single replace spanning both.
#[must_use]
pub fn changes_from_ops(ops: &[DiffOp]) -> Vec<Change> {
    let mut changes: Vec<Change> = Vec::new();
    let mut cursor = 0usize;

    for op in ops {
        match op.kind {
            DiffOpKind::Equal => cursor += op.lines.len(),
            DiffOpKind::Delete => {
                changes.push(Change {
                    start: cursor,
                    end: cursor + op.lines.len(),
                    insert: Vec::new(),
                });
                cursor += op.lines.len();
            }
            DiffOpKind::Insert => {
                let collapses = changes
                    .last()
                    .is_some_and(|last| last.end == cursor && !last.is_zero_width() && last.insert.is_empty());
                if collapses {
                    if let Some(last) = changes.last_mut() {
                        last.insert.clone_from(&op.lines);
                    }
                } else {
                    changes.push(Change {
                        start: cursor,
                        end: cursor,
                        insert: op.lines.clone(),
                    });
                }
            }
        }
    }

    changes
}

/// Compute [`Change`] records between two full texts (`new` vs `old`).
#[must_use]
pub fn diff_changes(old: &str, new: &str) -> Vec<Change> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    changes_from_ops(&diff_lines(&old_lines, &new_lines))
}

fn compact(flat: Vec<(DiffOpKind, &str)>) -> Vec<DiffOp> {
    let mut ops: Vec<DiffOp> = Vec::new();
    for (kind, line) in flat {
        match ops.last_mut() {
            Some(last) if last.kind == kind => last.lines.push(line.to_string()),
            _ => ops.push(DiffOp {
                kind,
                lines: vec![line.to_string()],
            }),
        }
    }
    ops
}
