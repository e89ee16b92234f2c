//! Three-way text merge.
//!
//! Combines the local and remote edits made since a shared base snapshot.
//! Disjoint edits merge cleanly; overlapping or same-region edits surface as
//! a conflict value carrying the untouched local text. Pure: inputs are
//! never mutated and no side effects occur.

use std::fmt;

use crate::diff::{diff_changes, split_lines, Change};

/// Why a three-way merge could not auto-resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The sides' edit ranges overlap
    OverlappingEdits,
    /// Both sides changed the same region differently
    SameRegion,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverlappingEdits => write!(f, "Overlapping edits detected."),
            Self::SameRegion => write!(f, "Changes modify the same region."),
        }
    }
}

/// Result of a three-way merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Merge completed without user arbitration; carries the merged text
    Clean(String),
    /// Merge requires arbitration; carries the unmerged local text
    Conflict {
        local: String,
        reason: ConflictReason,
    },
}

impl MergeOutcome {
    /// Whether the merge completed cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean(_))
    }
}

/// Merge `local` and `remote` against their common ancestor `base`.
pub fn merge_three_way(base: &str, local: &str, remote: &str) -> MergeOutcome {
    // fast paths, checked in this order
    if local == remote {
        return MergeOutcome::Clean(local.to_string());
    }
    if base == local {
        return MergeOutcome::Clean(remote.to_string());
    }
    if base == remote {
        return MergeOutcome::Clean(local.to_string());
    }

    let base_lines = split_lines(base);
    let local_changes = diff_changes(base, local);
    let remote_changes = diff_changes(base, remote);

    let mut merged: Vec<String> = Vec::new();
    let mut cursor = 0usize;
    let mut li = 0usize;
    let mut ri = 0usize;

    let conflict = |reason: ConflictReason| MergeOutcome::Conflict {
        local: local.to_string(),
        reason,
    };

    loop {
        match (local_changes.get(li), remote_changes.get(ri)) {
            (None, None) => break,
            (Some(change), None) => {
                apply_change(&base_lines, change, &mut merged, &mut cursor);
                li += 1;
            }
            (None, Some(change)) => {
                apply_change(&base_lines, change, &mut merged, &mut cursor);
                ri += 1;
            }
            (Some(local_change), Some(remote_change)) => {
                if local_change.start == remote_change.start {
                    if local_change == remote_change {
                        // both sides made the identical edit; apply once
                        apply_change(&base_lines, local_change, &mut merged, &mut cursor);
                    } else if local_change.is_zero_width() && remote_change.is_zero_width() {
                        // simultaneous inserts at the same point: local's
                        // insertion goes first (arbitrary but stable convention)
                        copy_base(&base_lines, local_change.start, &mut merged, &mut cursor);
                        merged.extend(local_change.insert.iter().cloned());
                        merged.extend(remote_change.insert.iter().cloned());
                    } else {
                        return conflict(ConflictReason::SameRegion);
                    }
                    li += 1;
                    ri += 1;
                } else if local_change.start < remote_change.start {
                    if overlaps(local_change, remote_change) {
                        return conflict(ConflictReason::OverlappingEdits);
                    }
                    apply_change(&base_lines, local_change, &mut merged, &mut cursor);
                    li += 1;
                } else {
                    if overlaps(remote_change, local_change) {
                        return conflict(ConflictReason::OverlappingEdits);
                    }
                    apply_change(&base_lines, remote_change, &mut merged, &mut cursor);
                    ri += 1;
                }
            }
        }
    }

    for line in &base_lines[cursor..] {
        merged.push((*line).to_string());
    }

    MergeOutcome::Clean(merged.join("\n"))
}

/// Whether the earlier-starting change collides with the other side's next
/// change. `earlier.start < other.start` is an invariant here, so a plain
/// end-past-start test also catches a zero-width insert landing strictly
/// inside the earlier change's replaced range.
fn overlaps(earlier: &Change, other: &Change) -> bool {
    earlier.end > other.start
}

fn apply_change(base: &[&str], change: &Change, merged: &mut Vec<String>, cursor: &mut usize) {
    copy_base(base, change.start, merged, cursor);
    merged.extend(change.insert.iter().cloned());
    *cursor = change.end;
}

fn copy_base(base: &[&str], until: usize, merged: &mut Vec<String>, cursor: &mut usize) {
    for line in &base[*cursor..until] {
        merged.push((*line).to_string());
    }
    *cursor = until;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn clean(outcome: MergeOutcome) -> String {
        match outcome {
            MergeOutcome::Clean(text) => text,
            MergeOutcome::Conflict { reason, .. } => panic!("unexpected conflict: {reason}"),
        }
    }

    #[test]
    fn local_only_edit_wins() {
        let merged = merge_three_way("A\nB\nC", "A\nB2\nC", "A\nB\nC");
        assert_eq!(clean(merged), "A\nB2\nC");
    }

    #[test]
    fn remote_only_edit_wins() {
        let merged = merge_three_way("A\nB\nC", "A\nB\nC", "A\nB2\nC");
        assert_eq!(clean(merged), "A\nB2\nC");
    }

    #[test]
    fn unchanged_local_adopts_any_remote() {
        // base == local means everything remote did is safe to take
        let merged = merge_three_way("L", "L", "completely\ndifferent");
        assert_eq!(clean(merged), "completely\ndifferent");
    }

    #[test]
    fn unchanged_remote_keeps_any_local() {
        let merged = merge_three_way("R", "totally\nnew", "R");
        assert_eq!(clean(merged), "totally\nnew");
    }

    #[test]
    fn merge_is_idempotent() {
        let text = "one\ntwo\nthree";
        let merged = clean(merge_three_way(text, text, text));
        assert_eq!(merged, text);
        // a merge's own output is stable under re-merge
        let again = clean(merge_three_way(&merged, &merged, &merged));
        assert_eq!(again, text);
    }

    #[test]
    fn disjoint_edits_merge_cleanly() {
        let merged = merge_three_way("A\nB\nC", "A2\nB\nC", "A\nB\nC2");
        assert_eq!(clean(merged), "A2\nB\nC2");
    }

    #[test]
    fn same_region_edits_conflict() {
        let outcome = merge_three_way("A\nB\nC", "A\nX\nC", "A\nY\nC");
        match outcome {
            MergeOutcome::Conflict { local, reason } => {
                assert_eq!(local, "A\nX\nC");
                assert_eq!(reason, ConflictReason::SameRegion);
                assert_eq!(reason.to_string(), "Changes modify the same region.");
            }
            MergeOutcome::Clean(text) => panic!("expected conflict, merged to {text:?}"),
        }
    }

    #[test]
    fn overlapping_ranges_conflict() {
        // local rewrites B..D while remote deletes C
        let outcome = merge_three_way("A\nB\nC\nD", "A\nX\nY\nZ\nD", "A\nB\nD");
        match outcome {
            MergeOutcome::Conflict { reason, .. } => {
                assert_eq!(reason.to_string(), "Overlapping edits detected.");
            }
            MergeOutcome::Clean(text) => panic!("expected conflict, merged to {text:?}"),
        }
    }

    #[test]
    fn identical_edits_apply_once() {
        let merged = merge_three_way("A\nB\nC", "A\nX\nC", "A\nX\nC");
        assert_eq!(clean(merged), "A\nX\nC");
    }

    #[test]
    fn same_point_inserts_keep_local_first() {
        // arbitrary but tested convention, not a guaranteed contract
        let merged = merge_three_way("A\nB", "A\nL\nB", "A\nR\nB");
        assert_eq!(clean(merged), "A\nL\nR\nB");
    }

    #[test]
    fn insert_inside_remote_replacement_conflicts() {
        // remote rewrites A..C; local inserts strictly inside that range
        let outcome = merge_three_way("A\nB\nC", "A\nB\nnew\nC", "X\nY");
        match outcome {
            MergeOutcome::Conflict { reason, .. } => {
                assert_eq!(reason, ConflictReason::OverlappingEdits);
            }
            MergeOutcome::Clean(text) => panic!("expected conflict, merged to {text:?}"),
        }
    }

    #[test]
    fn edits_in_different_paragraphs_merge() {
        let base = "title\n\nfirst paragraph\n\nsecond paragraph\n";
        let local = "title\n\nfirst paragraph, edited\n\nsecond paragraph\n";
        let remote = "title\n\nfirst paragraph\n\nsecond paragraph, extended\n";
        let merged = clean(merge_three_way(base, local, remote));
        assert_eq!(
            merged,
            "title\n\nfirst paragraph, edited\n\nsecond paragraph, extended\n"
        );
    }

    #[test]
    fn conflict_returns_unmerged_local_text() {
        let outcome = merge_three_way("base", "local version", "remote version");
        match outcome {
            MergeOutcome::Conflict { local, .. } => assert_eq!(local, "local version"),
            MergeOutcome::Clean(text) => panic!("expected conflict, merged to {text:?}"),
        }
    }
}
