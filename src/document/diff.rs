//! Position-based comparison of two block lists.

use serde::Serialize;

use super::types::{BlockChange, HasSource};

/// Classify every position between `old` and `new`.
///
/// Position `i` of `old` is compared with position `i` of `new` by source
/// text. Inserting a block near the top therefore marks every block after it
/// as [`BlockChange::Update`]; callers trade those extra renders for a diff
/// that never has to match blocks up.
///
/// # Example
///
/// ```
/// use mdsync::document::{BlockChange, diff_blocks};
///
/// let changes = diff_blocks(&["# A", "text"], &["# A", "edited"]);
/// assert_eq!(changes, vec![BlockChange::Keep, BlockChange::Update]);
/// ```
pub fn diff_blocks<O: HasSource, N: HasSource>(old: &[O], new: &[N]) -> Vec<BlockChange> {
    let len = old.len().max(new.len());
    (0..len)
        .map(|i| match (old.get(i), new.get(i)) {
            (Some(prev), Some(next)) if prev.source() == next.source() => BlockChange::Keep,
            (Some(_), Some(_)) => BlockChange::Update,
            (None, Some(_)) => BlockChange::Add,
            (Some(_), None) | (None, None) => BlockChange::Remove,
        })
        .collect()
}

/// Count of each classification in a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub kept: usize,
}

impl DiffSummary {
    pub fn of(changes: &[BlockChange]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change {
                BlockChange::Add => summary.added += 1,
                BlockChange::Remove => summary.removed += 1,
                BlockChange::Update => summary.updated += 1,
                BlockChange::Keep => summary.kept += 1,
            }
        }
        summary
    }
}
