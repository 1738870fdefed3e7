//! Edit-distance based change percentage between two example texts

use similar::{DiffTag, TextDiff};

/// Percentage reported for inputs that share nothing
pub const FULLY_CHANGED: f64 = 100.0;

/// How much of `original` changed to become `candidate`, as a percentage of
/// the original's length in characters
///
/// Inserted characters count up and deleted characters count down; the
/// magnitude of that net is the change. When insertions and deletions
/// cancel out exactly (same-length substitutions), the deleted count is
/// used instead. Deleting the whole original, or either side being empty,
/// is a full change.
pub fn percent_changed(original: &str, candidate: &str) -> f64 {
    let original_len = original.chars().count();
    if original_len == 0 || candidate.is_empty() {
        return FULLY_CHANGED;
    }

    let diff = TextDiff::from_chars(original, candidate);

    let mut net: i64 = 0;
    let mut deleted: usize = 0;

    for op in diff.ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();

        if matches!(tag, DiffTag::Delete | DiffTag::Replace) {
            deleted += old_range.len();
            if deleted == original_len {
                return FULLY_CHANGED;
            }
            net -= old_range.len() as i64;
        }
        if matches!(tag, DiffTag::Insert | DiffTag::Replace) {
            net += new_range.len() as i64;
        }
    }

    let changed = match net.unsigned_abs() {
        0 => deleted,
        n => n as usize,
    };

    changed as f64 / original_len as f64 * 100.0
}

/// Whether `candidate` is close enough to `original` to count as an edit of
/// it under `threshold` percent
pub fn is_update(original: &str, candidate: &str, threshold: f64) -> bool {
    percent_changed(original, candidate) < threshold
}
