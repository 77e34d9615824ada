use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error(
        "patch diffs do not split into prefix/changes/suffix: unexpected change at diff {index} of {total}"
    )]
    AffixShapeViolation { index: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, PatchError>;

/// Kind of a line-level edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Equal,
    Insert,
    Delete,
}

impl Operation {
    /// Prefix character used when rendering a line of this kind.
    pub fn marker(self) -> char {
        match self {
            Operation::Equal => ' ',
            Operation::Insert => '+',
            Operation::Delete => '-',
        }
    }
}

/// A run of lines sharing one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiff {
    pub operation: Operation,
    pub lines: Vec<String>,
}

impl LineDiff {
    pub fn new(operation: Operation, lines: Vec<String>) -> Self {
        Self { operation, lines }
    }

    pub fn equal<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Operation::Equal, lines.into_iter().map(Into::into).collect())
    }

    pub fn insert<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Operation::Insert, lines.into_iter().map(Into::into).collect())
    }

    pub fn delete<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Operation::Delete, lines.into_iter().map(Into::into).collect())
    }

    pub fn is_equal(&self) -> bool {
        self.operation == Operation::Equal
    }
}

impl fmt::Display for LineDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = self.operation.marker();
        for line in &self.lines {
            write!(f, "{marker}{line}")?;
        }
        Ok(())
    }
}

/// An ordered run of line diffs anchored in both the before and after text.
///
/// `start1` and `start2` are zero-based line offsets into the before and after
/// text. `length1` counts lines the patch covers in the before text (everything
/// but inserts), `length2` the lines in the after text (everything but deletes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinePatch {
    pub start1: usize,
    pub start2: usize,
    pub diffs: Vec<LineDiff>,
    pub length1: usize,
    pub length2: usize,
}

impl LinePatch {
    pub fn new(start1: usize, start2: usize, diffs: Vec<LineDiff>) -> Self {
        let length1 = count_lines(&diffs, Operation::Insert);
        let length2 = count_lines(&diffs, Operation::Delete);
        Self {
            start1,
            start2,
            diffs,
            length1,
            length2,
        }
    }

    /// Lines this patch expects in the before text.
    pub fn previous_lines(&self) -> impl Iterator<Item = &str> {
        lines_without(&self.diffs, Operation::Insert)
    }

    /// Lines this patch produces in the after text.
    pub fn current_lines(&self) -> impl Iterator<Item = &str> {
        lines_without(&self.diffs, Operation::Delete)
    }
}

impl fmt::Display for LinePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diff in &self.diffs {
            write!(f, "{diff}")?;
        }
        Ok(())
    }
}

// Lengths are derived, so stored documents only need the anchors and diffs.
impl<'de> Deserialize<'de> for LinePatch {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Stored {
            start1: usize,
            start2: usize,
            diffs: Vec<LineDiff>,
        }

        let stored = Stored::deserialize(deserializer)?;
        Ok(LinePatch::new(stored.start1, stored.start2, stored.diffs))
    }
}

fn count_lines(diffs: &[LineDiff], skip: Operation) -> usize {
    diffs
        .iter()
        .filter(|d| d.operation != skip)
        .map(|d| d.lines.len())
        .sum()
}

fn lines_without(diffs: &[LineDiff], skip: Operation) -> impl Iterator<Item = &str> {
    diffs
        .iter()
        .filter(move |d| d.operation != skip)
        .flat_map(|d| d.lines.iter().map(String::as_str))
}

/// Text produced by a run of diffs, i.e. all lines that are not deleted.
pub fn diffs_current_text(diffs: &[LineDiff]) -> Vec<String> {
    lines_without(diffs, Operation::Delete)
        .map(str::to_owned)
        .collect()
}

/// Apply `patch` to `lines`.
///
/// Every equal line must match the live content at its position, otherwise the
/// patch is stale and `false` is returned. The patch is applied to a scratch
/// copy and `lines` is only replaced once the whole patch has matched, so a
/// stale patch leaves `lines` untouched.
pub fn apply_patch(patch: &LinePatch, lines: &mut Vec<String>) -> bool {
    let mut scratch = lines.clone();
    let mut cursor = patch.start1;

    if cursor > scratch.len() {
        debug!(
            start1 = patch.start1,
            len = scratch.len(),
            "patch starts past end of text"
        );
        return false;
    }

    for (index, diff) in patch.diffs.iter().enumerate() {
        match diff.operation {
            Operation::Equal => {
                for line in &diff.lines {
                    if scratch.get(cursor) != Some(line) {
                        debug!(
                            start1 = patch.start1,
                            diff = index,
                            line = cursor,
                            "patch context does not match"
                        );
                        return false;
                    }
                    cursor += 1;
                }
            }
            Operation::Delete => {
                let end = cursor + diff.lines.len();
                if end > scratch.len() {
                    debug!(
                        start1 = patch.start1,
                        diff = index,
                        line = cursor,
                        "patch deletes past end of text"
                    );
                    return false;
                }
                scratch.drain(cursor..end);
            }
            Operation::Insert => {
                scratch.splice(cursor..cursor, diff.lines.iter().cloned());
                cursor += diff.lines.len();
            }
        }
    }

    *lines = scratch;
    true
}

/// Apply each patch in turn, reporting which ones matched.
///
/// A stale patch does not stop the ones after it.
pub fn apply_patches(patches: &[LinePatch], lines: &mut Vec<String>) -> Vec<bool> {
    patches.iter().map(|p| apply_patch(p, lines)).collect()
}

/// Shift patches computed against one base so they can be applied in sequence.
///
/// Each patch's `start1` moves back by the net line growth of every patch
/// before it.
pub fn unroll_context(patches: &mut [LinePatch]) {
    let mut total_delta: isize = 0;

    for patch in patches.iter_mut() {
        patch.start1 = patch.start1.saturating_add_signed(-total_delta);
        total_delta += patch.length2 as isize - patch.length1 as isize;
    }
}

/// A patch split around its single changed region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffixSplit {
    pub prefix: Vec<LineDiff>,
    pub changes: Vec<LineDiff>,
    pub suffix: Vec<LineDiff>,
}

/// Split a patch into leading equal diffs, the changed core and trailing equal diffs.
pub fn split_affix(patch: &LinePatch) -> Result<AffixSplit> {
    let diffs = &patch.diffs;

    let prefix_end = diffs
        .iter()
        .position(|d| !d.is_equal())
        .unwrap_or(diffs.len());
    let changes_end = diffs[prefix_end..]
        .iter()
        .position(LineDiff::is_equal)
        .map_or(diffs.len(), |i| prefix_end + i);
    let suffix_end = diffs[changes_end..]
        .iter()
        .position(|d| !d.is_equal())
        .map_or(diffs.len(), |i| changes_end + i);

    if suffix_end != diffs.len() {
        return Err(PatchError::AffixShapeViolation {
            index: suffix_end,
            total: diffs.len(),
        });
    }

    Ok(AffixSplit {
        prefix: diffs[..prefix_end].to_vec(),
        changes: diffs[prefix_end..changes_end].to_vec(),
        suffix: diffs[changes_end..].to_vec(),
    })
}
