use crate::PathPair;
use crate::file_id::ClientFileId;
use crate::matrix::{Entry, FileMatrix, Status};
use crate::revision::RevisionId;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("file {0} has no changed revision")]
    MissingChangedRevision(ClientFileId),
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Aggregate kind of change across an unreviewed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Deleted,
    Renamed,
    Modified,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Created => "created",
            ChangeType::Deleted => "deleted",
            ChangeType::Renamed => "renamed",
            ChangeType::Modified => "modified",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a reviewer still has to look at for one file.
///
/// `previous` is the last revision the reviewer has seen (or `Base`),
/// `current` the latest revision that changed the file. `review_file` spans
/// the path at `previous` to the path at `current`; `diff_file` is the file's
/// current path pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRange {
    pub file_id: ClientFileId,
    pub review_file: PathPair,
    pub diff_file: PathPair,
    pub previous: RevisionId,
    pub current: RevisionId,
    pub change_type: ChangeType,
}

/// Compute the unreviewed range of `entry` for `reviewer`.
pub fn resolve(entry: &Entry, reviewer: &str) -> Result<FileRange> {
    let rows: Vec<(&RevisionId, &Status)> = entry.revisions().iter().collect();

    let (last_changed_index, current, last_changed) = entry
        .last_changed()
        .ok_or_else(|| ResolveError::MissingChangedRevision(entry.file_id.clone()))?;

    let candidates = &rows[..=last_changed_index];
    let last_reviewed = candidates
        .iter()
        .enumerate()
        .rev()
        .find(|(_, (_, status))| status.is_reviewed_by(reviewer));

    let (previous, review_file, range) = match last_reviewed {
        None => {
            let (_, first) = candidates[0];
            (
                RevisionId::Base,
                first.file.with_new_name(last_changed.file.new_path.clone()),
                candidates,
            )
        }
        Some((index, (revision, status))) => (
            (*revision).clone(),
            PathPair::new(
                status.file.new_path.clone(),
                last_changed.file.new_path.clone(),
            ),
            &candidates[index + 1..],
        ),
    };

    Ok(FileRange {
        file_id: entry.file_id.clone(),
        review_file,
        diff_file: entry.current_file.clone(),
        previous,
        current: current.clone(),
        change_type: classify(range.iter().map(|(_, status)| *status)),
    })
}

/// Classify a range of rows, oldest first.
///
/// The most recent creation or deletion wins outright. A rename only sticks
/// if no creation or deletion is found closer to the present.
pub fn classify<'a, I>(range: I) -> ChangeType
where
    I: DoubleEndedIterator<Item = &'a Status>,
{
    let mut result = ChangeType::Modified;

    for status in range.rev() {
        if status.is_new {
            return ChangeType::Created;
        }
        if status.is_deleted {
            return ChangeType::Deleted;
        }
        if status.is_renamed {
            result = ChangeType::Renamed;
        }
    }

    result
}

/// Resolve every file of the matrix for `reviewer`, in matrix order.
///
/// A file that cannot be resolved is logged and reported in place; the
/// remaining files are still resolved.
pub fn find_files_to_review(matrix: &FileMatrix, reviewer: &str) -> Vec<Result<FileRange>> {
    matrix
        .entries()
        .iter()
        .map(|entry| {
            resolve(entry, reviewer).inspect_err(|e| {
                warn!(file_id = %entry.file_id, reviewer, error = %e, "cannot resolve review range");
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev(n: u32) -> RevisionId {
        RevisionId::Numbered(n)
    }

    fn entry(rows: Vec<(RevisionId, Status)>) -> Entry {
        let mut entry = Entry::new(
            ClientFileId::provisional(PathPair::single("file.txt")),
            PathPair::single("file.txt"),
        );
        for (revision, status) in rows {
            entry.push(revision, status).unwrap();
        }
        entry
    }

    fn file() -> PathPair {
        PathPair::single("file.txt")
    }

    #[test]
    fn never_reviewed_starts_at_base() {
        let e = entry(vec![
            (rev(1), Status::created(file())),
            (rev(2), Status::unchanged(&file())),
        ]);
        let range = resolve(&e, "bob").unwrap();
        assert_eq!(range.previous, RevisionId::Base);
        assert_eq!(range.current, rev(1));
        assert_eq!(range.change_type, ChangeType::Created);
        assert_eq!(range.review_file, file());
    }

    #[test]
    fn reviewed_revision_becomes_previous() {
        let e = entry(vec![
            (rev(1), Status::created(file()).with_reviewer("bob")),
            (rev(2), Status::unchanged(&file())),
            (rev(3), Status::modified(file())),
        ]);
        let range = resolve(&e, "bob").unwrap();
        assert_eq!(range.previous, rev(1));
        assert_eq!(range.current, rev(3));
        assert_eq!(range.change_type, ChangeType::Modified);
    }

    #[test]
    fn fully_reviewed_range_is_empty_and_modified() {
        let e = entry(vec![
            (rev(1), Status::created(file())),
            (rev(2), Status::modified(file()).with_reviewer("bob")),
            (rev(3), Status::unchanged(&file())),
        ]);
        let range = resolve(&e, "bob").unwrap();
        assert_eq!(range.previous, rev(2));
        assert_eq!(range.current, rev(2));
        assert_eq!(range.change_type, ChangeType::Modified);
    }

    #[test]
    fn marks_after_last_change_are_ignored() {
        let e = entry(vec![
            (rev(1), Status::created(file())),
            (rev(2), Status::unchanged(&file()).with_reviewer("bob")),
        ]);
        let range = resolve(&e, "bob").unwrap();
        assert_eq!(range.previous, RevisionId::Base);
        assert_eq!(range.current, rev(1));
    }

    #[test]
    fn review_file_spans_first_name_to_latest_name() {
        let e = entry(vec![
            (rev(1), Status::created(PathPair::single("a.txt"))),
            (rev(2), Status::renamed(PathPair::new("a.txt", "b.txt"))),
            (rev(3), Status::renamed(PathPair::new("b.txt", "c.txt"))),
        ]);
        let range = resolve(&e, "bob").unwrap();
        assert_eq!(range.review_file, PathPair::new("a.txt", "c.txt"));
        assert_eq!(range.diff_file, file());
    }

    #[test]
    fn review_file_starts_at_reviewed_name() {
        let e = entry(vec![
            (rev(1), Status::created(PathPair::single("a.txt"))),
            (rev(2), Status::renamed(PathPair::new("a.txt", "b.txt")).with_reviewer("bob")),
            (rev(3), Status::renamed(PathPair::new("b.txt", "c.txt"))),
        ]);
        let range = resolve(&e, "bob").unwrap();
        assert_eq!(range.previous, rev(2));
        assert_eq!(range.review_file, PathPair::new("b.txt", "c.txt"));
        assert_eq!(range.change_type, ChangeType::Renamed);
    }

    #[test]
    fn latest_reviewed_revision_wins() {
        let e = entry(vec![
            (rev(1), Status::created(file()).with_reviewer("bob")),
            (rev(2), Status::modified(file()).with_reviewer("bob")),
            (rev(3), Status::deleted(file())),
        ]);
        let range = resolve(&e, "bob").unwrap();
        assert_eq!(range.previous, rev(2));
        assert_eq!(range.change_type, ChangeType::Deleted);
    }

    #[test]
    fn missing_changed_revision_is_an_error() {
        let e = entry(vec![(rev(1), Status::unchanged(&file()))]);
        assert_eq!(
            resolve(&e, "bob"),
            Err(ResolveError::MissingChangedRevision(e.file_id.clone()))
        );
    }

    #[test]
    fn classify_newest_create_or_delete_wins() {
        let older_delete = [Status::deleted(file()), Status::created(file())];
        assert_eq!(classify(older_delete.iter()), ChangeType::Created);

        let older_create = [Status::created(file()), Status::deleted(file())];
        assert_eq!(classify(older_create.iter()), ChangeType::Deleted);
    }

    #[test]
    fn classify_rename_does_not_stop_scan() {
        let rename_after_create = [Status::created(file()), Status::renamed(file())];
        assert_eq!(classify(rename_after_create.iter()), ChangeType::Created);

        let rename_only = [Status::renamed(file()), Status::modified(file())];
        assert_eq!(classify(rename_only.iter()), ChangeType::Renamed);

        let empty: [Status; 0] = [];
        assert_eq!(classify(empty.iter()), ChangeType::Modified);
    }

    #[test]
    fn change_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ChangeType::Renamed).unwrap(),
            r#""renamed""#
        );
        assert_eq!(ChangeType::Created.to_string(), "created");
    }
}
