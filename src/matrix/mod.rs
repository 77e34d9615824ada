use crate::PathPair;
use crate::file_id::ClientFileId;
use crate::revision::RevisionId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::warn;

/// Errors raised while building or annotating a file matrix.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatrixError {
    #[error("revision {0} is not part of the review")]
    UnknownRevision(RevisionId),
    #[error("revision {0} appears more than once")]
    DuplicateRevision(RevisionId),
    #[error("revision {revision} does not come after the latest row of file {file_id}")]
    OutOfOrderRevision {
        file_id: ClientFileId,
        revision: RevisionId,
    },
    #[error("file {0} is not part of the review")]
    UnknownFile(ClientFileId),
    #[error("file {file_id} has no row for revision {revision}")]
    MissingRow {
        file_id: ClientFileId,
        revision: RevisionId,
    },
}

pub type Result<T> = std::result::Result<T, MatrixError>;

/// What happened to one file at one revision, and who has looked at it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub file: PathPair,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_renamed: bool,
    #[serde(default)]
    pub is_unchanged: bool,
    #[serde(default)]
    pub reviewers: BTreeSet<String>,
}

impl Status {
    /// A row for a file modified in place.
    pub fn modified(file: PathPair) -> Self {
        Self {
            file,
            ..Self::default()
        }
    }

    pub fn created(file: PathPair) -> Self {
        Self {
            file,
            is_new: true,
            ..Self::default()
        }
    }

    pub fn deleted(file: PathPair) -> Self {
        Self {
            file,
            is_deleted: true,
            ..Self::default()
        }
    }

    pub fn renamed(file: PathPair) -> Self {
        Self {
            file,
            is_renamed: true,
            ..Self::default()
        }
    }

    /// A row for a revision that did not touch the file. Keeps only the new path.
    pub fn unchanged(file: &PathPair) -> Self {
        Self {
            file: PathPair::single(file.new_path.clone()),
            is_unchanged: true,
            ..Self::default()
        }
    }

    pub fn from_change(change: &FileChange) -> Self {
        Self {
            file: change.file.clone(),
            is_new: change.is_new,
            is_deleted: change.is_deleted,
            is_renamed: change.is_renamed,
            is_unchanged: false,
            reviewers: BTreeSet::new(),
        }
    }

    /// Builder-style helper for tests and fixtures.
    pub fn with_reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.reviewers.insert(reviewer.into());
        self
    }

    pub fn is_reviewed_by(&self, reviewer: &str) -> bool {
        self.reviewers.contains(reviewer)
    }
}

/// One file's change at one revision, as reported by the repository history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    #[serde(default)]
    pub file_id: Option<ClientFileId>,
    pub file: PathPair,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_renamed: bool,
}

/// A reviewer mark as stored by the review's persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerMark {
    pub file_id: ClientFileId,
    pub revision: RevisionId,
    pub reviewer: String,
}

/// One pushed change, tagged with the revision it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryChange {
    pub revision: RevisionId,
    #[serde(flatten)]
    pub change: FileChange,
}

/// Materialized review history: revision order, per-push changes and marks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub revisions: Vec<RevisionId>,
    #[serde(default)]
    pub changes: Vec<HistoryChange>,
    #[serde(default)]
    pub marks: Vec<ReviewerMark>,
}

/// History of a single file across the review's revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub file_id: ClientFileId,
    pub current_file: PathPair,
    #[serde(with = "revision_rows")]
    revisions: IndexMap<RevisionId, Status>,
}

impl Entry {
    pub fn new(file_id: ClientFileId, current_file: PathPair) -> Self {
        Self {
            file_id,
            current_file,
            revisions: IndexMap::new(),
        }
    }

    /// Rows in chronological order.
    pub fn revisions(&self) -> &IndexMap<RevisionId, Status> {
        &self.revisions
    }

    /// Append a row. Revisions must be pushed in chronological order.
    ///
    /// Entries built outside a [`FileMatrix`] have no revision sequence to check
    /// against, so only key uniqueness and `Base` placement are enforced here.
    pub fn push(&mut self, revision: RevisionId, status: Status) -> Result<()> {
        let base_after_rows = revision.is_base() && !self.revisions.is_empty();
        if base_after_rows || self.revisions.contains_key(&revision) {
            return Err(MatrixError::OutOfOrderRevision {
                file_id: self.file_id.clone(),
                revision,
            });
        }
        self.revisions.insert(revision, status);
        Ok(())
    }

    /// Position of a revision among this entry's rows.
    pub fn position(&self, revision: &RevisionId) -> Option<usize> {
        self.revisions.get_index_of(revision)
    }

    /// Latest row that is not an unchanged filler, with its position.
    pub fn last_changed(&self) -> Option<(usize, &RevisionId, &Status)> {
        self.revisions
            .iter()
            .enumerate()
            .rev()
            .find(|(_, (_, status))| !status.is_unchanged)
            .map(|(index, (revision, status))| (index, revision, status))
    }

    /// The row in effect at `revision` given the matrix order `order`.
    pub fn status_at(&self, revision: &RevisionId, order: &[RevisionId]) -> Option<&Status> {
        let limit = order.iter().position(|r| r == revision)?;
        self.revisions
            .iter()
            .take_while(|(r, _)| order.iter().position(|o| o == *r).is_some_and(|p| p <= limit))
            .last()
            .map(|(_, status)| status)
    }

    fn latest_position(&self, order: &[RevisionId]) -> Option<usize> {
        let (revision, _) = self.revisions.last()?;
        order.iter().position(|r| r == revision)
    }
}

/// Serde helpers storing rows as an ordered array of `{ revision, ...status }`.
mod revision_rows {
    use super::{RevisionId, Status};
    use indexmap::IndexMap;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct RowRef<'a> {
        revision: &'a RevisionId,
        #[serde(flatten)]
        status: &'a Status,
    }

    #[derive(Deserialize)]
    struct Row {
        revision: RevisionId,
        #[serde(flatten)]
        status: Status,
    }

    pub fn serialize<S: Serializer>(
        rows: &IndexMap<RevisionId, Status>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(
            rows.iter()
                .map(|(revision, status)| RowRef { revision, status }),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IndexMap<RevisionId, Status>, D::Error> {
        let rows = Vec::<Row>::deserialize(deserializer)?;
        let mut map = IndexMap::with_capacity(rows.len());
        for row in rows {
            if map.contains_key(&row.revision) {
                return Err(D::Error::custom(format!(
                    "revision {} appears more than once",
                    row.revision
                )));
            }
            map.insert(row.revision, row.status);
        }
        Ok(map)
    }
}

/// Counts of files by whether their latest change has been reviewed by anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStatistics {
    pub reviewed_at_latest: usize,
    pub unreviewed_at_latest: usize,
}

/// Per-file revision history for a whole review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMatrix {
    revisions: Vec<RevisionId>,
    entries: Vec<Entry>,
}

impl FileMatrix {
    /// Create an empty matrix over the given revisions, oldest first.
    pub fn new(revisions: Vec<RevisionId>) -> Result<Self> {
        for (i, revision) in revisions.iter().enumerate() {
            if revisions[..i].contains(revision) {
                return Err(MatrixError::DuplicateRevision(revision.clone()));
            }
        }
        Ok(Self {
            revisions,
            entries: Vec::new(),
        })
    }

    pub fn revisions(&self) -> &[RevisionId] {
        &self.revisions
    }

    pub fn latest_revision(&self) -> Option<&RevisionId> {
        self.revisions.last()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, file_id: &ClientFileId) -> Option<&Entry> {
        self.entries.iter().find(|e| &e.file_id == file_id)
    }

    /// Record one file's change at `revision`.
    ///
    /// Renames are followed to the entry that held the old path at that
    /// revision, so a file keeps a single history across renames.
    pub fn append(&mut self, revision: &RevisionId, change: &FileChange) -> Result<()> {
        let position = self
            .revisions
            .iter()
            .position(|r| r == revision)
            .ok_or_else(|| MatrixError::UnknownRevision(revision.clone()))?;

        let index = match self.find_entry(revision, change) {
            Some(index) => index,
            None => {
                let file_id = change
                    .file_id
                    .clone()
                    .unwrap_or_else(|| ClientFileId::provisional(change.file.clone()));
                self.entries.push(Entry::new(file_id, change.file.clone()));
                self.entries.len() - 1
            }
        };

        let entry = &mut self.entries[index];
        if entry
            .latest_position(&self.revisions)
            .is_some_and(|latest| latest >= position)
        {
            return Err(MatrixError::OutOfOrderRevision {
                file_id: entry.file_id.clone(),
                revision: revision.clone(),
            });
        }

        if change.is_renamed {
            entry.current_file = entry.current_file.with_new_name(change.file.new_path.clone());
        }
        entry.revisions.insert(revision.clone(), Status::from_change(change));
        Ok(())
    }

    fn find_entry(&self, revision: &RevisionId, change: &FileChange) -> Option<usize> {
        if let Some(file_id) = &change.file_id
            && let Some(index) = self.entries.iter().position(|e| &e.file_id == file_id)
        {
            return Some(index);
        }

        if change.is_renamed
            && let Some(index) = self.entries.iter().position(|e| {
                e.status_at(revision, &self.revisions)
                    .is_some_and(|s| s.file.new_path == change.file.old_path)
            })
        {
            return Some(index);
        }

        self.entries
            .iter()
            .position(|e| e.current_file.new_path == change.file.old_path)
    }

    /// Build a complete matrix from a materialized history.
    ///
    /// Changes are appended in the order given, unchanged rows are filled in,
    /// then reviewer marks are applied.
    pub fn from_history(history: &History) -> Result<Self> {
        let mut matrix = Self::new(history.revisions.clone())?;
        for HistoryChange { revision, change } in &history.changes {
            matrix.append(revision, change)?;
        }
        matrix.fill_unchanged();
        for mark in &history.marks {
            matrix.add_reviewer(&mark.file_id, &mark.revision, &mark.reviewer)?;
        }
        Ok(matrix)
    }

    /// Give every entry a row for every revision of the matrix.
    ///
    /// Revisions before a file first appears reuse its first path; later gaps
    /// carry the previous row's new path forward.
    pub fn fill_unchanged(&mut self) {
        for entry in &mut self.entries {
            let Some((_, first)) = entry.revisions.first() else {
                continue;
            };
            let mut previous = first.file.clone();
            let mut filled = IndexMap::with_capacity(self.revisions.len());

            for revision in &self.revisions {
                match entry.revisions.swap_remove(revision) {
                    Some(status) => {
                        previous = status.file.clone();
                        filled.insert(revision.clone(), status);
                    }
                    None => {
                        filled.insert(revision.clone(), Status::unchanged(&previous));
                    }
                }
            }

            entry.revisions = filled;
        }
    }

    /// Record that `reviewer` has looked at `file_id` as of `revision`.
    pub fn add_reviewer(
        &mut self,
        file_id: &ClientFileId,
        revision: &RevisionId,
        reviewer: &str,
    ) -> Result<()> {
        if !self.revisions.contains(revision) {
            return Err(MatrixError::UnknownRevision(revision.clone()));
        }
        let entry = self
            .entries
            .iter_mut()
            .find(|e| &e.file_id == file_id)
            .ok_or_else(|| MatrixError::UnknownFile(file_id.clone()))?;
        let status = entry
            .revisions
            .get_mut(revision)
            .ok_or_else(|| MatrixError::MissingRow {
                file_id: file_id.clone(),
                revision: revision.clone(),
            })?;
        status.reviewers.insert(reviewer.to_owned());
        Ok(())
    }

    /// Count files whose latest change has been reviewed by at least one person.
    pub fn statistics(&self) -> ReviewStatistics {
        let mut stats = ReviewStatistics::default();

        for entry in &self.entries {
            match entry.last_changed() {
                Some((_, _, status)) if !status.reviewers.is_empty() => {
                    stats.reviewed_at_latest += 1;
                }
                Some(_) => stats.unreviewed_at_latest += 1,
                None => warn!(file_id = %entry.file_id, "file has no changed revision, skipping"),
            }
        }

        stats
    }
}
