pub mod cli;
pub mod file_id;
pub mod matrix;
pub mod patch;
pub mod review;
pub mod revision;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Old and new path of a file across one step of history.
///
/// Both sides are equal when no rename happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathPair {
    pub old_path: String,
    pub new_path: String,
}

impl PathPair {
    pub fn new(old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            old_path: old_path.into(),
            new_path: new_path.into(),
        }
    }

    /// A pair naming the same path on both sides.
    pub fn single(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            old_path: path.clone(),
            new_path: path,
        }
    }

    /// Keep the old path, replace the new one.
    pub fn with_new_name(&self, new_path: impl Into<String>) -> Self {
        Self::new(self.old_path.clone(), new_path)
    }

    pub fn is_rename(&self) -> bool {
        self.old_path != self.new_path
    }
}

impl fmt::Display for PathPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.old_path, self.new_path)
    }
}
