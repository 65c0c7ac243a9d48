// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! The unit of replication work.

use serde::{Deserialize, Serialize};

/// One object version listed in a manifest.
///
/// A record is either a data copy (read from the source, write to the
/// target) or, when `delete_marker` is set, a delete of that exact version
/// on the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Source bucket name.
    pub bucket: String,

    /// Object key.
    pub object: String,

    /// Version ID. Empty means the current (null) version.
    pub version_id: String,

    /// Whether this record is a delete marker.
    pub delete_marker: bool,
}

impl ObjectRecord {
    /// Creates a record for a data copy.
    pub fn copy(
        bucket: impl Into<String>,
        object: impl Into<String>,
        version_id: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
            version_id: version_id.into(),
            delete_marker: false,
        }
    }

    /// Creates a record for a delete marker.
    pub fn delete_marker(
        bucket: impl Into<String>,
        object: impl Into<String>,
        version_id: impl Into<String>,
    ) -> Self {
        Self { delete_marker: true, ..Self::copy(bucket, object, version_id) }
    }

    /// Returns the version ID, or `None` for the current version.
    pub fn version(&self) -> Option<&str> {
        if self.version_id.is_empty() {
            None
        } else {
            Some(&self.version_id)
        }
    }

    /// Returns the action this record replicates as.
    pub fn action(&self) -> RecordAction {
        if self.delete_marker {
            RecordAction::Delete
        } else {
            RecordAction::Copy
        }
    }
}

impl std::fmt::Display for ObjectRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.bucket, self.object, self.version().unwrap_or("null"))?;
        if self.delete_marker {
            write!(f, " (delete marker)")?;
        }
        Ok(())
    }
}

/// What replicating a record does on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    /// Read from the source and write to the target.
    Copy,
    /// Delete the version on the target.
    Delete,
}

impl RecordAction {
    /// Returns the name of this action.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for RecordAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_record() {
        let record = ObjectRecord::copy("b1", "k1", "v1");
        assert!(!record.delete_marker);
        assert_eq!(record.version(), Some("v1"));
        assert_eq!(record.action(), RecordAction::Copy);
    }

    #[test]
    fn test_delete_marker_record() {
        let record = ObjectRecord::delete_marker("b1", "k2", "v2");
        assert!(record.delete_marker);
        assert_eq!(record.action(), RecordAction::Delete);
        assert_eq!(record.to_string(), "b1/k2@v2 (delete marker)");
    }

    #[test]
    fn test_empty_version_is_current() {
        let record = ObjectRecord::copy("b1", "k1", "");
        assert_eq!(record.version(), None);
        assert_eq!(record.to_string(), "b1/k1@null");
    }
}
