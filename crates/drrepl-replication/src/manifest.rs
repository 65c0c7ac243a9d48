// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Manifest parsing and feeding.
//!
//! A manifest lists one object version per line:
//!
//! ```text
//! bucket,object,versionID[,deleteMarker]
//! ```
//!
//! Fields are trimmed. A fourth field equal to `true` marks a delete marker;
//! any other value, or no fourth field, is a data copy. Lines that do not
//! have three or four fields, or that are not valid UTF-8, are logged and
//! skipped.

use std::path::Path;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use super::error::{ReplicationError, Result};
use super::record::ObjectRecord;
use super::session::Session;

/// Name of the manifest file inside a working directory.
pub const MANIFEST_FILE_NAME: &str = "object_listing.txt";

/// Why a manifest line was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// The line does not have 3 or 4 fields.
    #[error("expected 3 or 4 comma-separated fields, found {found}")]
    FieldCount {
        /// Number of fields found.
        found: usize,
    },

    /// The line is not valid UTF-8.
    #[error("line is not valid UTF-8 after byte {valid_up_to}")]
    InvalidUtf8 {
        /// Length of the valid prefix.
        valid_up_to: usize,
    },

    /// A required field is empty.
    #[error("{field} field is empty")]
    EmptyField {
        /// Name of the empty field.
        field: &'static str,
    },
}

/// Parses one manifest line.
pub fn parse_line(line: &str) -> std::result::Result<ObjectRecord, ManifestError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if !(3..=4).contains(&fields.len()) {
        return Err(ManifestError::FieldCount { found: fields.len() });
    }
    if fields[0].is_empty() {
        return Err(ManifestError::EmptyField { field: "bucket" });
    }
    if fields[1].is_empty() {
        return Err(ManifestError::EmptyField { field: "object" });
    }

    Ok(ObjectRecord {
        bucket: fields[0].to_string(),
        object: fields[1].to_string(),
        version_id: fields[2].to_string(),
        delete_marker: fields.get(3).is_some_and(|f| *f == "true"),
    })
}

/// Counts from one pass over a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedSummary {
    /// Lines read.
    pub lines: u64,
    /// Lines rejected as malformed.
    pub malformed: u64,
    /// Well-formed records skipped by the offset.
    pub skipped: u64,
    /// Records handed to the session.
    pub enqueued: u64,
}

/// Opens a manifest file for [`feed`].
pub async fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .await
        .map_err(|e| ReplicationError::ManifestRead(format!("{}: {e}", path.display())))?;
    Ok(BufReader::new(file))
}

/// Parses every line of `reader` and enqueues the records on `session`.
///
/// The first `skip` well-formed records are ignored, which lets a rerun
/// resume after the records an earlier run already processed. Lines that
/// are not valid UTF-8 are malformed like any other bad line. Returns once
/// every record has been enqueued; the caller still has to drain the
/// session.
pub async fn feed<R>(session: &Session, mut reader: R, skip: u64) -> Result<FeedSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = FeedSummary::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| ReplicationError::ManifestRead(e.to_string()))?;
        if read == 0 {
            break;
        }
        summary.lines += 1;

        let line = trim_line_ending(&buf);
        let parsed = std::str::from_utf8(line)
            .map_err(|e| ManifestError::InvalidUtf8 { valid_up_to: e.valid_up_to() })
            .and_then(parse_line);

        let record = match parsed {
            Ok(record) => record,
            Err(e) => {
                summary.malformed += 1;
                warn!(
                    line_number = summary.lines,
                    line = %String::from_utf8_lossy(line),
                    error = %e,
                    "Skipping malformed manifest line"
                );
                continue;
            }
        };

        if summary.skipped < skip {
            summary.skipped += 1;
            continue;
        }

        debug!(record = %record, "Added record to copy queue");
        session.enqueue(record).await?;
        summary.enqueued += 1;
    }

    info!(
        lines = summary.lines,
        malformed = summary.malformed,
        skipped = summary.skipped,
        enqueued = summary.enqueued,
        "Finished reading manifest"
    );
    Ok(summary)
}

/// Strips a trailing `\n` or `\r\n`.
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
