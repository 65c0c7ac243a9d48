// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Error types for replication operations.

use thiserror::Error;

/// Result type for replication operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Errors that can occur during replication.
#[derive(Error, Debug, Clone)]
pub enum ReplicationError {
    /// The requested object version does not exist.
    #[error("object {bucket}/{key} (version {}) not found", version_label(.version_id))]
    NotFound {
        /// Bucket that was addressed.
        bucket: String,
        /// Object key that was addressed.
        key: String,
        /// Version that was addressed, `None` for the current version.
        version_id: Option<String>,
    },

    /// The gateway credentials are not allowed to perform the operation.
    #[error("access denied on {bucket}/{key}: {reason}")]
    AccessDenied {
        /// Bucket that was addressed.
        bucket: String,
        /// Object key that was addressed.
        key: String,
        /// The reason reported by the storage service.
        reason: String,
    },

    /// The request never produced a response (connect failure, timeout).
    #[error("transport error during {operation}: {reason}")]
    Transport {
        /// The gateway operation that failed.
        operation: &'static str,
        /// The reason for failure.
        reason: String,
    },

    /// Any other failure reported by a gateway.
    #[error("{operation} failed: {reason}")]
    Gateway {
        /// The gateway operation that failed.
        operation: &'static str,
        /// The reason for failure.
        reason: String,
    },

    /// A gateway could not be constructed from its configuration.
    #[error("invalid gateway configuration for {endpoint}: {reason}")]
    InvalidGatewayConfig {
        /// The endpoint being configured.
        endpoint: String,
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The session configuration was rejected.
    #[error("invalid session configuration: {0}")]
    InvalidConfig(#[from] crate::config::ConfigValidationError),

    /// The session no longer accepts records.
    #[error("replication session is closed")]
    SessionClosed,

    /// The manifest could not be read.
    #[error("failed to read manifest: {0}")]
    ManifestRead(String),
}

fn version_label(version_id: &Option<String>) -> &str {
    version_id.as_deref().unwrap_or("null")
}
