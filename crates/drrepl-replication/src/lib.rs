// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Manifest-driven replication of object versions between two
//! S3-compatible deployments.
//!
//! A manifest lists object versions, one per line. Each line becomes an
//! [`ObjectRecord`] that a [`Session`] replicates from the source gateway to
//! the target gateway:
//!
//! - **Copy**: the version is read from the source and written to the target
//! - **Delete**: a delete marker removes that version on the target only
//!
//! # Architecture
//!
//! ```text
//! object_listing.txt
//!      │
//!      ▼
//! ┌──────────┐  parse, skip offset
//! │ manifest │───────────────────────┐
//! └──────────┘                       │ enqueue (blocks when full)
//!                                    ▼
//!                          ┌──────────────────┐
//!                          │  bounded queue   │
//!                          └────────┬─────────┘
//!                 ┌─────────────────┼─────────────────┐
//!                 ▼                 ▼                 ▼
//!            worker 0          worker 1    ...   worker N-1
//!                 │                 │                 │
//!                 ├── Copy:   source.get ──► target.put
//!                 └── Delete: target.delete
//!                                    │
//!                                    ▼
//!                          ┌──────────────────┐
//!                          │ ledger           │
//!                          │ processed/failed │
//!                          └──────────────────┘
//! ```
//!
//! Failures are isolated per record: they are logged and counted, and the
//! session keeps going.
//!
//! # Example
//!
//! ```ignore
//! use drrepl_replication::{manifest, Gateways, GatewayConfig, S3Gateway, Session, SessionConfig};
//!
//! let source = S3Gateway::connect(&GatewayConfig::new("https://minio1:9000")
//!     .credentials("minio", "minio123")
//!     .bucket("src"))?;
//! let target = S3Gateway::connect(&GatewayConfig::new("https://minio2:9000")
//!     .credentials("minio", "minio123")
//!     .bucket("dst")
//!     .preserve_versions(true))?;
//!
//! let mut session = Session::start(
//!     SessionConfig::new().workers(16).target_bucket("dst"),
//!     Gateways::new(Arc::new(source), Arc::new(target)),
//! )?;
//!
//! let reader = manifest::open(Path::new("/data/object_listing.txt")).await?;
//! manifest::feed(&session, reader, 0).await?;
//!
//! let snapshot = session.drain().await;
//! println!("{} / {}", snapshot.succeeded(), snapshot.processed);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod gateway;
mod ledger;
pub mod manifest;
mod record;
mod s3;
mod session;

#[cfg(test)]
mod test_support;

// Re-export configuration
pub use config::{
    ConfigValidationError, GatewayConfig, SessionConfig, DEFAULT_GATEWAY_TIMEOUT_SECS,
    DEFAULT_QUEUE_SIZE, DEFAULT_REGION, DEFAULT_WORKERS,
};
// Re-export error types
pub use error::{ReplicationError, Result};
// Re-export gateway types
pub use gateway::{
    GatewayOperation, Gateways, MemoryGateway, ObjectGateway, ObjectVersion, StoredVersion,
};
// Re-export outcome accounting
pub use ledger::{LedgerSnapshot, ReplicationLedger};
// Re-export manifest entry points
pub use manifest::{FeedSummary, ManifestError, MANIFEST_FILE_NAME};
// Re-export records
pub use record::{ObjectRecord, RecordAction};
// Re-export the S3 gateway
pub use s3::S3Gateway;
// Re-export the session
pub use session::Session;
