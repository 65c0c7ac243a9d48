// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Configuration for a replication session and its gateways.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of concurrent replication workers.
pub const DEFAULT_WORKERS: usize = 8;

/// Default capacity of the replication task queue.
pub const DEFAULT_QUEUE_SIZE: usize = 512;

/// Default region used when signing gateway requests.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default gateway read timeout in seconds.
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 300;

/// Configuration for a replication session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of workers draining the task queue.
    pub workers: usize,

    /// Capacity of the task queue. Producers block once it is full.
    pub queue_size: usize,

    /// Log and count records without touching either gateway.
    pub dry_run: bool,

    /// Bucket to write to on the target.
    ///
    /// When unset, each record is written to a bucket with the same name
    /// as its source bucket.
    pub target_bucket: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_size: DEFAULT_QUEUE_SIZE,
            dry_run: false,
            target_bucket: None,
        }
    }
}

impl SessionConfig {
    /// Creates a new session configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of workers.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the task queue capacity.
    pub fn queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    /// Sets dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the target bucket.
    pub fn target_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.target_bucket = Some(bucket.into());
        self
    }

    /// Resolves the target bucket for a record read from `source_bucket`.
    pub fn target_bucket_for<'a>(&'a self, source_bucket: &'a str) -> &'a str {
        self.target_bucket.as_deref().unwrap_or(source_bucket)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.workers == 0 {
            return Err(ConfigValidationError::InvalidWorkerCount);
        }
        if self.queue_size == 0 {
            return Err(ConfigValidationError::InvalidQueueSize);
        }
        if matches!(self.target_bucket.as_deref(), Some("")) {
            return Err(ConfigValidationError::EmptyTargetBucket);
        }
        Ok(())
    }
}

/// Connection settings for one S3-compatible endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Endpoint URL, including the scheme.
    pub endpoint: String,

    /// Access key.
    pub access_key: String,

    /// Secret key.
    pub secret_key: String,

    /// Bucket this endpoint is used with.
    pub bucket: String,

    /// Region used for request signing.
    pub region: String,

    /// Read timeout on gateway connections in seconds.
    pub timeout_secs: u64,

    /// Ask the target to keep the source version id on writes.
    ///
    /// Only MinIO honors this; other services ignore the extra headers.
    pub preserve_versions: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            region: DEFAULT_REGION.to_string(),
            timeout_secs: DEFAULT_GATEWAY_TIMEOUT_SECS,
            preserve_versions: false,
        }
    }
}

impl GatewayConfig {
    /// Creates a gateway configuration for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), ..Self::default() }
    }

    /// Sets the static credentials.
    pub fn credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.access_key = access_key.into();
        self.secret_key = secret_key.into();
        self
    }

    /// Sets the bucket.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Sets the signing region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Sets the connection read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Sets whether source version ids are preserved on writes.
    pub fn preserve_versions(mut self, preserve: bool) -> Self {
        self.preserve_versions = preserve;
        self
    }

    /// Returns the timeout as a Duration.
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Keeps the secret key out of logs.
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"****")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("timeout_secs", &self.timeout_secs)
            .field("preserve_versions", &self.preserve_versions)
            .finish()
    }
}

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigValidationError {
    /// At least one worker is required.
    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    /// Queue size must be at least 1.
    #[error("queue size must be at least 1")]
    InvalidQueueSize,

    /// An explicit target bucket must not be empty.
    #[error("target bucket must not be empty")]
    EmptyTargetBucket,
}
