// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Object storage access used by replication workers.
//!
//! Workers never talk to a storage service directly. They hold a source and
//! a target [`ObjectGateway`] injected when the session starts, so the same
//! decision logic runs against S3 in production and against
//! [`MemoryGateway`] in tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use bytes::Bytes;
use parking_lot::Mutex;

use super::error::{ReplicationError, Result};

/// An object version in flight between two gateways.
#[derive(Debug)]
pub struct ObjectVersion {
    /// Object data. Streamed, not buffered, when read from S3.
    pub body: ByteStream,

    /// Size of the body in bytes, when known.
    pub content_length: Option<i64>,

    /// Content type.
    pub content_type: Option<String>,

    /// Last modification time on the source.
    pub last_modified: Option<DateTime>,

    /// User-defined metadata.
    pub metadata: HashMap<String, String>,
}

impl ObjectVersion {
    /// Creates an object version from in-memory data.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            content_length: Some(data.len() as i64),
            body: ByteStream::from(data),
            content_type: None,
            last_modified: None,
            metadata: HashMap::new(),
        }
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Access to one object storage endpoint.
///
/// Implementations must be safe for concurrent use by every worker of a
/// session. A `None` version addresses the current version of the object.
#[async_trait]
pub trait ObjectGateway: Send + Sync {
    /// Returns a short description of the endpoint for logs.
    fn name(&self) -> &str;

    /// Reads an object version.
    async fn get_object_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<ObjectVersion>;

    /// Writes an object version.
    async fn put_object_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        object: ObjectVersion,
    ) -> Result<()>;

    /// Deletes an object version.
    async fn delete_object_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<()>;
}

/// The pair of gateways a session replicates between.
#[derive(Clone)]
pub struct Gateways {
    /// Where object data is read from.
    pub source: Arc<dyn ObjectGateway>,
    /// Where object data is written and delete markers are applied.
    pub target: Arc<dyn ObjectGateway>,
}

impl Gateways {
    /// Creates a gateway pair.
    pub fn new(source: Arc<dyn ObjectGateway>, target: Arc<dyn ObjectGateway>) -> Self {
        Self { source, target }
    }
}

impl std::fmt::Debug for Gateways {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateways")
            .field("source", &self.source.name())
            .field("target", &self.target.name())
            .finish()
    }
}

/// Gateway operations, used to address injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOperation {
    /// `get_object_version`.
    Get,
    /// `put_object_version`.
    Put,
    /// `delete_object_version`.
    Delete,
}

impl GatewayOperation {
    /// Returns the name of this operation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get => "get_object_version",
            Self::Put => "put_object_version",
            Self::Delete => "delete_object_version",
        }
    }
}

/// A stored object version inside [`MemoryGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVersion {
    /// Version ID, `None` for the null version.
    pub version_id: Option<String>,
    /// Object data.
    pub data: Bytes,
    /// Content type.
    pub content_type: Option<String>,
}

/// An in-memory gateway with call counters and failure injection.
///
/// Versions of a key are kept in write order; reading without a version
/// returns the most recent one.
pub struct MemoryGateway {
    name: String,
    objects: Mutex<BTreeMap<(String, String), Vec<StoredVersion>>>,
    failures: Mutex<HashSet<(GatewayOperation, String)>>,
    latency: Option<Duration>,
    get_calls: AtomicUsize,
    put_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryGateway {
    /// Creates an empty gateway.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Mutex::new(BTreeMap::new()),
            failures: Mutex::new(HashSet::new()),
            latency: None,
            get_calls: AtomicUsize::new(0),
            put_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Stores an object version directly, without counting a call.
    pub fn insert(&self, bucket: &str, key: &str, version_id: Option<&str>, data: impl Into<Bytes>) {
        self.store(
            bucket,
            key,
            StoredVersion {
                version_id: version_id.map(str::to_string),
                data: data.into(),
                content_type: None,
            },
        );
    }

    /// Makes every `operation` on `key` fail.
    pub fn inject_failure(&self, operation: GatewayOperation, key: impl Into<String>) {
        self.failures.lock().insert((operation, key.into()));
    }

    /// Returns the stored version of `key`, or the latest one for `None`.
    pub fn stored(&self, bucket: &str, key: &str, version_id: Option<&str>) -> Option<StoredVersion> {
        let objects = self.objects.lock();
        let versions = objects.get(&(bucket.to_string(), key.to_string()))?;
        match version_id {
            Some(version_id) => {
                versions.iter().find(|v| v.version_id.as_deref() == Some(version_id)).cloned()
            }
            None => versions.last().cloned(),
        }
    }

    /// Number of `get_object_version` calls.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of `put_object_version` calls.
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Number of `delete_object_version` calls.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Total number of calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.get_calls() + self.put_calls() + self.delete_calls()
    }

    fn store(&self, bucket: &str, key: &str, version: StoredVersion) {
        let mut objects = self.objects.lock();
        let versions = objects.entry((bucket.to_string(), key.to_string())).or_default();
        versions.retain(|v| v.version_id != version.version_id);
        versions.push(version);
    }

    async fn begin(&self, operation: GatewayOperation, key: &str) -> Result<()> {
        let counter = match operation {
            GatewayOperation::Get => &self.get_calls,
            GatewayOperation::Put => &self.put_calls,
            GatewayOperation::Delete => &self.delete_calls,
        };
        counter.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.failures.lock().contains(&(operation, key.to_string())) {
            return Err(ReplicationError::Gateway {
                operation: operation.name(),
                reason: format!("injected failure on {}", self.name),
            });
        }
        Ok(())
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl ObjectGateway for MemoryGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_object_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<ObjectVersion> {
        self.begin(GatewayOperation::Get, key).await?;

        let stored =
            self.stored(bucket, key, version_id).ok_or_else(|| ReplicationError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
                version_id: version_id.map(str::to_string),
            })?;

        let object = ObjectVersion::from_bytes(stored.data);
        Ok(ObjectVersion { content_type: stored.content_type, ..object })
    }

    async fn put_object_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        object: ObjectVersion,
    ) -> Result<()> {
        self.begin(GatewayOperation::Put, key).await?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| ReplicationError::Transport {
                operation: GatewayOperation::Put.name(),
                reason: e.to_string(),
            })?
            .into_bytes();

        self.store(
            bucket,
            key,
            StoredVersion {
                version_id: version_id.map(str::to_string),
                data,
                content_type: object.content_type,
            },
        );
        Ok(())
    }

    async fn delete_object_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<()> {
        self.begin(GatewayOperation::Delete, key).await?;

        // Deleting a missing version succeeds, as it does on S3.
        let mut objects = self.objects.lock();
        if let Some(versions) = objects.get_mut(&(bucket.to_string(), key.to_string())) {
            match version_id {
                Some(version_id) => versions.retain(|v| v.version_id.as_deref() != Some(version_id)),
                None => {
                    versions.pop();
                }
            }
        }
        Ok(())
    }
}
