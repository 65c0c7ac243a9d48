// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Replication session: task queue, worker pool and drain.
//!
//! A session owns a bounded queue of [`ObjectRecord`]s and a fixed pool of
//! workers draining it. The producer blocks in [`Session::enqueue`] while
//! the queue is full. [`Session::drain`] closes the queue and waits until
//! every queued and in-flight record has completed, after which the ledger
//! counters are final.
//!
//! ```text
//! manifest ──► enqueue ──► [ bounded queue ] ──► worker 0 ─┐
//!                                           ├──► worker 1 ─┼──► gateways
//!                                           └──► worker N ─┘       │
//!                                                                  ▼
//!                                                               ledger
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, info_span, Dispatch, Instrument};

use super::config::SessionConfig;
use super::error::{ReplicationError, Result};
use super::gateway::Gateways;
use super::ledger::{LedgerSnapshot, ReplicationLedger};
use super::record::{ObjectRecord, RecordAction};

/// A running replication session.
pub struct Session {
    config: SessionConfig,
    sender: Option<mpsc::Sender<ObjectRecord>>,
    workers: Vec<JoinHandle<()>>,
    ledger: Arc<ReplicationLedger>,
    dispatch: Dispatch,
}

impl Session {
    /// Starts a session whose workers log through the current default
    /// subscriber.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: SessionConfig, gateways: Gateways) -> Result<Self> {
        let dispatch = tracing::dispatcher::get_default(Dispatch::clone);
        Self::start_with_dispatch(config, gateways, dispatch)
    }

    /// Starts a session whose workers log through `dispatch`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_with_dispatch(
        config: SessionConfig,
        gateways: Gateways,
        dispatch: Dispatch,
    ) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.queue_size);
        let queue = Arc::new(Mutex::new(receiver));
        let ledger = Arc::new(ReplicationLedger::new());

        let workers: Vec<JoinHandle<()>> = tracing::dispatcher::with_default(&dispatch, || {
            info!(
                workers = config.workers,
                queue_size = config.queue_size,
                dry_run = config.dry_run,
                source = gateways.source.name(),
                target = gateways.target.name(),
                "Starting replication session"
            );

            (0..config.workers)
                .map(|id| {
                    let worker = Worker {
                        queue: Arc::clone(&queue),
                        gateways: gateways.clone(),
                        ledger: Arc::clone(&ledger),
                        config: config.clone(),
                    };
                    let span = info_span!("replication_worker", worker = id);
                    tokio::spawn(worker.run().instrument(span).with_subscriber(dispatch.clone()))
                })
                .collect()
        });

        Ok(Self { config, sender: Some(sender), workers, ledger, dispatch })
    }

    /// Submits a record for replication.
    ///
    /// Waits while the queue is at capacity. Fails with
    /// [`ReplicationError::SessionClosed`] once the session has been drained.
    pub async fn enqueue(&self, record: ObjectRecord) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(ReplicationError::SessionClosed)?;
        sender.send(record).await.map_err(|_| ReplicationError::SessionClosed)
    }

    /// Closes the queue and waits for every queued and in-flight record.
    ///
    /// Returns the final counters. Calling it again returns the same
    /// counters without waiting.
    pub async fn drain(&mut self) -> LedgerSnapshot {
        // Dropping the only sender lets workers see the end of the queue
        // once it is empty.
        self.sender.take();

        let workers = std::mem::take(&mut self.workers);
        for (id, handle) in workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                tracing::dispatcher::with_default(&self.dispatch, || {
                    error!(worker = id, error = %e, "Replication worker terminated abnormally");
                });
            }
        }

        let snapshot = self.ledger.snapshot();
        tracing::dispatcher::with_default(&self.dispatch, || {
            info!(
                processed = snapshot.processed,
                failed = snapshot.failed,
                dry_run = self.config.dry_run,
                "Replication session drained"
            );
        });
        snapshot
    }

    /// Number of records processed so far.
    pub fn processed_count(&self) -> u64 {
        self.ledger.processed()
    }

    /// Number of records that failed so far.
    pub fn failed_count(&self) -> u64 {
        self.ledger.failed()
    }

    /// Reads both counters.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns true once the session no longer accepts records.
    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("workers", &self.workers.len())
            .field("closed", &self.is_closed())
            .field("ledger", &self.ledger)
            .finish()
    }
}

/// One member of the worker pool.
struct Worker {
    queue: Arc<Mutex<mpsc::Receiver<ObjectRecord>>>,
    gateways: Gateways,
    ledger: Arc<ReplicationLedger>,
    config: SessionConfig,
}

impl Worker {
    async fn run(self) {
        debug!("Replication worker started");

        loop {
            // The lock is held only while waiting for the next record.
            let next = self.queue.lock().await.recv().await;
            let Some(record) = next else {
                debug!("Replication queue closed, stopping worker");
                break;
            };
            self.process(record).await;
        }
    }

    async fn process(&self, record: ObjectRecord) {
        let action = record.action();
        let target_bucket = self.config.target_bucket_for(&record.bucket);
        let version_id = record.version().unwrap_or("null");

        if self.config.dry_run {
            info!(
                bucket = %record.bucket,
                key = %record.object,
                version_id = %version_id,
                target_bucket = %target_bucket,
                "would {}",
                action
            );
            self.ledger.record_success();
            return;
        }

        let result = match action {
            RecordAction::Copy => self.copy(&record, target_bucket).await,
            RecordAction::Delete => {
                self.gateways
                    .target
                    .delete_object_version(target_bucket, &record.object, record.version())
                    .await
            }
        };

        match result {
            Ok(()) => {
                self.ledger.record_success();
                debug!(
                    bucket = %record.bucket,
                    key = %record.object,
                    version_id = %version_id,
                    action = %action,
                    "Replicated object"
                );
            }
            Err(e) => {
                self.ledger.record_failure();
                error!(
                    bucket = %record.bucket,
                    key = %record.object,
                    version_id = %version_id,
                    delete_marker = record.delete_marker,
                    action = %action,
                    error = %e,
                    "Failed to replicate object"
                );
            }
        }
    }

    async fn copy(&self, record: &ObjectRecord, target_bucket: &str) -> Result<()> {
        let object = self
            .gateways
            .source
            .get_object_version(&record.bucket, &record.object, record.version())
            .await?;

        self.gateways
            .target
            .put_object_version(target_bucket, &record.object, record.version(), object)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tracing::Level;

    use super::*;
    use crate::gateway::{GatewayOperation, MemoryGateway};
    use crate::test_support::CapturedEvents;

    fn memory_gateways() -> (Arc<MemoryGateway>, Arc<MemoryGateway>, Gateways) {
        let source = Arc::new(MemoryGateway::new("source"));
        let target = Arc::new(MemoryGateway::new("target"));
        let gateways = Gateways::new(source.clone(), target.clone());
        (source, target, gateways)
    }

    #[tokio::test]
    async fn test_copy_record() {
        let (source, target, gateways) = memory_gateways();
        source.insert("b1", "k1", Some("v1"), "payload");

        let mut session = Session::start(SessionConfig::new().workers(2), gateways).unwrap();
        session.enqueue(ObjectRecord::copy("b1", "k1", "v1")).await.unwrap();
        let snapshot = session.drain().await;

        assert_eq!(snapshot, LedgerSnapshot { processed: 1, failed: 0 });
        assert_eq!(source.get_calls(), 1);
        assert_eq!(target.put_calls(), 1);
        assert_eq!(target.delete_calls(), 0);

        let stored = target.stored("b1", "k1", Some("v1")).unwrap();
        assert_eq!(stored.data, bytes::Bytes::from("payload"));
    }

    #[tokio::test]
    async fn test_delete_marker_touches_only_target() {
        let (source, target, gateways) = memory_gateways();

        let mut session = Session::start(SessionConfig::new(), gateways).unwrap();
        session.enqueue(ObjectRecord::delete_marker("b1", "k2", "v2")).await.unwrap();
        session.drain().await;

        assert_eq!(session.processed_count(), 1);
        assert_eq!(session.failed_count(), 0);
        assert_eq!(source.total_calls(), 0);
        assert_eq!(target.delete_calls(), 1);
        assert_eq!(target.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_target_bucket_override() {
        let (source, target, gateways) = memory_gateways();
        source.insert("src", "k1", None, "data");

        let config = SessionConfig::new().target_bucket("dst");
        let mut session = Session::start(config, gateways).unwrap();
        session.enqueue(ObjectRecord::copy("src", "k1", "")).await.unwrap();
        session.drain().await;

        assert!(target.stored("dst", "k1", None).is_some());
        assert!(target.stored("src", "k1", None).is_none());
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let (source, target, gateways) = memory_gateways();
        let captured = CapturedEvents::default();

        let mut session = Session::start_with_dispatch(
            SessionConfig::new().dry_run(true),
            gateways,
            captured.dispatch(),
        )
        .unwrap();
        session.enqueue(ObjectRecord::copy("b1", "k1", "v1")).await.unwrap();
        session.enqueue(ObjectRecord::delete_marker("b1", "k2", "v2")).await.unwrap();
        let snapshot = session.drain().await;

        assert_eq!(snapshot, LedgerSnapshot { processed: 2, failed: 0 });
        assert_eq!(source.total_calls(), 0);
        assert_eq!(target.total_calls(), 0);
        assert!(captured.contains(Level::INFO, "would copy"));
        assert!(captured.contains(Level::INFO, "would delete"));
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let (source, target, gateways) = memory_gateways();
        source.insert("b1", "k1", Some("v1"), "data");
        source.insert("b1", "k3", Some("v3"), "data");
        let captured = CapturedEvents::default();

        let mut session = Session::start_with_dispatch(
            SessionConfig::new().workers(1),
            gateways,
            captured.dispatch(),
        )
        .unwrap();
        session.enqueue(ObjectRecord::copy("b1", "k1", "v1")).await.unwrap();
        session.enqueue(ObjectRecord::copy("b1", "missing", "v9")).await.unwrap();
        session.enqueue(ObjectRecord::copy("b1", "k3", "v3")).await.unwrap();
        let snapshot = session.drain().await;

        assert_eq!(snapshot.processed, 3);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.succeeded(), 2);
        assert_eq!(target.put_calls(), 2);
        assert!(captured.contains(Level::ERROR, "Failed to replicate object"));
    }

    #[tokio::test]
    async fn test_put_failure_counts_once() {
        let (source, target, gateways) = memory_gateways();
        source.insert("b1", "k1", Some("v1"), "data");
        target.inject_failure(GatewayOperation::Put, "k1");

        let mut session = Session::start(SessionConfig::new(), gateways).unwrap();
        session.enqueue(ObjectRecord::copy("b1", "k1", "v1")).await.unwrap();
        let snapshot = session.drain().await;

        assert_eq!(snapshot, LedgerSnapshot { processed: 1, failed: 1 });
        assert_eq!(target.put_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_in_flight_records() {
        let source = Arc::new(MemoryGateway::new("source"));
        let target = Arc::new(MemoryGateway::new("target").with_latency(Duration::from_secs(5)));
        let gateways = Gateways::new(source, target.clone());

        let mut session = Session::start(SessionConfig::new().workers(2), gateways).unwrap();
        for i in 0..6 {
            session.enqueue(ObjectRecord::delete_marker("b1", format!("k{i}"), "v1")).await.unwrap();
        }
        let snapshot = session.drain().await;

        assert_eq!(snapshot.processed, 6);
        assert_eq!(target.delete_calls(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_applies_backpressure() {
        let source = Arc::new(MemoryGateway::new("source").with_latency(Duration::from_secs(60)));
        let target = Arc::new(MemoryGateway::new("target"));
        let gateways = Gateways::new(source, target);

        let mut session =
            Session::start(SessionConfig::new().workers(1).queue_size(1), gateways).unwrap();

        // One record in flight, one buffered: the queue is full.
        session.enqueue(ObjectRecord::copy("b1", "k1", "v1")).await.unwrap();
        session.enqueue(ObjectRecord::copy("b1", "k2", "v2")).await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(100),
            session.enqueue(ObjectRecord::copy("b1", "k3", "v3")),
        )
        .await;
        assert!(blocked.is_err());

        let snapshot = session.drain().await;
        assert_eq!(snapshot.processed, 2);
    }

    #[tokio::test]
    async fn test_enqueue_after_drain_fails() {
        let (_source, _target, gateways) = memory_gateways();

        let mut session = Session::start(SessionConfig::new(), gateways).unwrap();
        session.drain().await;
        assert!(session.is_closed());

        let err = session.enqueue(ObjectRecord::copy("b1", "k1", "v1")).await.unwrap_err();
        assert!(matches!(err, ReplicationError::SessionClosed));

        // Draining again is harmless
        assert_eq!(session.drain().await, LedgerSnapshot::default());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let (_source, _target, gateways) = memory_gateways();

        let err = Session::start(SessionConfig::new().workers(0), gateways).unwrap_err();
        assert!(matches!(err, ReplicationError::InvalidConfig(_)));
    }
}
