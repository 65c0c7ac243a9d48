// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Replication outcome accounting.
//!
//! Every record a worker takes off the queue is counted exactly once as
//! processed; the ones that errored are additionally counted as failed.
//! The driver reports `processed - failed` as the number of records that
//! replicated successfully.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;

/// Shared outcome counters for a replication session.
#[derive(Debug, Default)]
pub struct ReplicationLedger {
    /// Records attempted, successful or not.
    processed: AtomicU64,

    /// Records that failed.
    failed: AtomicU64,
}

impl ReplicationLedger {
    /// Creates a ledger with both counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successfully replicated (or simulated) record.
    pub fn record_success(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        counter!("drrepl_objects_processed_total").increment(1);
    }

    /// Records a record whose replication failed.
    pub fn record_failure(&self) {
        // processed before failed, so failed never exceeds processed
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.failed.fetch_add(1, Ordering::SeqCst);
        counter!("drrepl_objects_processed_total").increment(1);
        counter!("drrepl_objects_failed_total").increment(1);
    }

    /// Number of records attempted.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Number of records that failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Reads both counters.
    pub fn snapshot(&self) -> LedgerSnapshot {
        // failed is read first; see record_failure
        let failed = self.failed();
        let processed = self.processed();
        LedgerSnapshot { processed, failed }
    }
}

/// A point-in-time copy of the ledger counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerSnapshot {
    /// Records attempted.
    pub processed: u64,
    /// Records that failed.
    pub failed: u64,
}

impl LedgerSnapshot {
    /// Records that replicated successfully.
    pub fn succeeded(&self) -> u64 {
        self.processed - self.failed
    }
}
