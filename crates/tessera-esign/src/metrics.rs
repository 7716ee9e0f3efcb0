// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job counters.
//!
//! Counter keys render as `name{job=<job_name>}`, or a bare `name` when no
//! job label applies.

use std::collections::BTreeMap;
use std::sync::Mutex;

pub const JOB_SUCCESS_TOTAL: &str = "job_success_total";
pub const JOB_FAILURE_TOTAL: &str = "job_failure_total";
pub const JOB_RETRY_TOTAL: &str = "job_retry_total";
pub const JOB_DEDUPED_TOTAL: &str = "job_deduped_total";
pub const FINALIZE_FAILURE_TOTAL: &str = "finalize_failure_total";

/// Sink for job counters.
pub trait Metrics: Send + Sync {
    /// Increment `name`, labelled with `job` when given.
    fn increment(&self, name: &str, job: Option<&str>);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn increment(&self, _name: &str, _job: Option<&str>) {}
}

/// Point-in-time copy of the in-memory counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    /// Value of `name{job=<job>}`, zero when never incremented.
    pub fn job_counter(&self, name: &str, job: &str) -> u64 {
        self.counters
            .get(&counter_key(name, Some(job)))
            .copied()
            .unwrap_or(0)
    }

    /// Value of an unlabelled counter.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

/// Counters kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<BTreeMap<String, u64>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = match self.counters.lock() {
            Ok(counters) => counters.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        MetricsSnapshot { counters }
    }
}

impl Metrics for InMemoryMetrics {
    fn increment(&self, name: &str, job: Option<&str>) {
        let mut counters = match self.counters.lock() {
            Ok(counters) => counters,
            Err(poisoned) => poisoned.into_inner(),
        };
        *counters.entry(counter_key(name, job)).or_insert(0) += 1;
    }
}

fn counter_key(name: &str, job: Option<&str>) -> String {
    match job {
        Some(job) => format!("{}{{job={}}}", name, job),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_counters() {
        let metrics = InMemoryMetrics::new();
        metrics.increment(JOB_SUCCESS_TOTAL, Some("token_rotate"));
        metrics.increment(JOB_SUCCESS_TOTAL, Some("token_rotate"));
        metrics.increment(FINALIZE_FAILURE_TOTAL, None);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.job_counter(JOB_SUCCESS_TOTAL, "token_rotate"), 2);
        assert_eq!(snapshot.job_counter(JOB_FAILURE_TOTAL, "token_rotate"), 0);
        assert_eq!(snapshot.counter(FINALIZE_FAILURE_TOTAL), 1);
        assert!(
            snapshot
                .counters
                .contains_key("job_success_total{job=token_rotate}")
        );
    }
}
