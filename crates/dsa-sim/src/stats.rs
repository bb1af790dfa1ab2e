//! Per-worker statistics and their reduction into a run summary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::warn;

/// Everything one worker counted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub worker: usize,
    /// Samples attempted
    pub samples: usize,
    /// Samples written to the sample files
    pub recorded: usize,
    /// Samples dropped on a propagation fault
    pub discarded: usize,
    /// Samples whose PUs alone violated a PUR
    pub pur_violated: usize,
    /// Requests whose power was within the oracle's maximum
    pub accepted: usize,
    pub cs_valid: usize,
    pub cs_invalid: usize,
    /// Σ |oracle − cs| over valid CS samples
    pub cs_diff_sum: f64,
    /// Σ max(0, cs − oracle) over valid CS samples
    pub cs_fp_diff_sum: f64,
    pub joint_unconverged: usize,
    pub synthetic_written: usize,
    /// Σ SU data rates in bit/s
    pub data_rate_sum: f64,
    pub data_rate_count: usize,
    /// Path loss table lookups
    pub fetches: u64,
    pub elapsed_secs: f64,
}

impl WorkerStats {
    pub fn new(worker: usize) -> Self {
        Self {
            worker,
            ..Default::default()
        }
    }

    /// Record one crowd-sourced estimate against the oracle.
    pub fn record_cs(&mut self, oracle: f64, cs: f64) {
        if !cs.is_finite() {
            self.cs_invalid += 1;
            return;
        }
        self.cs_valid += 1;
        self.cs_diff_sum += (oracle - cs).abs();
        self.cs_fp_diff_sum += (cs - oracle).max(0.0);
    }

    pub fn add_elapsed(&mut self, d: Duration) {
        self.elapsed_secs += d.as_secs_f64();
    }
}

/// Shared map of finished workers, one entry each.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    workers: RwLock<BTreeMap<usize, WorkerStats>>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a worker's stats. A second entry for the same worker is
    /// ignored.
    pub fn record(&self, stats: WorkerStats) {
        let mut map = self.workers.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&stats.worker) {
            warn!(worker = stats.worker, "stats already recorded for worker");
            return;
        }
        map.insert(stats.worker, stats);
    }

    pub fn len(&self) -> usize {
        self.workers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Worker stats ordered by worker id.
    pub fn snapshot(&self) -> Vec<WorkerStats> {
        self.workers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_workers(self.snapshot())
    }
}

/// Reduced statistics of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub workers: usize,
    pub samples: usize,
    pub recorded: usize,
    pub discarded: usize,
    pub pur_violated: usize,
    pub accepted: usize,
    pub cs_valid: usize,
    pub cs_invalid: usize,
    /// dB, over valid CS samples
    pub average_diff: Option<f64>,
    pub average_fp_diff: Option<f64>,
    pub joint_unconverged: usize,
    pub synthetic_written: usize,
    /// Mbit/s per SU
    pub average_data_rate_mbps: Option<f64>,
    /// dB, oracle answer over a short SU walk
    pub max_power_std: Option<f64>,
    pub fetches: u64,
    /// Summed over workers
    pub worker_secs: f64,
    pub per_worker: Vec<WorkerStats>,
}

impl RunSummary {
    pub fn from_workers(per_worker: Vec<WorkerStats>) -> Self {
        let mut s = RunSummary {
            workers: per_worker.len(),
            ..Default::default()
        };
        let mut diff = 0.0;
        let mut fp_diff = 0.0;
        let mut rate = 0.0;
        let mut rate_count = 0;
        for w in &per_worker {
            s.samples += w.samples;
            s.recorded += w.recorded;
            s.discarded += w.discarded;
            s.pur_violated += w.pur_violated;
            s.accepted += w.accepted;
            s.cs_valid += w.cs_valid;
            s.cs_invalid += w.cs_invalid;
            s.joint_unconverged += w.joint_unconverged;
            s.synthetic_written += w.synthetic_written;
            s.fetches += w.fetches;
            s.worker_secs += w.elapsed_secs;
            diff += w.cs_diff_sum;
            fp_diff += w.cs_fp_diff_sum;
            rate += w.data_rate_sum;
            rate_count += w.data_rate_count;
        }
        if s.cs_valid > 0 {
            s.average_diff = Some(diff / s.cs_valid as f64);
            s.average_fp_diff = Some(fp_diff / s.cs_valid as f64);
        }
        if rate_count > 0 {
            s.average_data_rate_mbps = Some(rate / (rate_count as f64 * 1e6));
        }
        s.per_worker = per_worker;
        s
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
