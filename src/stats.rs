//! Builder statistics for the statistics sink
//!
//! Counters are plain atomics bumped on the writer and prune paths; readers
//! take a [`StatsSnapshot`] that also carries the current graph size.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct BuilderStats {
    update_count: AtomicU64,
    prune_count: AtomicU64,
    conflict_count: AtomicU64,
    processing_time_ns: AtomicU64,
    pruner_failed: AtomicBool,
}

impl BuilderStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_update(&self) {
        self.update_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prune(&self) {
        self.prune_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.conflict_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Accumulate time spent in graph updates and prune passes
    pub fn add_processing_time(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.processing_time_ns.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Mark the prune timer as dead; pruning will not resume
    pub fn mark_pruner_failed(&self) {
        self.pruner_failed.store(true, Ordering::SeqCst);
    }

    pub fn update_count(&self) -> u64 {
        self.update_count.load(Ordering::Relaxed)
    }

    pub fn prune_count(&self) -> u64 {
        self.prune_count.load(Ordering::Relaxed)
    }

    pub fn conflict_count(&self) -> u64 {
        self.conflict_count.load(Ordering::Relaxed)
    }

    pub fn processing_time(&self) -> Duration {
        Duration::from_nanos(self.processing_time_ns.load(Ordering::Relaxed))
    }

    pub fn pruner_failed(&self) -> bool {
        self.pruner_failed.load(Ordering::SeqCst)
    }
}

/// Point-in-time copy of the builder counters and graph size
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub update_count: u64,
    pub prune_count: u64,
    pub conflict_count: u64,
    pub processing_time_ms: u64,
    pub pruner_failed: bool,
    pub vertex_count: usize,
    pub edge_count: usize,
    pub tracked_objects: usize,
    pub snapshot_ms: u64,
    pub period_count: usize,
}

impl StatsSnapshot {
    /// Mean time per update or prune pass in milliseconds (0.0 when idle)
    pub fn mean_processing_ms(&self) -> f64 {
        let ops = self.update_count + self.prune_count;
        if ops == 0 {
            0.0
        } else {
            self.processing_time_ms as f64 / ops as f64
        }
    }

    /// Print a summary table to stdout
    pub fn print_summary(&self) {
        println!("{:<22} {:>12}", "metric", "value");
        println!("{:-<22} {:->12}", "", "");
        println!("{:<22} {:>12}", "updates", self.update_count);
        println!("{:<22} {:>12}", "prune ticks", self.prune_count);
        println!("{:<22} {:>12}", "conflicts", self.conflict_count);
        println!("{:<22} {:>12}", "processing time (ms)", self.processing_time_ms);
        println!("{:<22} {:>12.4}", "mean per op (ms)", self.mean_processing_ms());
        println!("{:<22} {:>12}", "vertices", self.vertex_count);
        println!("{:<22} {:>12}", "edges", self.edge_count);
        println!("{:<22} {:>12}", "tracked objects", self.tracked_objects);
        println!("{:<22} {:>12}", "snapshot (ms)", self.snapshot_ms);
        println!("{:<22} {:>12}", "period count", self.period_count);
        if self.pruner_failed {
            println!("{:<22} {:>12}", "pruner", "FAILED");
        }
    }
}
