// src/infra/stats.rs — Process-wide service counters
//
// Constructed once by the service wiring and shared by Arc; nothing here is
// global.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ServiceStats {
    analyze_requests: AtomicU64,
    repair_requests: AtomicU64,
    repair_success: AtomicU64,
    repair_failed: AtomicU64,
    watch_processed: AtomicU64,
    watch_failed: AtomicU64,
}

/// Point-in-time copy of the counters, for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub analyze_requests: u64,
    pub repair_requests: u64,
    pub repair_success: u64,
    pub repair_failed: u64,
    pub watch_processed: u64,
    pub watch_failed: u64,
}

#[derive(Debug, Clone, Copy)]
pub enum Counter {
    AnalyzeRequests,
    RepairRequests,
    RepairSuccess,
    RepairFailed,
    WatchProcessed,
    WatchFailed,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, counter: Counter) {
        self.slot(counter).fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            analyze_requests: self.analyze_requests.load(Ordering::Relaxed),
            repair_requests: self.repair_requests.load(Ordering::Relaxed),
            repair_success: self.repair_success.load(Ordering::Relaxed),
            repair_failed: self.repair_failed.load(Ordering::Relaxed),
            watch_processed: self.watch_processed.load(Ordering::Relaxed),
            watch_failed: self.watch_failed.load(Ordering::Relaxed),
        }
    }

    fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::AnalyzeRequests => &self.analyze_requests,
            Counter::RepairRequests => &self.repair_requests,
            Counter::RepairSuccess => &self.repair_success,
            Counter::RepairFailed => &self.repair_failed,
            Counter::WatchProcessed => &self.watch_processed,
            Counter::WatchFailed => &self.watch_failed,
        }
    }
}
