// Pool observability port
// Saturation is a signal to the outside world, never a control action
use crate::application::constants::SATURATION_OCCUPANCY_PERCENT;
use serde::Serialize;
use tracing::warn;

/// Point-in-time pool occupancy plus lifetime counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub idle: usize,
    /// Checked out or being established
    pub active: usize,
    pub waiting: usize,
    pub max_size: usize,
    pub min_size: usize,
    pub closed: bool,

    pub created: u64,
    pub destroyed: u64,
    pub reaped: u64,
    pub acquire_timeouts: u64,
}

impl PoolStats {
    /// Saturation thresholds crossed by this snapshot (empty when healthy)
    pub fn saturation_reasons(&self) -> Vec<SaturationReason> {
        let mut reasons = Vec::new();
        if self.closed {
            return reasons;
        }
        if self.waiting > 0 {
            reasons.push(SaturationReason::Waiters);
        }
        if self.idle == 0 {
            reasons.push(SaturationReason::NoIdle);
        }
        if self.total * 100 > self.max_size * SATURATION_OCCUPANCY_PERCENT {
            reasons.push(SaturationReason::HighOccupancy);
        }
        reasons
    }
}

/// Why a scan considered the pool saturated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaturationReason {
    /// Callers are queued in acquire()
    Waiters,
    /// No idle connection is available
    NoIdle,
    /// More than 80% of max_size is open
    HighOccupancy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaturationSignal {
    pub stats: PoolStats,
    pub reasons: Vec<SaturationReason>,
}

/// Receiver of saturation signals (logging/metrics collaborator)
pub trait PoolObserver: Send + Sync {
    fn on_saturation(&self, signal: &SaturationSignal);
}

/// Default observer: structured warning log
pub struct TracingPoolObserver;

impl PoolObserver for TracingPoolObserver {
    fn on_saturation(&self, signal: &SaturationSignal) {
        warn!(
            total = signal.stats.total,
            idle = signal.stats.idle,
            active = signal.stats.active,
            waiting = signal.stats.waiting,
            max_size = signal.stats.max_size,
            reasons = ?signal.reasons,
            "Connection pool saturated"
        );
    }
}


// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every signal it receives
    #[derive(Clone, Default)]
    pub struct RecordingObserver {
        signals: Arc<Mutex<Vec<SaturationSignal>>>,
    }

    impl RecordingObserver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn signals(&self) -> Vec<SaturationSignal> {
            self.signals.lock().unwrap().clone()
        }
    }

    impl PoolObserver for RecordingObserver {
        fn on_saturation(&self, signal: &SaturationSignal) {
            self.signals.lock().unwrap().push(signal.clone());
        }
    }
}
