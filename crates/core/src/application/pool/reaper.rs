// Idle Reaper
// Periodic scan: evicts long-idle connections above the floor, then reports
// saturation. Replenishment below min_size is left to acquire().

use super::{close_quietly, ConnectionPool, IdleConnection};
use crate::application::cancel::CancelToken;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

impl ConnectionPool {
    /// Close connections idle longer than `idle_timeout`, keeping at least
    /// `min_size` open. Returns the number reaped.
    pub async fn reap_idle(&self) -> usize {
        let idle_timeout = self.inner.config.idle_timeout;
        let min_size = self.inner.config.min_size;

        let victims: Vec<IdleConnection> = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return 0;
            }
            let mut victims = Vec::new();
            // Front of the idle queue is the longest idle
            while state.total.saturating_sub(victims.len()) > min_size {
                let expired = state
                    .idle
                    .front()
                    .is_some_and(|entry| entry.idle_since.elapsed() > idle_timeout);
                if !expired {
                    break;
                }
                if let Some(entry) = state.idle.pop_front() {
                    victims.push(entry);
                }
            }
            victims
        };

        let reaped = victims.len();
        if reaped == 0 {
            return 0;
        }

        for entry in victims {
            debug!(connection_id = entry.id, "Reaping idle connection");
            close_quietly(entry.conn, entry.id).await;
        }

        let counters = &self.inner.counters;
        counters.reaped.fetch_add(reaped as u64, Ordering::Relaxed);
        counters.destroyed.fetch_add(reaped as u64, Ordering::Relaxed);
        self.inner.forget_slots(reaped);

        info!(reaped = reaped, "Reaped idle connections");
        reaped
    }
}

/// Background task driving `reap_idle` and `check_saturation`
pub struct PoolReaper {
    pool: ConnectionPool,
    interval: Duration,
}

impl PoolReaper {
    pub fn new(pool: ConnectionPool) -> Self {
        let interval = pool.config().reaper_interval;
        Self { pool, interval }
    }

    /// One scan
    pub async fn run_once(&self) -> usize {
        let reaped = self.pool.reap_idle().await;
        self.pool.check_saturation();
        reaped
    }

    /// Run until `shutdown` fires or the pool closes
    pub async fn run(self, mut shutdown: CancelToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately
        ticker.tick().await;

        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Pool reaper started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.pool.is_closed() {
                        break;
                    }
                    self.run_once().await;
                }
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Pool reaper stopped");
    }
}
