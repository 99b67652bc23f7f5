// Connection Pool Manager
//
// Bounded, lazily grown set of sessions. All counters and the idle set live
// behind one mutex; waiters park on a Notify and re-check state on wake-up.

mod config;
mod guard;
mod reaper;

pub use config::PoolConfig;
pub use guard::PooledConnection;
pub use reaper::PoolReaper;

use crate::application::cancel::{wait_cancelled, CancelToken};
use crate::application::constants::CLOSE_TIMEOUT;
use crate::domain::{ClassifiedError, ConnectionId, ConnectionState, ErrorKind};
use crate::port::{
    Connector, DbConnection, PoolObserver, PoolStats, SaturationSignal, TracingPoolObserver,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use std::time::Duration;
use tokio::time::{sleep_until, timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

struct IdleConnection {
    conn: Box<dyn DbConnection>,
    id: ConnectionId,
    idle_since: Instant,
}

/// Mutable pool state; `total` counts idle, checked-out and in-flight
/// connects, so `total <= max_size` bounds live sessions.
#[derive(Default)]
struct PoolState {
    /// Front = longest idle, back = most recently released
    idle: VecDeque<IdleConnection>,
    total: usize,
    waiting: usize,
    closed: bool,
    next_id: ConnectionId,
}

#[derive(Default)]
struct PoolCounters {
    created: AtomicU64,
    destroyed: AtomicU64,
    reaped: AtomicU64,
    acquire_timeouts: AtomicU64,
}

struct PoolInner {
    connector: Arc<dyn Connector>,
    config: PoolConfig,
    observer: Arc<dyn PoolObserver>,
    state: Mutex<PoolState>,
    /// Signalled when an idle connection or a free slot appears, or on close
    available: Notify,
    /// Signalled whenever `total` shrinks (drain waits on it)
    drained: Notify,
    counters: PoolCounters,
}

impl PoolInner {
    /// Give `n` slots back and wake whoever may be waiting for one
    fn forget_slots(&self, n: usize) {
        {
            let mut state = self.state.lock();
            state.total = state.total.saturating_sub(n);
        }
        for _ in 0..n {
            self.available.notify_one();
        }
        self.drained.notify_waiters();
    }
}

/// Decrements the waiter count even if the acquiring future is dropped
struct WaitingGuard<'a>(&'a PoolInner);

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        state.waiting = state.waiting.saturating_sub(1);
    }
}

/// Slot reserved for a connect in flight; returned unless committed
struct SlotReservation<'a> {
    inner: &'a PoolInner,
    committed: bool,
}

impl SlotReservation<'_> {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.inner.forget_slots(1);
        }
    }
}

enum AcquireStep {
    Reuse(IdleConnection),
    Create(ConnectionId),
    Wait,
}

/// `now + after`, saturating to roughly thirty years out instead of panicking
fn deadline_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

/// Shared handle to the pool (cheap to clone)
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create a pool that logs saturation through `tracing`
    ///
    /// No session is opened here; see `warm_up`.
    pub fn new(connector: Arc<dyn Connector>, config: PoolConfig) -> Self {
        Self::with_observer(connector, config, Arc::new(TracingPoolObserver))
    }

    pub fn with_observer(
        connector: Arc<dyn Connector>,
        config: PoolConfig,
        observer: Arc<dyn PoolObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                connector,
                config,
                observer,
                state: Mutex::new(PoolState::default()),
                available: Notify::new(),
                drained: Notify::new(),
                counters: PoolCounters::default(),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Borrow a connection
    ///
    /// Reuses the most recently released idle connection, otherwise opens a
    /// new one while `total < max_size`, otherwise waits up to
    /// `connect_timeout` for a release. Opening a session shares the same
    /// deadline.
    ///
    /// # Errors
    /// - `PoolClosed` after shutdown
    /// - `TransientResource` when no slot frees up within `connect_timeout`
    /// - `TransientConnection` when a new session cannot be opened in time
    pub async fn acquire(&self) -> Result<PooledConnection, ClassifiedError> {
        self.acquire_with(None).await
    }

    /// `acquire` that aborts with `Cancelled` when `cancel` fires
    pub async fn acquire_cancellable(
        &self,
        cancel: &CancelToken,
    ) -> Result<PooledConnection, ClassifiedError> {
        self.acquire_with(Some(cancel)).await
    }

    pub(crate) async fn acquire_with(
        &self,
        cancel: Option<&CancelToken>,
    ) -> Result<PooledConnection, ClassifiedError> {
        let deadline = deadline_after(self.inner.config.connect_timeout);

        loop {
            // Register interest before inspecting state so a release between
            // the check and the wait is not missed.
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let step = {
                let mut state = self.inner.state.lock();
                if state.closed {
                    return Err(ClassifiedError::pool_closed());
                }
                if let Some(idle) = state.idle.pop_back() {
                    AcquireStep::Reuse(idle)
                } else if state.total < self.inner.config.max_size {
                    state.total += 1;
                    state.next_id += 1;
                    AcquireStep::Create(state.next_id)
                } else {
                    state.waiting += 1;
                    AcquireStep::Wait
                }
            };

            match step {
                AcquireStep::Reuse(idle) => {
                    debug!(connection_id = idle.id, "Reusing idle connection");
                    return Ok(PooledConnection::new(
                        self.clone(),
                        idle.conn,
                        idle.id,
                        ConnectionState::Idle,
                    ));
                }
                AcquireStep::Create(id) => return self.open_connection(id, deadline, cancel).await,
                AcquireStep::Wait => {
                    let _waiting = WaitingGuard(&self.inner);
                    tokio::select! {
                        _ = &mut notified => continue,
                        _ = sleep_until(deadline) => {
                            self.inner
                                .counters
                                .acquire_timeouts
                                .fetch_add(1, Ordering::Relaxed);
                            warn!(
                                timeout_ms = self.inner.config.connect_timeout.as_millis() as u64,
                                max_size = self.inner.config.max_size,
                                "Timed out waiting for a pooled connection"
                            );
                            return Err(ClassifiedError::new(
                                ErrorKind::TransientResource,
                                format!(
                                    "connection pool exhausted: no connection available within {}ms",
                                    self.inner.config.connect_timeout.as_millis()
                                ),
                            ));
                        }
                        _ = wait_cancelled(cancel) => {
                            debug!("Acquire cancelled while waiting for a connection");
                            return Err(ClassifiedError::cancelled());
                        }
                    }
                }
            }
        }
    }

    /// Open a session in a slot already counted in `total`
    ///
    /// The slot is returned if the connect fails, times out at `deadline` or
    /// is cancelled.
    async fn open_connection(
        &self,
        id: ConnectionId,
        deadline: Instant,
        cancel: Option<&CancelToken>,
    ) -> Result<PooledConnection, ClassifiedError> {
        let reservation = SlotReservation {
            inner: &self.inner,
            committed: false,
        };
        let connect_timeout = self.inner.config.connect_timeout;

        let outcome = tokio::select! {
            res = timeout_at(deadline, self.inner.connector.connect()) => res,
            _ = wait_cancelled(cancel) => {
                debug!(connection_id = id, "Acquire cancelled while opening a connection");
                return Err(ClassifiedError::cancelled());
            }
        };

        match outcome {
            Ok(Ok(conn)) => {
                reservation.commit();
                self.inner.counters.created.fetch_add(1, Ordering::Relaxed);
                debug!(connection_id = id, "Opened new connection");
                Ok(PooledConnection::new(
                    self.clone(),
                    conn,
                    id,
                    ConnectionState::Created,
                ))
            }
            Ok(Err(err)) => {
                warn!(error = %err.detail(), "Failed to open database connection");
                // Establishment failures are connection-level unless the
                // driver says the server is out of resources or refuses us.
                let kind = match err.kind {
                    ErrorKind::TransientResource | ErrorKind::Fatal => err.kind,
                    _ => ErrorKind::TransientConnection,
                };
                Err(ClassifiedError::new(
                    kind,
                    format!("failed to open connection: {}", err.detail()),
                ))
            }
            Err(_) => {
                warn!(
                    timeout_ms = connect_timeout.as_millis() as u64,
                    "Timed out opening database connection"
                );
                Err(ClassifiedError::new(
                    ErrorKind::TransientConnection,
                    format!(
                        "timed out opening connection after {}ms",
                        connect_timeout.as_millis()
                    ),
                ))
            }
        }
    }

    /// Return a borrowed connection
    ///
    /// Healthy connections go back to the idle set; unhealthy ones are
    /// closed and their slot freed.
    pub async fn release(&self, conn: PooledConnection, healthy: bool) {
        conn.release(healthy).await;
    }

    pub(crate) async fn give_back(
        &self,
        conn: Box<dyn DbConnection>,
        id: ConnectionId,
        state: ConnectionState,
        healthy: bool,
    ) {
        let reusable = healthy
            && match state.transition(ConnectionState::Idle) {
                Ok(_) => true,
                Err(e) => {
                    error!(connection_id = id, error = %e, "Refusing to park connection");
                    false
                }
            };

        if !reusable {
            debug!(connection_id = id, "Destroying unhealthy connection");
            self.destroy(conn, id).await;
            return;
        }

        let rejected = {
            let mut pool_state = self.inner.state.lock();
            if pool_state.closed {
                Some(conn)
            } else {
                pool_state.idle.push_back(IdleConnection {
                    conn,
                    id,
                    idle_since: Instant::now(),
                });
                None
            }
        };

        match rejected {
            None => self.inner.available.notify_one(),
            Some(conn) => self.destroy(conn, id).await,
        }
    }

    /// Close a session, then free its slot
    ///
    /// The slot is freed only after close completes so the number of open
    /// sessions never exceeds `max_size`, even transiently.
    pub(crate) async fn destroy(&self, conn: Box<dyn DbConnection>, id: ConnectionId) {
        close_quietly(conn, id).await;
        self.inner.counters.destroyed.fetch_add(1, Ordering::Relaxed);
        self.inner.forget_slots(1);
    }

    /// Account for a connection dropped outside an async context
    pub(crate) fn forget_dropped(&self) {
        self.inner.counters.destroyed.fetch_add(1, Ordering::Relaxed);
        self.inner.forget_slots(1);
    }

    /// Open connections up to `min_size` (startup only)
    ///
    /// Failures are logged and stop the warm-up; they are not fatal.
    pub async fn warm_up(&self) -> usize {
        let mut opened = Vec::new();

        loop {
            let id = {
                let mut state = self.inner.state.lock();
                if state.closed || state.total >= self.inner.config.min_size {
                    break;
                }
                state.total += 1;
                state.next_id += 1;
                state.next_id
            };

            let deadline = deadline_after(self.inner.config.connect_timeout);
            match self.open_connection(id, deadline, None).await {
                Ok(conn) => opened.push(conn),
                Err(e) => {
                    warn!(error = %e, "Pool warm-up stopped early");
                    break;
                }
            }
        }

        let count = opened.len();
        for conn in opened {
            conn.release(true).await;
        }
        info!(opened = count, min_size = self.inner.config.min_size, "Pool warm-up complete");
        count
    }

    /// Stop handing out connections and close everything
    ///
    /// Idle connections are closed immediately; checked-out ones are closed
    /// as they come back, for at most `drain_timeout`. Returns the number of
    /// connections still outstanding when the drain gave up.
    pub async fn drain_and_close(&self) -> usize {
        let idle: Vec<IdleConnection> = {
            let mut state = self.inner.state.lock();
            if !state.closed {
                state.closed = true;
                info!(
                    total = state.total,
                    idle = state.idle.len(),
                    "Connection pool closing"
                );
            }
            state.idle.drain(..).collect()
        };

        // Waiters observe `closed` and fail with PoolClosed
        self.inner.available.notify_waiters();

        for entry in idle {
            self.destroy(entry.conn, entry.id).await;
        }

        let deadline = deadline_after(self.inner.config.drain_timeout);
        loop {
            let drained = self.inner.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            let remaining = self.inner.state.lock().total;
            if remaining == 0 {
                info!("Connection pool drained");
                return 0;
            }

            tokio::select! {
                _ = &mut drained => {}
                _ = sleep_until(deadline) => {
                    warn!(
                        remaining = remaining,
                        "Drain timed out with connections still checked out"
                    );
                    return remaining;
                }
            }
        }
    }

    /// Alias of `drain_and_close` for process shutdown paths
    pub async fn shutdown(&self) {
        self.drain_and_close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn stats(&self) -> PoolStats {
        let (total, idle, waiting, closed) = {
            let state = self.inner.state.lock();
            (state.total, state.idle.len(), state.waiting, state.closed)
        };
        let counters = &self.inner.counters;

        PoolStats {
            total,
            idle,
            active: total.saturating_sub(idle),
            waiting,
            max_size: self.inner.config.max_size,
            min_size: self.inner.config.min_size,
            closed,
            created: counters.created.load(Ordering::Relaxed),
            destroyed: counters.destroyed.load(Ordering::Relaxed),
            reaped: counters.reaped.load(Ordering::Relaxed),
            acquire_timeouts: counters.acquire_timeouts.load(Ordering::Relaxed),
        }
    }

    /// Emit a saturation signal to the observer if any threshold is crossed
    pub fn check_saturation(&self) -> Option<SaturationSignal> {
        let stats = self.stats();
        let reasons = stats.saturation_reasons();
        if reasons.is_empty() {
            return None;
        }

        let signal = SaturationSignal { stats, reasons };
        self.inner.observer.on_saturation(&signal);
        Some(signal)
    }
}

/// Close a session, giving up after `CLOSE_TIMEOUT`
///
/// Dropping an unfinished close still drops the driver session.
async fn close_quietly(conn: Box<dyn DbConnection>, id: ConnectionId) {
    match timeout(CLOSE_TIMEOUT, conn.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            debug!(connection_id = id, error = %e, "Error while closing connection");
        }
        Err(_) => {
            warn!(
                connection_id = id,
                timeout_ms = CLOSE_TIMEOUT.as_millis() as u64,
                "Connection close timed out; session abandoned"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cancel::cancel_channel;
    use crate::port::connector::mocks::MockConnector;
    use crate::port::pool_observer::mocks::RecordingObserver;
    use crate::port::SaturationReason;
    use std::time::Duration;

    fn config(min_size: usize, max_size: usize) -> PoolConfig {
        PoolConfig {
            min_size,
            max_size,
            connect_timeout: Duration::from_millis(500),
            ..Default::default()
        }
    }

    fn setup(min_size: usize, max_size: usize) -> (ConnectionPool, MockConnector) {
        let connector = MockConnector::new();
        let pool = ConnectionPool::new(Arc::new(connector.clone()), config(min_size, max_size));
        (pool, connector)
    }

    #[tokio::test]
    async fn test_acquire_creates_lazily_and_reuses() {
        let (pool, connector) = setup(0, 4);
        assert_eq!(connector.connect_count(), 0);

        let conn = pool.acquire().await.unwrap();
        let first_id = conn.id();
        assert_eq!(pool.stats().active, 1);
        pool.release(conn, true).await;

        let conn = pool.acquire().await.unwrap();
        assert_eq!(conn.id(), first_id);
        assert_eq!(connector.connect_count(), 1);
        conn.release(true).await;

        let stats = pool.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.active, 0);
    }

    #[tokio::test]
    async fn test_unhealthy_release_destroys_and_frees_slot() {
        let (pool, connector) = setup(0, 2);

        let conn = pool.acquire().await.unwrap();
        conn.release(false).await;

        let stats = pool.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.destroyed, 1);
        assert_eq!(connector.live_connections(), 0);
        assert_eq!(connector.close_count(), 1);

        // Lazy replenishment: the next acquire opens a fresh session
        let conn = pool.acquire().await.unwrap();
        assert_eq!(connector.connect_count(), 2);
        conn.release(true).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out_when_exhausted() {
        let (pool, _connector) = setup(0, 1);
        let held = pool.acquire().await.unwrap();

        let err = pool.acquire().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransientResource);

        let stats = pool.stats();
        assert_eq!(stats.acquire_timeouts, 1);
        assert_eq!(stats.waiting, 0);
        assert_eq!(stats.total, 1);
        held.release(true).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_is_woken_by_release() {
        let (pool, connector) = setup(0, 1);
        let held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let conn = pool.acquire().await?;
                let id = conn.id();
                conn.release(true).await;
                Ok::<_, ClassifiedError>(id)
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.stats().waiting, 1);

        let held_id = held.id();
        held.release(true).await;

        assert_eq!(waiter.await.unwrap().unwrap(), held_id);
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_returns_slot() {
        let (pool, connector) = setup(0, 1);
        connector.fail_next_connect(
            crate::port::DriverError::new(ErrorKind::TransientConnection, "connection refused")
                .with_code("ECONNREFUSED"),
        );

        let err = pool.acquire().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransientConnection);
        assert!(err.message.contains("ECONNREFUSED"));
        assert_eq!(pool.stats().total, 0);

        // Slot is usable again
        let conn = pool.acquire().await.unwrap();
        conn.release(true).await;
    }

    #[tokio::test]
    async fn test_dropped_guard_destroys_connection() {
        let (pool, connector) = setup(0, 1);
        let conn = pool.acquire().await.unwrap();
        drop(conn);

        // Close happens on a spawned task
        for _ in 0..10 {
            if pool.stats().total == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(pool.stats().total, 0);
        assert_eq!(connector.live_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_after_shutdown_fails_fast() {
        let (pool, connector) = setup(0, 2);
        let conn = pool.acquire().await.unwrap();
        conn.release(true).await;

        pool.shutdown().await;
        assert!(pool.is_closed());
        assert_eq!(connector.live_connections(), 0);

        let err = pool.acquire().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PoolClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_wakes_waiters_with_pool_closed() {
        let (pool, _connector) = setup(0, 1);
        let held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let drain = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.drain_and_close().await })
        };

        let err = waiter.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::PoolClosed);

        // Drain completes once the held connection comes back
        held.release(true).await;
        assert_eq!(drain.await.unwrap(), 0);
        assert_eq!(pool.stats().total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_gives_up_after_timeout() {
        let (pool, _connector) = setup(0, 1);
        let held = pool.acquire().await.unwrap();

        assert_eq!(pool.drain_and_close().await, 1);
        held.release(true).await;
        assert_eq!(pool.stats().total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_waiting_acquire() {
        let (pool, _connector) = setup(0, 1);
        let held = pool.acquire().await.unwrap();
        let (handle, token) = cancel_channel();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire_cancellable(&token).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        let err = waiter.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancelled);
        assert_eq!(pool.stats().waiting, 0);
        held.release(true).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_connect_in_flight() {
        let connector = MockConnector::new();
        connector.set_connect_delay(Duration::from_secs(20));
        let pool = ConnectionPool::new(
            Arc::new(connector.clone()),
            PoolConfig {
                connect_timeout: Duration::from_secs(30),
                ..config(0, 2)
            },
        );
        let (handle, token) = cancel_channel();

        let started = Instant::now();
        let opener = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire_cancellable(&token).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.stats().total, 1);
        handle.cancel();

        let err = opener.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(pool.stats().total, 0);
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_and_connect_share_one_deadline() {
        let (pool, connector) = setup(0, 1);
        let held = pool.acquire().await.unwrap();

        let started = Instant::now();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };

        // Free the slot late; the replacement connect is slower than what is left
        tokio::time::sleep(Duration::from_millis(400)).await;
        connector.set_connect_delay(Duration::from_secs(10));
        held.invalidate().await;

        let err = waiter.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransientConnection);
        assert!(started.elapsed() <= Duration::from_millis(550));
        assert_eq!(pool.stats().total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_connect_timeout_does_not_overflow() {
        let connector = MockConnector::new();
        let pool = ConnectionPool::new(
            Arc::new(connector),
            PoolConfig {
                connect_timeout: Duration::MAX,
                drain_timeout: Duration::MAX,
                ..config(0, 1)
            },
        );

        let conn = pool.acquire().await.unwrap();
        conn.release(true).await;
        assert_eq!(pool.drain_and_close().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_close_is_abandoned_and_slot_freed() {
        let (pool, connector) = setup(0, 1);
        connector.set_hang_on_close(true);

        let conn = pool.acquire().await.unwrap();
        let started = Instant::now();
        conn.invalidate().await;

        assert!(started.elapsed() >= CLOSE_TIMEOUT);
        assert_eq!(connector.close_count(), 1);
        assert_eq!(connector.live_connections(), 0);
        assert_eq!(pool.stats().total, 0);
    }

    #[tokio::test]
    async fn test_never_exceeds_max_size_under_load() {
        let (pool, connector) = setup(0, 5);
        connector.set_fallback(crate::port::connector::mocks::MockBehavior::Delay(
            Duration::from_millis(2),
            crate::domain::ResultSet::empty(),
        ));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..50 {
            let pool = pool.clone();
            tasks.spawn(async move {
                let mut conn = pool.acquire().await.unwrap();
                conn.execute("SELECT 1", &[]).await.unwrap();
                let stats = pool.stats();
                assert!(stats.total <= stats.max_size);
                conn.release(true).await;
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap();
        }

        assert!(connector.peak_connections() <= 5);
        assert!(pool.stats().total <= 5);
    }

    #[tokio::test]
    async fn test_warm_up_opens_min_size() {
        let (pool, connector) = setup(3, 10);
        assert_eq!(pool.warm_up().await, 3);
        assert_eq!(connector.connect_count(), 3);

        let stats = pool.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.idle, 3);
    }

    #[tokio::test]
    async fn test_saturation_signal() {
        let connector = MockConnector::new();
        let observer = RecordingObserver::new();
        let pool = ConnectionPool::with_observer(
            Arc::new(connector),
            config(0, 10),
            Arc::new(observer.clone()),
        );

        let mut held = Vec::new();
        for _ in 0..9 {
            held.push(pool.acquire().await.unwrap());
        }

        let signal = pool.check_saturation().unwrap();
        assert!(signal.reasons.contains(&SaturationReason::NoIdle));
        assert!(signal.reasons.contains(&SaturationReason::HighOccupancy));

        for conn in held.drain(..5) {
            conn.release(true).await;
        }
        let signal = pool.check_saturation().unwrap();
        assert_eq!(signal.reasons, vec![SaturationReason::HighOccupancy]);

        for conn in held {
            conn.invalidate().await;
        }
        // 5 of 10 open, all idle, nobody waiting
        assert!(pool.check_saturation().is_none());
        assert_eq!(observer.signals().len(), 2);
    }
}
