//! Shared fixtures: temp-file databases and an instrumented SQLite connector

#![allow(dead_code)]

use async_trait::async_trait;
use dbguard_core::application::{
    BackoffPolicy, ConnectionPool, ExecutorConfig, PoolConfig, QueryExecutor,
};
use dbguard_core::domain::{ResultSet, Value};
use dbguard_core::port::{
    Connector, DbConnection, DriverError, ErrorClassifier, RandomJitter,
};
use dbguard_infra_sqlite::{SqliteConnector, SqlxErrorClassifier};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// SQLite file under the temp dir, removed (with WAL side files) on drop
pub struct TempDb {
    path: PathBuf,
}

impl TempDb {
    pub fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "dbguard_{}_{}.db",
            name,
            std::process::id()
        ));
        let db = Self { path };
        db.cleanup();
        db
    }

    pub fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }

    fn cleanup(&self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(PathBuf::from(file));
        }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[derive(Default)]
pub struct Counters {
    pub live: AtomicUsize,
    pub peak: AtomicUsize,
    pub connects: AtomicUsize,
    /// Statements that will fail with a simulated connection reset
    pub resets_remaining: AtomicUsize,
}

/// Real SQLite sessions plus live/peak accounting and fault injection
#[derive(Clone)]
pub struct InstrumentedConnector {
    inner: Arc<SqliteConnector>,
    pub counters: Arc<Counters>,
}

impl InstrumentedConnector {
    pub fn new(inner: SqliteConnector) -> Self {
        Self {
            inner: Arc::new(inner),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn for_url(url: &str) -> Self {
        Self::new(SqliteConnector::new(url).expect("valid sqlite url"))
    }

    pub fn inject_resets(&self, n: usize) {
        self.counters.resets_remaining.store(n, Ordering::SeqCst);
    }

    pub fn live(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for InstrumentedConnector {
    async fn connect(&self) -> Result<Box<dyn DbConnection>, DriverError> {
        let inner = self.inner.connect().await?;
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(InstrumentedConnection {
            inner,
            live: LiveGuard(self.counters.clone()),
        }))
    }
}

struct LiveGuard(Arc<Counters>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}

struct InstrumentedConnection {
    inner: Box<dyn DbConnection>,
    live: LiveGuard,
}

#[async_trait]
impl DbConnection for InstrumentedConnection {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
        let counters = &self.live.0;
        let inject = counters
            .resets_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if inject {
            let err = sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
            return Err(SqlxErrorClassifier.classify(&err));
        }
        self.inner.execute(sql, params).await
    }

    async fn ping(&mut self) -> Result<(), DriverError> {
        self.inner.ping().await
    }

    async fn cancel(&mut self) {
        self.inner.cancel().await
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        let Self { inner, live } = *self;
        let res = inner.close().await;
        drop(live);
        res
    }
}

/// Short backoff so retry tests finish quickly (10ms base, 5ms jitter)
pub fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy::new(
        Arc::new(RandomJitter),
        Duration::from_millis(10),
        Duration::from_millis(5),
    )
}

pub fn pool_config(min_size: usize, max_size: usize) -> PoolConfig {
    PoolConfig {
        min_size,
        max_size,
        connect_timeout: Duration::from_secs(5),
        drain_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

pub fn executor(
    connector: &InstrumentedConnector,
    config: PoolConfig,
    development: bool,
) -> QueryExecutor {
    let pool = ConnectionPool::new(Arc::new(connector.clone()), config);
    QueryExecutor::with_backoff(
        pool,
        fast_backoff(),
        ExecutorConfig {
            redact_fatal: !development,
            ..Default::default()
        },
    )
}
