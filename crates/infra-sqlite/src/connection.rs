// SQLite Connector: one sqlx connection per pooled session

use crate::classifier::SqlxErrorClassifier;
use crate::row::{bind_params, decode_rows};
use async_trait::async_trait;
use dbguard_core::domain::{ErrorKind, ResultSet, Value};
use dbguard_core::port::{Connector, DbConnection, DriverError, ErrorClassifier};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::Connection;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long SQLite itself waits on a locked database before SQLITE_BUSY
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// VM instructions between checks of the interrupt flag
const INTERRUPT_CHECK_OPS: i32 = 1000;

/// Opens sessions against a single SQLite database
///
/// WAL journal, 5s busy timeout, foreign keys on. `sqlite::memory:` gives
/// every session of this connector the same shared-cache database.
pub struct SqliteConnector {
    options: SqliteConnectOptions,
    classifier: SqlxErrorClassifier,
}

impl SqliteConnector {
    pub fn new(database_url: &str) -> Result<Self, DriverError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                DriverError::new(
                    ErrorKind::Fatal,
                    format!("invalid database url '{}': {}", database_url, e),
                )
            })?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .create_if_missing(true)
            .foreign_keys(true);

        Ok(Self::with_options(options))
    }

    pub fn with_options(options: SqliteConnectOptions) -> Self {
        Self {
            options,
            classifier: SqlxErrorClassifier,
        }
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self) -> Result<Box<dyn DbConnection>, DriverError> {
        let mut conn = SqliteConnection::connect_with(&self.options)
            .await
            .map_err(|e| self.classifier.classify(&e))?;

        // A set flag makes the running statement fail with SQLITE_INTERRUPT
        let interrupt = Arc::new(AtomicBool::new(false));
        {
            let flag = Arc::clone(&interrupt);
            let mut handle = conn
                .lock_handle()
                .await
                .map_err(|e| self.classifier.classify(&e))?;
            handle.set_progress_handler(INTERRUPT_CHECK_OPS, move || {
                !flag.load(Ordering::Relaxed)
            });
        }

        debug!(filename = %self.options.get_filename().display(), "SQLite session opened");
        Ok(Box::new(SqliteDbConnection {
            conn,
            interrupt,
            classifier: self.classifier,
        }))
    }
}

pub struct SqliteDbConnection {
    conn: SqliteConnection,
    interrupt: Arc<AtomicBool>,
    classifier: SqlxErrorClassifier,
}

#[async_trait]
impl DbConnection for SqliteDbConnection {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
        self.interrupt.store(false, Ordering::Relaxed);
        let query = bind_params(sqlx::query(sql), params);
        let rows = query
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| self.classifier.classify(&e))?;

        decode_rows(&rows).map_err(|e| self.classifier.classify(&e))
    }

    async fn ping(&mut self) -> Result<(), DriverError> {
        self.conn
            .ping()
            .await
            .map_err(|e| self.classifier.classify(&e))
    }

    /// Interrupt the statement still running on the worker thread
    ///
    /// Does not wait for the lock on the handle, so it works while a
    /// statement is running.
    async fn cancel(&mut self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        let classifier = self.classifier;
        self.conn.close().await.map_err(|e| classifier.classify(&e))
    }
}
