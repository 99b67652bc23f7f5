// Query Executor
// Runs one statement per request against a pooled connection, retrying
// transient failures with backoff and bounding every attempt by a deadline.

use crate::application::cancel::{wait_cancelled, CancelToken};
use crate::application::constants::{DEFAULT_MAX_RETRIES, DEFAULT_STATEMENT_TIMEOUT};
use crate::application::pool::ConnectionPool;
use crate::application::retry::{BackoffPolicy, RetryDecision};
use crate::domain::{ClassifiedError, ErrorKind, QueryRequest, ResultSet};
use crate::port::RandomJitter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Message returned in place of fatal driver detail outside development
const REDACTED_FATAL_MESSAGE: &str = "query failed; see server logs for details";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Per-attempt deadline unless the request overrides it
    pub statement_timeout: Duration,
    /// Retries after the first attempt unless the request overrides it
    pub max_retries: u32,
    /// Hide driver detail of fatal errors from callers
    pub redact_fatal: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            redact_fatal: true,
        }
    }
}

/// Resilient query executor
///
/// Attempt flow:
/// 1. acquire a connection (bounded by the pool's connect timeout)
/// 2. run the statement under the per-attempt deadline
/// 3. release healthy connections, destroy broken or timed-out ones
/// 4. on failure, ask the backoff policy whether to try again
#[derive(Clone)]
pub struct QueryExecutor {
    pool: ConnectionPool,
    backoff: Arc<BackoffPolicy>,
    config: ExecutorConfig,
}

impl QueryExecutor {
    pub fn new(pool: ConnectionPool, config: ExecutorConfig) -> Self {
        Self::with_backoff(
            pool,
            BackoffPolicy::with_defaults(Arc::new(RandomJitter)),
            config,
        )
    }

    pub fn with_backoff(pool: ConnectionPool, backoff: BackoffPolicy, config: ExecutorConfig) -> Self {
        Self {
            pool,
            backoff: Arc::new(backoff),
            config,
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a statement with retries
    ///
    /// # Errors
    /// Returns the last classified failure, with `retries_attempted` set.
    pub async fn execute(&self, request: &QueryRequest) -> Result<ResultSet, ClassifiedError> {
        self.run(request, None).await
    }

    /// `execute` that stops at the next checkpoint once `cancel` fires
    ///
    /// Checkpoints: before each attempt, while waiting for a connection,
    /// during the statement, and during backoff sleeps.
    pub async fn execute_with_cancel(
        &self,
        request: &QueryRequest,
        cancel: &CancelToken,
    ) -> Result<ResultSet, ClassifiedError> {
        self.run(request, Some(cancel)).await
    }

    async fn run(
        &self,
        request: &QueryRequest,
        cancel: Option<&CancelToken>,
    ) -> Result<ResultSet, ClassifiedError> {
        let max_retries = request.max_retries.unwrap_or(self.config.max_retries);
        let statement_timeout = request.timeout.unwrap_or(self.config.statement_timeout);
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(self.finish(ClassifiedError::cancelled(), attempt));
            }

            let err = match self.attempt(request, statement_timeout, cancel).await {
                Ok(rows) => {
                    if attempt > 0 {
                        info!(retries = attempt, "Query succeeded after retry");
                    }
                    return Ok(rows);
                }
                Err(err) => err,
            };

            let delay = match self.backoff.should_retry(&err, attempt, max_retries) {
                RetryDecision::Stop => return Err(self.finish(err, attempt)),
                RetryDecision::Retry(delay) => delay,
            };

            warn!(
                attempt = attempt + 1,
                max_retries = max_retries,
                delay_ms = delay.as_millis() as u64,
                kind = %err.kind,
                error = %err.message,
                "Transient query failure, retrying after backoff"
            );

            tokio::select! {
                _ = sleep(delay) => {}
                _ = wait_cancelled(cancel) => {
                    debug!("Query cancelled during backoff");
                    return Err(self.finish(ClassifiedError::cancelled(), attempt));
                }
            }
            attempt += 1;
        }
    }

    /// One acquire / execute / release cycle
    async fn attempt(
        &self,
        request: &QueryRequest,
        statement_timeout: Duration,
        cancel: Option<&CancelToken>,
    ) -> Result<ResultSet, ClassifiedError> {
        let mut conn = self.pool.acquire_with(cancel).await?;

        let outcome = tokio::select! {
            res = timeout(statement_timeout, conn.execute(&request.sql, &request.params)) => Some(res),
            _ = wait_cancelled(cancel) => None,
        };

        match outcome {
            Some(Ok(Ok(rows))) => {
                conn.release(true).await;
                Ok(rows)
            }
            Some(Ok(Err(driver_err))) => {
                let healthy = !driver_err.transport_broken && driver_err.kind != ErrorKind::Timeout;
                debug!(
                    connection_id = conn.id(),
                    kind = %driver_err.kind,
                    healthy = healthy,
                    "Statement failed"
                );
                conn.release(healthy).await;
                Err(ClassifiedError::new(driver_err.kind, driver_err.detail()))
            }
            Some(Err(_elapsed)) => {
                warn!(
                    connection_id = conn.id(),
                    timeout_ms = statement_timeout.as_millis() as u64,
                    "Statement exceeded its deadline"
                );
                conn.cancel().await;
                conn.invalidate().await;
                Err(ClassifiedError::new(
                    ErrorKind::Timeout,
                    format!(
                        "statement exceeded timeout of {}ms",
                        statement_timeout.as_millis()
                    ),
                ))
            }
            None => {
                conn.cancel().await;
                conn.invalidate().await;
                Err(ClassifiedError::cancelled())
            }
        }
    }

    /// Stamp the retry count and apply fatal-message redaction
    fn finish(&self, mut err: ClassifiedError, attempt: u32) -> ClassifiedError {
        err.retries_attempted = attempt;
        if err.kind == ErrorKind::Fatal {
            error!(retries = attempt, error = %err.message, "Query failed with fatal error");
            if self.config.redact_fatal {
                err.message = REDACTED_FATAL_MESSAGE.to_string();
            }
        }
        err
    }

    /// Health probe: acquire, ping, release
    ///
    /// Never fails; any problem is logged and reported as `false`.
    pub async fn test_connection(&self) -> bool {
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Health check could not acquire a connection");
                return false;
            }
        };

        match timeout(self.config.statement_timeout, conn.ping()).await {
            Ok(Ok(())) => {
                conn.release(true).await;
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e.detail(), "Health check ping failed");
                conn.invalidate().await;
                false
            }
            Err(_) => {
                warn!("Health check ping timed out");
                conn.cancel().await;
                conn.invalidate().await;
                false
            }
        }
    }

    /// Drain the pool; later calls fail with `PoolClosed`
    pub async fn drain_and_close(&self) -> usize {
        self.pool.drain_and_close().await
    }
}
