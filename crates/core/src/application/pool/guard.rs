// Checked-out connection handle

use super::ConnectionPool;
use crate::domain::{ConnectionId, ConnectionState, ErrorKind, ResultSet, Value};
use crate::port::{DbConnection, DriverError};
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Exclusive borrow of a pooled connection
///
/// Must be handed back with `release`. Dropping it instead destroys the
/// session (it may be mid-statement) and frees the slot.
pub struct PooledConnection {
    pool: ConnectionPool,
    conn: Option<Box<dyn DbConnection>>,
    id: ConnectionId,
    state: ConnectionState,
    checked_out_at: Instant,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PooledConnection {
    pub(super) fn new(
        pool: ConnectionPool,
        conn: Box<dyn DbConnection>,
        id: ConnectionId,
        from: ConnectionState,
    ) -> Self {
        let state = from.transition(ConnectionState::Active).unwrap_or_else(|e| {
            error!(connection_id = id, error = %e, "Unexpected connection state on checkout");
            ConnectionState::Active
        });
        Self {
            pool,
            conn: Some(conn),
            id,
            state,
            checked_out_at: Instant::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn session(&mut self) -> Result<&mut Box<dyn DbConnection>, DriverError> {
        self.conn.as_mut().ok_or_else(|| {
            DriverError::new(ErrorKind::TransientConnection, "connection already released")
                .broken()
        })
    }

    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
        self.session()?.execute(sql, params).await
    }

    pub async fn ping(&mut self) -> Result<(), DriverError> {
        self.session()?.ping().await
    }

    /// Ask the driver to interrupt the running statement
    pub async fn cancel(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.cancel().await;
        }
    }

    /// Hand the connection back to the pool
    ///
    /// `healthy = false` closes the session instead of parking it.
    pub async fn release(mut self, healthy: bool) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        debug!(
            connection_id = self.id,
            healthy = healthy,
            held_ms = self.checked_out_at.elapsed().as_millis() as u64,
            "Releasing connection"
        );
        self.pool.give_back(conn, self.id, self.state, healthy).await;
    }

    /// Release as unhealthy
    pub async fn invalidate(self) {
        self.release(false).await;
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        warn!(
            connection_id = self.id,
            "Connection dropped without release; destroying it"
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = self.pool.clone();
                let id = self.id;
                handle.spawn(async move {
                    pool.destroy(conn, id).await;
                });
            }
            Err(_) => {
                drop(conn);
                self.pool.forget_dropped();
            }
        }
    }
}
