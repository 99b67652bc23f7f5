// Connector Port (Interface)
// Abstraction over a database driver that can open sessions

use crate::domain::{ErrorKind, ResultSet, Value};
use async_trait::async_trait;
use thiserror::Error;

/// Driver failure, already classified by the adapter's ErrorClassifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DriverError {
    pub kind: ErrorKind,
    /// Transport is unusable; the connection must be destroyed, not reused
    pub transport_broken: bool,
    /// Driver-native code, kept for operator diagnostics only
    pub code: Option<String>,
    pub message: String,
}

impl DriverError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            transport_broken: false,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Mark the underlying transport as broken
    pub fn broken(mut self) -> Self {
        self.transport_broken = true;
        self
    }

    /// Message including the native code, e.g. `[2067] UNIQUE constraint failed`
    pub fn detail(&self) -> String {
        match &self.code {
            Some(code) => format!("[{}] {}", code, self.message),
            None => self.message.clone(),
        }
    }
}

/// A live database session
///
/// Exclusively owned by one in-flight attempt at a time (hence `&mut self`).
#[async_trait]
pub trait DbConnection: Send {
    /// Run one statement with positional parameters
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError>;

    /// Cheap liveness probe
    async fn ping(&mut self) -> Result<(), DriverError>;

    /// Interrupt a statement abandoned after its deadline
    ///
    /// Drivers without server-side cancellation keep the default no-op; the
    /// executor destroys the connection afterwards either way.
    async fn cancel(&mut self) {}

    /// Close the session
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// Factory for new sessions against the single configured endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DbConnection>, DriverError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock statement behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Succeed immediately
        Rows(ResultSet),
        /// Fail with the given driver error
        Fail(DriverError),
        /// Succeed after a delay
        Delay(Duration, ResultSet),
        /// Never complete (for timeout testing)
        Hang,
    }

    #[derive(Default)]
    struct MockState {
        script: Mutex<VecDeque<MockBehavior>>,
        fallback: Mutex<Option<MockBehavior>>,
        connect_failures: Mutex<VecDeque<DriverError>>,
        connect_delay: Mutex<Option<Duration>>,
        fail_pings: AtomicBool,
        hang_on_close: AtomicBool,
        live: AtomicUsize,
        peak: AtomicUsize,
        connects: AtomicUsize,
        executions: AtomicUsize,
        closes: AtomicUsize,
        cancels: AtomicUsize,
    }

    /// Mock Connector for testing
    ///
    /// Statements consume the scripted behaviors in order (shared across all
    /// connections); once the script is empty the fallback behavior applies.
    #[derive(Clone, Default)]
    pub struct MockConnector {
        state: Arc<MockState>,
    }

    impl MockConnector {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_script(script: Vec<MockBehavior>) -> Self {
            let connector = Self::new();
            *connector.state.script.lock().unwrap() = script.into();
            connector
        }

        pub fn set_fallback(&self, behavior: MockBehavior) {
            *self.state.fallback.lock().unwrap() = Some(behavior);
        }

        pub fn push(&self, behavior: MockBehavior) {
            self.state.script.lock().unwrap().push_back(behavior);
        }

        pub fn fail_next_connect(&self, err: DriverError) {
            self.state.connect_failures.lock().unwrap().push_back(err);
        }

        /// Every later connect sleeps this long before opening
        pub fn set_connect_delay(&self, delay: Duration) {
            *self.state.connect_delay.lock().unwrap() = Some(delay);
        }

        /// Make `close()` never complete
        pub fn set_hang_on_close(&self, hang: bool) {
            self.state.hang_on_close.store(hang, Ordering::SeqCst);
        }

        pub fn set_fail_pings(&self, fail: bool) {
            self.state.fail_pings.store(fail, Ordering::SeqCst);
        }

        /// Sessions currently open
        pub fn live_connections(&self) -> usize {
            self.state.live.load(Ordering::SeqCst)
        }

        /// Highest number of simultaneously open sessions
        pub fn peak_connections(&self) -> usize {
            self.state.peak.load(Ordering::SeqCst)
        }

        pub fn connect_count(&self) -> usize {
            self.state.connects.load(Ordering::SeqCst)
        }

        pub fn execute_count(&self) -> usize {
            self.state.executions.load(Ordering::SeqCst)
        }

        pub fn close_count(&self) -> usize {
            self.state.closes.load(Ordering::SeqCst)
        }

        pub fn cancel_count(&self) -> usize {
            self.state.cancels.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self) -> Result<Box<dyn DbConnection>, DriverError> {
            let delay = *self.state.connect_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = self.state.connect_failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            self.state.connects.fetch_add(1, Ordering::SeqCst);
            let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.state.peak.fetch_max(live, Ordering::SeqCst);
            Ok(Box::new(MockConnection {
                state: Arc::clone(&self.state),
            }))
        }
    }

    struct MockConnection {
        state: Arc<MockState>,
    }

    #[async_trait]
    impl DbConnection for MockConnection {
        async fn execute(
            &mut self,
            _sql: &str,
            _params: &[Value],
        ) -> Result<ResultSet, DriverError> {
            self.state.executions.fetch_add(1, Ordering::SeqCst);

            let behavior = self
                .state
                .script
                .lock()
                .unwrap()
                .pop_front()
                .or_else(|| self.state.fallback.lock().unwrap().clone())
                .unwrap_or(MockBehavior::Rows(ResultSet::empty()));

            match behavior {
                MockBehavior::Rows(rows) => Ok(rows),
                MockBehavior::Fail(err) => Err(err),
                MockBehavior::Delay(delay, rows) => {
                    tokio::time::sleep(delay).await;
                    Ok(rows)
                }
                MockBehavior::Hang => {
                    std::future::pending::<()>().await;
                    Ok(ResultSet::empty())
                }
            }
        }

        async fn ping(&mut self) -> Result<(), DriverError> {
            if self.state.fail_pings.load(Ordering::SeqCst) {
                return Err(
                    DriverError::new(ErrorKind::TransientConnection, "mock ping failed").broken(),
                );
            }
            Ok(())
        }

        async fn cancel(&mut self) {
            self.state.cancels.fetch_add(1, Ordering::SeqCst);
        }

        async fn close(self: Box<Self>) -> Result<(), DriverError> {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
            if self.state.hang_on_close.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    impl Drop for MockConnection {
        fn drop(&mut self) {
            self.state.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// ECONNRESET-style failure
    pub fn connection_reset() -> DriverError {
        DriverError::new(ErrorKind::TransientConnection, "connection reset by peer")
            .with_code("ECONNRESET")
            .broken()
    }

    /// Unique-constraint violation
    pub fn unique_violation() -> DriverError {
        DriverError::new(ErrorKind::Fatal, "UNIQUE constraint failed: users.email")
            .with_code("2067")
    }

    /// Server-side resource exhaustion (connection stays usable)
    pub fn too_many_connections() -> DriverError {
        DriverError::new(ErrorKind::TransientResource, "too many connections").with_code("53300")
    }
}
