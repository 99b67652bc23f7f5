// Application Layer - Pool and Executor

pub mod cancel;
pub mod constants;
pub mod executor;
pub mod pool;
pub mod retry;

// Re-exports
pub use cancel::{cancel_channel, CancelHandle, CancelToken};
pub use executor::{ExecutorConfig, QueryExecutor};
pub use pool::{ConnectionPool, PoolConfig, PoolReaper, PooledConnection};
pub use retry::{BackoffPolicy, RetryDecision};
