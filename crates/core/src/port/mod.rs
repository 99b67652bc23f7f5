// Port Layer - Interfaces for external dependencies

pub mod connector;
pub mod error_classifier;
pub mod jitter; // For deterministic testing
pub mod pool_observer;

// Re-exports
pub use connector::{Connector, DbConnection, DriverError};
pub use error_classifier::ErrorClassifier;
pub use jitter::{JitterSource, RandomJitter};
pub use pool_observer::{
    PoolObserver, PoolStats, SaturationReason, SaturationSignal, TracingPoolObserver,
};
