// dbguard Infrastructure - SQLite Adapter
// Implements: Connector, DbConnection, ErrorClassifier<sqlx::Error>

mod classifier;
mod connection;
mod row;

pub use classifier::SqlxErrorClassifier;
pub use connection::{SqliteConnector, SqliteDbConnection};

// Note: sqlx::Error never crosses into core; every driver failure is
// classified into a DriverError here (orphan rules keep From impls out of core)
