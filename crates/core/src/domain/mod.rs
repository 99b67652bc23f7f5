// Domain Layer - Pure data types and invariants

pub mod classification;
pub mod connection;
pub mod error;
pub mod query;

// Re-exports
pub use classification::{ClassifiedError, ErrorKind};
pub use connection::{ConnectionId, ConnectionState};
pub use error::DomainError;
pub use query::{QueryRequest, ResultSet, Value};
