// dbguard Core - Pool, Executor & Ports
// NO driver dependencies (ADR-001: Hexagonal Architecture)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;
pub mod settings;

pub use error::{AppError, Result};
pub use settings::Settings;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
