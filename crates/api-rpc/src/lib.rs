//! JSON-RPC API Layer
//!
//! Exposes the resilient query executor as JSON-RPC 2.0 methods:
//! `db.execute.v1`, `db.health.v1`, `admin.pool_stats.v1`.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
