//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use dbguard_core::domain::{QueryRequest, ResultSet, Value};
use dbguard_core::port::PoolStats;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// db.execute.v1 - Run one statement through the resilient executor
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<Value>,
    /// Per-attempt deadline; executor default when absent
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl From<ExecuteRequest> for QueryRequest {
    fn from(req: ExecuteRequest) -> Self {
        QueryRequest {
            sql: req.sql,
            params: req.params,
            timeout: req.timeout_ms.map(Duration::from_millis),
            max_retries: req.max_retries,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
}

impl From<ResultSet> for ExecuteResponse {
    fn from(rs: ResultSet) -> Self {
        let row_count = rs.row_count();
        Self {
            columns: rs.columns,
            rows: rs.rows,
            row_count,
        }
    }
}

/// db.health.v1 - Connectivity probe (no parameters)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub uptime_seconds: i64,
}

/// admin.pool_stats.v1 - Pool occupancy and lifetime counters (no parameters)
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatsResponse {
    #[serde(flatten)]
    pub stats: PoolStats,
    pub saturated: bool,
}
