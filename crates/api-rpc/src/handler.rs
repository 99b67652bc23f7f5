//! RPC Method Handlers
//!
//! Thin adapters from JSON-RPC params to the query executor.

use crate::error::{app_to_rpc_error, to_rpc_error};
use crate::types::{ExecuteRequest, ExecuteResponse, HealthResponse, PoolStatsResponse};
use dbguard_core::application::QueryExecutor;
use dbguard_core::domain::QueryRequest;
use dbguard_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;
use tracing::debug;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    executor: QueryExecutor,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(executor: QueryExecutor) -> Self {
        Self {
            executor,
            start_time: std::time::Instant::now(),
        }
    }

    /// db.execute.v1
    pub async fn execute(
        &self,
        params: ExecuteRequest,
    ) -> Result<ExecuteResponse, ErrorObjectOwned> {
        if params.sql.trim().is_empty() {
            return Err(app_to_rpc_error(AppError::Validation(
                "sql must not be empty".to_string(),
            )));
        }
        if params.timeout_ms == Some(0) {
            return Err(app_to_rpc_error(AppError::Validation(
                "timeout_ms must be greater than zero".to_string(),
            )));
        }

        let request = QueryRequest::from(params);
        debug!(params = request.params.len(), "db.execute.v1");

        self.executor
            .execute(&request)
            .await
            .map(ExecuteResponse::from)
            .map_err(to_rpc_error)
    }

    /// db.health.v1
    pub async fn health(&self) -> Result<HealthResponse, ErrorObjectOwned> {
        Ok(HealthResponse {
            healthy: self.executor.test_connection().await,
            version: dbguard_core::VERSION.to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs() as i64,
        })
    }

    /// admin.pool_stats.v1
    pub async fn pool_stats(&self) -> Result<PoolStatsResponse, ErrorObjectOwned> {
        let stats = self.executor.pool().stats();
        let saturated = !stats.saturation_reasons().is_empty();
        Ok(PoolStatsResponse { stats, saturated })
    }
}
