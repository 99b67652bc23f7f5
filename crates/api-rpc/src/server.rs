//! JSON-RPC Server
//!
//! Serves the executor over JSON-RPC 2.0 on TCP.

use crate::handler::RpcHandler;
use crate::types::ExecuteRequest;
use dbguard_core::application::QueryExecutor;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9530;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, executor: QueryExecutor) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(executor)),
        }
    }

    /// Register every method on a fresh module
    pub fn module(&self) -> Result<RpcModule<()>, String> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("db.execute.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ExecuteRequest = params.parse()?;
                    handler.execute(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("db.health.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.health().await }
            })
            .map_err(|e| e.to_string())?;

        // Admin APIs
        let handler = self.handler.clone();
        module
            .register_async_method("admin.pool_stats.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.pool_stats().await }
            })
            .map_err(|e| e.to_string())?;

        Ok(module)
    }

    /// Start the JSON-RPC server
    ///
    /// Binds to the configured host; the default is localhost only.
    pub async fn start(self) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let module = self.module()?;

        info!("JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbguard_core::application::{ConnectionPool, ExecutorConfig, PoolConfig};
    use dbguard_core::port::connector::mocks::MockConnector;

    fn server() -> RpcServer {
        let pool = ConnectionPool::new(Arc::new(MockConnector::new()), PoolConfig::default());
        RpcServer::new(
            RpcServerConfig::default(),
            QueryExecutor::new(pool, ExecutorConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_module_registers_versioned_methods() {
        let module = server().module().unwrap();
        let names: Vec<&str> = module.method_names().collect();
        for method in ["db.execute.v1", "db.health.v1", "admin.pool_stats.v1"] {
            assert!(names.contains(&method), "missing {}", method);
        }
    }

    #[tokio::test]
    async fn test_health_through_module() {
        let module = server().module().unwrap();
        let health: serde_json::Value = module
            .call("db.health.v1", Vec::<u8>::new())
            .await
            .unwrap();
        assert_eq!(health["healthy"], true);

        let stats: serde_json::Value = module
            .call("admin.pool_stats.v1", Vec::<u8>::new())
            .await
            .unwrap();
        assert_eq!(stats["total"], 1);
        assert_eq!(stats["max_size"], 20);
    }
}
