use std::sync::Arc;

use todo_api::adapters::http::HttpServer;
use todo_api::core::todo_service::TodoService;
use todo_api::storage::sqlite::SqliteStore;

struct ServerConfig {
    bind_addr: String,
    database_url: String,
    max_connections: u32,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://todos.db?mode=rwc".to_string()),
            max_connections: 100,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let config = ServerConfig::from_env();

    let store = SqliteStore::connect(&config.database_url, config.max_connections).await?;
    let service = TodoService::new(Arc::new(store));

    tracing::info!(addr = %config.bind_addr, db = %config.database_url, "starting todo server");
    let server = HttpServer::new(service, &config.bind_addr).await?;
    server.run().await
}
