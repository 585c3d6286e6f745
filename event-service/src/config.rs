//! Configuration loaded from environment variables with sensible defaults.

use std::env;

/// Event service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// `PostgreSQL` connection URL.
    pub database_url: String,
    /// Maximum connections in the pool.
    pub database_max_connections: u32,
    /// AMQP broker URL; messaging is disabled when unset.
    pub rabbitmq_url: Option<String>,
    /// Exchange all services publish through.
    pub exchange: String,
}

impl Config {
    /// Load configuration from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            database_url: database_url_from_env(),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            rabbitmq_url: env::var("RABBITMQ_URL").ok(),
            exchange: env::var("BROKER_EXCHANGE").unwrap_or_else(|_| "tixie".to_string()),
        }
    }
}

/// `DATABASE_URL` wins; otherwise the URL is composed from the per-part
/// variables the deployment exports.
pub(crate) fn database_url_from_env() -> String {
    env::var("DATABASE_URL").unwrap_or_else(|_| {
        let host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
        let user = env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string());
        let password = env::var("DB_PASSWORD").unwrap_or_else(|_| "postgres".to_string());
        let name = env::var("DB_NAME").unwrap_or_else(|_| "events".to_string());
        let sslmode = env::var("DB_SSLMODE").unwrap_or_else(|_| "disable".to_string());
        format!("postgres://{user}:{password}@{host}:{port}/{name}?sslmode={sslmode}")
    })
}
