//! Configuration loaded from environment variables with sensible defaults.

use std::env;

/// Reservation service configuration.
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
    /// Base URL of the event service.
    pub event_service_url: String,
    /// Base URL of the user service.
    pub user_service_url: String,
    /// Base URL of the ticket service.
    pub ticket_service_url: String,
    /// External QR decoder endpoint.
    pub qr_decoder_url: String,
    /// Timeout for intra-cluster HTTP calls, seconds.
    pub http_timeout_secs: u64,
    /// Sweeper cadence, seconds.
    pub sweep_interval_secs: u64,
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
                .unwrap_or(8082),
            database_url: database_url_from_env(),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            rabbitmq_url: env::var("RABBITMQ_URL").ok(),
            exchange: env::var("BROKER_EXCHANGE").unwrap_or_else(|_| "tixie".to_string()),
            event_service_url: env::var("EVENT_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            user_service_url: env::var("USER_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            ticket_service_url: env::var("TICKET_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8083".to_string()),
            qr_decoder_url: env::var("QR_DECODER_URL")
                .unwrap_or_else(|_| "https://api.qrserver.com/v1/read-qr-code/".to_string()),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
        }
    }
}

fn database_url_from_env() -> String {
    env::var("DATABASE_URL").unwrap_or_else(|_| {
        let host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
        let user = env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string());
        let password = env::var("DB_PASSWORD").unwrap_or_else(|_| "postgres".to_string());
        let name = env::var("DB_NAME").unwrap_or_else(|_| "reservations".to_string());
        let sslmode = env::var("DB_SSLMODE").unwrap_or_else(|_| "disable".to_string());
        format!("postgres://{user}:{password}@{host}:{port}/{name}?sslmode={sslmode}")
    })
}
