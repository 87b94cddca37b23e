use std::time::Duration;

use crate::error::AppError;

#[derive(Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    /// Interval between `ping` broadcasts to all connections.
    pub heartbeat_interval_secs: u64,
    /// A connection with no inbound frame for this long is force-closed.
    pub pong_timeout_secs: u64,
    /// Upper bound on rooms a single connection may subscribe to.
    pub max_rooms_per_connection: usize,
    /// Interval of the summary reconciliation job.
    pub reconcile_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_host: std::env::var("SERVER_HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://chat_relay.db".to_string()),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid DB_MAX_CONNECTIONS: {}", e)))?,
            db_min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid DB_MIN_CONNECTIONS: {}", e)))?,
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid REQUEST_TIMEOUT_SECS: {}", e)))?,
            heartbeat_interval_secs: std::env::var("HEARTBEAT_INTERVAL_SECS")
                .unwrap_or_else(|_| "25".to_string())
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid HEARTBEAT_INTERVAL_SECS: {}", e)))?,
            pong_timeout_secs: std::env::var("PONG_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid PONG_TIMEOUT_SECS: {}", e)))?,
            max_rooms_per_connection: std::env::var("MAX_ROOMS_PER_CONNECTION")
                .unwrap_or_else(|_| "64".to_string())
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid MAX_ROOMS_PER_CONNECTION: {}", e)))?,
            reconcile_interval_secs: std::env::var("RECONCILE_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid RECONCILE_INTERVAL_SECS: {}", e)))?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}
