use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::{Config, DatabaseConfig};
use crate::error::{Result, TrackingError};
use crate::repository::{RequestLogRepository, RequestLogStore, UserRepository, UserStore};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const MAX_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Postgres pool holding the request log and user tables
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect, verify the connection and bring the schema up to date.
    /// The returned database is ready for the request log stores.
    pub async fn open(config: &Config) -> Result<Self> {
        info!(
            host = %config.database.host,
            port = %config.database.port,
            database = %config.database.name,
            "Connecting to request log database"
        );

        let pool = pool_options(&config.database)
            .connect(&config.database_url())
            .await
            .map_err(|e| TrackingError::DatabaseConnection(e.to_string()))?;
        let db = Database { pool };

        let latency = db.ping().await?;
        info!(?latency, "Request log database reachable");

        super::migrations::run_migrations(&db.pool).await?;

        Ok(db)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Store the tracking middleware writes request logs to
    pub fn request_logs(&self) -> Arc<dyn RequestLogStore> {
        Arc::new(RequestLogRepository::new(self.pool.clone()))
    }

    /// Store that resolves usernames to user rows
    pub fn users(&self) -> Arc<dyn UserStore> {
        Arc::new(UserRepository::new(self.pool.clone()))
    }

    /// Latency of one trivial query
    pub async fn ping(&self) -> Result<Duration> {
        let start = Instant::now();
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(start.elapsed())
    }

    pub async fn close(&self) {
        info!("Closing request log database");
        self.pool.close().await;
    }
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .min_connections(config.min_connections.min(config.max_connections))
        .max_connections(config.max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database_config(min_connections: u32, max_connections: u32) -> DatabaseConfig {
        DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            user: "tracking".to_string(),
            password: "tracking_password".to_string(),
            name: "tracking".to_string(),
            ssl_mode: "disable".to_string(),
            max_connections,
            min_connections,
        }
    }

    #[test]
    fn test_pool_options_follow_config() {
        let options = pool_options(&database_config(2, 8));

        assert_eq!(options.get_min_connections(), 2);
        assert_eq!(options.get_max_connections(), 8);
        assert_eq!(options.get_acquire_timeout(), ACQUIRE_TIMEOUT);
        assert_eq!(options.get_idle_timeout(), Some(IDLE_TIMEOUT));
        assert_eq!(options.get_max_lifetime(), Some(MAX_LIFETIME));
    }

    #[test]
    fn test_pool_min_never_exceeds_max() {
        let options = pool_options(&database_config(20, 5));

        assert_eq!(options.get_min_connections(), 5);
        assert_eq!(options.get_max_connections(), 5);
    }
}
