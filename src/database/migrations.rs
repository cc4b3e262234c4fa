use crate::error::Result;
use sqlx::{Executor, PgPool};
use tracing::info;

/// Run all database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    create_migrations_table(pool).await?;

    for (version, name, sql) in get_migrations() {
        if !is_migration_applied(pool, version).await? {
            info!(version = version, name = name, "Applying migration");

            // Migrations hold several statements, so they go through the
            // simple query protocol
            pool.execute(sql).await?;

            record_migration(pool, version, name).await?;

            info!(version = version, name = name, "Migration applied successfully");
        }
    }

    Ok(())
}

/// Create the migrations tracking table
async fn create_migrations_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn is_migration_applied(pool: &PgPool, version: i32) -> Result<bool> {
    let result = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM schema_migrations WHERE version = $1",
    )
    .bind(version)
    .fetch_one(pool)
    .await?;

    Ok(result > 0)
}

async fn record_migration(pool: &PgPool, version: i32, name: &str) -> Result<()> {
    sqlx::query("INSERT INTO schema_migrations (version, name) VALUES ($1, $2)")
        .bind(version)
        .bind(name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Get all migrations in order
fn get_migrations() -> Vec<(i32, &'static str, &'static str)> {
    vec![
        (1, "users_table", MIGRATION_001_USERS),
        (2, "api_request_logs_table", MIGRATION_002_API_REQUEST_LOGS),
    ]
}

// Migration 1: users referenced by request logs
const MIGRATION_001_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    username VARCHAR(150) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT unique_username UNIQUE (username)
);
"#;

// Migration 2: request logs
const MIGRATION_002_API_REQUEST_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS api_request_logs (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT REFERENCES users(id) ON DELETE SET NULL,
    request_id VARCHAR(100),
    requested_at TIMESTAMPTZ NOT NULL,
    response_ms INTEGER NOT NULL DEFAULT 0 CHECK (response_ms >= 0),
    path VARCHAR(200) NOT NULL,
    view VARCHAR(200) NOT NULL,
    view_method VARCHAR(200) NOT NULL,
    remote_addr VARCHAR(45) NOT NULL,
    host VARCHAR(200) NOT NULL,
    method VARCHAR(10) NOT NULL,
    query_params TEXT,
    data TEXT,
    response TEXT,
    kind_of_cache_using SMALLINT CHECK (kind_of_cache_using IN (100, 50, 0)),
    errors TEXT,
    status_code INTEGER CHECK (status_code >= 0)
);

CREATE INDEX IF NOT EXISTS idx_api_request_logs_request_id ON api_request_logs(request_id);
CREATE INDEX IF NOT EXISTS idx_api_request_logs_requested_at ON api_request_logs(requested_at DESC);
CREATE INDEX IF NOT EXISTS idx_api_request_logs_path ON api_request_logs(path);
CREATE INDEX IF NOT EXISTS idx_api_request_logs_view ON api_request_logs(view);
CREATE INDEX IF NOT EXISTS idx_api_request_logs_view_method ON api_request_logs(view_method);
CREATE INDEX IF NOT EXISTS idx_api_request_logs_user_id ON api_request_logs(user_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered_and_unique() {
        let migrations = get_migrations();
        let versions: Vec<i32> = migrations.iter().map(|(v, _, _)| *v).collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn test_request_log_schema_constraints() {
        assert!(MIGRATION_002_API_REQUEST_LOGS.contains("REFERENCES users(id) ON DELETE SET NULL"));
        assert!(MIGRATION_002_API_REQUEST_LOGS.contains("CHECK (response_ms >= 0)"));
        assert!(MIGRATION_002_API_REQUEST_LOGS.contains("CHECK (kind_of_cache_using IN (100, 50, 0))"));
    }
}
