//! Pool construction. Every connection gets foreign-key enforcement, WAL
//! journaling, and a busy timeout derived from the configured acquire
//! timeout, so writer contention surfaces as a slow query instead of an
//! immediate `SQLITE_BUSY`.

use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Executor;

use inboxly_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Cap on the per-statement busy wait; a stuck writer should fail the
/// statement well before the pool acquire timeout gives up.
const MAX_BUSY_TIMEOUT_MS: u64 = 5_000;

pub async fn connect(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&database.url, database.max_connections, database.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let busy_timeout_ms = timeout_secs.max(1).saturating_mul(1_000).min(MAX_BUSY_TIMEOUT_MS);

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                let pragmas = format!(
                    "PRAGMA foreign_keys = ON;
                     PRAGMA journal_mode = WAL;
                     PRAGMA busy_timeout = {busy_timeout_ms};"
                );
                conn.execute(pragmas.as_str()).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use inboxly_core::config::DatabaseConfig;

    use super::{connect, connect_with_settings};
    use crate::migrations;

    #[tokio::test]
    async fn connect_takes_its_settings_from_the_database_config() {
        let database = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 2,
        };
        let pool = connect(&database).await.expect("connect");

        let foreign_keys: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        assert_eq!(foreign_keys, 1);

        let busy_timeout: i64 =
            sqlx::query_scalar("PRAGMA busy_timeout").fetch_one(&pool).await.expect("pragma");
        assert_eq!(busy_timeout, 2_000, "busy timeout should track the configured acquire timeout");

        pool.close().await;
    }

    #[tokio::test]
    async fn busy_timeout_is_capped_for_long_acquire_timeouts() {
        let pool = connect_with_settings("sqlite::memory:", 1, 120).await.expect("connect");

        let busy_timeout: i64 =
            sqlx::query_scalar("PRAGMA busy_timeout").fetch_one(&pool).await.expect("pragma");
        assert_eq!(busy_timeout, 5_000);

        pool.close().await;
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced_on_pooled_connections() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let orphan = sqlx::query(
            "INSERT INTO message (id, thread_id, direction, sent_at)
             VALUES ('m-1', 'no-such-thread', 'inbound', '2024-01-08T09:00:00+00:00')",
        )
        .execute(&pool)
        .await;

        assert!(orphan.is_err(), "a message without a thread must violate the foreign key");

        pool.close().await;
    }
}
