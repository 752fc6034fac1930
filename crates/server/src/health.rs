//! Liveness endpoint. Reports whether the SLA schema is reachable and how
//! monitor passes are triggered, so an operator can tell a dead database
//! apart from a service that simply has periodic monitoring switched off.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use inboxly_db::DbPool;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    monitor_mode: MonitorMode,
}

/// How SLA passes run in this deployment. `Periodic` means the background
/// ticker is active; `OnDemand` means passes only happen over the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorMode {
    Periodic,
    OnDemand,
}

impl MonitorMode {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Self::Periodic
        } else {
            Self::OnDemand
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub monitor_mode: MonitorMode,
    pub database: SchemaHealth,
    pub checked_at: String,
}

/// Result of the schema query. `tracked_threads` doubles as a cheap
/// operational signal: how many threads currently hold an SLA state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SchemaHealth {
    pub reachable: bool,
    pub tracked_threads: Option<i64>,
    pub detail: String,
}

pub fn router(db_pool: DbPool, monitor_mode: MonitorMode) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(HealthState { db_pool, monitor_mode })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    db_pool: DbPool,
    monitor_mode: MonitorMode,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        bind_address = %address,
        monitor_mode = ?monitor_mode,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(db_pool, monitor_mode)).await {
            error!(
                event_name = "system.health.error",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let database = schema_health(&state.db_pool).await;

    let payload = HealthReport {
        status: if database.reachable { "ok" } else { "unavailable" },
        monitor_mode: state.monitor_mode,
        checked_at: Utc::now().to_rfc3339(),
        database,
    };

    let status_code =
        if payload.database.reachable { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

/// Counting tracked threads proves both that the database answers and that
/// migrations have run; a bare `SELECT 1` would pass against an empty file.
async fn schema_health(pool: &DbPool) -> SchemaHealth {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sla_status").fetch_one(pool).await {
        Ok(count) => SchemaHealth {
            reachable: true,
            tracked_threads: Some(count),
            detail: "sla schema reachable".to_string(),
        },
        Err(error) => SchemaHealth {
            reachable: false,
            tracked_threads: None,
            detail: format!("sla schema query failed: {error}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use inboxly_core::config::{ConfigOverrides, LoadOptions};
    use inboxly_db::connect_with_settings;

    use crate::bootstrap::bootstrap;
    use crate::health::{health, HealthState, MonitorMode};

    #[tokio::test]
    async fn health_reports_ok_with_thread_count_after_bootstrap() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with in-memory database");

        sqlx::query(
            "INSERT INTO sla_status (thread_id, tenant_id, state, updated_at)
             VALUES ('t-1', 'acme', 'warning', '2024-01-08T09:00:00+00:00')",
        )
        .execute(&app.db_pool)
        .await
        .expect("seed tracked thread");

        let state = HealthState {
            db_pool: app.db_pool.clone(),
            monitor_mode: MonitorMode::from_enabled(app.config.monitor.enabled),
        };
        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ok");
        assert!(payload.database.reachable);
        assert_eq!(payload.database.tracked_threads, Some(1));
        assert_eq!(
            payload.monitor_mode,
            MonitorMode::from_enabled(app.config.monitor.enabled)
        );

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn health_reports_unavailable_before_migrations_run() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5)
            .await
            .expect("pool should connect");

        let state = HealthState { db_pool: pool.clone(), monitor_mode: MonitorMode::OnDemand };
        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "unavailable");
        assert!(!payload.database.reachable);
        assert_eq!(payload.database.tracked_threads, None);

        pool.close().await;
    }

    #[tokio::test]
    async fn health_reports_unavailable_when_the_pool_is_closed() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5)
            .await
            .expect("pool should connect");
        pool.close().await;

        let state = HealthState { db_pool: pool, monitor_mode: MonitorMode::Periodic };
        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!payload.database.reachable);
        assert_eq!(payload.monitor_mode, MonitorMode::Periodic);
    }
}
