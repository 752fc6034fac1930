use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

use inboxly_core::config::{AppConfig, ConfigError, LoadOptions};
use inboxly_db::repositories::{
    SqlMembershipRepository, SqlPolicyRepository, SqlSlaStatusStore, SqlThreadRepository,
};
use inboxly_db::{connect, migrations, DbPool};
use inboxly_monitor::escalation::{EscalationSink, SinkError};
use inboxly_monitor::{MonitorSettings, SlaMonitor};
use inboxly_notify::{LogEscalationSink, WebhookEscalationSink};

use crate::api::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub monitor: Arc<SlaMonitor>,
    pub api_state: ApiState,
    pub settings_generation: watch::Receiver<u64>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("escalation sink setup failed: {0}")]
    Escalation(#[source] SinkError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let threads = Arc::new(SqlThreadRepository::new(db_pool.clone()));
    let policies = Arc::new(SqlPolicyRepository::new(db_pool.clone()));
    let memberships = Arc::new(SqlMembershipRepository::new(db_pool.clone()));
    let statuses = Arc::new(SqlSlaStatusStore::new(db_pool.clone()));

    let sink: Arc<dyn EscalationSink> = match &config.escalation.webhook_url {
        Some(url) => {
            info!(
                event_name = "system.bootstrap.escalation_sink",
                sink = "webhook",
                "escalations will be delivered over webhook"
            );
            Arc::new(
                WebhookEscalationSink::new(
                    url.clone(),
                    config.escalation.auth_token.clone(),
                    Duration::from_secs(config.escalation.timeout_secs),
                )
                .map_err(BootstrapError::Escalation)?,
            )
        }
        None => {
            info!(
                event_name = "system.bootstrap.escalation_sink",
                sink = "log",
                "no webhook configured, escalations land in the service log"
            );
            Arc::new(LogEscalationSink::new())
        }
    };

    let monitor = Arc::new(SlaMonitor::new(
        threads,
        policies.clone(),
        statuses,
        sink,
        MonitorSettings {
            thread_timeout: Duration::from_millis(config.monitor.thread_timeout_ms),
        },
    ));

    let (settings_tx, settings_rx) = watch::channel(0);
    let api_state = ApiState {
        policies,
        memberships,
        monitor: monitor.clone(),
        settings_generation: settings_tx,
    };

    Ok(Application {
        config,
        db_pool,
        monitor,
        api_state,
        settings_generation: settings_rx,
    })
}

#[cfg(test)]
mod tests {
    use inboxly_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    fn memory_overrides() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_escalation_config() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                escalation_webhook_url: Some("ftp://not-a-webhook".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("escalation.webhook_url"));
    }

    #[tokio::test]
    async fn bootstrap_smoke_covers_config_pool_and_migrations() {
        let app = bootstrap(memory_overrides())
            .await
            .expect("bootstrap should succeed with in-memory database");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN \
             ('tenant', 'tenant_member', 'sla_policy', 'thread', 'message', 'sla_status')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables should be available after bootstrap");
        assert_eq!(table_count, 6, "bootstrap should expose the baseline schema");

        let summary = app.monitor.monitor_all().await.expect("empty pass succeeds");
        assert_eq!(summary.evaluated, 0);

        app.db_pool.close().await;
    }
}
