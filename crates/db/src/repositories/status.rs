use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row};

use inboxly_core::domain::tenant::TenantId;
use inboxly_core::domain::thread::ThreadId;
use inboxly_core::sla::SlaState;

use super::{RepositoryError, SlaStatusStore};
use crate::DbPool;

pub struct SqlSlaStatusStore {
    pool: DbPool,
}

impl SqlSlaStatusStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SlaStatusStore for SqlSlaStatusStore {
    async fn transition(
        &self,
        tenant_id: &TenantId,
        thread_id: &ThreadId,
        state: SlaState,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        // Single-statement compare-and-set. The WHERE clause on the upsert
        // makes a same-state write a no-op, so rows_affected > 0 holds for
        // exactly one of any set of concurrent identical writers.
        let result = sqlx::query(
            "INSERT INTO sla_status (thread_id, tenant_id, state, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(thread_id) DO UPDATE SET
                 state = excluded.state,
                 updated_at = excluded.updated_at
             WHERE sla_status.state != excluded.state",
        )
        .bind(&thread_id.0)
        .bind(&tenant_id.0)
        .bind(state.as_str())
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn last_state(&self, thread_id: &ThreadId) -> Result<Option<SlaState>, RepositoryError> {
        let row = sqlx::query("SELECT state FROM sla_status WHERE thread_id = ?")
            .bind(&thread_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let raw: String = row.get("state");
            SlaState::parse(&raw)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown sla state `{raw}`")))
        })
        .transpose()
    }

    async fn tracked_tenants(&self) -> Result<Vec<TenantId>, RepositoryError> {
        let rows =
            sqlx::query("SELECT DISTINCT tenant_id FROM sla_status ORDER BY tenant_id ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|row| TenantId(row.get("tenant_id"))).collect())
    }

    async fn prune(
        &self,
        tenant_id: &TenantId,
        open_threads: &[ThreadId],
    ) -> Result<u64, RepositoryError> {
        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("DELETE FROM sla_status WHERE tenant_id = ");
        builder.push_bind(&tenant_id.0);

        if !open_threads.is_empty() {
            builder.push(" AND thread_id NOT IN (");
            let mut separated = builder.separated(", ");
            for thread_id in open_threads {
                separated.push_bind(&thread_id.0);
            }
            separated.push_unseparated(")");
        }

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
