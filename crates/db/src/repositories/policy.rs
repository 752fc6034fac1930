use sqlx::{sqlite::SqliteRow, Row};

use inboxly_core::domain::policy::{PolicyId, SlaPolicy};
use inboxly_core::domain::tenant::TenantId;
use inboxly_core::hours::BusinessHours;

use super::{PolicyRepository, RepositoryError};
use crate::repositories::thread::parse_timestamp;
use crate::DbPool;

pub struct SqlPolicyRepository {
    pool: DbPool,
}

impl SqlPolicyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const POLICY_COLUMNS: &str =
    "id, tenant_id, name, first_response_minutes, business_hours_json, created_at";

#[async_trait::async_trait]
impl PolicyRepository for SqlPolicyRepository {
    async fn insert(&self, policy: SlaPolicy) -> Result<(), RepositoryError> {
        let business_hours_json = policy
            .business_hours
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| {
                RepositoryError::Decode(format!("business hours encode failed: {error}"))
            })?;

        sqlx::query(
            "INSERT INTO sla_policy (
                id,
                tenant_id,
                name,
                first_response_minutes,
                business_hours_json,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&policy.id.0)
        .bind(&policy.tenant_id.0)
        .bind(&policy.name)
        .bind(policy.first_response_minutes)
        .bind(business_hours_json.as_deref())
        .bind(policy.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &PolicyId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM sla_policy WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: &PolicyId) -> Result<Option<SlaPolicy>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {POLICY_COLUMNS} FROM sla_policy WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(policy_from_row).transpose()
    }

    async fn active_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<SlaPolicy>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {POLICY_COLUMNS}
             FROM sla_policy
             WHERE tenant_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(&tenant_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(policy_from_row).transpose()
    }
}

fn policy_from_row(row: SqliteRow) -> Result<SlaPolicy, RepositoryError> {
    let business_hours = row
        .get::<Option<String>, _>("business_hours_json")
        .map(|raw| {
            serde_json::from_str::<BusinessHours>(&raw).map_err(|error| {
                RepositoryError::Decode(format!("business hours decode failed: {error}"))
            })
        })
        .transpose()?;

    Ok(SlaPolicy {
        id: PolicyId(row.get("id")),
        tenant_id: TenantId(row.get("tenant_id")),
        name: row.get("name"),
        first_response_minutes: row.get("first_response_minutes"),
        business_hours,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}
