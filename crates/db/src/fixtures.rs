//! Seed helpers shared by repository tests.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use inboxly_core::domain::tenant::TenantRole;
use inboxly_core::domain::thread::MessageDirection;

use crate::DbPool;

/// Handle to a seeded tenant; spawn threads and members from it.
pub struct TenantSeed {
    pub tenant_id: String,
    pub policy_id: String,
}

/// Insert a tenant plus a default policy with the given first-response
/// deadline. The policy is backdated a day so later inserts win the
/// most-recently-created race.
pub async fn seed_tenant(
    pool: &DbPool,
    tenant_id: &str,
    first_response_minutes: i64,
) -> Result<TenantSeed, sqlx::Error> {
    let now = Utc::now();

    sqlx::query("INSERT INTO tenant (id, name, created_at) VALUES (?, ?, ?)")
        .bind(tenant_id)
        .bind(tenant_id)
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;

    let policy_id = format!("{tenant_id}-default");
    sqlx::query(
        "INSERT INTO sla_policy (
            id, tenant_id, name, first_response_minutes, business_hours_json, created_at
         ) VALUES (?, ?, ?, ?, NULL, ?)",
    )
    .bind(&policy_id)
    .bind(tenant_id)
    .bind("Default")
    .bind(first_response_minutes)
    .bind((now - Duration::days(1)).to_rfc3339())
    .execute(pool)
    .await?;

    Ok(TenantSeed { tenant_id: tenant_id.to_string(), policy_id })
}

impl TenantSeed {
    pub async fn member(
        &self,
        pool: &DbPool,
        user_id: &str,
        role: TenantRole,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO tenant_member (tenant_id, user_id, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&self.tenant_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn thread(&self, pool: &DbPool, seed: ThreadSeed) -> Result<(), sqlx::Error> {
        let created_at = seed.created_at;

        sqlx::query("INSERT INTO thread (id, tenant_id, status, created_at) VALUES (?, ?, ?, ?)")
            .bind(&seed.id)
            .bind(&self.tenant_id)
            .bind(seed.status)
            .bind(created_at.to_rfc3339())
            .execute(pool)
            .await?;

        for (direction, minutes) in &seed.messages {
            sqlx::query(
                "INSERT INTO message (id, thread_id, direction, sent_at) VALUES (?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&seed.id)
            .bind(direction.as_str())
            .bind((created_at + Duration::minutes(*minutes)).to_rfc3339())
            .execute(pool)
            .await?;
        }

        Ok(())
    }
}

/// Builder for a thread with messages placed at minute offsets from the
/// thread's creation time.
pub struct ThreadSeed {
    id: String,
    status: &'static str,
    created_at: DateTime<Utc>,
    messages: Vec<(MessageDirection, i64)>,
}

impl ThreadSeed {
    pub fn open(id: &str) -> Self {
        Self::with_status(id, "open")
    }

    pub fn closed(id: &str) -> Self {
        Self::with_status(id, "closed")
    }

    fn with_status(id: &str, status: &'static str) -> Self {
        Self {
            id: id.to_string(),
            status,
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn inbound(mut self, minutes_after_creation: i64) -> Self {
        self.messages.push((MessageDirection::Inbound, minutes_after_creation));
        self
    }

    pub fn outbound(mut self, minutes_after_creation: i64) -> Self {
        self.messages.push((MessageDirection::Outbound, minutes_after_creation));
        self
    }
}
