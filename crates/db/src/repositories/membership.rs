use sqlx::Row;

use inboxly_core::domain::tenant::{TenantId, TenantRole, UserId};

use super::{MembershipRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMembershipRepository {
    pool: DbPool,
}

impl SqlMembershipRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MembershipRepository for SqlMembershipRepository {
    async fn role(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> Result<Option<TenantRole>, RepositoryError> {
        let row = sqlx::query(
            "SELECT role FROM tenant_member WHERE tenant_id = ? AND user_id = ?",
        )
        .bind(&tenant_id.0)
        .bind(&user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let raw: String = row.get("role");
            TenantRole::parse(&raw)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown tenant role `{raw}`")))
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use inboxly_core::domain::tenant::{TenantId, TenantRole, UserId};

    use crate::fixtures::seed_tenant;
    use crate::repositories::{MembershipRepository, SqlMembershipRepository};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn role_resolves_seeded_members() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let seed = seed_tenant(&pool, "acme", 60).await.expect("seed");
        seed.member(&pool, "alice", TenantRole::Admin).await.expect("seed member");
        seed.member(&pool, "bob", TenantRole::Agent).await.expect("seed member");

        let repo = SqlMembershipRepository::new(pool.clone());
        let tenant = TenantId("acme".to_string());

        assert_eq!(
            repo.role(&tenant, &UserId("alice".to_string())).await.expect("query"),
            Some(TenantRole::Admin)
        );
        assert_eq!(
            repo.role(&tenant, &UserId("bob".to_string())).await.expect("query"),
            Some(TenantRole::Agent)
        );
        assert_eq!(
            repo.role(&tenant, &UserId("mallory".to_string())).await.expect("query"),
            None
        );

        pool.close().await;
    }
}
