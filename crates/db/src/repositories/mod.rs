use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use inboxly_core::domain::policy::{PolicyId, SlaPolicy};
use inboxly_core::domain::tenant::{TenantId, TenantRole, UserId};
use inboxly_core::domain::thread::{Thread, ThreadId};
use inboxly_core::sla::SlaState;

pub mod membership;
pub mod memory;
pub mod policy;
pub mod status;
pub mod thread;

pub use membership::SqlMembershipRepository;
pub use memory::{
    InMemoryMembershipRepository, InMemoryPolicyRepository, InMemorySlaStatusStore,
    InMemoryThreadRepository,
};
pub use policy::SqlPolicyRepository;
pub use status::SqlSlaStatusStore;
pub use thread::SqlThreadRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Read access to conversation threads and their ordered message histories.
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    /// Open threads, messages ordered by send time ascending. `None` scope
    /// means every tenant.
    async fn list_open(&self, tenant_id: Option<&TenantId>)
        -> Result<Vec<Thread>, RepositoryError>;

    async fn find_by_id(&self, id: &ThreadId) -> Result<Option<Thread>, RepositoryError>;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn insert(&self, policy: SlaPolicy) -> Result<(), RepositoryError>;

    /// Returns `false` when no policy with that id exists.
    async fn delete(&self, id: &PolicyId) -> Result<bool, RepositoryError>;

    async fn find_by_id(&self, id: &PolicyId) -> Result<Option<SlaPolicy>, RepositoryError>;

    /// The tenant's active policy: the most recently created one.
    async fn active_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<SlaPolicy>, RepositoryError>;
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn role(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> Result<Option<TenantRole>, RepositoryError>;
}

/// The last-emitted SLA state per thread, the monitor's only derived state.
///
/// `transition` is an atomic compare-and-set: concurrent callers recording the
/// same state for the same thread observe exactly one `true`. That single
/// guarantee is what makes overlapping monitor runs escalate at most once per
/// transition.
#[async_trait]
pub trait SlaStatusStore: Send + Sync {
    /// Record `state` for the thread. Returns `true` only when the recorded
    /// state actually changed (first sighting included).
    async fn transition(
        &self,
        tenant_id: &TenantId,
        thread_id: &ThreadId,
        state: SlaState,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn last_state(&self, thread_id: &ThreadId) -> Result<Option<SlaState>, RepositoryError>;

    /// Tenants that currently have at least one tracked thread. Drives the
    /// prune pass so a tenant whose last thread closed still gets cleaned.
    async fn tracked_tenants(&self) -> Result<Vec<TenantId>, RepositoryError>;

    /// Drop tracking entries for the tenant's threads that are no longer in
    /// `open_threads` (closed, resolved, or deleted). Returns removed count.
    async fn prune(
        &self,
        tenant_id: &TenantId,
        open_threads: &[ThreadId],
    ) -> Result<u64, RepositoryError>;
}
