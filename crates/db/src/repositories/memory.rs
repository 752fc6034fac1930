//! In-memory repository implementations for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use inboxly_core::domain::policy::{PolicyId, SlaPolicy};
use inboxly_core::domain::tenant::{TenantId, TenantRole, UserId};
use inboxly_core::domain::thread::{Thread, ThreadId};
use inboxly_core::sla::SlaState;

use super::{
    MembershipRepository, PolicyRepository, RepositoryError, SlaStatusStore, ThreadRepository,
};

#[derive(Default)]
pub struct InMemoryThreadRepository {
    threads: RwLock<HashMap<String, Thread>>,
}

impl InMemoryThreadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, thread: Thread) {
        self.threads.write().await.insert(thread.id.0.clone(), thread);
    }

    pub async fn remove(&self, id: &ThreadId) {
        self.threads.write().await.remove(&id.0);
    }
}

#[async_trait]
impl ThreadRepository for InMemoryThreadRepository {
    async fn list_open(
        &self,
        tenant_id: Option<&TenantId>,
    ) -> Result<Vec<Thread>, RepositoryError> {
        let threads = self.threads.read().await;
        let mut open: Vec<Thread> = threads
            .values()
            .filter(|thread| thread.status.is_open())
            .filter(|thread| tenant_id.map_or(true, |scope| &thread.tenant_id == scope))
            .cloned()
            .collect();
        open.sort_by(|a, b| (&a.tenant_id.0, a.created_at).cmp(&(&b.tenant_id.0, b.created_at)));
        Ok(open)
    }

    async fn find_by_id(&self, id: &ThreadId) -> Result<Option<Thread>, RepositoryError> {
        Ok(self.threads.read().await.get(&id.0).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryPolicyRepository {
    policies: RwLock<HashMap<String, SlaPolicy>>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn insert(&self, policy: SlaPolicy) -> Result<(), RepositoryError> {
        self.policies.write().await.insert(policy.id.0.clone(), policy);
        Ok(())
    }

    async fn delete(&self, id: &PolicyId) -> Result<bool, RepositoryError> {
        Ok(self.policies.write().await.remove(&id.0).is_some())
    }

    async fn find_by_id(&self, id: &PolicyId) -> Result<Option<SlaPolicy>, RepositoryError> {
        Ok(self.policies.read().await.get(&id.0).cloned())
    }

    async fn active_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<SlaPolicy>, RepositoryError> {
        let policies = self.policies.read().await;
        Ok(policies
            .values()
            .filter(|policy| &policy.tenant_id == tenant_id)
            .max_by(|a, b| (a.created_at, &a.id.0).cmp(&(b.created_at, &b.id.0)))
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryMembershipRepository {
    roles: RwLock<HashMap<(String, String), TenantRole>>,
}

impl InMemoryMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant(&self, tenant_id: &TenantId, user_id: &UserId, role: TenantRole) {
        self.roles.write().await.insert((tenant_id.0.clone(), user_id.0.clone()), role);
    }
}

#[async_trait]
impl MembershipRepository for InMemoryMembershipRepository {
    async fn role(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> Result<Option<TenantRole>, RepositoryError> {
        let roles = self.roles.read().await;
        Ok(roles.get(&(tenant_id.0.clone(), user_id.0.clone())).copied())
    }
}

#[derive(Default)]
pub struct InMemorySlaStatusStore {
    entries: RwLock<HashMap<String, (String, SlaState, DateTime<Utc>)>>,
}

impl InMemorySlaStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlaStatusStore for InMemorySlaStatusStore {
    async fn transition(
        &self,
        tenant_id: &TenantId,
        thread_id: &ThreadId,
        state: SlaState,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        // Compare and swap under a single write lock, mirroring the atomic
        // upsert the SQL store performs.
        let mut entries = self.entries.write().await;
        match entries.get(&thread_id.0) {
            Some((_, previous, _)) if *previous == state => Ok(false),
            _ => {
                entries.insert(thread_id.0.clone(), (tenant_id.0.clone(), state, at));
                Ok(true)
            }
        }
    }

    async fn last_state(&self, thread_id: &ThreadId) -> Result<Option<SlaState>, RepositoryError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&thread_id.0).map(|(_, state, _)| *state))
    }

    async fn tracked_tenants(&self) -> Result<Vec<TenantId>, RepositoryError> {
        let entries = self.entries.read().await;
        let mut tenants: Vec<String> =
            entries.values().map(|(tenant, _, _)| tenant.clone()).collect();
        tenants.sort();
        tenants.dedup();
        Ok(tenants.into_iter().map(TenantId).collect())
    }

    async fn prune(
        &self,
        tenant_id: &TenantId,
        open_threads: &[ThreadId],
    ) -> Result<u64, RepositoryError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|thread_id, (owner, _, _)| {
            owner != &tenant_id.0 || open_threads.iter().any(|open| &open.0 == thread_id)
        });
        Ok((before - entries.len()) as u64)
    }
}
