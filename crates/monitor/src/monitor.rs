//! The monitoring pass: evaluate every open thread, record transitions,
//! escalate the ones that newly entered warning or breach.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use inboxly_core::domain::policy::SlaPolicy;
use inboxly_core::domain::tenant::TenantId;
use inboxly_core::domain::thread::Thread;
use inboxly_core::sla;
use inboxly_db::repositories::{
    PolicyRepository, RepositoryError, SlaStatusStore, ThreadRepository,
};

use crate::escalation::{Escalation, EscalationSink};

#[derive(Clone, Copy, Debug)]
pub struct MonitorSettings {
    /// Hard ceiling on the time spent on a single thread, delivery included.
    pub thread_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self { thread_timeout: Duration::from_millis(2_000) }
    }
}

/// Counters for one monitoring pass. `failed` covers every per-thread fault
/// the pass absorbed: bad data, storage errors, sink errors, timeouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub evaluated: u64,
    pub escalated: u64,
    pub skipped_no_policy: u64,
    pub failed: u64,
    pub pruned: u64,
}

/// Faults that abort a whole pass. Per-thread faults never surface here.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct SlaMonitor {
    threads: Arc<dyn ThreadRepository>,
    policies: Arc<dyn PolicyRepository>,
    statuses: Arc<dyn SlaStatusStore>,
    sink: Arc<dyn EscalationSink>,
    settings: MonitorSettings,
}

impl SlaMonitor {
    pub fn new(
        threads: Arc<dyn ThreadRepository>,
        policies: Arc<dyn PolicyRepository>,
        statuses: Arc<dyn SlaStatusStore>,
        sink: Arc<dyn EscalationSink>,
        settings: MonitorSettings,
    ) -> Self {
        Self { threads, policies, statuses, sink, settings }
    }

    /// Evaluate every tenant's open threads at the current instant.
    pub async fn monitor_all(&self) -> Result<RunSummary, MonitorError> {
        self.monitor_all_at(Utc::now()).await
    }

    /// Evaluate a single tenant's open threads at the current instant.
    pub async fn monitor_tenant(&self, tenant_id: &TenantId) -> Result<RunSummary, MonitorError> {
        self.monitor_tenant_at(tenant_id, Utc::now()).await
    }

    /// As `monitor_all`, with the evaluation instant supplied by the caller.
    pub async fn monitor_all_at(&self, now: DateTime<Utc>) -> Result<RunSummary, MonitorError> {
        self.run(None, now).await
    }

    /// As `monitor_tenant`, with the evaluation instant supplied by the caller.
    pub async fn monitor_tenant_at(
        &self,
        tenant_id: &TenantId,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, MonitorError> {
        self.run(Some(tenant_id), now).await
    }

    async fn run(
        &self,
        scope: Option<&TenantId>,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, MonitorError> {
        let open = self.threads.list_open(scope).await?;

        let mut by_tenant: BTreeMap<String, Vec<Thread>> = BTreeMap::new();
        for thread in open {
            by_tenant.entry(thread.tenant_id.0.clone()).or_default().push(thread);
        }

        let mut summary = RunSummary::default();

        for (tenant, threads) in &by_tenant {
            let tenant_id = TenantId(tenant.clone());
            let policy = match self.policies.active_for_tenant(&tenant_id).await {
                Ok(Some(policy)) => policy,
                Ok(None) => {
                    debug!(
                        event_name = "monitor.tenant.no_policy",
                        tenant_id = %tenant,
                        threads = threads.len(),
                        "tenant has no active policy, skipping"
                    );
                    summary.skipped_no_policy += threads.len() as u64;
                    continue;
                }
                Err(error) => {
                    warn!(
                        event_name = "monitor.tenant.policy_lookup_failed",
                        tenant_id = %tenant,
                        error = %error,
                        "could not resolve active policy, skipping tenant"
                    );
                    summary.failed += threads.len() as u64;
                    continue;
                }
            };

            for thread in threads {
                let work = self.process_thread(thread, &policy, now, &mut summary);
                let timed_out =
                    tokio::time::timeout(self.settings.thread_timeout, work).await.is_err();
                if timed_out {
                    warn!(
                        event_name = "monitor.thread.timed_out",
                        tenant_id = %tenant,
                        thread_id = %thread.id.0,
                        timeout_ms = self.settings.thread_timeout.as_millis() as u64,
                        "thread processing exceeded the per-thread timeout"
                    );
                    summary.failed += 1;
                }
            }
        }

        summary.pruned = self.prune(scope, &by_tenant).await?;

        debug!(
            event_name = "monitor.run.completed",
            scope = scope.map(|tenant| tenant.0.as_str()).unwrap_or("all"),
            evaluated = summary.evaluated,
            escalated = summary.escalated,
            skipped_no_policy = summary.skipped_no_policy,
            failed = summary.failed,
            pruned = summary.pruned,
            "monitoring pass finished"
        );

        Ok(summary)
    }

    async fn process_thread(
        &self,
        thread: &Thread,
        policy: &SlaPolicy,
        now: DateTime<Utc>,
        summary: &mut RunSummary,
    ) {
        let status = match sla::evaluate(thread, policy, now) {
            Ok(status) => status,
            Err(error) => {
                warn!(
                    event_name = "monitor.thread.evaluation_failed",
                    tenant_id = %thread.tenant_id.0,
                    thread_id = %thread.id.0,
                    error = %error,
                    "skipping thread with inconsistent data"
                );
                summary.failed += 1;
                return;
            }
        };
        summary.evaluated += 1;

        let transitioned = match self
            .statuses
            .transition(&thread.tenant_id, &thread.id, status.state, now)
            .await
        {
            Ok(transitioned) => transitioned,
            Err(error) => {
                warn!(
                    event_name = "monitor.thread.transition_failed",
                    tenant_id = %thread.tenant_id.0,
                    thread_id = %thread.id.0,
                    error = %error,
                    "could not record state"
                );
                summary.failed += 1;
                return;
            }
        };

        if !(transitioned && status.state.is_escalatable()) {
            return;
        }

        let escalation = Escalation {
            tenant_id: thread.tenant_id.clone(),
            thread_id: thread.id.clone(),
            state: status.state,
            minutes_elapsed: status.minutes_elapsed,
            minutes_remaining: status.minutes_remaining,
            occurred_at: now,
        };

        match self.sink.escalate(escalation).await {
            Ok(()) => summary.escalated += 1,
            Err(error) => {
                warn!(
                    event_name = "monitor.thread.escalation_failed",
                    tenant_id = %thread.tenant_id.0,
                    thread_id = %thread.id.0,
                    state = status.state.as_str(),
                    error = %error,
                    "escalation was not delivered"
                );
                summary.failed += 1;
            }
        }
    }

    async fn prune(
        &self,
        scope: Option<&TenantId>,
        by_tenant: &BTreeMap<String, Vec<Thread>>,
    ) -> Result<u64, MonitorError> {
        let open_ids = |tenant: &str| {
            by_tenant
                .get(tenant)
                .map(|threads| threads.iter().map(|thread| thread.id.clone()).collect::<Vec<_>>())
                .unwrap_or_default()
        };

        let mut pruned = 0;
        match scope {
            Some(tenant_id) => {
                pruned += self.statuses.prune(tenant_id, &open_ids(&tenant_id.0)).await?;
            }
            None => {
                for tenant_id in self.statuses.tracked_tenants().await? {
                    pruned += self.statuses.prune(&tenant_id, &open_ids(&tenant_id.0)).await?;
                }
            }
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use inboxly_core::domain::policy::{PolicyId, SlaPolicy};
    use inboxly_core::domain::tenant::TenantId;
    use inboxly_core::domain::thread::{
        Message, MessageDirection, MessageId, Thread, ThreadId, ThreadStatus,
    };
    use inboxly_core::sla::SlaState;
    use inboxly_db::repositories::{
        InMemoryPolicyRepository, InMemorySlaStatusStore, InMemoryThreadRepository,
        PolicyRepository, SlaStatusStore,
    };

    use crate::escalation::{Escalation, EscalationSink, FailingSink, RecordingSink, SinkError};

    use super::{MonitorSettings, SlaMonitor};

    fn base_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).single().expect("valid instant")
    }

    fn policy(tenant: &str, minutes: i64) -> SlaPolicy {
        SlaPolicy {
            id: PolicyId(format!("{tenant}-default")),
            tenant_id: TenantId(tenant.to_string()),
            name: "Default".to_string(),
            first_response_minutes: minutes,
            business_hours: None,
            created_at: base_time(),
        }
    }

    fn unanswered_thread(id: &str, tenant: &str) -> Thread {
        Thread {
            id: ThreadId(id.to_string()),
            tenant_id: TenantId(tenant.to_string()),
            status: ThreadStatus::Open,
            created_at: base_time(),
            messages: vec![Message {
                id: MessageId(format!("{id}-m1")),
                direction: MessageDirection::Inbound,
                sent_at: base_time(),
            }],
        }
    }

    struct Harness {
        threads: Arc<InMemoryThreadRepository>,
        policies: Arc<InMemoryPolicyRepository>,
        statuses: Arc<InMemorySlaStatusStore>,
        sink: Arc<RecordingSink>,
    }

    impl Harness {
        async fn with_policy(tenant: &str, minutes: i64) -> Self {
            let harness = Self {
                threads: Arc::new(InMemoryThreadRepository::new()),
                policies: Arc::new(InMemoryPolicyRepository::new()),
                statuses: Arc::new(InMemorySlaStatusStore::new()),
                sink: Arc::new(RecordingSink::new()),
            };
            harness.policies.insert(policy(tenant, minutes)).await.expect("insert policy");
            harness
        }

        fn monitor(&self) -> SlaMonitor {
            self.monitor_with_sink(self.sink.clone())
        }

        fn monitor_with_sink(&self, sink: Arc<dyn EscalationSink>) -> SlaMonitor {
            SlaMonitor::new(
                self.threads.clone(),
                self.policies.clone(),
                self.statuses.clone(),
                sink,
                MonitorSettings::default(),
            )
        }
    }

    #[tokio::test]
    async fn repeated_passes_escalate_a_breach_once() {
        let harness = Harness::with_policy("acme", 60).await;
        harness.threads.put(unanswered_thread("T-1", "acme")).await;
        let monitor = harness.monitor();

        let overdue = base_time() + chrono::Duration::minutes(90);
        for _ in 0..4 {
            monitor.monitor_all_at(overdue).await.expect("run");
        }

        let received = harness.sink.received().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].state, SlaState::Breached);
        assert_eq!(received[0].thread_id.0, "T-1");
    }

    #[tokio::test]
    async fn ok_then_warning_then_breach_escalates_twice() {
        let harness = Harness::with_policy("acme", 60).await;
        harness.threads.put(unanswered_thread("T-1", "acme")).await;
        let monitor = harness.monitor();

        monitor.monitor_all_at(base_time() + chrono::Duration::minutes(10)).await.expect("ok");
        monitor.monitor_all_at(base_time() + chrono::Duration::minutes(50)).await.expect("warn");
        monitor.monitor_all_at(base_time() + chrono::Duration::minutes(70)).await.expect("breach");

        let received = harness.sink.received().await;
        let states: Vec<SlaState> = received.iter().map(|escalation| escalation.state).collect();
        assert_eq!(states, vec![SlaState::Warning, SlaState::Breached]);
    }

    #[tokio::test]
    async fn answered_thread_never_escalates() {
        let harness = Harness::with_policy("acme", 60).await;
        let mut thread = unanswered_thread("T-1", "acme");
        thread.messages.push(Message {
            id: MessageId("T-1-m2".to_string()),
            direction: MessageDirection::Outbound,
            sent_at: base_time() + chrono::Duration::minutes(45),
        });
        harness.threads.put(thread).await;
        let monitor = harness.monitor();

        let summary = monitor
            .monitor_all_at(base_time() + chrono::Duration::minutes(300))
            .await
            .expect("run");

        assert_eq!(summary.evaluated, 1);
        assert!(harness.sink.received().await.is_empty());
        assert_eq!(
            harness.statuses.last_state(&ThreadId("T-1".to_string())).await.expect("query"),
            Some(SlaState::Ok)
        );
    }

    #[tokio::test]
    async fn tenant_without_policy_is_skipped() {
        let harness = Harness::with_policy("acme", 60).await;
        harness.threads.put(unanswered_thread("T-1", "acme")).await;
        harness.threads.put(unanswered_thread("T-2", "globex")).await;
        let monitor = harness.monitor();

        let summary = monitor
            .monitor_all_at(base_time() + chrono::Duration::minutes(90))
            .await
            .expect("run");

        assert_eq!(summary.skipped_no_policy, 1);
        assert_eq!(summary.evaluated, 1);
        let received = harness.sink.received().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].tenant_id.0, "acme");
    }

    #[tokio::test]
    async fn a_bad_thread_does_not_stop_the_pass() {
        let harness = Harness::with_policy("acme", 60).await;
        let mut future_thread = unanswered_thread("T-future", "acme");
        future_thread.created_at = base_time() + chrono::Duration::days(30);
        future_thread.messages.clear();
        harness.threads.put(future_thread).await;
        harness.threads.put(unanswered_thread("T-ok", "acme")).await;
        let monitor = harness.monitor();

        let summary = monitor
            .monitor_all_at(base_time() + chrono::Duration::minutes(90))
            .await
            .expect("run");

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.evaluated, 1);
        let received = harness.sink.received().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].thread_id.0, "T-ok");
    }

    #[tokio::test]
    async fn sink_failure_is_absorbed_and_counted() {
        let harness = Harness::with_policy("acme", 60).await;
        harness.threads.put(unanswered_thread("T-1", "acme")).await;
        let monitor = harness.monitor_with_sink(Arc::new(FailingSink));

        let summary = monitor
            .monitor_all_at(base_time() + chrono::Duration::minutes(90))
            .await
            .expect("run");

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.escalated, 0);
        // The transition was still recorded, so the state is not re-delivered
        // when the sink recovers on the next pass.
        assert_eq!(
            harness.statuses.last_state(&ThreadId("T-1".to_string())).await.expect("query"),
            Some(SlaState::Breached)
        );
    }

    struct SlowSink;

    #[async_trait]
    impl EscalationSink for SlowSink {
        async fn escalate(&self, _escalation: Escalation) -> Result<(), SinkError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn a_stalled_sink_hits_the_per_thread_timeout() {
        let harness = Harness::with_policy("acme", 60).await;
        harness.threads.put(unanswered_thread("T-1", "acme")).await;
        let monitor = harness.monitor_with_sink(Arc::new(SlowSink));

        let summary = monitor
            .monitor_all_at(base_time() + chrono::Duration::minutes(90))
            .await
            .expect("run");

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.escalated, 0);
    }

    #[tokio::test]
    async fn overlapping_passes_escalate_exactly_once() {
        let harness = Harness::with_policy("acme", 60).await;
        harness.threads.put(unanswered_thread("T-1", "acme")).await;
        let monitor = Arc::new(harness.monitor());

        let tenant = TenantId("acme".to_string());
        let overdue = base_time() + chrono::Duration::minutes(90);
        let first = {
            let monitor = monitor.clone();
            let tenant = tenant.clone();
            async move { monitor.monitor_tenant_at(&tenant, overdue).await }
        };
        let second = {
            let monitor = monitor.clone();
            let tenant = tenant.clone();
            async move { monitor.monitor_tenant_at(&tenant, overdue).await }
        };

        let (first, second) = tokio::join!(first, second);
        first.expect("first run");
        second.expect("second run");

        assert_eq!(harness.sink.received().await.len(), 1);
    }

    #[tokio::test]
    async fn closed_threads_are_pruned_from_tracking() {
        let harness = Harness::with_policy("acme", 60).await;
        harness.threads.put(unanswered_thread("T-1", "acme")).await;
        let monitor = harness.monitor();

        monitor.monitor_all_at(base_time() + chrono::Duration::minutes(90)).await.expect("run");
        assert!(harness
            .statuses
            .last_state(&ThreadId("T-1".to_string()))
            .await
            .expect("query")
            .is_some());

        // The thread closes between passes.
        harness.threads.remove(&ThreadId("T-1".to_string())).await;

        let summary = monitor
            .monitor_all_at(base_time() + chrono::Duration::minutes(120))
            .await
            .expect("run");

        assert_eq!(summary.pruned, 1);
        assert_eq!(
            harness.statuses.last_state(&ThreadId("T-1".to_string())).await.expect("query"),
            None
        );
    }

    #[tokio::test]
    async fn reopened_breach_escalates_again() {
        let harness = Harness::with_policy("acme", 60).await;
        harness.threads.put(unanswered_thread("T-1", "acme")).await;
        let monitor = harness.monitor();

        monitor.monitor_all_at(base_time() + chrono::Duration::minutes(90)).await.expect("run");
        assert_eq!(harness.sink.received().await.len(), 1);

        // Tracking entry is gone after the thread closes, so a later reopen
        // in breach raises a fresh escalation.
        harness.threads.remove(&ThreadId("T-1".to_string())).await;
        monitor.monitor_all_at(base_time() + chrono::Duration::minutes(95)).await.expect("run");
        harness.threads.put(unanswered_thread("T-1", "acme")).await;
        monitor.monitor_all_at(base_time() + chrono::Duration::minutes(100)).await.expect("run");

        assert_eq!(harness.sink.received().await.len(), 2);
    }
}
