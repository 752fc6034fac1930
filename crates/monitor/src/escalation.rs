//! Escalation sink contract plus the in-process doubles tests use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use inboxly_core::domain::tenant::TenantId;
use inboxly_core::domain::thread::ThreadId;
use inboxly_core::sla::SlaState;

/// One state transition worth telling a human about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Escalation {
    pub tenant_id: TenantId,
    pub thread_id: ThreadId,
    pub state: SlaState,
    pub minutes_elapsed: i64,
    pub minutes_remaining: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("escalation delivery failed: {0}")]
    Delivery(String),
}

/// Delivery channel for escalations. Implementations must tolerate being
/// called concurrently; the monitor fires one call per state transition.
#[async_trait]
pub trait EscalationSink: Send + Sync {
    async fn escalate(&self, escalation: Escalation) -> Result<(), SinkError>;
}

/// Records every escalation it receives. Test double.
#[derive(Default)]
pub struct RecordingSink {
    received: Mutex<Vec<Escalation>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn received(&self) -> Vec<Escalation> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl EscalationSink for RecordingSink {
    async fn escalate(&self, escalation: Escalation) -> Result<(), SinkError> {
        self.received.lock().await.push(escalation);
        Ok(())
    }
}

/// Fails every delivery. Test double for sink fault isolation.
#[derive(Default)]
pub struct FailingSink;

#[async_trait]
impl EscalationSink for FailingSink {
    async fn escalate(&self, _escalation: Escalation) -> Result<(), SinkError> {
        Err(SinkError::Delivery("sink unavailable".to_string()))
    }
}
