//! Fallback sink when no webhook is configured: escalations land in the
//! service log and nowhere else.

use async_trait::async_trait;
use tracing::warn;

use inboxly_monitor::escalation::{Escalation, EscalationSink, SinkError};

#[derive(Default)]
pub struct LogEscalationSink;

impl LogEscalationSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EscalationSink for LogEscalationSink {
    async fn escalate(&self, escalation: Escalation) -> Result<(), SinkError> {
        warn!(
            event_name = "notify.log.escalation",
            tenant_id = %escalation.tenant_id.0,
            thread_id = %escalation.thread_id.0,
            state = escalation.state.as_str(),
            minutes_elapsed = escalation.minutes_elapsed,
            minutes_remaining = escalation.minutes_remaining,
            occurred_at = %escalation.occurred_at.to_rfc3339(),
            "sla escalation"
        );
        Ok(())
    }
}
