//! Webhook delivery for escalations.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use inboxly_monitor::escalation::{Escalation, EscalationSink, SinkError};

/// Posts each escalation as a JSON document to a configured endpoint, with an
/// optional bearer token.
pub struct WebhookEscalationSink {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<SecretString>,
}

/// Wire shape of the webhook body. Field names are part of the external
/// contract; change them only with consumers in the loop.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    tenant_id: &'a str,
    thread_id: &'a str,
    state: &'a str,
    minutes_elapsed: i64,
    minutes_remaining: i64,
    occurred_at: String,
}

impl<'a> WebhookPayload<'a> {
    fn from_escalation(escalation: &'a Escalation) -> Self {
        Self {
            tenant_id: &escalation.tenant_id.0,
            thread_id: &escalation.thread_id.0,
            state: escalation.state.as_str(),
            minutes_elapsed: escalation.minutes_elapsed,
            minutes_remaining: escalation.minutes_remaining,
            occurred_at: escalation.occurred_at.to_rfc3339(),
        }
    }
}

impl WebhookEscalationSink {
    pub fn new(
        endpoint: String,
        auth_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| SinkError::Delivery(format!("client setup failed: {error}")))?;
        Ok(Self { client, endpoint, auth_token })
    }
}

#[async_trait]
impl EscalationSink for WebhookEscalationSink {
    async fn escalate(&self, escalation: Escalation) -> Result<(), SinkError> {
        let payload = WebhookPayload::from_escalation(&escalation);

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| SinkError::Delivery(format!("webhook request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Delivery(format!("webhook returned {status}")));
        }

        tracing::debug!(
            event_name = "notify.webhook.delivered",
            tenant_id = %escalation.tenant_id.0,
            thread_id = %escalation.thread_id.0,
            state = escalation.state.as_str(),
            "escalation delivered"
        );
        Ok(())
    }
}
