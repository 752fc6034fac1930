use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::tenant::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Conversation lifecycle. Only `Open` threads are evaluated against an SLA;
/// the other states are terminal for monitoring purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Open,
    Closed,
    Resolved,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            _ => None,
        }
    }
}

/// Immutable once recorded; ordering within a thread is by `sent_at` ascending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub direction: MessageDirection,
    pub sent_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub tenant_id: TenantId,
    pub status: ThreadStatus,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Thread {
    /// The first response: earliest outbound message, ties broken by timestamp
    /// ascending. `None` while the contact is still waiting.
    pub fn first_response(&self) -> Option<&Message> {
        self.messages
            .iter()
            .filter(|message| message.direction == MessageDirection::Outbound)
            .min_by_key(|message| message.sent_at)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::domain::tenant::TenantId;

    use super::{Message, MessageDirection, MessageId, Thread, ThreadId, ThreadStatus};

    fn message(id: &str, direction: MessageDirection, minutes_after: i64) -> Message {
        Message {
            id: MessageId(id.to_string()),
            direction,
            sent_at: Utc::now() + Duration::minutes(minutes_after),
        }
    }

    fn thread(messages: Vec<Message>) -> Thread {
        Thread {
            id: ThreadId("T-1".to_string()),
            tenant_id: TenantId("acme".to_string()),
            status: ThreadStatus::Open,
            created_at: Utc::now(),
            messages,
        }
    }

    #[test]
    fn first_response_is_earliest_outbound_message() {
        let thread = thread(vec![
            message("m1", MessageDirection::Inbound, 0),
            message("m2", MessageDirection::Outbound, 30),
            message("m3", MessageDirection::Outbound, 10),
        ]);

        let first = thread.first_response().expect("outbound message exists");
        assert_eq!(first.id, MessageId("m3".to_string()));
    }

    #[test]
    fn first_response_is_none_when_only_inbound_messages_exist() {
        let thread = thread(vec![
            message("m1", MessageDirection::Inbound, 0),
            message("m2", MessageDirection::Inbound, 5),
        ]);

        assert!(thread.first_response().is_none());
    }

    #[test]
    fn thread_status_round_trips_from_storage_encoding() {
        let cases = [ThreadStatus::Open, ThreadStatus::Closed, ThreadStatus::Resolved];

        for status in cases {
            assert_eq!(ThreadStatus::parse(status.as_str()), Some(status));
        }
        assert!(ThreadStatus::Open.is_open());
        assert!(!ThreadStatus::Resolved.is_open());
    }
}
