//! SLA Policy Evaluator
//!
//! Pure first-response deadline arithmetic: given a thread's message history,
//! the tenant's policy, and an evaluation instant, compute the current SLA
//! state. No I/O, deterministic, safe to call concurrently.
//!
//! The SLA is measured only against the *first* outbound response. Once a
//! response exists the thread is permanently `Ok`, however late that response
//! was; elapsed/remaining keep being reported for historical display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::policy::SlaPolicy;
use crate::domain::thread::{Thread, ThreadId};

/// The warning band is the final fifth of the deadline. Deliberately a fixed
/// constant rather than per-policy configuration.
pub const WARNING_WINDOW_NUM: i64 = 1;
pub const WARNING_WINDOW_DEN: i64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaState {
    Ok,
    Warning,
    Breached,
}

impl SlaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Breached => "breached",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ok" => Some(Self::Ok),
            "warning" => Some(Self::Warning),
            "breached" => Some(Self::Breached),
            _ => None,
        }
    }

    /// States worth raising an escalation for when newly entered.
    pub fn is_escalatable(&self) -> bool {
        matches!(self, Self::Warning | Self::Breached)
    }
}

/// Derived status. Never the source of truth: recomputed on every pass.
/// `minutes_remaining` is signed; negative means overdue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaStatus {
    pub state: SlaState,
    pub minutes_elapsed: i64,
    pub minutes_remaining: i64,
    pub responded: bool,
}

/// Per-thread data anomaly found during evaluation. The monitor logs these
/// and moves on to the next thread.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("thread {thread_id:?} was created after the evaluation instant")]
    CreatedInFuture { thread_id: ThreadId },
    #[error("policy deadline must be positive, got {minutes}")]
    NonPositiveDeadline { minutes: i64 },
    #[error("thread {thread_id:?} has a message sent before the thread was created")]
    MessageBeforeThread { thread_id: ThreadId },
}

/// Evaluate one thread against one policy at `now`.
pub fn evaluate(
    thread: &Thread,
    policy: &SlaPolicy,
    now: DateTime<Utc>,
) -> Result<SlaStatus, EvaluationError> {
    let deadline = policy.first_response_minutes;
    if deadline <= 0 {
        return Err(EvaluationError::NonPositiveDeadline { minutes: deadline });
    }
    if thread.created_at > now {
        return Err(EvaluationError::CreatedInFuture { thread_id: thread.id.clone() });
    }

    if let Some(first_response) = thread.first_response() {
        if first_response.sent_at < thread.created_at {
            return Err(EvaluationError::MessageBeforeThread { thread_id: thread.id.clone() });
        }
        let minutes_elapsed = elapsed_minutes(policy, thread.created_at, first_response.sent_at);
        return Ok(SlaStatus {
            state: SlaState::Ok,
            minutes_elapsed,
            minutes_remaining: deadline - minutes_elapsed,
            responded: true,
        });
    }

    let minutes_elapsed = elapsed_minutes(policy, thread.created_at, now);
    let minutes_remaining = deadline - minutes_elapsed;

    let state = if minutes_remaining < 0 {
        SlaState::Breached
    } else if within_warning_window(minutes_remaining, deadline) {
        SlaState::Warning
    } else {
        SlaState::Ok
    };

    Ok(SlaStatus { state, minutes_elapsed, minutes_remaining, responded: false })
}

/// `remaining / deadline < 1/5`, in integer arithmetic.
fn within_warning_window(minutes_remaining: i64, deadline: i64) -> bool {
    minutes_remaining * WARNING_WINDOW_DEN < deadline * WARNING_WINDOW_NUM
}

fn elapsed_minutes(policy: &SlaPolicy, from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    match &policy.business_hours {
        Some(hours) => hours.business_minutes_between(from, to),
        None => (to - from).num_minutes(),
    }
}
