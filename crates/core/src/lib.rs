pub mod config;
pub mod domain;
pub mod errors;
pub mod hours;
pub mod sla;

pub use domain::policy::{FieldError, PolicyDraft, PolicyId, SlaPolicy, MIN_POLICY_NAME_LENGTH};
pub use domain::tenant::{TenantId, TenantRole, UserId};
pub use domain::thread::{Message, MessageDirection, MessageId, Thread, ThreadId, ThreadStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use hours::{BusinessDay, BusinessHours, BusinessWindow};
pub use sla::{evaluate, EvaluationError, SlaState, SlaStatus};
