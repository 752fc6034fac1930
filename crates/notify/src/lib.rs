//! Delivery adapters for SLA escalations.

pub mod log;
pub mod webhook;

pub use log::LogEscalationSink;
pub use webhook::WebhookEscalationSink;
