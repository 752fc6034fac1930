//! SLA monitoring: the periodic pass over open threads, transition tracking,
//! and escalation dispatch.

pub mod escalation;
pub mod monitor;
pub mod ticker;

pub use escalation::{Escalation, EscalationSink, SinkError};
pub use monitor::{MonitorError, MonitorSettings, RunSummary, SlaMonitor};
