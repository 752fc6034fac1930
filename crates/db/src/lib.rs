//! SQLite persistence for Inboxly: pool setup, migrations, and the
//! repository traits the monitor and API are written against.

pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    MembershipRepository, PolicyRepository, RepositoryError, SlaStatusStore, ThreadRepository,
};
