pub mod policy;
pub mod tenant;
pub mod thread;
