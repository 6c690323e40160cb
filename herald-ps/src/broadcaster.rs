//! Publisher of parameter snapshots.
mod base;
mod config;
pub use base::Broadcaster;
pub use config::BroadcasterConfig;
