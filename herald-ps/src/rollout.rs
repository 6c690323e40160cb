//! Runs an agent on an environment with parameters pulled from a broadcaster.
mod base;
mod config;
mod stat;
pub use base::Rollout;
pub use config::RolloutConfig;
pub use stat::{rollout_stats_fmt, RolloutStat};
