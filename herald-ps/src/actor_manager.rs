//! A manager of [`Rollout`](crate::Rollout) threads.
mod base;
mod config;
pub use base::ActorManager;
pub use config::ActorManagerConfig;
