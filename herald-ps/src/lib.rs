//! Parameter broadcasting between a learner and distributed actors.
//!
//! The learner publishes the latest snapshot of its parameters with a
//! [`Broadcaster`]. Actors pull the snapshot through a [`ParameterClient`]
//! and run their local copy of the model on an environment with [`Rollout`].
//! The two sides only share a [`PubSub`] channel, keyed by the name of the
//! broadcaster.
//!
//! # Messages
//! * From the learner to actors
//!   - [`ParameterPayload`]: serialized parameters, a version and a free-form message.
//!
//! Only the latest payload is kept for each name. An actor that pulls late
//! sees the newest parameters and nothing older; an actor that never pulls
//! keeps running with whatever it has.
mod actor_manager;
mod broadcaster;
mod channel;
mod client;
pub mod error;
mod messages;
mod rollout;
mod sync_model;
mod util;
pub use actor_manager::{ActorManager, ActorManagerConfig};
pub use broadcaster::{Broadcaster, BroadcasterConfig};
pub use channel::{MemoryChannel, PubSub};
pub use client::{ParameterClient, PullInfo};
pub use messages::ParameterPayload;
pub use rollout::{rollout_stats_fmt, Rollout, RolloutConfig, RolloutStat};
pub use sync_model::ParameterSerialize;
pub use util::binary_hash;
