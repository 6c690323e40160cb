//! Core functionalities.
mod agent;
mod env;
mod policy;
mod step;
pub use agent::{Agent, AgentMode};
pub use env::Env;
pub use policy::{Configurable, Policy};
use std::fmt::Debug;
pub use step::{Info, Step};

/// An observation of an environment.
pub trait Obs: Clone + Debug {}

/// An action applied to an environment.
pub trait Act: Clone + Debug {}
