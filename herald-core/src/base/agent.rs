//! Agent.
use super::{Env, Policy};
use serde::{Deserialize, Serialize};

/// How an agent selects actions.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum AgentMode {
    /// Samples actions, the behaviour used while collecting training data.
    Training,

    /// Samples actions for evaluation.
    EvalStochastic,

    /// Takes the most probable action.
    EvalDeterministic,
}

impl Default for AgentMode {
    fn default() -> Self {
        Self::Training
    }
}

impl AgentMode {
    /// Returns `true` if actions are selected without sampling.
    pub fn is_deterministic(&self) -> bool {
        matches!(self, Self::EvalDeterministic)
    }
}

/// A policy whose behaviour can be switched between training and evaluation,
/// and which may carry state across the steps of an episode.
pub trait Agent<E: Env>: Policy<E> {
    /// Sets the action selection mode.
    fn set_mode(&mut self, mode: AgentMode);

    /// Returns the action selection mode.
    fn mode(&self) -> AgentMode;

    /// Drops any state kept across steps of the current episode.
    ///
    /// Called whenever the environment is reset.
    fn reset_episode(&mut self) {}
}
