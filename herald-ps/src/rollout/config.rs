use anyhow::Result;
use herald_core::AgentMode;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    time::Duration,
};

/// Configuration of [`Rollout`](super::Rollout).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RolloutConfig {
    /// Action selection mode of the agent.
    pub mode: AgentMode,

    /// Stops after this number of episodes. `None` runs until stopped.
    pub max_episodes: Option<usize>,

    /// Stops after this number of environment steps. `None` runs until stopped.
    pub max_env_steps: Option<usize>,

    /// Time to wait for the first parameters, in milliseconds.
    ///
    /// The default value is 10000.
    pub pull_timeout_ms: u64,

    /// If `true`, the loop does not start before parameters have been pulled.
    /// Otherwise it starts with the initial parameters of the agent when
    /// nothing has been published yet.
    pub wait_initial_params: bool,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            mode: AgentMode::Training,
            max_episodes: None,
            max_env_steps: None,
            pull_timeout_ms: 10_000,
            wait_initial_params: true,
        }
    }
}

impl RolloutConfig {
    /// Sets the action selection mode.
    pub fn mode(mut self, v: AgentMode) -> Self {
        self.mode = v;
        self
    }

    /// Sets the maximum number of episodes.
    pub fn max_episodes(mut self, v: usize) -> Self {
        self.max_episodes = Some(v);
        self
    }

    /// Sets the maximum number of environment steps.
    pub fn max_env_steps(mut self, v: usize) -> Self {
        self.max_env_steps = Some(v);
        self
    }

    /// Sets the timeout for the first parameters in milliseconds.
    pub fn pull_timeout_ms(mut self, v: u64) -> Self {
        self.pull_timeout_ms = v;
        self
    }

    /// Sets whether to wait for the first parameters.
    pub fn wait_initial_params(mut self, v: bool) -> Self {
        self.wait_initial_params = v;
        self
    }

    /// Timeout for the first parameters.
    pub fn pull_timeout(&self) -> Duration {
        Duration::from_millis(self.pull_timeout_ms)
    }

    /// Constructs [`RolloutConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`RolloutConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
