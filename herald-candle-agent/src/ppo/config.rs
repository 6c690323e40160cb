//! Configurations of the PPO model and agent.
use anyhow::Result;
use herald_core::AgentMode;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of the recurrent stem shared by the actor and the critic.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct RecurrentConfig {
    /// If `true`, observations go through a stack of LSTM layers first.
    pub enabled: bool,

    /// Size of the hidden state of each layer.
    pub hidden_size: usize,

    /// Number of stacked layers.
    pub num_layers: usize,
}

impl Default for RecurrentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hidden_size: 64,
            num_layers: 1,
        }
    }
}

impl RecurrentConfig {
    /// Enabled recurrent stem.
    pub fn lstm(hidden_size: usize, num_layers: usize) -> Self {
        Self {
            enabled: true,
            hidden_size,
            num_layers,
        }
    }
}

/// Configuration of [`PpoModel`](super::PpoModel).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PpoModelConfig {
    /// Initial value of the log standard deviation of actions.
    pub init_log_std: f64,

    /// Dimension of observations.
    pub obs_dim: usize,

    /// Dimension of actions.
    pub action_dim: usize,

    /// If `true`, observations are normalized with running statistics.
    pub use_observation_filter: bool,

    /// Recurrent stem.
    pub recurrent: RecurrentConfig,

    /// If `true`, the model is placed on a CUDA device when available.
    pub use_accelerator: bool,

    /// Hidden layers of the actor head.
    pub actor_units: Vec<usize>,

    /// Hidden layers of the critic head.
    pub critic_units: Vec<usize>,
}

impl Default for PpoModelConfig {
    fn default() -> Self {
        Self {
            init_log_std: -1.0,
            obs_dim: 1,
            action_dim: 1,
            use_observation_filter: false,
            recurrent: RecurrentConfig::default(),
            use_accelerator: false,
            actor_units: vec![64, 64],
            critic_units: vec![64, 64],
        }
    }
}

impl PpoModelConfig {
    /// Creates a feed-forward configuration.
    pub fn new(obs_dim: usize, action_dim: usize) -> Self {
        Self {
            obs_dim,
            action_dim,
            ..Default::default()
        }
    }

    /// Sets the initial log standard deviation.
    pub fn init_log_std(mut self, v: f64) -> Self {
        self.init_log_std = v;
        self
    }

    /// Enables or disables the observation filter.
    pub fn use_observation_filter(mut self, v: bool) -> Self {
        self.use_observation_filter = v;
        self
    }

    /// Sets the recurrent stem.
    pub fn recurrent(mut self, v: RecurrentConfig) -> Self {
        self.recurrent = v;
        self
    }

    /// Places the model on a CUDA device when available.
    pub fn use_accelerator(mut self, v: bool) -> Self {
        self.use_accelerator = v;
        self
    }

    /// Sets hidden layers of the actor head.
    pub fn actor_units(mut self, v: Vec<usize>) -> Self {
        self.actor_units = v;
        self
    }

    /// Sets hidden layers of the critic head.
    pub fn critic_units(mut self, v: Vec<usize>) -> Self {
        self.critic_units = v;
        self
    }

    /// Input dimension of the heads.
    pub(super) fn head_in_dim(&self) -> usize {
        match self.recurrent.enabled {
            true => self.recurrent.hidden_size,
            false => self.obs_dim,
        }
    }

    /// Constructs [`PpoModelConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`PpoModelConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Configuration of [`PpoAgent`](super::PpoAgent).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub struct PpoAgentConfig {
    /// Configuration of the model.
    pub model: PpoModelConfig,

    /// Initial mode of the agent.
    pub mode: AgentMode,
}

impl PpoAgentConfig {
    /// Creates a configuration with the given model.
    pub fn new(model: PpoModelConfig) -> Self {
        Self {
            model,
            mode: AgentMode::default(),
        }
    }

    /// Sets the initial mode.
    pub fn mode(mut self, v: AgentMode) -> Self {
        self.mode = v;
        self
    }

    /// Constructs [`PpoAgentConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of PPO agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`PpoAgentConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of PPO agent into {:?}", path_);
        Ok(())
    }
}
