use crate::RolloutConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ActorManager`](super::ActorManager).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ActorManagerConfig {
    /// Number of actor threads.
    ///
    /// The default value is 1.
    pub n_actors: usize,

    /// Configuration shared by the rollout loops of all actors.
    pub rollout: RolloutConfig,

    /// Actor `i` builds its environment with seed `env_seed_base + i`.
    pub env_seed_base: i64,
}

impl Default for ActorManagerConfig {
    fn default() -> Self {
        Self {
            n_actors: 1,
            rollout: RolloutConfig::default(),
            env_seed_base: 0,
        }
    }
}

impl ActorManagerConfig {
    /// Creates a configuration with `n_actors` actors.
    pub fn new(n_actors: usize) -> Self {
        Self {
            n_actors,
            ..Self::default()
        }
    }

    /// Sets the rollout configuration.
    pub fn rollout(mut self, v: RolloutConfig) -> Self {
        self.rollout = v;
        self
    }

    /// Sets the base of environment seeds.
    pub fn env_seed_base(mut self, v: i64) -> Self {
        self.env_seed_base = v;
        self
    }

    /// Constructs [`ActorManagerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ActorManagerConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
