use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Broadcaster`](super::Broadcaster).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct BroadcasterConfig {
    /// Name of the channel slot the parameters are published under.
    ///
    /// The default value is `"ps"`.
    pub name: String,

    /// If `true`, the hash of every published blob is logged.
    pub debug: bool,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            name: "ps".to_string(),
            debug: false,
        }
    }
}

impl BroadcasterConfig {
    /// Sets the name of the broadcaster.
    pub fn name(mut self, v: impl Into<String>) -> Self {
        self.name = v.into();
        self
    }

    /// Enables or disables logging of blob hashes.
    pub fn debug(mut self, v: bool) -> Self {
        self.debug = v;
        self
    }

    /// Constructs [`BroadcasterConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`BroadcasterConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
