use super::BroadcasterConfig;
use crate::{binary_hash, util::new_epoch, ParameterPayload, ParameterSerialize, PubSub};
use anyhow::{anyhow, Result};
use log::{debug, info};
use std::sync::{Arc, Mutex};

/// Publishes the parameters of a model to every current and future subscriber.
///
/// Broadcasting is fire-and-forget: nothing tells the broadcaster whether
/// anybody pulled. Each call serializes the model completely, wraps it in a
/// [`ParameterPayload`] with the next version and a message, then hands the
/// encoded payload to the channel in one publish.
///
/// Every broadcaster draws a fresh epoch when it is built. Clients order
/// versions within an epoch only, so a rebuilt broadcaster publishing under
/// the same name is followed from its first version.
///
/// A broadcaster can be shared between threads. Versions reach the channel
/// in the order they are assigned.
pub struct Broadcaster {
    name: String,
    debug: bool,
    channel: Arc<dyn PubSub>,
    epoch: u64,

    // Held while publishing.
    version: Mutex<u64>,
}

impl Broadcaster {
    /// Builds a [`Broadcaster`] publishing to `channel`.
    pub fn build(config: &BroadcasterConfig, channel: Arc<dyn PubSub>) -> Self {
        Self {
            name: config.name.clone(),
            debug: config.debug,
            channel,
            epoch: new_epoch(),
            version: Mutex::new(0),
        }
    }

    /// Name the parameters are published under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Epoch attached to every payload of this broadcaster.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Version of the last broadcast, `0` before the first one.
    pub fn version(&self) -> u64 {
        match self.version.lock() {
            Ok(version) => *version,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Serializes the parameters of `model` and publishes them with `message`.
    ///
    /// Returns the version assigned to the published payload.
    pub fn broadcast<M>(&self, model: &M, message: impl Into<String>) -> Result<u64>
    where
        M: ParameterSerialize + ?Sized,
    {
        let binary = model.parameters_to_binary()?;
        let message = message.into();
        if self.debug {
            info!("BROADCAST {} BINARY_HASH {}", message, binary_hash(&binary));
        }

        let mut last = self
            .version
            .lock()
            .map_err(|_| anyhow!("broadcaster lock poisoned"))?;
        let version = *last + 1;
        let payload = ParameterPayload {
            epoch: self.epoch,
            version,
            message,
            binary,
        }
        .encode()?;
        self.channel.publish(&self.name, payload)?;
        *last = version;
        debug!("Broadcast version {} under {:?}", version, self.name);

        Ok(version)
    }
}
