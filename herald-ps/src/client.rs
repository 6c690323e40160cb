//! Subscriber side of the parameter channel.
use crate::{error::PsError, ParameterPayload, ParameterSerialize, PubSub};
use anyhow::Result;
use log::{debug, trace};
use std::{sync::Arc, time::Duration};

/// Version and message of the parameters adopted by a [`ParameterClient`].
#[derive(Clone, Debug, PartialEq)]
pub struct PullInfo {
    /// Epoch of the broadcaster that published the parameters.
    pub epoch: u64,

    /// Version assigned by the broadcaster.
    pub version: u64,

    /// Message attached by the learner.
    pub message: String,
}

/// Pulls the latest parameters published under a broadcaster name into a local model.
///
/// The client remembers the epoch and version it adopted last. It skips
/// payloads of the same epoch that are not newer, and adopts any payload of
/// another epoch, as published by a rebuilt broadcaster.
pub struct ParameterClient {
    name: String,
    channel: Arc<dyn PubSub>,
    info: Option<PullInfo>,
}

impl ParameterClient {
    /// Creates a client for the broadcaster `name`.
    pub fn new(name: impl Into<String>, channel: Arc<dyn PubSub>) -> Self {
        Self {
            name: name.into(),
            channel,
            info: None,
        }
    }

    /// Name of the broadcaster this client listens to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the latest payload without touching any model.
    pub fn fetch(&self) -> Result<Option<ParameterPayload>> {
        match self.channel.get_latest(&self.name)? {
            None => Ok(None),
            Some(bytes) => Ok(Some(ParameterPayload::decode(&bytes)?)),
        }
    }

    /// Copies the latest parameters into `model` unless they are the ones
    /// adopted before or older ones of the same broadcaster.
    ///
    /// Returns `None` when nothing newer is available.
    pub fn pull<M>(&mut self, model: &mut M) -> Result<Option<PullInfo>>
    where
        M: ParameterSerialize + ?Sized,
    {
        match self.fetch()? {
            None => {
                trace!("Nothing published under {:?} yet", self.name);
                Ok(None)
            }
            Some(payload) => self.adopt(payload, model),
        }
    }

    /// Blocks up to `timeout` until parameters are published, then pulls them.
    ///
    /// Returns the info of the parameters in use after the call, which may be
    /// older ones if nothing newer was published.
    pub fn wait_and_pull<M>(&mut self, model: &mut M, timeout: Duration) -> Result<PullInfo>
    where
        M: ParameterSerialize + ?Sized,
    {
        let bytes = self
            .channel
            .wait_latest(&self.name, timeout)?
            .ok_or_else(|| PsError::Timeout {
                name: self.name.clone(),
                timeout,
            })?;
        let payload = ParameterPayload::decode(&bytes)?;
        self.adopt(payload, model)?;

        // adopt() either updated `info` or kept the one of the same epoch.
        self.info.clone().ok_or_else(|| {
            PsError::MalformedPayload("no parameters adopted".to_string()).into()
        })
    }

    /// Info of the parameters adopted last.
    pub fn info(&self) -> Option<&PullInfo> {
        self.info.as_ref()
    }

    fn adopt<M>(&mut self, payload: ParameterPayload, model: &mut M) -> Result<Option<PullInfo>>
    where
        M: ParameterSerialize + ?Sized,
    {
        if let Some(info) = &self.info {
            if payload.epoch == info.epoch && payload.version <= info.version {
                return Ok(None);
            }
            if payload.epoch != info.epoch {
                debug!(
                    "New broadcaster epoch under {:?}: {:016x} -> {:016x}",
                    self.name, info.epoch, payload.epoch
                );
            }
        }

        model.binary_to_parameters(&payload.binary)?;
        let info = PullInfo {
            epoch: payload.epoch,
            version: payload.version,
            message: payload.message,
        };
        debug!("Pulled version {} from {:?}", info.version, self.name);
        self.info = Some(info.clone());

        Ok(Some(info))
    }
}
