use crate::error::PsError;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// The unit published by a [`Broadcaster`](crate::Broadcaster).
///
/// A payload is built completely and encoded before it reaches the channel,
/// and it is never modified afterwards.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ParameterPayload {
    /// Identifies the broadcaster instance that published the payload.
    ///
    /// Versions are only ordered within one epoch.
    pub epoch: u64,

    /// Version assigned by the broadcaster, starting from 1.
    pub version: u64,

    /// Free-form message attached by the learner.
    pub message: String,

    /// Serialized parameters.
    pub binary: Vec<u8>,
}

impl ParameterPayload {
    /// Encodes the payload as bytes for the channel.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes a payload taken from the channel.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| PsError::MalformedPayload(e.to_string()).into())
    }
}
