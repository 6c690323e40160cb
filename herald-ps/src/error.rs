//! Errors in the parameter server.
use std::time::Duration;
use thiserror::Error;

/// Errors in the parameter server.
#[derive(Error, Debug)]
pub enum PsError {
    /// Nothing was published under the name within the timeout.
    #[error("No parameters published under {name:?} within {timeout:?}")]
    Timeout {
        /// Name of the broadcaster.
        name: String,

        /// Duration waited.
        timeout: Duration,
    },

    /// A payload could not be decoded.
    #[error("Malformed parameter payload: {0}")]
    MalformedPayload(String),

    /// A thread panicked while holding the lock of the channel.
    #[error("Channel lock poisoned")]
    ChannelPoisoned,
}
