use super::PubSub;
use crate::error::PsError;
use anyhow::Result;
use log::trace;
use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex},
    time::{Duration, Instant},
};

/// In-process [`PubSub`] backend.
///
/// Each name owns one slot pointing at the latest payload. Swapping the
/// pointer happens under a lock, so a reader gets either the previous or the
/// new payload in full.
#[derive(Default)]
pub struct MemoryChannel {
    slots: Mutex<HashMap<String, Arc<[u8]>>>,
    published: Condvar,
}

impl MemoryChannel {
    /// Creates an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty channel to be shared between threads.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl PubSub for MemoryChannel {
    fn publish(&self, name: &str, payload: Vec<u8>) -> Result<()> {
        let payload: Arc<[u8]> = payload.into();
        {
            let mut slots = self.slots.lock().map_err(|_| PsError::ChannelPoisoned)?;
            slots.insert(name.to_string(), payload);
        }
        trace!("Published under {:?}", name);
        self.published.notify_all();
        Ok(())
    }

    fn get_latest(&self, name: &str) -> Result<Option<Arc<[u8]>>> {
        let slots = self.slots.lock().map_err(|_| PsError::ChannelPoisoned)?;
        Ok(slots.get(name).cloned())
    }

    fn wait_latest(&self, name: &str, timeout: Duration) -> Result<Option<Arc<[u8]>>> {
        let deadline = Instant::now() + timeout;
        let mut slots = self.slots.lock().map_err(|_| PsError::ChannelPoisoned)?;

        loop {
            if let Some(payload) = slots.get(name) {
                return Ok(Some(payload.clone()));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (guard, _) = self
                .published
                .wait_timeout(slots, deadline - now)
                .map_err(|_| PsError::ChannelPoisoned)?;
            slots = guard;
        }
    }
}
