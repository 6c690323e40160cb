//! Utility functions.
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};
use xxhash_rust::xxh3::xxh3_64;

static EPOCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns a hex digest of `binary`, used to trace which parameters were published.
///
/// The digest is deterministic across processes and runs.
pub fn binary_hash(binary: &[u8]) -> String {
    format!("{:016x}", xxh3_64(binary))
}

/// Returns an identifier distinguishing a publisher from any other one,
/// including earlier ones in restarted processes.
pub(crate) fn new_epoch() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let count = EPOCH_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut seed = Vec::with_capacity(28);
    seed.extend_from_slice(&nanos.to_le_bytes());
    seed.extend_from_slice(&std::process::id().to_le_bytes());
    seed.extend_from_slice(&count.to_le_bytes());
    xxh3_64(&seed)
}

#[cfg(test)]
mod test {
    use super::{binary_hash, new_epoch};

    #[test]
    fn test_binary_hash() {
        let h1 = binary_hash(&[1, 2, 3]);
        assert_eq!(h1.len(), 16);
        assert_eq!(h1, binary_hash(&[1, 2, 3]));
        assert_ne!(h1, binary_hash(&[1, 2, 4]));
    }

    #[test]
    fn test_new_epoch_is_unique() {
        let epochs: std::collections::HashSet<u64> = (0..100).map(|_| new_epoch()).collect();
        assert_eq!(epochs.len(), 100);
    }
}
