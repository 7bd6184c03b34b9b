//! Per-signer submission serialization
//!
//! Nonces for one signer must be gap-free and strictly ordered, so the
//! fetch-sign-broadcast step for a signer runs under that signer's lock.
//! Different signers never contend.

use crate::types::Address;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async lock per signer address
#[derive(Debug, Default)]
pub struct SignerLocks {
    locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl SignerLocks {
    /// No signers yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `signer`'s sequence
    pub async fn acquire(&self, signer: &Address) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the map shard is not held across the await
        let lock = self
            .locks
            .entry(*signer)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Signers seen so far
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True before the first acquire
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
