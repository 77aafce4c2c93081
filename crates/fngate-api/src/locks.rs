//! Per-function serialization of mutating requests.
//!
//! Provisioning swaps a function's workers before the registry records
//! their URLs. Holding the function's lock across both steps keeps the
//! stored URLs equal to the supervisor's live batch.

use std::collections::HashMap;
use std::sync::Arc;

use fngate_core::FunctionKey;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct FunctionLocks {
    locks: Mutex<HashMap<FunctionKey, Arc<Mutex<()>>>>,
}

impl FunctionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}
