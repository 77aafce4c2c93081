//! In-memory registry backend.
//!
//! Nothing is persisted. Definitions live in a `HashMap` behind a
//! `tokio::sync::RwLock`: reads share the lock, and every mutation holds the
//! write lock for its whole check-then-write sequence, so concurrent writes
//! to one key are serialized and none is lost.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use fngate_core::{FunctionDefinition, FunctionKey};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{RegistryError, RegistryResult};
use crate::registry::{merge_update, stamp_new, FunctionRegistry};

#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    functions: Arc<RwLock<HashMap<FunctionKey, FunctionDefinition>>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> RegistryResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RegistryError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl FunctionRegistry for InMemoryRegistry {
    async fn init(&self) -> RegistryResult<()> {
        self.closed.store(false, Ordering::Release);
        debug!("in-memory registry initialized");
        Ok(())
    }

    async fn create(&self, def: &FunctionDefinition) -> RegistryResult<FunctionKey> {
        self.ensure_open()?;
        let key = def.key();
        let mut functions = self.functions.write().await;
        if functions.contains_key(&key) {
            return Err(RegistryError::AlreadyExists(key));
        }
        functions.insert(key.clone(), stamp_new(def, &key));
        info!(%key, size = functions.len(), "function created");
        Ok(key)
    }

    async fn update(&self, def: &FunctionDefinition) -> RegistryResult<FunctionKey> {
        self.ensure_open()?;
        let key = def.key();
        let mut functions = self.functions.write().await;
        let record = match functions.get(&key) {
            Some(existing) => merge_update(existing, def),
            None => stamp_new(def, &key),
        };
        functions.insert(key.clone(), record);
        info!(%key, "function upserted");
        Ok(key)
    }

    async fn get_by_key(&self, key: &str) -> RegistryResult<FunctionDefinition> {
        self.ensure_open()?;
        let functions = self.functions.read().await;
        functions
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }

    async fn delete_by_key(&self, key: &str) -> RegistryResult<FunctionKey> {
        self.ensure_open()?;
        let mut functions = self.functions.write().await;
        match functions.remove(key) {
            Some(_) => {
                info!(%key, "function deleted");
                Ok(key.to_string())
            }
            None => Err(RegistryError::NotFound(key.to_string())),
        }
    }

    async fn load(&self) -> RegistryResult<Vec<FunctionDefinition>> {
        self.ensure_open()?;
        let functions = self.functions.read().await;
        let results: Vec<_> = functions.values().cloned().collect();
        debug!(size = results.len(), "registry loaded");
        Ok(results)
    }

    async fn sync(&self) -> RegistryResult<()> {
        Ok(())
    }

    async fn health(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) -> RegistryResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "inmemory"
    }
}
