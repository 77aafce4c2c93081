//! Durable registry backend on redb.
//!
//! Definitions are JSON-serialized into a single `&str -> &[u8]` table keyed
//! by the function key. redb admits one write transaction at a time, so each
//! mutation's read-check-write runs serialized inside its own transaction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use fngate_core::{FunctionDefinition, FunctionKey};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{RegistryError, RegistryResult};
use crate::registry::{merge_update, stamp_new, FunctionRegistry};

/// Function definitions keyed by `{tenant}{name}`.
const FUNCTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("functions");

/// Convert any `Display` error into a `RegistryError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| RegistryError::$variant(e.to_string())
    };
}

enum Location {
    File(PathBuf),
    Memory,
}

pub struct RedbRegistry {
    location: Location,
    db: RwLock<Option<Arc<Database>>>,
}

impl RedbRegistry {
    /// A registry stored at `path`. Nothing is opened until [`init`](FunctionRegistry::init).
    pub fn new(path: &Path) -> Self {
        Self {
            location: Location::File(path.to_path_buf()),
            db: RwLock::new(None),
        }
    }

    /// A redb registry on the in-memory backend (for testing).
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            db: RwLock::new(None),
        }
    }

    async fn db(&self) -> RegistryResult<Arc<Database>> {
        self.db.read().await.clone().ok_or(RegistryError::Closed)
    }

    fn open_database(&self) -> RegistryResult<Database> {
        let db = match &self.location {
            Location::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(map_err!(Init))?;
                }
                Database::create(path).map_err(map_err!(Init))?
            }
            Location::Memory => Database::builder()
                .create_with_backend(redb::backends::InMemoryBackend::new())
                .map_err(map_err!(Init))?,
        };
        // Opening a table in a write transaction creates it if absent.
        let txn = db.begin_write().map_err(map_err!(Init))?;
        txn.open_table(FUNCTIONS).map_err(map_err!(Init))?;
        txn.commit().map_err(map_err!(Init))?;
        Ok(db)
    }

    /// Write a record produced from the current value under `key`.
    async fn write_with<F>(&self, key: &str, produce: F) -> RegistryResult<()>
    where
        F: FnOnce(Option<FunctionDefinition>) -> RegistryResult<FunctionDefinition>,
    {
        let db = self.db().await?;
        let txn = db.begin_write().map_err(map_err!(Storage))?;
        {
            let mut table = txn.open_table(FUNCTIONS).map_err(map_err!(Storage))?;
            let existing = table
                .get(key)
                .map_err(map_err!(Storage))?
                .map(|guard| serde_json::from_slice::<FunctionDefinition>(guard.value()))
                .transpose()
                .map_err(map_err!(Deserialize))?;
            let record = produce(existing)?;
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        Ok(())
    }
}

#[async_trait]
impl FunctionRegistry for RedbRegistry {
    async fn init(&self) -> RegistryResult<()> {
        let mut slot = self.db.write().await;
        if slot.is_none() {
            *slot = Some(Arc::new(self.open_database()?));
            match &self.location {
                Location::File(path) => info!(?path, "redb registry opened"),
                Location::Memory => debug!("in-memory redb registry opened"),
            }
        }
        Ok(())
    }

    async fn create(&self, def: &FunctionDefinition) -> RegistryResult<FunctionKey> {
        let key = def.key();
        self.write_with(&key, |existing| match existing {
            Some(_) => Err(RegistryError::AlreadyExists(key.clone())),
            None => Ok(stamp_new(def, &key)),
        })
        .await?;
        info!(%key, "function created");
        Ok(key)
    }

    async fn update(&self, def: &FunctionDefinition) -> RegistryResult<FunctionKey> {
        let key = def.key();
        self.write_with(&key, |existing| {
            Ok(match existing {
                Some(existing) => merge_update(&existing, def),
                None => stamp_new(def, &key),
            })
        })
        .await?;
        info!(%key, "function upserted");
        Ok(key)
    }

    async fn get_by_key(&self, key: &str) -> RegistryResult<FunctionDefinition> {
        let db = self.db().await?;
        let txn = db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(FUNCTIONS).map_err(map_err!(Storage))?;
        match table.get(key).map_err(map_err!(Storage))? {
            Some(guard) => serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize)),
            None => Err(RegistryError::NotFound(key.to_string())),
        }
    }

    async fn delete_by_key(&self, key: &str) -> RegistryResult<FunctionKey> {
        let db = self.db().await?;
        let txn = db.begin_write().map_err(map_err!(Storage))?;
        let existed;
        {
            let mut table = txn.open_table(FUNCTIONS).map_err(map_err!(Storage))?;
            existed = table.remove(key).map_err(map_err!(Storage))?.is_some();
        }
        if !existed {
            txn.abort().map_err(map_err!(Storage))?;
            return Err(RegistryError::NotFound(key.to_string()));
        }
        txn.commit().map_err(map_err!(Storage))?;
        info!(%key, "function deleted");
        Ok(key.to_string())
    }

    async fn load(&self) -> RegistryResult<Vec<FunctionDefinition>> {
        let db = self.db().await?;
        let txn = db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(FUNCTIONS).map_err(map_err!(Storage))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Storage))? {
            let (_, value) = entry.map_err(map_err!(Storage))?;
            let def: FunctionDefinition =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(def);
        }
        debug!(size = results.len(), "registry loaded");
        Ok(results)
    }

    async fn sync(&self) -> RegistryResult<()> {
        // Every commit is already durable.
        self.db().await.map(|_| ())
    }

    async fn health(&self) -> bool {
        match self.db().await {
            Ok(db) => db.begin_read().is_ok(),
            Err(_) => false,
        }
    }

    async fn close(&self) -> RegistryResult<()> {
        self.db.write().await.take();
        debug!("redb registry closed");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redb"
    }
}
