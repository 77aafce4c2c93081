//! Backend selection and the shared registry handle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::error::{RegistryError, RegistryResult};
use crate::memory::InMemoryRegistry;
use crate::redb_store::RedbRegistry;
use crate::registry::FunctionRegistry;

/// File name of the redb registry inside the data directory.
pub const REDB_FILE_NAME: &str = "fngate.redb";

/// Supported registry backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    InMemory,
    Redb,
}

impl FromStr for RegistryKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> RegistryResult<Self> {
        match s {
            "inmemory" => Ok(RegistryKind::InMemory),
            "redb" => Ok(RegistryKind::Redb),
            other => Err(RegistryError::UnsupportedBackend(other.to_string())),
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryKind::InMemory => f.write_str("inmemory"),
            RegistryKind::Redb => f.write_str("redb"),
        }
    }
}

/// Builds the process's registry once and hands out the same handle after.
///
/// Owned by the entry point; there is no global instance.
pub struct RegistryFactory {
    data_dir: PathBuf,
    handle: OnceCell<Arc<dyn FunctionRegistry>>,
}

impl RegistryFactory {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            handle: OnceCell::new(),
        }
    }

    /// Return the registry, constructing and initializing it on first use.
    ///
    /// Later calls return the existing handle whatever `backend` they name.
    pub async fn get_or_open(&self, backend: &str) -> RegistryResult<Arc<dyn FunctionRegistry>> {
        if let Some(existing) = self.handle.get() {
            info!(requested = backend, active = existing.backend_name(), "return existing registry");
            return Ok(existing.clone());
        }
        let kind: RegistryKind = backend.parse()?;
        let handle = self
            .handle
            .get_or_try_init(|| async {
                let registry: Arc<dyn FunctionRegistry> = match kind {
                    RegistryKind::InMemory => Arc::new(InMemoryRegistry::new()),
                    RegistryKind::Redb => {
                        Arc::new(RedbRegistry::new(&self.data_dir.join(REDB_FILE_NAME)))
                    }
                };
                registry.init().await?;
                info!(backend = %kind, "registry initialized");
                Ok::<_, RegistryError>(registry)
            })
            .await?;
        Ok(handle.clone())
    }
}
