//! On-disk staging of uploaded function sources.
//!
//! Sources live at `<base>/<tenant>/<name>.<ext>`. An empty tenant stages
//! under [`FALLBACK_TENANT`].

use std::path::{Component, Path, PathBuf};

use fngate_core::LanguagePack;
use tracing::{debug, info};

use crate::error::{RuntimeError, RuntimeResult};

/// Tenant directory used when a definition carries no tenant.
pub const FALLBACK_TENANT: &str = "public";

#[derive(Debug, Clone)]
pub struct SourceStaging {
    base: PathBuf,
}

impl SourceStaging {
    /// Stage under `base`, or under [`default_base_dir`](Self::default_base_dir).
    pub fn new(base: Option<&Path>) -> Self {
        let base = base.map(Path::to_path_buf).unwrap_or_else(Self::default_base_dir);
        debug!(?base, "source staging directory");
        Self { base }
    }

    /// `<local data dir>/fngate/functions`, or the temp dir when the
    /// platform reports no data directory.
    pub fn default_base_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("fngate")
            .join("functions")
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    /// Where the source for `tenant`/`name` lives.
    pub fn source_path(&self, tenant: &str, name: &str, pack: LanguagePack) -> RuntimeResult<PathBuf> {
        let tenant = if tenant.is_empty() { FALLBACK_TENANT } else { tenant };
        check_segment("tenant", tenant)?;
        check_segment("function name", name)?;
        Ok(self
            .base
            .join(tenant)
            .join(format!("{name}.{}", pack.extension())))
    }

    /// Write `source` to its staging path, replacing any previous upload.
    pub async fn stage(
        &self,
        tenant: &str,
        name: &str,
        pack: LanguagePack,
        source: &[u8],
    ) -> RuntimeResult<PathBuf> {
        let path = self.source_path(tenant, name, pack)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RuntimeError::Staging(format!("{}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, source)
            .await
            .map_err(|e| RuntimeError::Staging(format!("{}: {e}", path.display())))?;
        info!(?path, bytes = source.len(), "function source staged");
        Ok(path)
    }

    /// Remove a staged source. Missing files are not an error.
    pub async fn remove(&self, path: &Path) -> RuntimeResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(?path, "function source removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RuntimeError::Staging(format!("{}: {e}", path.display()))),
        }
    }
}

/// A tenant or function name must be a single plain path component.
fn check_segment(what: &str, value: &str) -> RuntimeResult<()> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(RuntimeError::Staging(format!("invalid {what} {value:?}"))),
    }
}
