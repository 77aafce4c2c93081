//! Startup reconciliation.
//!
//! Worker processes do not outlive the gateway, so every URL a durable
//! registry still holds after a restart is stale. Reconciliation
//! re-provisions each running definition and writes the fresh worker URLs
//! back; stopped definitions just lose any leftover URLs.

use fngate_core::{FunctionKey, FunctionStatus};
use fngate_registry::{FunctionRegistry, RegistryResult};
use fngate_runtime::Supervisor;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub provisioned: usize,
    pub stopped: usize,
    /// Definitions whose workers could not be started, with the reason.
    pub failed: Vec<(FunctionKey, String)>,
}

pub async fn reconcile(
    registry: &dyn FunctionRegistry,
    supervisor: &Supervisor,
    cancel: &CancellationToken,
) -> RegistryResult<ReconcileReport> {
    let mut report = ReconcileReport::default();

    for mut def in registry.load().await? {
        let key = def.key();
        match def.status {
            FunctionStatus::Stopped => {
                if !def.worker_urls.is_empty() {
                    def.worker_urls.clear();
                    registry.update(&def).await?;
                }
                report.stopped += 1;
            }
            FunctionStatus::Running => {
                let provisioned = supervisor.provision(&def, cancel).await;
                match provisioned {
                    Ok(urls) => {
                        def.worker_urls = urls;
                        registry.update(&def).await?;
                        report.provisioned += 1;
                    }
                    Err(e) => {
                        warn!(%key, error = %e, "failed to restore function workers");
                        def.worker_urls.clear();
                        registry.update(&def).await?;
                        report.failed.push((key, e.to_string()));
                    }
                }
            }
        }
    }

    info!(
        provisioned = report.provisioned,
        stopped = report.stopped,
        failed = report.failed.len(),
        "registry reconciled"
    );
    Ok(report)
}
