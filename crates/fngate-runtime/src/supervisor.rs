//! Worker supervision.
//!
//! The [`Supervisor`] turns a function definition into `parallelism` healthy
//! worker processes and keeps them in an instance table keyed by function
//! key. The table exclusively owns every live worker: replacing or removing
//! an entry stops the processes it held.

use std::collections::HashMap;
use std::time::Duration;

use fngate_core::{
    FunctionDefinition, FunctionKey, FunctionStatus, GatewayConfig, LanguagePack, function_key,
};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{RuntimeError, RuntimeResult};
use crate::ports::PortAllocator;
use crate::probe::{RetryPolicy, health_check_retry};
use crate::worker::{FunctionInstance, WorkerCommand, spawn_worker};

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub command: WorkerCommand,
    /// Ports are drawn strictly above this value.
    pub port_seed: u16,
    pub port_ceiling: u16,
    pub reserved_ports: Vec<u16>,
    pub probe_timeout: Duration,
    pub retry: RetryPolicy,
}

impl SupervisorConfig {
    pub fn from_gateway(config: &GatewayConfig) -> Self {
        Self {
            command: WorkerCommand {
                interpreter: config.runtime.interpreter.clone(),
                loader: config.runtime.loader.clone(),
            },
            port_seed: config.runtime.port_base,
            port_ceiling: config.runtime.port_ceiling,
            reserved_ports: config.reserved_worker_ports(),
            probe_timeout: Duration::from_millis(config.runtime.health_timeout_ms),
            retry: RetryPolicy::default(),
        }
    }
}

pub struct Supervisor {
    config: SupervisorConfig,
    ports: PortAllocator,
    instances: RwLock<HashMap<FunctionKey, Vec<FunctionInstance>>>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let ports = PortAllocator::new(
            config.port_seed,
            config.port_ceiling,
            config.reserved_ports.clone(),
        );
        Self {
            config,
            ports,
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Start one worker for `def`, record it, and return its base URL.
    pub async fn create_instance(
        &self,
        def: &FunctionDefinition,
        cancel: &CancellationToken,
    ) -> RuntimeResult<String> {
        let instance = self.launch(def, cancel).await?;
        let uri = instance.uri.clone();
        self.instances
            .write()
            .await
            .entry(def.key())
            .or_default()
            .push(instance);
        Ok(uri)
    }

    async fn launch(
        &self,
        def: &FunctionDefinition,
        cancel: &CancellationToken,
    ) -> RuntimeResult<FunctionInstance> {
        match def.language_pack {
            LanguagePack::Javascript => self.start_worker(def, cancel).await,
        }
    }

    /// Spawn one worker and wait until it reports healthy.
    ///
    /// The returned instance is not yet recorded. A worker that never turns
    /// healthy, or whose wait is cancelled, is killed before returning.
    pub async fn start_worker(
        &self,
        def: &FunctionDefinition,
        cancel: &CancellationToken,
    ) -> RuntimeResult<FunctionInstance> {
        let port = self.ports.allocate()?;
        let instance = spawn_worker(&self.config.command, &def.key(), port, &def.source_file_path)?;

        let verified = health_check_retry(
            &instance.uri,
            &self.config.retry,
            self.config.probe_timeout,
            cancel,
        )
        .await;
        match verified {
            Ok(()) => Ok(instance),
            Err(e) => {
                warn!(instance = %instance.id, error = %e, "discarding worker");
                instance.stop();
                Err(e)
            }
        }
    }

    /// Bring `def` to `parallelism` healthy workers and return their URLs.
    ///
    /// The new batch replaces whatever the table held for this function,
    /// and only once every worker in it is healthy. If any worker fails, the
    /// workers already started for the batch are stopped and the previous
    /// entry is left alone. A stopped definition provisions nothing and
    /// clears its entry.
    pub async fn provision(
        &self,
        def: &FunctionDefinition,
        cancel: &CancellationToken,
    ) -> RuntimeResult<Vec<String>> {
        let key = def.key();
        if def.status == FunctionStatus::Stopped {
            let stopped = self.stop(&def.tenant, &def.name).await;
            debug!(%key, stopped, "function is stopped, nothing to provision");
            return Ok(Vec::new());
        }

        let mut batch = Vec::with_capacity(def.parallelism as usize);
        for _ in 0..def.parallelism {
            match self.launch(def, cancel).await {
                Ok(instance) => batch.push(instance),
                Err(e) => {
                    warn!(%key, started = batch.len(), error = %e, "provisioning failed");
                    batch.into_iter().for_each(FunctionInstance::stop);
                    return Err(e);
                }
            }
        }

        let urls: Vec<String> = batch.iter().map(|i| i.uri.clone()).collect();
        let previous = self.instances.write().await.insert(key.clone(), batch);
        if let Some(previous) = previous {
            debug!(%key, replaced = previous.len(), "replacing workers");
            previous.into_iter().for_each(FunctionInstance::stop);
        }
        info!(%key, workers = urls.len(), "function provisioned");
        Ok(urls)
    }

    /// Stop every worker of `tenant`/`name`. Returns how many were stopped.
    pub async fn stop(&self, tenant: &str, name: &str) -> usize {
        let key = function_key(tenant, name);
        match self.instances.write().await.remove(&key) {
            Some(workers) => {
                let count = workers.len();
                workers.into_iter().for_each(FunctionInstance::stop);
                info!(%key, count, "workers stopped");
                count
            }
            None => 0,
        }
    }

    /// Stop every worker of every function.
    pub async fn stop_all(&self) -> usize {
        let drained: Vec<_> = self.instances.write().await.drain().collect();
        let mut count = 0;
        for (_, workers) in drained {
            count += workers.len();
            workers.into_iter().for_each(FunctionInstance::stop);
        }
        info!(count, "all workers stopped");
        count
    }

    /// Base URLs of the live workers recorded for `key`.
    pub async fn instance_urls(&self, key: &str) -> Vec<String> {
        self.instances
            .read()
            .await
            .get(key)
            .map(|workers| workers.iter().map(|w| w.uri.clone()).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    async fn instance_pids(&self, key: &str) -> Vec<u32> {
        self.instances
            .read()
            .await
            .get(key)
            .map(|workers| workers.iter().filter_map(|w| w.pid).collect())
            .unwrap_or_default()
    }

    /// Functions with at least one live worker.
    pub async fn function_count(&self) -> usize {
        self.instances.read().await.len()
    }

    /// Live workers across all functions.
    pub async fn worker_count(&self) -> usize {
        self.instances.read().await.values().map(Vec::len).sum()
    }

    /// Last worker port handed out.
    pub fn last_port(&self) -> u16 {
        self.ports.last_allocated()
    }
}

/// Parse a language pack name as the supervisor reports it.
pub fn parse_language_pack(raw: &str) -> RuntimeResult<LanguagePack> {
    raw.parse()
        .map_err(|_| RuntimeError::UnsupportedLanguage(raw.to_string()))
}
