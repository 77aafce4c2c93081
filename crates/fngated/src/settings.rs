//! Configuration layering: defaults, then the TOML file, then flags and
//! `FNGATE_*` environment variables.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use fngate_core::GatewayConfig;
use tracing::debug;

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// TOML configuration file.
    #[arg(long, env = "FNGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port the REST API listens on.
    #[arg(long, env = "FNGATE_PORT")]
    pub port: Option<u16>,

    /// Registry backend (`inmemory` or `redb`).
    #[arg(long, env = "FNGATE_REGISTRY")]
    pub registry: Option<String>,

    /// Directory for the durable registry.
    #[arg(long, env = "FNGATE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Root directory for staged function sources.
    #[arg(long, env = "FNGATE_FUNCTION_DIR")]
    pub function_dir: Option<PathBuf>,

    /// Interpreter that runs javascript workers.
    #[arg(long, env = "FNGATE_INTERPRETER")]
    pub interpreter: Option<String>,

    /// Loader program passed to the interpreter.
    #[arg(long, env = "FNGATE_LOADER")]
    pub loader: Option<PathBuf>,

    /// Worker ports are allocated above this value.
    #[arg(long, env = "FNGATE_PORT_BASE")]
    pub port_base: Option<u16>,

    /// Subjects allowed to act on every tenant.
    #[arg(long, env = "FNGATE_SUPER_ROLES", value_delimiter = ',')]
    pub super_roles: Vec<String>,

    /// Broker URL used when a request carries none.
    #[arg(long, env = "FNGATE_BROKER_URL")]
    pub broker_url: Option<String>,

    /// Broker URLs requests may name.
    #[arg(long, env = "FNGATE_ALLOWED_BROKER_URLS", value_delimiter = ',')]
    pub allowed_broker_urls: Vec<String>,

    /// Upper bound in seconds for provisioning one function.
    #[arg(long, env = "FNGATE_PROVISION_TIMEOUT")]
    pub provision_timeout_secs: Option<u64>,

    /// Per-probe timeout in milliseconds for worker health checks.
    #[arg(long, env = "FNGATE_HEALTH_TIMEOUT_MS")]
    pub health_timeout_ms: Option<u64>,

    /// Largest worker count one function may request.
    #[arg(long, env = "FNGATE_MAX_PARALLELISM")]
    pub max_parallelism: Option<u32>,
}

impl ServeArgs {
    /// Build the effective configuration.
    pub fn resolve(&self) -> anyhow::Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::from_file(path)
                .with_context(|| format!("failed to read config {}", path.display()))?,
            None => GatewayConfig::default(),
        };

        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(secs) = self.provision_timeout_secs {
            config.server.provision_timeout_secs = secs;
        }
        if let Some(backend) = &self.registry {
            config.registry.backend = backend.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.registry.data_dir = dir.clone();
        }
        if let Some(dir) = &self.function_dir {
            config.runtime.function_base_dir = Some(dir.clone());
        }
        if let Some(interpreter) = &self.interpreter {
            config.runtime.interpreter = interpreter.clone();
        }
        if let Some(loader) = &self.loader {
            config.runtime.loader = loader.clone();
        }
        if let Some(base) = self.port_base {
            config.runtime.port_base = base;
        }
        if let Some(ms) = self.health_timeout_ms {
            config.runtime.health_timeout_ms = ms;
        }
        if let Some(max) = self.max_parallelism {
            config.runtime.max_parallelism = max;
        }
        if !self.super_roles.is_empty() {
            config.auth.super_roles = self.super_roles.clone();
        }
        if let Some(url) = &self.broker_url {
            config.broker.default_url = Some(url.clone());
        }
        if !self.allowed_broker_urls.is_empty() {
            config.broker.allowed_urls = self.allowed_broker_urls.clone();
        }

        if config.runtime.port_base >= config.runtime.port_ceiling {
            anyhow::bail!(
                "worker port base {} must be below the ceiling {}",
                config.runtime.port_base,
                config.runtime.port_ceiling
            );
        }
        debug!(?config, "configuration resolved");
        Ok(config)
    }
}
