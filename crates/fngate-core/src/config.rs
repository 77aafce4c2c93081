//! fngate.toml configuration.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! The daemon layers CLI flags and `FNGATE_*` environment variables on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub runtime: RuntimeConfig,
    pub auth: AuthConfig,
    pub broker: BrokerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Upper bound for a whole provisioning request.
    pub provision_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            provision_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Backend type: `inmemory` or `redb`.
    pub backend: String,
    /// Directory holding the redb file.
    pub data_dir: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: "inmemory".to_string(),
            data_dir: PathBuf::from("/var/lib/fngate"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Root of staged function sources. Platform default when unset.
    pub function_base_dir: Option<PathBuf>,
    /// Interpreter used for the javascript pack.
    pub interpreter: String,
    /// Loader program handed to the interpreter.
    pub loader: PathBuf,
    /// Port counter seed; the first worker gets `port_base + 1`.
    pub port_base: u16,
    /// Last usable worker port.
    pub port_ceiling: u16,
    /// Ports never handed to workers (the gateway's own listeners).
    pub reserved_ports: Vec<u16>,
    /// Timeout of a single health probe.
    pub health_timeout_ms: u64,
    pub max_parallelism: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            function_base_dir: None,
            interpreter: "node".to_string(),
            loader: PathBuf::from("function-pack/js/loader.js"),
            port_base: 2999,
            port_ceiling: 49151,
            reserved_ports: vec![8085],
            health_timeout_ms: 2000,
            max_parallelism: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Subjects granted access to every tenant.
    pub super_roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BrokerConfig {
    /// Used when a request carries no broker URL header.
    pub default_url: Option<String>,
    /// Accepted broker URLs; empty accepts any.
    pub allowed_urls: Vec<String>,
}

impl GatewayConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Ports a worker must never receive: configured reservations plus the
    /// gateway's own listener.
    pub fn reserved_worker_ports(&self) -> Vec<u16> {
        let mut ports = self.runtime.reserved_ports.clone();
        if !ports.contains(&self.server.port) {
            ports.push(self.server.port);
        }
        ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.registry.backend, "inmemory");
        assert_eq!(config.runtime.port_ceiling, 49151);
        assert!(config.auth.super_roles.is_empty());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let toml_str = r#"
[registry]
backend = "redb"

[auth]
super_roles = ["superuser", "admin"]

[runtime]
interpreter = "/usr/local/bin/node"
"#;
        let config: GatewayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.registry.backend, "redb");
        assert_eq!(config.registry.data_dir, PathBuf::from("/var/lib/fngate"));
        assert_eq!(config.auth.super_roles, vec!["superuser", "admin"]);
        assert_eq!(config.runtime.interpreter, "/usr/local/bin/node");
        assert_eq!(config.runtime.port_base, 2999);
    }

    #[test]
    fn reserved_ports_include_listener() {
        let mut config = GatewayConfig::default();
        config.server.port = 9000;
        assert_eq!(config.reserved_worker_ports(), vec![8085, 9000]);
    }

    #[test]
    fn from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fngate.toml");
        let config = GatewayConfig::default();
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = GatewayConfig::from_file(&path).unwrap();
        assert_eq!(loaded.server.port, config.server.port);
        assert_eq!(loaded.runtime.loader, config.runtime.loader);
    }
}
