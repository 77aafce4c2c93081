//! fngated: the fngate daemon.
//!
//! Assembles the function registry, the runtime supervisor and the REST
//! API into one process.
//!
//! # Usage
//!
//! ```text
//! fngated serve --port 8081 --registry redb --data-dir /var/lib/fngate
//! fngated print-config --config fngate.toml
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use fngate_api::{ApiState, build_router};
use fngate_registry::RegistryFactory;
use fngate_runtime::{Supervisor, SupervisorConfig};
use fngated::{ServeArgs, reconcile};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fngated", about = "fngate function gateway daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, env = "FNGATE_LOG_FORMAT", value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway.
    Serve(ServeArgs),
    /// Print the effective configuration as TOML.
    PrintConfig(ServeArgs),
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,fngated=debug,fngate=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::PrintConfig(args) => {
            print!("{}", args.resolve()?.to_toml_string()?);
            Ok(())
        }
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.resolve()?;
    info!(port = config.server.port, backend = %config.registry.backend, "fngate starting");

    // ── Subsystems ─────────────────────────────────────────────

    let factory = RegistryFactory::new(&config.registry.data_dir);
    let registry = factory
        .get_or_open(&config.registry.backend)
        .await
        .context("failed to initialize the function registry")?;

    let supervisor = Arc::new(Supervisor::new(SupervisorConfig::from_gateway(&config)));
    info!(
        interpreter = %config.runtime.interpreter,
        loader = ?config.runtime.loader,
        "runtime supervisor initialized"
    );

    let shutdown = CancellationToken::new();
    reconcile(registry.as_ref(), &supervisor, &shutdown)
        .await
        .context("failed to reconcile the registry")?;

    // ── API server ─────────────────────────────────────────────

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let state = ApiState::new(registry.clone(), supervisor.clone(), config, shutdown.clone());
    info!(base_dir = ?state.staging.base_dir(), "staging function sources");
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "API server listening");

    let signal = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for the shutdown signal");
            }
            info!("shutdown signal received");
            signal.cancel();
        })
        .await?;

    // ── Teardown ───────────────────────────────────────────────

    supervisor.stop_all().await;
    registry.sync().await?;
    registry.close().await?;
    info!("fngate stopped");
    Ok(())
}
