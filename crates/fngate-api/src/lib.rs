//! fngate-api: REST API for fngate.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/status` | Liveness |
//! | GET | `/healthz` | Registry health |
//! | GET | `/metrics` | Prometheus metrics |
//! | GET | `/v2/function/{tenant}` | List a tenant's functions |
//! | GET | `/v2/function/{tenant}/{function}` | Get one function |
//! | POST | `/v2/function/{tenant}/{function}` | Upload and provision a function |
//! | DELETE | `/v2/function/{tenant}/{function}` | Stop and delete a function |
//!
//! Callers are identified by the comma-separated subject list in
//! `x-fngate-subjects`, which an upstream token verifier sets. Access tokens
//! never leave the API unmasked.

pub mod error;
pub mod form;
pub mod handlers;
pub mod locks;
pub mod metrics;
pub mod response;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use fngate_authz::SubjectVerifier;
use fngate_core::GatewayConfig;
use fngate_registry::FunctionRegistry;
use fngate_runtime::{SourceStaging, Supervisor};
use tokio_util::sync::CancellationToken;

pub use error::{ApiError, ApiResult};
pub use locks::FunctionLocks;
pub use metrics::{FailureKind, GatewayMetrics, render_prometheus};
pub use response::ApiResponse;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<dyn FunctionRegistry>,
    pub supervisor: Arc<Supervisor>,
    pub verifier: Arc<SubjectVerifier>,
    pub staging: Arc<SourceStaging>,
    pub config: Arc<GatewayConfig>,
    pub metrics: Arc<GatewayMetrics>,
    /// Held across provisioning and the registry write of one function.
    pub function_locks: Arc<FunctionLocks>,
    /// Cancelled on server shutdown; provisioning runs under a child token.
    pub shutdown: CancellationToken,
}

impl ApiState {
    pub fn new(
        registry: Arc<dyn FunctionRegistry>,
        supervisor: Arc<Supervisor>,
        config: GatewayConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let verifier = SubjectVerifier::new(config.auth.super_roles.clone());
        let staging = SourceStaging::new(config.runtime.function_base_dir.as_deref());
        Self {
            registry,
            supervisor,
            verifier: Arc::new(verifier),
            staging: Arc::new(staging),
            config: Arc::new(config),
            metrics: Arc::new(GatewayMetrics::new()),
            function_locks: Arc::new(FunctionLocks::new()),
            shutdown,
        }
    }
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let functions = Router::new()
        .route("/function/{tenant}", get(handlers::list_functions))
        .route(
            "/function/{tenant}/{function}",
            get(handlers::get_function)
                .post(handlers::upsert_function)
                .delete(handlers::delete_function),
        );

    Router::new()
        .nest("/v2", functions)
        .route("/status", get(handlers::status))
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(state)
}
