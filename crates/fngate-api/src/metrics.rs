//! Prometheus text exposition.
//!
//! Provisioning outcomes are counted as requests complete; worker and
//! registry gauges are read at scrape time.

use std::sync::atomic::{AtomicU64, Ordering};

use fngate_runtime::RuntimeError;

use crate::error::ApiError;

/// Why a provisioning request failed, as reported in the `kind` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    PortExhausted,
    Spawn,
    Unhealthy,
    Cancelled,
    Staging,
    Registry,
}

impl FailureKind {
    pub const ALL: [FailureKind; 6] = [
        FailureKind::PortExhausted,
        FailureKind::Spawn,
        FailureKind::Unhealthy,
        FailureKind::Cancelled,
        FailureKind::Staging,
        FailureKind::Registry,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FailureKind::PortExhausted => "port_exhausted",
            FailureKind::Spawn => "spawn",
            FailureKind::Unhealthy => "unhealthy",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Staging => "staging",
            FailureKind::Registry => "registry",
        }
    }

    /// Classify an upload error. Caller mistakes are not provisioning
    /// failures and yield `None`.
    pub fn of(err: &ApiError) -> Option<Self> {
        match err {
            ApiError::Unauthorized(_) | ApiError::Validation(_) | ApiError::Topic(_) => None,
            ApiError::Registry(_) => Some(FailureKind::Registry),
            ApiError::Runtime(e) => match e {
                RuntimeError::UnsupportedLanguage(_) => None,
                RuntimeError::PortPoolExhausted { .. } => Some(FailureKind::PortExhausted),
                RuntimeError::Spawn { .. } => Some(FailureKind::Spawn),
                RuntimeError::WorkerUnhealthy { .. } => Some(FailureKind::Unhealthy),
                RuntimeError::Cancelled { .. } => Some(FailureKind::Cancelled),
                RuntimeError::Staging(_) => Some(FailureKind::Staging),
            },
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Provisioning counters shared by all handlers.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    provisioned: AtomicU64,
    failures: [AtomicU64; FailureKind::ALL.len()],
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_provisioned(&self) {
        self.provisioned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: FailureKind) {
        self.failures[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn provisioned(&self) -> u64 {
        self.provisioned.load(Ordering::Relaxed)
    }

    pub fn failures(&self, kind: FailureKind) -> u64 {
        self.failures[kind.index()].load(Ordering::Relaxed)
    }
}

/// Gauges sampled from the supervisor and registry for one scrape.
#[derive(Debug, Clone, Default)]
pub struct GaugeSnapshot {
    pub running_functions: usize,
    pub live_workers: usize,
    pub registered_functions: usize,
    pub last_worker_port: u16,
}

/// Render counters and gauges into Prometheus text format.
pub fn render_prometheus(metrics: &GatewayMetrics, gauges: &GaugeSnapshot) -> String {
    let mut out = String::new();

    out.push_str("# HELP fngate_provisions_total Uploads whose workers were provisioned and stored.\n");
    out.push_str("# TYPE fngate_provisions_total counter\n");
    out.push_str(&format!("fngate_provisions_total {}\n", metrics.provisioned()));

    out.push_str("# HELP fngate_provision_failures_total Uploads that failed while staging, provisioning or storing.\n");
    out.push_str("# TYPE fngate_provision_failures_total counter\n");
    for kind in FailureKind::ALL {
        out.push_str(&format!(
            "fngate_provision_failures_total{{kind=\"{}\"}} {}\n",
            kind.label(),
            metrics.failures(kind)
        ));
    }

    out.push_str("# HELP fngate_running_functions Functions with live workers.\n");
    out.push_str("# TYPE fngate_running_functions gauge\n");
    out.push_str(&format!("fngate_running_functions {}\n", gauges.running_functions));

    out.push_str("# HELP fngate_live_workers Live worker processes.\n");
    out.push_str("# TYPE fngate_live_workers gauge\n");
    out.push_str(&format!("fngate_live_workers {}\n", gauges.live_workers));

    out.push_str("# HELP fngate_registered_functions Functions in the registry.\n");
    out.push_str("# TYPE fngate_registered_functions gauge\n");
    out.push_str(&format!(
        "fngate_registered_functions {}\n",
        gauges.registered_functions
    ));

    out.push_str("# HELP fngate_last_worker_port Last port handed to a worker.\n");
    out.push_str("# TYPE fngate_last_worker_port gauge\n");
    out.push_str(&format!("fngate_last_worker_port {}\n", gauges.last_worker_port));

    out
}
