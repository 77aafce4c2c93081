//! Worker health probing.
//!
//! A worker counts as ready only when `GET <base>/health` answers exactly
//! `200 OK`. Readiness after spawn is verified with a bounded retry whose
//! wait grows geometrically and which aborts on cancellation.

use std::time::Duration;

use http::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{RuntimeError, RuntimeResult};

/// Path every worker serves its liveness answer on.
pub const HEALTH_PATH: &str = "/health";

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The health endpoint returned 200.
    Healthy,
    /// The health endpoint answered with any other status.
    Unhealthy(StatusCode),
    /// No answer: connection refused, handshake error, or timeout.
    Failed,
}

/// Bounded readiness retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    /// Three probes, waiting 100ms, 400ms, then 1600ms after each failure.
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(100),
            factor: 4,
        }
    }
}

impl RetryPolicy {
    /// Wait after the failed probe numbered `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * self.factor.saturating_pow(attempt)
    }
}

fn probe_address(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let port = url.port_or_known_default()?;
    Some(format!("{host}:{port}"))
}

/// Perform one `GET <base_url>/health`.
pub async fn http_probe(base_url: &str, timeout: Duration) -> ProbeResult {
    let Some(address) = Url::parse(base_url).ok().as_ref().and_then(probe_address) else {
        debug!(url = base_url, "health probe target is not a URL");
        return ProbeResult::Failed;
    };

    let result = tokio::time::timeout(timeout, async {
        let stream = match tokio::net::TcpStream::connect(&address).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %address, "health probe connection failed");
                return ProbeResult::Failed;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %address, "health probe handshake failed");
                return ProbeResult::Failed;
            }
        };

        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method("GET")
            .uri(HEALTH_PATH)
            .header("host", address.as_str())
            .header("user-agent", "fngate-runtime/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, %address, "health probe request invalid");
                return ProbeResult::Failed;
            }
        };

        match sender.send_request(req).await {
            Ok(resp) if resp.status() == StatusCode::OK => ProbeResult::Healthy,
            Ok(resp) => {
                debug!(status = %resp.status(), %address, "health probe not ok");
                ProbeResult::Unhealthy(resp.status())
            }
            Err(e) => {
                debug!(error = %e, %address, "health probe request failed");
                ProbeResult::Failed
            }
        }
    })
    .await;

    result.unwrap_or_else(|_| {
        debug!(%address, "health probe timed out");
        ProbeResult::Failed
    })
}

/// Single readiness check; any answer other than 200 is an error.
pub async fn health_check(base_url: &str, timeout: Duration) -> RuntimeResult<()> {
    match http_probe(base_url, timeout).await {
        ProbeResult::Healthy => Ok(()),
        _ => Err(RuntimeError::WorkerUnhealthy {
            url: base_url.to_string(),
            attempts: 1,
        }),
    }
}

/// Probe until healthy, at most `policy.attempts` times.
///
/// Sleeps `policy.delay(i)` after failed attempt `i`, including the last.
/// Returns `Cancelled` as soon as `cancel` fires, whether mid-probe or
/// mid-sleep.
pub async fn health_check_retry(
    base_url: &str,
    policy: &RetryPolicy,
    probe_timeout: Duration,
    cancel: &CancellationToken,
) -> RuntimeResult<()> {
    let cancelled = || RuntimeError::Cancelled {
        url: base_url.to_string(),
    };

    for attempt in 0..policy.attempts {
        let probe = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            probe = http_probe(base_url, probe_timeout) => probe,
        };
        if probe == ProbeResult::Healthy {
            info!(url = base_url, attempt, "worker is healthy");
            return Ok(());
        }

        let delay = policy.delay(attempt);
        debug!(url = base_url, attempt, ?probe, ?delay, "worker not ready, backing off");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = tokio::time::sleep(delay) => {}
        }
    }

    warn!(url = base_url, attempts = policy.attempts, "worker never became healthy");
    Err(RuntimeError::WorkerUnhealthy {
        url: base_url.to_string(),
        attempts: policy.attempts,
    })
}
