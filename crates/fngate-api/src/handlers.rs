//! REST API handlers.
//!
//! Every function route first checks that the caller's subjects grant the
//! path tenant. Records are redacted before they are returned.

use std::time::Duration;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use fngate_core::{FunctionDefinition, FunctionKey, TopicBinding, function_key};
use fngate_registry::RegistryError;
use fngate_runtime::RuntimeError;
use serde::Serialize;
use tracing::{info, warn};

use crate::ApiState;
use crate::error::{ApiError, ApiResult};
use crate::form::{FunctionUpload, UploadContext};
use crate::metrics::{FailureKind, GaugeSnapshot, render_prometheus};
use crate::response::ApiResponse;

/// Comma-separated subjects of the verified caller.
pub const SUBJECTS_HEADER: &str = "x-fngate-subjects";

/// Broker the function's topics live on.
pub const BROKER_URL_HEADER: &str = "x-broker-url";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn subjects(headers: &HeaderMap) -> &str {
    header_value(headers, SUBJECTS_HEADER).unwrap_or_default()
}

fn authorize(state: &ApiState, headers: &HeaderMap, tenant: &str) -> ApiResult<()> {
    if state.verifier.verify_subject(tenant, subjects(headers)) {
        Ok(())
    } else {
        warn!(%tenant, "incorrect subject");
        Err(ApiError::Unauthorized("incorrect subject".to_string()))
    }
}

fn bearer_token(headers: &HeaderMap) -> String {
    header_value(headers, header::AUTHORIZATION.as_str())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim().to_string())
        .unwrap_or_default()
}

/// Broker URL from the request or the configured default, checked against
/// the allow-list when one is configured.
fn broker_url(state: &ApiState, headers: &HeaderMap) -> ApiResult<Option<String>> {
    let url = header_value(headers, BROKER_URL_HEADER)
        .map(str::to_string)
        .or_else(|| state.config.broker.default_url.clone());
    let allowed = &state.config.broker.allowed_urls;
    if let Some(url) = &url {
        if !allowed.is_empty() && !allowed.contains(url) {
            return Err(ApiError::Unauthorized(format!("broker URL {url} is not allowed")));
        }
    }
    Ok(url)
}

/// Tenant and function names become path components on disk.
fn check_name(what: &str, value: &str) -> ApiResult<()> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(ApiError::Validation(format!("invalid {what} name {value:?}")));
    }
    Ok(())
}

fn bindings(def: &FunctionDefinition) -> impl Iterator<Item = &TopicBinding> {
    [&def.input_topic, &def.output_topic, &def.log_topic]
        .into_iter()
        .flatten()
}

// ── Service ────────────────────────────────────────────────────

/// GET /status
pub async fn status() -> impl IntoResponse {
    ApiResponse::ok("ok")
}

#[derive(Serialize)]
struct RegistryHealth {
    backend: &'static str,
    healthy: bool,
}

/// GET /healthz
pub async fn healthz(State(state): State<ApiState>) -> impl IntoResponse {
    let report = RegistryHealth {
        backend: state.registry.backend_name(),
        healthy: state.registry.health().await,
    };
    let code = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, ApiResponse::ok(report))
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let gauges = GaugeSnapshot {
        running_functions: state.supervisor.function_count().await,
        live_workers: state.supervisor.worker_count().await,
        registered_functions: state.registry.load().await.map(|d| d.len()).unwrap_or_default(),
        last_worker_port: state.supervisor.last_port(),
    };
    let body = render_prometheus(&state.metrics, &gauges);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

// ── Functions ──────────────────────────────────────────────────

/// GET /v2/function/:tenant
pub async fn list_functions(
    State(state): State<ApiState>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<Vec<FunctionDefinition>>>> {
    authorize(&state, &headers, &tenant)?;
    let mut functions: Vec<_> = state
        .registry
        .load()
        .await?
        .into_iter()
        .filter(|def| def.tenant == tenant)
        .map(|def| def.redacted())
        .collect();
    functions.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(ApiResponse::ok(functions))
}

/// GET /v2/function/:tenant/:function
pub async fn get_function(
    State(state): State<ApiState>,
    Path((tenant, function)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<FunctionDefinition>>> {
    authorize(&state, &headers, &tenant)?;
    let def = state.registry.get_by_topic(&tenant, &function).await?;
    Ok(ApiResponse::ok(def.redacted()))
}

/// POST /v2/function/:tenant/:function
///
/// Stages the uploaded source, brings the function to its requested worker
/// count, and stores the definition with the new worker URLs. An upload
/// without `source` reuses the source already staged for the function.
pub async fn upsert_function(
    State(state): State<ApiState>,
    Path((tenant, function)): Path<(String, String)>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    check_name("tenant", &tenant)?;
    check_name("function", &function)?;
    authorize(&state, &headers, &tenant)?;

    let ctx = UploadContext {
        tenant,
        name: function,
        broker_url: broker_url(&state, &headers)?,
        access_token: bearer_token(&headers),
    };
    let upload = FunctionUpload::read(multipart).await?;
    let def = upload.to_definition(&ctx, state.config.runtime.max_parallelism)?;

    for binding in bindings(&def) {
        if !state
            .verifier
            .verify_subject_for_topic(&binding.topic_full_name, subjects(&headers))
        {
            warn!(topic = %binding.topic_full_name, "subject may not bind to topic");
            return Err(ApiError::Unauthorized(format!(
                "incorrect subject for topic {}",
                binding.topic_full_name
            )));
        }
    }

    let stored = store_function(&state, def, upload.source.as_deref()).await;
    match &stored {
        Ok(_) => state.metrics.record_provisioned(),
        Err(e) => {
            if let Some(kind) = FailureKind::of(e) {
                state.metrics.record_failure(kind);
            }
        }
    }
    let stored = stored?;
    info!(key = %stored.id, status = ?stored.status, workers = stored.worker_urls.len(), "function upserted");
    Ok((StatusCode::CREATED, ApiResponse::ok(stored.redacted())))
}

/// Stage, provision and record `def` while holding its function lock.
///
/// A first upload that fails leaves no staged source behind.
async fn store_function(
    state: &ApiState,
    mut def: FunctionDefinition,
    source: Option<&[u8]>,
) -> ApiResult<FunctionDefinition> {
    let key = def.key();
    let _guard = state.function_locks.lock(&key).await;

    let previous = match state.registry.get_by_key(&key).await {
        Ok(existing) => Some(existing),
        Err(RegistryError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };
    def.source_file_path = match (source, &previous) {
        (Some(source), _) => {
            state
                .staging
                .stage(&def.tenant, &def.name, def.language_pack, source)
                .await?
        }
        (None, Some(existing)) => existing.source_file_path.clone(),
        (None, None) => {
            return Err(ApiError::Validation("function source is missing".to_string()));
        }
    };

    match provision_and_record(state, &mut def).await {
        Ok(key) => Ok(state.registry.get_by_key(&key).await?),
        Err(e) => {
            if previous.is_none() {
                if let Err(rm) = state.staging.remove(&def.source_file_path).await {
                    warn!(%key, error = %rm, "failed to remove staged source");
                }
            }
            Err(e)
        }
    }
}

async fn provision_and_record(
    state: &ApiState,
    def: &mut FunctionDefinition,
) -> ApiResult<FunctionKey> {
    let cancel = state.shutdown.child_token();
    let limit = Duration::from_secs(state.config.server.provision_timeout_secs);
    let provisioned = tokio::time::timeout(limit, state.supervisor.provision(def, &cancel)).await;
    def.worker_urls = match provisioned {
        Ok(urls) => urls?,
        Err(_) => {
            cancel.cancel();
            warn!(key = %def.key(), ?limit, "provisioning timed out");
            return Err(RuntimeError::Cancelled { url: def.key() }.into());
        }
    };

    match state.registry.update(def).await {
        Ok(key) => Ok(key),
        Err(e) => {
            state.supervisor.stop(&def.tenant, &def.name).await;
            Err(e.into())
        }
    }
}

#[derive(Serialize)]
pub struct Deleted {
    pub id: String,
    pub stopped_workers: usize,
}

/// DELETE /v2/function/:tenant/:function
pub async fn delete_function(
    State(state): State<ApiState>,
    Path((tenant, function)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<Deleted>>> {
    authorize(&state, &headers, &tenant)?;
    let _guard = state.function_locks.lock(&function_key(&tenant, &function)).await;
    let def = state.registry.get_by_topic(&tenant, &function).await?;

    let stopped_workers = state.supervisor.stop(&tenant, &function).await;
    let id = state.registry.delete(&tenant, &function).await?;
    if let Err(e) = state.staging.remove(&def.source_file_path).await {
        warn!(%id, error = %e, "failed to remove staged source");
    }
    info!(%id, stopped_workers, "function deleted");
    Ok(ApiResponse::ok(Deleted {
        id,
        stopped_workers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use fngate_core::GatewayConfig;
    use fngate_registry::{FunctionRegistry, InMemoryRegistry};
    use fngate_runtime::{Supervisor, SupervisorConfig};
    use http_body_util::BodyExt;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::build_router;

    const BOUNDARY: &str = "fngate-test-boundary";
    const SOURCE: &str = "module.exports = { trigger: (req, res) => res.end('ok') }";

    struct Harness {
        router: Router,
        registry: Arc<dyn FunctionRegistry>,
        supervisor: Arc<Supervisor>,
        staging_dir: PathBuf,
        _dir: tempfile::TempDir,
    }

    async fn harness_with(configure: impl FnOnce(&mut GatewayConfig)) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GatewayConfig::default();
        config.auth.super_roles = vec!["superuser".to_string()];
        config.runtime.function_base_dir = Some(dir.path().to_path_buf());
        config.runtime.interpreter = "fngate-no-such-interpreter".to_string();
        configure(&mut config);

        let registry: Arc<dyn FunctionRegistry> = Arc::new(InMemoryRegistry::new());
        registry.init().await.unwrap();
        let supervisor = Arc::new(Supervisor::new(SupervisorConfig::from_gateway(&config)));
        let state = ApiState::new(
            registry.clone(),
            supervisor.clone(),
            config,
            CancellationToken::new(),
        );
        Harness {
            router: build_router(state),
            registry,
            supervisor,
            staging_dir: dir.path().to_path_buf(),
            _dir: dir,
        }
    }

    async fn harness() -> Harness {
        harness_with(|_| {}).await
    }

    fn multipart_body(fields: &[(&str, &str)], source: Option<&str>) -> Body {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        if let Some(source) = source {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"source\"; filename=\"handler.js\"\r\nContent-Type: application/javascript\r\n\r\n{source}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Body::from(body)
    }

    fn upload(
        path: &str,
        subjects: Option<&str>,
        fields: &[(&str, &str)],
        source: Option<&str>,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::AUTHORIZATION, "Bearer secret-token")
            .header(BROKER_URL_HEADER, "pulsar://broker.example.com:6650");
        if let Some(subjects) = subjects {
            builder = builder.header(SUBJECTS_HEADER, subjects);
        }
        builder.body(multipart_body(fields, source)).unwrap()
    }

    fn request(method: &str, path: &str, subjects: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(path)
            .header(SUBJECTS_HEADER, subjects)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    const STOPPED_TOPIC_FUNCTION: &[(&str, &str)] = &[
        ("language-pack", "javascript"),
        ("function-status", "stopped"),
        ("input-topic", "persistent://acme/ns1/images"),
        ("subscription-name", "resizer"),
        ("output-topic", "persistent://acme/ns1/thumbs"),
    ];

    #[tokio::test]
    async fn status_is_ok() {
        let h = harness().await;
        let req = Request::builder().uri("/status").body(Body::empty()).unwrap();
        let resp = h.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn healthz_follows_registry() {
        let h = harness().await;
        let req = || Request::builder().uri("/healthz").body(Body::empty()).unwrap();

        let resp = h.router.clone().oneshot(req()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        h.registry.close().await.unwrap();
        let resp = h.router.oneshot(req()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(resp).await["data"]["healthy"], false);
    }

    #[tokio::test]
    async fn stopped_upload_is_stored_and_redacted() {
        let h = harness().await;
        let resp = h
            .router
            .oneshot(upload(
                "/v2/function/acme/resize",
                Some("acme-admin"),
                STOPPED_TOPIC_FUNCTION,
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], "acmeresize");
        assert_eq!(json["data"]["status"], "stopped");
        assert_eq!(json["data"]["input_topic"]["access_token"], "***");
        assert_eq!(json["data"]["output_topic"]["access_token"], "***");
        assert_eq!(json["data"]["worker_urls"], serde_json::json!([]));

        let stored = h.registry.get_by_key("acmeresize").await.unwrap();
        assert_eq!(stored.input_topic.unwrap().access_token, "secret-token");
        let staged = h.staging_dir.join("acme").join("resize.js");
        assert_eq!(stored.source_file_path, staged);
        assert_eq!(std::fs::read_to_string(staged).unwrap(), SOURCE);
    }

    #[tokio::test]
    async fn wrong_or_missing_subject_is_unauthorized() {
        let h = harness().await;
        let resp = h
            .router
            .clone()
            .oneshot(upload(
                "/v2/function/acme/resize",
                Some("beta-admin"),
                STOPPED_TOPIC_FUNCTION,
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = h
            .router
            .oneshot(upload(
                "/v2/function/acme/resize",
                None,
                STOPPED_TOPIC_FUNCTION,
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(h.registry.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_topic_is_unauthorized() {
        let h = harness().await;
        let resp = h
            .router
            .oneshot(upload(
                "/v2/function/acme/resize",
                Some("acme"),
                &[
                    ("function-status", "stopped"),
                    ("input-topic", "persistent://beta/ns1/images"),
                    ("subscription-name", "resizer"),
                ],
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn superuser_may_bind_any_tenant() {
        let h = harness().await;
        let resp = h
            .router
            .oneshot(upload(
                "/v2/function/acme/resize",
                Some("superuser"),
                &[
                    ("function-status", "stopped"),
                    ("input-topic", "persistent://beta/ns1/images"),
                    ("subscription-name", "resizer"),
                ],
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn disallowed_broker_is_unauthorized() {
        let h = harness_with(|c| c.broker.allowed_urls = vec!["pulsar://other:6650".to_string()])
            .await;
        let resp = h
            .router
            .oneshot(upload(
                "/v2/function/acme/resize",
                Some("acme"),
                STOPPED_TOPIC_FUNCTION,
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_uploads_are_unprocessable() {
        let h = harness().await;
        let cases: &[&[(&str, &str)]] = &[
            &[("language-pack", "cobol"), ("trigger-type", "http")],
            &[("parallelism", "0"), ("trigger-type", "http")],
            &[("trigger-type", "smoke-signal")],
            &[("input-topic", "persistent://acme/ns1/images")],
            &[
                ("input-topic", "persistent://acme/ns1/images"),
                ("subscription-name", "resizer"),
                ("subscription-type", "fanout"),
            ],
        ];
        for fields in cases {
            let resp = h
                .router
                .clone()
                .oneshot(upload("/v2/function/acme/resize", Some("acme"), fields, Some(SOURCE)))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{fields:?}");
        }
    }

    #[tokio::test]
    async fn first_upload_needs_source() {
        let h = harness().await;
        let resp = h
            .router
            .oneshot(upload(
                "/v2/function/acme/resize",
                Some("acme"),
                STOPPED_TOPIC_FUNCTION,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn reupload_without_source_keeps_staged_file() {
        let h = harness().await;
        let first = h
            .router
            .clone()
            .oneshot(upload(
                "/v2/function/acme/resize",
                Some("acme"),
                STOPPED_TOPIC_FUNCTION,
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        let created = h.registry.get_by_key("acmeresize").await.unwrap();

        let mut fields = STOPPED_TOPIC_FUNCTION.to_vec();
        fields.push(("parallelism", "2"));
        let second = h
            .router
            .oneshot(upload("/v2/function/acme/resize", Some("acme"), &fields, None))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CREATED);

        let updated = h.registry.get_by_key("acmeresize").await.unwrap();
        assert_eq!(updated.parallelism, 2);
        assert_eq!(updated.source_file_path, created.source_file_path);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn failed_spawn_stores_nothing() {
        let h = harness().await;
        let resp = h
            .router
            .oneshot(upload(
                "/v2/function/acme/resize",
                Some("acme"),
                &[("trigger-type", "http")],
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await["success"], false);
        assert!(h.registry.load().await.unwrap().is_empty());
        assert!(h.supervisor.instance_urls("acmeresize").await.is_empty());
    }

    #[tokio::test]
    async fn failed_first_upload_removes_staged_source() {
        let h = harness().await;
        let resp = h
            .router
            .oneshot(upload(
                "/v2/function/acme/resize",
                Some("acme"),
                &[("trigger-type", "http")],
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!h.staging_dir.join("acme").join("resize.js").exists());
    }

    #[tokio::test]
    async fn failed_reupload_keeps_previous_record() {
        let h = harness().await;
        let first = h
            .router
            .clone()
            .oneshot(upload(
                "/v2/function/acme/resize",
                Some("acme"),
                STOPPED_TOPIC_FUNCTION,
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        let created = h.registry.get_by_key("acmeresize").await.unwrap();

        let second = h
            .router
            .oneshot(upload(
                "/v2/function/acme/resize",
                Some("acme"),
                &[("trigger-type", "http")],
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let kept = h.registry.get_by_key("acmeresize").await.unwrap();
        assert_eq!(kept.updated_at, created.updated_at);
        assert!(kept.source_file_path.exists());
    }

    /// Binds `count` consecutive loopback ports serving `GET /health`.
    #[cfg(unix)]
    async fn health_servers(count: u16) -> u16 {
        use axum::routing::get;

        'search: loop {
            let first = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = first.local_addr().unwrap().port();
            if base.checked_add(count).is_none() {
                continue;
            }
            let mut listeners = vec![first];
            for offset in 1..count {
                match tokio::net::TcpListener::bind(("127.0.0.1", base + offset)).await {
                    Ok(listener) => listeners.push(listener),
                    Err(_) => continue 'search,
                }
            }
            for listener in listeners {
                let app = Router::new().route("/health", get(|| async { "ok" }));
                tokio::spawn(async move {
                    axum::serve(listener, app).await.unwrap();
                });
            }
            return base;
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn concurrent_uploads_store_the_live_batch() {
        let base = health_servers(2).await;
        let loader_dir = tempfile::tempdir().unwrap();
        let loader = loader_dir.path().join("loader.sh");
        std::fs::write(&loader, "sleep 30\n").unwrap();
        let h = harness_with(|c| {
            c.runtime.interpreter = "sh".to_string();
            c.runtime.loader = loader.clone();
            c.runtime.port_base = base - 1;
            c.runtime.port_ceiling = u16::MAX;
        })
        .await;

        let send = |router: Router| {
            router.oneshot(upload(
                "/v2/function/acme/resize",
                Some("acme"),
                &[("trigger-type", "http")],
                Some(SOURCE),
            ))
        };
        let (a, b) = tokio::join!(send(h.router.clone()), send(h.router.clone()));
        assert_eq!(a.unwrap().status(), StatusCode::CREATED);
        assert_eq!(b.unwrap().status(), StatusCode::CREATED);

        let stored = h.registry.get_by_key("acmeresize").await.unwrap();
        let live = h.supervisor.instance_urls("acmeresize").await;
        assert_eq!(live.len(), 1);
        assert_eq!(stored.worker_urls, live);
        h.supervisor.stop_all().await;
    }

    #[tokio::test]
    async fn metrics_count_provisioning_outcomes() {
        let h = harness().await;
        let stopped = h
            .router
            .clone()
            .oneshot(upload(
                "/v2/function/acme/resize",
                Some("acme"),
                STOPPED_TOPIC_FUNCTION,
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(stopped.status(), StatusCode::CREATED);
        let failed = h
            .router
            .clone()
            .oneshot(upload(
                "/v2/function/acme/crop",
                Some("acme"),
                &[("trigger-type", "http")],
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let rejected = h
            .router
            .clone()
            .oneshot(upload(
                "/v2/function/acme/crop",
                Some("acme"),
                &[("parallelism", "0"), ("trigger-type", "http")],
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = h.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/plain; version=0.0.4"));

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("fngate_provisions_total 1\n"));
        assert!(text.contains("fngate_provision_failures_total{kind=\"spawn\"} 1\n"));
        assert!(text.contains("fngate_provision_failures_total{kind=\"registry\"} 0\n"));
        assert!(text.contains("fngate_registered_functions 1\n"));
        assert!(text.contains("fngate_running_functions 0\n"));
        assert!(text.contains("fngate_live_workers 0\n"));
    }

    #[tokio::test]
    async fn port_exhaustion_is_unavailable() {
        let h = harness_with(|c| c.runtime.port_base = c.runtime.port_ceiling).await;
        let resp = h
            .router
            .oneshot(upload(
                "/v2/function/acme/resize",
                Some("acme"),
                &[("trigger-type", "http")],
                Some(SOURCE),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn get_list_and_delete() {
        let h = harness().await;
        for name in ["resize", "crop"] {
            let resp = h
                .router
                .clone()
                .oneshot(upload(
                    &format!("/v2/function/acme/{name}"),
                    Some("acme"),
                    STOPPED_TOPIC_FUNCTION,
                    Some(SOURCE),
                ))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::CREATED);
        }

        let resp = h
            .router
            .clone()
            .oneshot(request("GET", "/v2/function/acme/resize", "acme-reader"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["data"]["name"], "resize");
        assert_eq!(json["data"]["input_topic"]["access_token"], "***");

        let resp = h
            .router
            .clone()
            .oneshot(request("GET", "/v2/function/acme", "acme"))
            .await
            .unwrap();
        let json = body_json(resp).await;
        let names: Vec<_> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["crop", "resize"]);

        let resp = h
            .router
            .clone()
            .oneshot(request("GET", "/v2/function/acme/resize", "beta"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = h
            .router
            .clone()
            .oneshot(request("DELETE", "/v2/function/acme/resize", "acme"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["data"]["id"], "acmeresize");
        assert!(!h.staging_dir.join("acme").join("resize.js").exists());

        for method in ["GET", "DELETE"] {
            let resp = h
                .router
                .clone()
                .oneshot(request(method, "/v2/function/acme/resize", "acme"))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{method}");
        }
    }
}
