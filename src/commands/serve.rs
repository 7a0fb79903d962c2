use anyhow::{Context, Result};
use axum::{
    extract::{MatchedPath, Path, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use stockwatch::config::Config;
use stockwatch::crawler::HttpRenderer;
use stockwatch::error::{Error, ErrorCategory, ErrorKind};
use stockwatch::metrics;
use stockwatch::models::{ItemSpec, SubscriberSpec, SubscriptionId};
use stockwatch::notifications::WebhookNotifier;
use stockwatch::service::{EngineOptions, StockService};
use stockwatch::storage::SqliteStore;

// ============================================================================
// API State and Types
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
struct AppState {
    service: Arc<StockService>,
    api_key: Arc<str>,
}

/// Body of `POST /checks`
///
/// Missing strings deserialize as empty so they are reported as
/// validation errors rather than JSON rejections.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CheckRequest {
    url: String,
    location_filter: String,
    interval_minutes: Option<i64>,
    phone_number: String,
    email: String,
}

impl CheckRequest {
    fn into_parts(self) -> (ItemSpec, SubscriberSpec) {
        (
            ItemSpec {
                url: self.url,
                location_filter: self.location_filter,
                interval_minutes: self.interval_minutes,
            },
            SubscriberSpec {
                email: self.email,
                phone_number: self.phone_number,
            },
        )
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionsQuery {
    #[serde(default)]
    email: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    monitors: usize,
    checks_running: usize,
    checks_queued: usize,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    category: &'static str,
}

/// Handler error carrying the engine error
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let category = self.0.category();
        let status = match category {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, category = %category, "Request failed");
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
            category: category.as_str(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ============================================================================
// Server
// ============================================================================

/// Load configuration from a TOML file or the environment
pub fn load_config(path: Option<&std::path::Path>, port: Option<u16>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    if let Some(port) = port {
        config.server.port = port;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Run the HTTP API and the monitoring engine until Ctrl-C
pub async fn serve(config: Config) -> Result<()> {
    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed");
    }

    let store = Arc::new(
        SqliteStore::new(&config.database.sqlite_path).context("Failed to open database")?,
    );
    let renderer =
        Arc::new(HttpRenderer::new(&config.renderer).context("Failed to create renderer")?);
    let notifier =
        Arc::new(WebhookNotifier::new(config.webhook()).context("Failed to create notifier")?);

    let options = EngineOptions {
        registry: config.registry(),
        render_timeout: config.render_timeout(),
    };
    let service = Arc::new(StockService::new(store, renderer, notifier, options));

    let restored = service
        .bootstrap()
        .await
        .context("Failed to restore monitors")?;

    let app = router(Arc::clone(&service), &config.server.api_key);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    println!("stockwatch listening on http://{addr}");
    println!("  Monitors restored: {restored}");
    println!("  Max concurrent checks: {}", config.monitor.max_concurrent);
    println!("  Database: {}", config.database.sqlite_path.display());
    println!();
    println!("Endpoints:");
    println!("  GET    /health          - Health check");
    println!("  GET    /metrics         - Prometheus metrics");
    println!("  POST   /checks          - Register a subscription");
    println!("  DELETE /checks/{{id}}     - Unsubscribe");
    println!("  GET    /subscriptions   - List subscriptions by email");
    println!("  GET    /monitors        - List running monitors");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    service.shutdown().await;
    tracing::info!("stockwatch shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }
}

fn router(service: Arc<StockService>, api_key: &str) -> Router {
    let state = AppState {
        service,
        api_key: Arc::from(api_key),
    };

    let protected = Router::new()
        .route("/checks", post(create_check))
        .route("/checks/{id}", delete(delete_check))
        .route("/subscriptions", get(list_subscriptions))
        .route("/monitors", get(list_monitors))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(protected)
        .route_layer(middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// ============================================================================
// Middleware
// ============================================================================

/// Bearer token check: 401 without a usable header, 403 on a wrong token
async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> std::result::Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match token {
        None => Err(StatusCode::UNAUTHORIZED),
        Some(token) if token != &*state.api_key => {
            tracing::warn!(path = %request.uri().path(), "Rejected request with wrong API key");
            Err(StatusCode::FORBIDDEN)
        }
        Some(_) => Ok(next.run(request).await),
    }
}

async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| format!("{} {}", request.method(), path.as_str()))
        .unwrap_or_else(|| request.uri().path().to_string());

    let start = Instant::now();
    let response = next.run(request).await;

    metrics::record_api_request(
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.service.scheduler_stats();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        monitors: state.service.monitors().await.len(),
        checks_running: stats.active,
        checks_queued: stats.queued,
    })
}

async fn metrics_handler() -> Response {
    match metrics::encode_metrics() {
        Ok(text) => (
            [("content-type", "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn create_check(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> ApiResult<impl IntoResponse> {
    let (item, subscriber) = request.into_parts();
    let registration = state.service.register_subscription(item, subscriber).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

async fn delete_check(
    State(state): State<AppState>,
    Path(id): Path<SubscriptionId>,
) -> ApiResult<Response> {
    let outcome = state.service.unsubscribe(id).await?;
    let status = if outcome.removed {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok((status, Json(outcome)).into_response())
}

async fn list_subscriptions(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionsQuery>,
) -> ApiResult<impl IntoResponse> {
    let subscriptions = state.service.subscriptions_for(&query.email).await?;
    Ok(Json(subscriptions))
}

async fn list_monitors(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.monitors().await)
}
