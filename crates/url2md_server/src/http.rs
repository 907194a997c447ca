//! HTTP routes: the JSON API, the event stream and the `/mcp` endpoint.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use url2md_core::{
    ConversionJob, JobId, JobStatus, NotificationEvent, RateLimitExceeded, RateLimitInfo,
};
use url2md_logging::conv_info;

use crate::context::AppContext;
use crate::flow::{run_conversion, ConversionRequest};
use crate::mcp;
use crate::sampler::ProcessSample;

const DEFAULT_CONVERSION_PAGE: usize = 10;
const DEFAULT_LOG_PAGE: usize = 50;

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

type SharedContext = Arc<AppContext>;

pub fn router(ctx: SharedContext) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/stats", get(stats))
        .route("/api/convert", post(convert))
        .route("/api/conversions", get(list_conversions))
        .route("/api/conversions/{id}", get(get_conversion))
        .route("/api/logs", get(list_logs))
        .route("/api/events", get(events))
        .route("/mcp", post(mcp_endpoint))
        .with_state(ctx)
}

/// Serves until `cancel` fires, then drains in-flight requests.
pub async fn serve(
    ctx: SharedContext,
    listener: TcpListener,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        conv_info!("HTTP server listening on {}", addr);
    }
    axum::serve(
        listener,
        router(ctx).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await
}

/// `{success, data?, error?}` envelope shared by every JSON route.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    RateLimited(RateLimitExceeded),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": message }),
            ),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": message }),
            ),
            ApiError::RateLimited(exceeded) => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "success": false,
                    "error": "Rate limit exceeded. Try again later.",
                    "resetTime": exceeded.reset_time.timestamp_millis(),
                }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Identity used for rate limiting: the peer address, or `unknown` when the
/// server was not built with connection info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(ClientId(id))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    limit: Option<String>,
}

impl LimitQuery {
    fn limit_or(&self, default: usize) -> usize {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(default)
    }
}

async fn health(State(ctx): State<SharedContext>) -> impl IntoResponse {
    ApiResponse::ok(json!({
        "status": "healthy",
        "uptime": ctx.uptime_secs(),
        "memory": { "residentBytes": ProcessSample::read().resident_bytes },
        "stats": ctx.stats.snapshot(),
    }))
}

async fn status(State(ctx): State<SharedContext>) -> impl IntoResponse {
    ApiResponse::ok(ctx.status())
}

async fn stats(State(ctx): State<SharedContext>) -> impl IntoResponse {
    let connections = u32::try_from(ctx.events.subscriber_count()).unwrap_or(u32::MAX);
    ctx.stats.set_active_connections(connections);
    ApiResponse::ok(ctx.stats.snapshot())
}

async fn convert(
    State(ctx): State<SharedContext>,
    ClientId(client): ClientId,
    body: Bytes,
) -> Response {
    let admitted = match ctx.limiter.check(&client) {
        Ok(info) => info,
        Err(exceeded) => return ApiError::RateLimited(exceeded).into_response(),
    };

    let response = match parse_conversion_request(&body) {
        Some(request) => {
            let job = run_conversion(&ctx, &request, &client).await;
            conversion_response(&job)
        }
        None => ApiError::BadRequest("Invalid request data".to_string()).into_response(),
    };
    with_rate_limit_headers(response, admitted)
}

/// Body must be JSON with a parseable absolute `url`. Scheme checks happen in
/// the pipeline so that non-http URLs still leave a failed job behind.
fn parse_conversion_request(body: &[u8]) -> Option<ConversionRequest> {
    let request: ConversionRequest = serde_json::from_slice(body).ok()?;
    url::Url::parse(&request.url).ok()?;
    Some(request)
}

fn conversion_response(job: &ConversionJob) -> Response {
    match (job.status, &job.markdown) {
        (JobStatus::Completed, Some(markdown)) => ApiResponse::ok(json!({
            "id": job.id,
            "url": job.url,
            "title": job.title,
            "markdown": markdown,
            "createdAt": job.created_at,
            "completedAt": job.completed_at,
        }))
        .into_response(),
        _ => ApiError::BadRequest(
            job.error_message
                .clone()
                .unwrap_or_else(|| "Conversion did not complete".to_string()),
        )
        .into_response(),
    }
}

fn with_rate_limit_headers(mut response: Response, info: RateLimitInfo) -> Response {
    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(info.remaining));
    headers.insert(
        RATE_LIMIT_RESET,
        HeaderValue::from(info.reset_time.timestamp_millis()),
    );
    response
}

async fn get_conversion(
    State(ctx): State<SharedContext>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ConversionJob>>, ApiError> {
    id.parse::<JobId>()
        .ok()
        .and_then(|job_id| ctx.store.get(job_id))
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::NotFound("Conversion not found".to_string()))
}

async fn list_conversions(
    State(ctx): State<SharedContext>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    let jobs = ctx.store.list_recent(query.limit_or(DEFAULT_CONVERSION_PAGE));
    ApiResponse::ok(jobs)
}

async fn list_logs(
    State(ctx): State<SharedContext>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    ApiResponse::ok(ctx.activity.recent(query.limit_or(DEFAULT_LOG_PAGE)))
}

async fn events(State(ctx): State<SharedContext>) -> impl IntoResponse {
    let stream = ctx.events.sse_stream();
    let connections = u32::try_from(ctx.events.subscriber_count()).unwrap_or(u32::MAX);
    ctx.stats.set_active_connections(connections);
    ctx.activity.info("New event stream connection established", None);
    ctx.events.publish(NotificationEvent::StatusUpdate {});

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn mcp_endpoint(State(ctx): State<SharedContext>, body: Bytes) -> Response {
    let reply = match std::str::from_utf8(&body) {
        Ok(text) => mcp::handle_message(&ctx, text).await,
        Err(err) => Some(mcp::types::JsonRpcResponse::parse_error(&err.to_string())),
    };
    match reply {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
