//! HTTP routes and handlers

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use checkmeter_core::Tier;
use checkmeter_quota::{QuotaDecision, UsageSnapshot};
use chrono::Local;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::HttpConfig;
use crate::error::{quota_message, AppError};
use crate::identity::client_identity;
use crate::pipeline::AnalysisOutcome;
use crate::state::AppState;
use crate::telemetry::{QUOTA_REJECTIONS_TOTAL, REQUESTS_TOTAL};
use crate::upload::UploadForm;

/// Multipart framing allowance on top of the image limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.upload.max_bytes + MULTIPART_OVERHEAD;
    let cors = cors_layer(&state.config.server);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/check-meter", post(check_meter))
        .route("/api/usage", get(usage_snapshot).post(usage_consume))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &HttpConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if config.cors_allow_any {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Classify an uploaded meter photo.
///
/// The tier's daily quota is charged once the upload has validated and
/// before the vision call. A retake outcome or an upstream failure still
/// counts against it.
async fn check_meter(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<AnalysisOutcome>, AppError> {
    counter!(REQUESTS_TOTAL, "endpoint" => "check_meter").increment(1);

    let identity = client_identity(&headers);
    let span = info_span!("check_meter", request_id = %Uuid::new_v4());

    classify(&state, &identity, multipart)
        .instrument(span)
        .await
        .map(Json)
}

async fn classify(state: &AppState, identity: &str, mut multipart: Multipart) -> Result<AnalysisOutcome, AppError> {
    let upload = &state.config.upload;
    let request = UploadForm::read(&mut multipart, upload).await?.into_request(upload)?;
    let tier = request.tier;

    debug!(
        client = %identity,
        tier = %tier,
        bytes = request.image.len(),
        mime_type = %request.image.mime_type,
        "Upload accepted"
    );

    if state.config.quota.enforce_on_classify {
        if let QuotaDecision::Rejected(usage) = state.usage.try_consume(identity, tier, Local::now()).await {
            counter!(QUOTA_REJECTIONS_TOTAL, "tier" => tier.as_str()).increment(1);
            return Err(AppError::QuotaExceeded { tier, usage });
        }
    }

    Ok(state.pipeline.analyze(request).await?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageRequest {
    check_type: String,
}

#[derive(Debug, Serialize)]
struct UsageResponse {
    success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,

    #[serde(flatten)]
    usage: UsageSnapshot,
}

/// Current usage for the caller, without consuming anything
async fn usage_snapshot(State(state): State<AppState>, headers: HeaderMap) -> Json<UsageResponse> {
    counter!(REQUESTS_TOTAL, "endpoint" => "usage").increment(1);

    let identity = client_identity(&headers);
    let usage = state.usage.snapshot(&identity, Local::now()).await;

    Json(UsageResponse {
        success: true,
        error: None,
        usage,
    })
}

/// Record one check of the requested tier for the caller
async fn usage_consume(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UsageRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    counter!(REQUESTS_TOTAL, "endpoint" => "usage").increment(1);

    let Json(payload) = payload?;
    let tier: Tier = payload.check_type.parse().map_err(AppError::InvalidRequest)?;

    let identity = client_identity(&headers);
    let response = match state.usage.try_consume(&identity, tier, Local::now()).await {
        QuotaDecision::Accepted(usage) => (
            StatusCode::OK,
            Json(UsageResponse {
                success: true,
                error: None,
                usage,
            }),
        ),
        QuotaDecision::Rejected(usage) => {
            counter!(QUOTA_REJECTIONS_TOTAL, "tier" => tier.as_str()).increment(1);
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(UsageResponse {
                    success: false,
                    error: Some(quota_message(tier)),
                    usage,
                }),
            )
        }
    };

    Ok(response.into_response())
}

async fn fallback() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": {
                "message": "Not found",
                "type": "not_found"
            }
        })),
    )
        .into_response()
}
