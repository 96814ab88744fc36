//! HTTP error mapping

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use checkmeter_core::Tier;
use checkmeter_quota::UsageSnapshot;
use serde_json::json;
use tracing::{error, warn};

/// The only message shown to clients when the vision service fails
pub const ANALYSIS_FAILED_MESSAGE: &str = "Image analysis failed. Please try again with a clearer photo.";

/// Request-scoped failures
#[derive(Debug)]
pub enum AppError {
    /// Malformed or missing input
    InvalidRequest(String),
    /// Upload larger than the configured limit
    PayloadTooLarge { limit: usize },
    /// Upload that is not an accepted image type
    UnsupportedMediaType(String),
    /// Daily allowance for the tier is used up
    QuotaExceeded { tier: Tier, usage: UsageSnapshot },
    /// The vision service failed; details are logged, never returned
    Upstream(checkmeter_core::Error),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// User-facing message for an exhausted tier
pub fn quota_message(tier: Tier) -> String {
    let what = match tier {
        Tier::Standard => "standard checks",
        Tier::Detailed => "detailed analysis",
    };
    format!("Daily limit for {} reached. It resets at local midnight.", what)
}

impl From<checkmeter_core::Error> for AppError {
    fn from(err: checkmeter_core::Error) -> Self {
        if err.is_upstream() {
            Self::Upstream(err)
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl AppError {
    /// Map a multipart read failure, reporting `limit` when the body was cut off
    pub fn from_multipart(err: MultipartError, limit: usize) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge { limit }
        } else {
            Self::InvalidRequest(err.body_text())
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge { limit: 0 }
        } else {
            Self::InvalidRequest(rejection.body_text())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, kind, usage) = match self {
            Self::InvalidRequest(msg) => (msg, "invalid_request_error", None),
            Self::PayloadTooLarge { limit } => {
                let msg = if limit > 0 {
                    format!("Image is too large. The maximum size is {} MB.", limit / (1024 * 1024))
                } else {
                    "Image is too large.".to_string()
                };
                (msg, "payload_too_large", None)
            }
            Self::UnsupportedMediaType(mime) => (
                format!(
                    "Unsupported image type '{}'. Please upload a JPEG, PNG, WebP or GIF photo.",
                    mime
                ),
                "unsupported_media_type",
                None,
            ),
            Self::QuotaExceeded { tier, usage } => (quota_message(tier), "quota_exceeded", Some(usage)),
            Self::Upstream(err) => {
                error!(error = %err, "Image analysis failed");
                (ANALYSIS_FAILED_MESSAGE.to_string(), "upstream_error", None)
            }
            Self::Internal(msg) => {
                error!(error = %msg, "Internal error");
                ("Internal server error".to_string(), "internal_error", None)
            }
        };

        if status.is_client_error() {
            warn!(status = status.as_u16(), kind, "Request rejected");
        }

        let mut body = json!({
            "error": {
                "message": message,
                "type": kind,
            }
        });
        if let Some(usage) = usage {
            body["usage"] = json!(usage);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use checkmeter_quota::QuotaLimits;
    use chrono::Local;
    use serde_json::Value;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_upstream_detail_is_hidden() {
        let err = AppError::from(checkmeter_core::Error::upstream("401 from api.openai.com: bad key sk-123"));
        let (status, body) = body_of(err).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["message"], ANALYSIS_FAILED_MESSAGE);
        assert_eq!(body["error"]["type"], "upstream_error");
        assert!(!body.to_string().contains("sk-123"));
    }

    #[tokio::test]
    async fn test_non_upstream_core_error_is_internal() {
        let (status, body) = body_of(checkmeter_core::Error::image("bad pixels").into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["type"], "internal_error");
    }

    #[tokio::test]
    async fn test_quota_error_carries_usage() {
        let usage = UsageSnapshot::empty(&QuotaLimits::default(), Local::now());
        let (status, body) = body_of(AppError::QuotaExceeded {
            tier: Tier::Detailed,
            usage,
        })
        .await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"]["message"].as_str().unwrap().contains("local midnight"));
        assert_eq!(body["usage"]["detailedAnalysis"]["limit"], 1);
    }

    #[tokio::test]
    async fn test_payload_too_large_message() {
        let (status, body) = body_of(AppError::PayloadTooLarge { limit: 5 * 1024 * 1024 }).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"]["message"].as_str().unwrap().contains("5 MB"));
    }
}
