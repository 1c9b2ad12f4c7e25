//! HTTP surface for feedback ingestion.
//!
//! - `POST /api/v1/feedback`: 202 with a [`FeedbackReceipt`]
//! - `GET /health`: liveness probe
//!
//! Errors are `{"error": <kind>, "message": <text>}` with 400 for anything
//! malformed, 404 for unknown ids and 503 when the queue cannot take more.

use std::future::Future;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{FeedbackError, Result};
use crate::event::{FeedbackReceipt, FeedbackRequest};
use crate::ingest::IngestionService;

/// Path of the ingestion endpoint.
pub const FEEDBACK_PATH: &str = "/api/v1/feedback";

/// Path of the liveness probe.
pub const HEALTH_PATH: &str = "/health";

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable kind.
    pub error: String,

    /// Human-readable detail.
    pub message: String,
}

/// Body of the liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// Build the router.
pub fn router(service: IngestionService) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(FEEDBACK_PATH, post(submit_feedback))
        .with_state(service)
}

/// Serve `service` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    service: IngestionService,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Feedback API listening on http://{addr}");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn submit_feedback(
    State(service): State<IngestionService>,
    payload: std::result::Result<Json<FeedbackRequest>, JsonRejection>,
) -> std::result::Result<(StatusCode, Json<FeedbackReceipt>), ApiError> {
    let Json(request) =
        payload.map_err(|rejection| bad_request("malformed_request", rejection.body_text()))?;

    let receipt = service
        .submit(request)
        .await
        .map_err(|e| error_response(&e))?;

    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

/// HTTP status for an ingestion error.
pub fn status_for(err: &FeedbackError) -> StatusCode {
    match err {
        FeedbackError::Validation(_) | FeedbackError::UnknownFeedbackType(_) => {
            StatusCode::BAD_REQUEST
        }
        FeedbackError::UserNotFound(_) | FeedbackError::ContentNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        FeedbackError::QueueUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        other if other.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &FeedbackError) -> ApiError {
    let status = status_for(err);
    if status.is_server_error() {
        error!("feedback ingestion failed: {err}");
    }
    (
        status,
        Json(ErrorBody {
            error: err.kind().to_string(),
            message: err.to_string(),
        }),
    )
}

fn bad_request(kind: &str, message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: kind.to_string(),
            message: message.into(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_ranking::RankingError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&FeedbackError::UnknownFeedbackType("HIDE".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&FeedbackError::UserNotFound("u".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&FeedbackError::QueueUnavailable("full".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&FeedbackError::Ranking(RankingError::Io(std::io::Error::other("disk")))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&FeedbackError::Ranking(RankingError::Config("bad".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
