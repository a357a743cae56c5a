// ==============================================================================
// handlers.rs - API Request Handlers
// ==============================================================================
// Description: HTTP request handlers for the annotation API endpoints
// Author: Matt Barham
// Created: 2026-06-30
// Modified: 2026-07-30
// Version: 1.2.0
// ==============================================================================

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::error;

use crate::facade::{PollOutcome, SubmitError, SubmitOutcome};
use crate::models::*;
use crate::state::AppState;

/// Root endpoint - API information
pub async fn root() -> Json<ApiInfoResponse> {
    Json(ApiInfoResponse {
        service: "Variant Annotation API",
        version: "1.0.0",
        endpoints: vec![
            "/health - Health check",
            "/submit - Submit variant for annotation (POST)",
            "/poll/{variant_key} - Poll annotation status (GET)",
            "/statistics - Service statistics (GET)",
        ],
    })
}

/// Submit a variant for annotation.
///
/// Returns immediately: `cached` with the stored record on a cache hit,
/// `accepted` when the variant entered the batch queue, `already_pending`
/// when an identical submission is in flight, `retry_exhausted` when the
/// key has spent its attempt budget and is still within retention.
pub async fn submit_variant(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let result = state
        .facade()
        .submit(&request.chrom, request.pos, &request.ref_allele, &request.alt)
        .await
        .map_err(ApiError::from)?;

    let max_retries = state.processor().max_retries();
    let response = match result.outcome {
        SubmitOutcome::Cached(record) => SubmitResponse {
            state: SubmitState::Cached,
            variant_key: result.variant_key,
            record: Some(*record),
            attempts: None,
            max_retries: None,
        },
        SubmitOutcome::Accepted { attempts } => SubmitResponse {
            state: SubmitState::Accepted,
            variant_key: result.variant_key,
            record: None,
            attempts: Some(attempts),
            max_retries: Some(max_retries),
        },
        SubmitOutcome::AlreadyPending { attempts } => SubmitResponse {
            state: SubmitState::AlreadyPending,
            variant_key: result.variant_key,
            record: None,
            attempts: Some(attempts),
            max_retries: Some(max_retries),
        },
        SubmitOutcome::RetryExhausted { attempts } => SubmitResponse {
            state: SubmitState::RetryExhausted,
            variant_key: result.variant_key,
            record: None,
            attempts: Some(attempts),
            max_retries: Some(max_retries),
        },
    };
    Ok(Json(response))
}

/// Poll annotation status for a variant key.
pub async fn poll_variant(
    State(state): State<AppState>,
    Path(variant_key): Path<String>,
) -> Result<Response, ApiError> {
    let outcome = state
        .facade()
        .poll(&variant_key)
        .await
        .map_err(ApiError::from)?;

    let max_retries = state.processor().max_retries();
    let (status, response) = match outcome {
        PollOutcome::Completed(record) => (
            StatusCode::OK,
            PollResponse {
                state: PollState::Completed,
                variant_key: record.record.variant_key.clone(),
                record: Some(*record),
                attempts: None,
                max_retries: None,
                reason: None,
            },
        ),
        PollOutcome::Processing { attempts } => (
            StatusCode::ACCEPTED,
            PollResponse {
                state: PollState::Processing,
                variant_key,
                record: None,
                attempts: Some(attempts),
                max_retries: Some(max_retries),
                reason: None,
            },
        ),
        PollOutcome::Failed { attempts, reason } => (
            StatusCode::OK,
            PollResponse {
                state: PollState::Failed,
                variant_key,
                record: None,
                attempts: Some(attempts),
                max_retries: Some(max_retries),
                reason,
            },
        ),
        PollOutcome::RetryAvailable { attempts } => (
            StatusCode::OK,
            PollResponse {
                state: PollState::RetryAvailable,
                variant_key,
                record: None,
                attempts: Some(attempts),
                max_retries: Some(max_retries),
                reason: None,
            },
        ),
        PollOutcome::NotFound => (
            StatusCode::NOT_FOUND,
            PollResponse {
                state: PollState::NotFound,
                variant_key,
                record: None,
                attempts: None,
                max_retries: None,
                reason: None,
            },
        ),
    };

    Ok((status, Json(response)).into_response())
}

/// Health check: database reachable and the batch dispatcher live.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.store().ping().await;
    let worker_live = state.processor().is_live();
    let healthy = database && worker_live;

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        database,
        worker_live,
        timestamp: Utc::now(),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Aggregated service statistics from the cache store and the registry.
pub async fn statistics(State(state): State<AppState>) -> Result<Json<StatisticsResponse>, ApiError> {
    let cache = state
        .store()
        .statistics()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(StatisticsResponse {
        cache,
        pending: state.registry().counts(),
        queue_depth: state.processor().queue_depth(),
        batch_size_limit: state.max_batch_size(),
        batch_time_limit_ms: state.max_wait_time().as_millis() as u64,
    }))
}

/// Application error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unavailable(String),
    Internal(String),
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Invalid(e) => ApiError::BadRequest(e.to_string()),
            SubmitError::Unavailable(msg) => ApiError::Unavailable(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
