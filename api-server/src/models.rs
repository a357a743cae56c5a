// ==============================================================================
// models.rs - API Data Models
// ==============================================================================
// Description: Request/response models for the annotation API
// Author: Matt Barham
// Created: 2026-06-26
// Modified: 2026-07-28
// Version: 1.1.0
// ==============================================================================

use annotation_core::models::VariantAnnotation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::PendingCounts;
use crate::store::CacheStatistics;

/// Variant submission request body
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub chrom: String,
    pub pos: i64,
    #[serde(rename = "ref")]
    pub ref_allele: String,
    pub alt: String,
}

/// Submission outcome surfaced to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitState {
    Accepted,
    Cached,
    AlreadyPending,
    RetryExhausted,
}

impl SubmitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitState::Accepted => "accepted",
            SubmitState::Cached => "cached",
            SubmitState::AlreadyPending => "already_pending",
            SubmitState::RetryExhausted => "retry_exhausted",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub state: SubmitState,
    pub variant_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<VariantAnnotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

/// Poll state for a submitted variant. Queued entries report as
/// `processing` - the distinction is internal to the batch core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Processing,
    Completed,
    Failed,
    RetryAvailable,
    NotFound,
}

impl PollState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollState::Processing => "processing",
            PollState::Completed => "completed",
            PollState::Failed => "failed",
            PollState::RetryAvailable => "retry_available",
            PollState::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub state: PollState,
    pub variant_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<VariantAnnotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub worker_live: bool,
    pub timestamp: DateTime<Utc>,
}

/// Service statistics response
#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub cache: CacheStatistics,
    pub pending: PendingCounts,
    pub queue_depth: usize,
    pub batch_size_limit: usize,
    pub batch_time_limit_ms: u64,
}

/// API information response
#[derive(Debug, Serialize)]
pub struct ApiInfoResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<&'static str>,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: String) -> Self {
        Self {
            status: "error",
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&SubmitState::AlreadyPending).unwrap(),
            "\"already_pending\""
        );
        assert_eq!(
            serde_json::to_string(&PollState::RetryAvailable).unwrap(),
            "\"retry_available\""
        );
        assert_eq!(SubmitState::RetryExhausted.as_str(), "retry_exhausted");
        assert_eq!(PollState::NotFound.as_str(), "not_found");
    }

    #[test]
    fn test_submit_request_accepts_ref_keyword() {
        let req: SubmitRequest =
            serde_json::from_str(r#"{"chrom": "chr1", "pos": 12345, "ref": "A", "alt": "G"}"#)
                .unwrap();
        assert_eq!(req.ref_allele, "A");
        assert_eq!(req.alt, "G");
    }

    #[test]
    fn test_optional_fields_omitted() {
        let response = SubmitResponse {
            state: SubmitState::Accepted,
            variant_key: "1:12345:A>G".to_string(),
            record: None,
            attempts: Some(0),
            max_retries: Some(3),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("record").is_none());
        assert_eq!(json["state"], "accepted");
    }
}
