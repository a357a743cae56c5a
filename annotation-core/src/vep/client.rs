// ==============================================================================
// vep/client.rs - VEP Batch HTTP Client
// ==============================================================================
// Description: One POST per batch against the Ensembl VEP REST API
// Author: Matt Barham
// Created: 2026-06-20
// Modified: 2026-07-24
// Version: 1.0.0
// ==============================================================================

use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::variant::Variant;

/// Default public VEP endpoint
pub const DEFAULT_VEP_URL: &str = "https://rest.ensembl.org/vep/human/region";

/// Errors from the VEP batch call. All of them fail the whole batch;
/// everything except a 4xx rejection is transient and worth a retry.
#[derive(Error, Debug)]
pub enum VepClientError {
    #[error("VEP request timed out after {0:?}")]
    Timeout(Duration),

    #[error("VEP transport error: {0}")]
    Transport(String),

    /// 4xx: the service rejected the request itself. Retrying the same
    /// payload cannot succeed.
    #[error("VEP API rejected the request with status {0}")]
    Rejected(u16),

    /// 5xx and other unexpected statuses
    #[error("VEP API returned status {0}")]
    Upstream(u16),

    #[error("Failed to decode VEP response: {0}")]
    Decode(String),
}

impl VepClientError {
    /// True when another attempt with the same batch could succeed
    /// (timeouts, connection resets, 5xx). A 4xx rejection is not.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, VepClientError::Rejected(_))
    }
}

/// Shared, stateless client for the external variant-effect service.
#[derive(Clone)]
pub struct VepClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl VepClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Annotate one batch of variants with a single POST.
    ///
    /// The response is decoded only to the per-variant block level; typed
    /// extraction happens in the parser so one malformed block cannot fail
    /// the whole batch here.
    pub async fn annotate(&self, variants: &[Variant]) -> Result<Vec<serde_json::Value>, VepClientError> {
        let payload = request_payload(variants);
        debug!("Calling VEP with {} variant(s)", variants.len());

        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VepClientError::Timeout(self.timeout)
                } else {
                    VepClientError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            return Err(VepClientError::Rejected(status.as_u16()));
        }
        if !status.is_success() {
            return Err(VepClientError::Upstream(status.as_u16()));
        }

        response
            .json::<Vec<serde_json::Value>>()
            .await
            .map_err(|e| VepClientError::Decode(e.to_string()))
    }
}

/// Batch request body. The flag set matches the annotations the rest of
/// the pipeline extracts: REVEL, CADD, SpliceAI, protein domains, LoF,
/// MANE, HGVS notations, and the dbNSFP ClinVar/GERP++ fields.
fn request_payload(variants: &[Variant]) -> serde_json::Value {
    let regions: Vec<String> = variants.iter().map(Variant::to_region).collect();
    json!({
        "variants": regions,
        "REVEL": true,
        "CADD": true,
        "SpliceAI": true,
        "protein": true,
        "gencode_basic": true,
        "LoF": true,
        "mane": true,
        "hgvs": true,
        "dbNSFP": "clinvar_OMIM_id,GERP++_RS",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_payload_regions_and_flags() {
        let variants = vec![
            Variant::parse("1", 12345, "A", "G").unwrap(),
            Variant::parse("chr2", 100, "GCG", "C").unwrap(),
        ];
        let payload = request_payload(&variants);

        assert_eq!(
            payload["variants"],
            serde_json::json!(["1 12345 12345 A/G +", "2 100 102 GCG/C +"])
        );
        assert_eq!(payload["CADD"], true);
        assert_eq!(payload["mane"], true);
        assert_eq!(payload["dbNSFP"], "clinvar_OMIM_id,GERP++_RS");
    }

    #[test]
    fn test_error_retriability() {
        assert!(VepClientError::Timeout(Duration::from_secs(1)).is_retriable());
        assert!(VepClientError::Transport("connection reset".to_string()).is_retriable());
        assert!(VepClientError::Upstream(503).is_retriable());
        assert!(VepClientError::Decode("truncated body".to_string()).is_retriable());
        assert!(!VepClientError::Rejected(400).is_retriable());
    }
}
