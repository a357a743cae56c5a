// ==============================================================================
// vep/response.rs - VEP Response Wire Types
// ==============================================================================
// Description: Serde types for the VEP batch response payload
// Author: Matt Barham
// Created: 2026-06-20
// Modified: 2026-07-24
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// One per-variant block of the VEP batch response.
///
/// Only the fields the parser depends on are modelled; everything else in
/// the payload is ignored. `transcript_consequences` and
/// `colocated_variants` default to empty so a sparse block still
/// deserializes (their absence is what `no_annotation_returned` detects).
#[derive(Debug, Clone, Deserialize)]
pub struct VepResult {
    /// Echo of the submitted region string, e.g. "1 12345 12345 A/G +"
    pub input: Option<String>,
    pub id: Option<String>,
    pub most_severe_consequence: Option<String>,
    #[serde(default)]
    pub transcript_consequences: Vec<TranscriptConsequence>,
    #[serde(default)]
    pub colocated_variants: Vec<ColocatedVariant>,
}

/// Per-transcript consequence block
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptConsequence {
    pub transcript_id: Option<String>,
    pub gene_symbol: Option<String>,
    pub impact: Option<String>,
    #[serde(default)]
    pub consequence_terms: Vec<String>,
    pub cadd_phred: Option<f64>,
    pub polyphen_score: Option<f64>,
    pub revel: Option<f64>,
    /// dbNSFP GERP++ conservation score; arrives as a string or a number
    #[serde(rename = "gerp++_rs", default, deserialize_with = "lenient_f64")]
    pub gerp_rs: Option<f64>,
    /// LOFTEE class ("HC"/"LC")
    pub lof: Option<String>,
    /// Non-empty when this is a MANE transcript (e.g. ["MANE_Select"])
    #[serde(default)]
    pub mane: Vec<String>,
    /// HGVS.c, prefixed with the transcript id ("ENST...:c.123A>G")
    pub hgvsc: Option<String>,
    /// HGVS.p, prefixed with the protein id ("ENSP...:p.Lys41Arg")
    pub hgvsp: Option<String>,
    pub spliceai: Option<SpliceAiScores>,
    /// dbNSFP ClinVar OMIM cross-reference, '&'-separated when multiple;
    /// arrives as a string or a number
    #[serde(default, deserialize_with = "lenient_string")]
    pub clinvar_omim_id: Option<String>,
}

/// SpliceAI delta scores per splicing event type
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpliceAiScores {
    #[serde(rename = "DS_AG", default, deserialize_with = "lenient_f64")]
    pub ds_ag: Option<f64>,
    #[serde(rename = "DS_AL", default, deserialize_with = "lenient_f64")]
    pub ds_al: Option<f64>,
    #[serde(rename = "DS_DG", default, deserialize_with = "lenient_f64")]
    pub ds_dg: Option<f64>,
    #[serde(rename = "DS_DL", default, deserialize_with = "lenient_f64")]
    pub ds_dl: Option<f64>,
}

impl SpliceAiScores {
    /// Maximum absolute delta score across the four event types.
    pub fn max_delta(&self) -> Option<f64> {
        [self.ds_ag, self.ds_al, self.ds_dg, self.ds_dl]
            .into_iter()
            .flatten()
            .map(f64::abs)
            .fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.max(v)))
            })
    }
}

/// Known-variant block colocated with the query variant
#[derive(Debug, Clone, Deserialize)]
pub struct ColocatedVariant {
    pub id: Option<String>,
    #[serde(default)]
    pub clin_sig: Vec<String>,
    /// allele -> population -> frequency. BTreeMap keeps extraction
    /// deterministic when multiple alleles are reported.
    #[serde(default)]
    pub frequencies: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

/// Accept a float encoded as a JSON number or a numeric string.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(json_number))
}

/// Accept a string encoded as a JSON string or a bare number.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Numeric coercion used across frequency maps and lenient fields.
pub(crate) fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_sparse_block() {
        let block: VepResult = serde_json::from_str(r#"{"input": "1 1 1 A/G +"}"#).unwrap();
        assert!(block.transcript_consequences.is_empty());
        assert!(block.colocated_variants.is_empty());
        assert_eq!(block.input.as_deref(), Some("1 1 1 A/G +"));
    }

    #[test]
    fn test_gerp_accepts_string_and_number() {
        let json = r#"{"transcript_id": "ENST1", "gerp++_rs": "4.58"}"#;
        let tc: TranscriptConsequence = serde_json::from_str(json).unwrap();
        assert_eq!(tc.gerp_rs, Some(4.58));

        let json = r#"{"transcript_id": "ENST1", "gerp++_rs": 4.58}"#;
        let tc: TranscriptConsequence = serde_json::from_str(json).unwrap();
        assert_eq!(tc.gerp_rs, Some(4.58));

        let json = r#"{"transcript_id": "ENST1"}"#;
        let tc: TranscriptConsequence = serde_json::from_str(json).unwrap();
        assert_eq!(tc.gerp_rs, None);
    }

    #[test]
    fn test_clinvar_omim_accepts_number() {
        let json = r#"{"transcript_id": "ENST1", "clinvar_omim_id": 603903}"#;
        let tc: TranscriptConsequence = serde_json::from_str(json).unwrap();
        assert_eq!(tc.clinvar_omim_id.as_deref(), Some("603903"));
    }

    #[test]
    fn test_spliceai_max_delta() {
        let scores = SpliceAiScores {
            ds_ag: Some(0.02),
            ds_al: Some(-0.91),
            ds_dg: None,
            ds_dl: Some(0.10),
        };
        assert_eq!(scores.max_delta(), Some(0.91));
        assert_eq!(SpliceAiScores::default().max_delta(), None);
    }
}
