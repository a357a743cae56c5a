// ==============================================================================
// vep/parser.rs - VEP Response Parser
// ==============================================================================
// Description: Extracts annotation records and transcript rows from a VEP
//              batch response
// Author: Matt Barham
// Created: 2026-06-20
// Modified: 2026-07-28
// Version: 1.1.0
// ==============================================================================

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::models::{AnnotationRecord, Impact, Loftee, TranscriptRecord, VariantAnnotation};
use crate::variant::key_from_region_input;
use crate::vep::response::{json_number, ColocatedVariant, TranscriptConsequence, VepResult};

/// Multiple OMIM ids / clinical significance values are joined with this.
const VALUE_DELIMITER: &str = ",";

/// Per-variant parse failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// VEP responded, but the variant had neither transcript consequences
    /// nor a colocated-variant summary.
    #[error("no annotation returned for this variant")]
    NoAnnotationReturned,

    /// The per-variant response block did not match the documented shape.
    #[error("malformed response block: {0}")]
    Malformed(String),
}

impl ParseError {
    /// Stable reason string surfaced to pollers.
    pub fn reason(&self) -> &'static str {
        match self {
            ParseError::NoAnnotationReturned => "no_annotation_returned",
            ParseError::Malformed(_) => "parse_error",
        }
    }
}

/// Outcome of parsing one batch response: cleanly parsed annotations plus
/// per-variant failures. Failures here are non-retriable; one malformed
/// block never poisons the rest of the batch.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub parsed: Vec<VariantAnnotation>,
    pub failures: Vec<(String, ParseError)>,
}

/// Parse the VEP response for one batch.
///
/// Response blocks are matched back to the requested variant keys through
/// their echoed `input` region string. Blocks that match no requested key
/// are ignored; requested keys with no matching block fail with
/// `no_annotation_returned`.
pub fn parse_response(blocks: &[serde_json::Value], requested_keys: &[String]) -> ParsedBatch {
    let mut results: HashMap<String, VepResult> = HashMap::new();
    let mut malformed: HashMap<String, String> = HashMap::new();

    for block in blocks {
        let key = block
            .get("input")
            .and_then(|v| v.as_str())
            .and_then(key_from_region_input);

        match serde_json::from_value::<VepResult>(block.clone()) {
            Ok(result) => {
                if let Some(key) = key {
                    results.insert(key, result);
                }
            }
            Err(e) => {
                if let Some(key) = key {
                    malformed.insert(key, e.to_string());
                }
            }
        }
    }

    let mut batch = ParsedBatch::default();
    for key in requested_keys {
        if let Some(result) = results.get(key) {
            match parse_variant(result, key) {
                Ok(annotation) => batch.parsed.push(annotation),
                Err(e) => batch.failures.push((key.clone(), e)),
            }
        } else if let Some(detail) = malformed.get(key) {
            batch
                .failures
                .push((key.clone(), ParseError::Malformed(detail.clone())));
        } else {
            debug!("No VEP response entry for {}", key);
            batch
                .failures
                .push((key.clone(), ParseError::NoAnnotationReturned));
        }
    }

    batch
}

/// Parse a single per-variant block into an annotation record plus its
/// transcript rows.
pub fn parse_variant(result: &VepResult, variant_key: &str) -> Result<VariantAnnotation, ParseError> {
    if result.transcript_consequences.is_empty() && result.colocated_variants.is_empty() {
        return Err(ParseError::NoAnnotationReturned);
    }

    let canonical = canonical_consequence(result);
    let (allele_freq, max_allele_freq) = extract_frequencies(&result.colocated_variants);

    let record = AnnotationRecord {
        variant_key: variant_key.to_string(),
        gene: canonical.and_then(|tc| tc.gene_symbol.clone()),
        cadd: canonical.and_then(|tc| tc.cadd_phred),
        ml_score: None,
        most_severe_consequence: result.most_severe_consequence.clone(),
        allele_freq,
        max_allele_freq,
        omim: extract_omim(&result.transcript_consequences),
        clinsig: extract_clin_sig(&result.colocated_variants),
    };

    let transcripts = result
        .transcript_consequences
        .iter()
        .map(to_transcript_record)
        .collect();

    Ok(VariantAnnotation { record, transcripts })
}

/// The transcript the variant-level fields are drawn from: the MANE
/// transcript when present, otherwise the transcript whose consequence
/// terms contain the response's own most_severe_consequence, otherwise
/// the first listed transcript.
fn canonical_consequence(result: &VepResult) -> Option<&TranscriptConsequence> {
    let transcripts = &result.transcript_consequences;

    transcripts
        .iter()
        .find(|tc| !tc.mane.is_empty())
        .or_else(|| {
            result.most_severe_consequence.as_ref().and_then(|msc| {
                transcripts
                    .iter()
                    .find(|tc| tc.consequence_terms.iter().any(|t| t == msc))
            })
        })
        .or_else(|| transcripts.first())
}

/// gnomAD allele frequency plus the maximum frequency across all reported
/// populations, from the first colocated variant carrying a frequency map.
fn extract_frequencies(colocated: &[ColocatedVariant]) -> (Option<f64>, Option<f64>) {
    for col in colocated {
        if let Some(freq_map) = col.frequencies.values().next() {
            let allele_freq = ["gnomade", "gnomadg", "af"]
                .iter()
                .find_map(|k| freq_map.get(*k).and_then(json_number));

            let max_allele_freq = freq_map
                .values()
                .filter_map(json_number)
                .fold(None, |acc: Option<f64>, v| {
                    Some(acc.map_or(v, |a| a.max(v)))
                });

            return (allele_freq, max_allele_freq);
        }
    }
    (None, None)
}

/// ClinVar significance from the first colocated variant that reports it.
fn extract_clin_sig(colocated: &[ColocatedVariant]) -> Option<String> {
    colocated
        .iter()
        .find(|col| !col.clin_sig.is_empty())
        .map(|col| col.clin_sig.join(VALUE_DELIMITER))
}

/// OMIM ids from the dbNSFP ClinVar cross-reference. The upstream value
/// is '&'-separated when multiple; re-joined with the stable delimiter.
fn extract_omim(transcripts: &[TranscriptConsequence]) -> Option<String> {
    transcripts
        .iter()
        .find_map(|tc| tc.clinvar_omim_id.as_deref())
        .map(|raw| {
            raw.split('&')
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(VALUE_DELIMITER)
        })
        .filter(|s| !s.is_empty())
}

fn to_transcript_record(tc: &TranscriptConsequence) -> TranscriptRecord {
    TranscriptRecord {
        transcript_id: tc.transcript_id.clone().unwrap_or_default(),
        polyphen: tc.polyphen_score,
        protein_notation: hgvs_notation(tc.hgvsp.as_deref()),
        revel: tc.revel,
        splice_ai: tc.spliceai.as_ref().and_then(|s| s.max_delta()),
        mane: !tc.mane.is_empty(),
        loftee: tc.lof.as_deref().and_then(Loftee::parse),
        impact: tc.impact.as_deref().and_then(Impact::parse),
        gerp: tc.gerp_rs,
        cdna_notation: hgvs_notation(tc.hgvsc.as_deref()),
        consequences: if tc.consequence_terms.is_empty() {
            None
        } else {
            Some(tc.consequence_terms.join(VALUE_DELIMITER))
        },
    }
}

/// Strip the reference-sequence prefix from an HGVS string
/// ("ENST...:c.123A>G" -> "c.123A>G").
fn hgvs_notation(hgvs: Option<&str>) -> Option<String> {
    hgvs.and_then(|s| s.split_once(':'))
        .map(|(_, notation)| notation.to_string())
}
