// ==============================================================================
// models.rs - Annotation Data Model
// ==============================================================================
// Description: Variant-level and transcript-level annotation records
// Author: Matt Barham
// Created: 2026-06-18
// Modified: 2026-07-24
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};

/// VEP impact classification for a transcript consequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Impact {
    High,
    Moderate,
    Low,
    Modifier,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::High => "HIGH",
            Impact::Moderate => "MODERATE",
            Impact::Low => "LOW",
            Impact::Modifier => "MODIFIER",
        }
    }

    /// Lenient parse: unknown or empty values become None rather than an error.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "HIGH" => Some(Impact::High),
            "MODERATE" => Some(Impact::Moderate),
            "LOW" => Some(Impact::Low),
            "MODIFIER" => Some(Impact::Modifier),
            _ => None,
        }
    }
}

/// LOFTEE loss-of-function confidence class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Loftee {
    /// High confidence
    Hc,
    /// Low confidence
    Lc,
}

impl Loftee {
    pub fn as_str(&self) -> &'static str {
        match self {
            Loftee::Hc => "HC",
            Loftee::Lc => "LC",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "HC" => Some(Loftee::Hc),
            "LC" => Some(Loftee::Lc),
            _ => None,
        }
    }
}

/// Variant-level annotation record. One per variant key; presence in the
/// cache store implies annotation completed successfully at least once.
/// Missing upstream values stay None - they are never coerced to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub variant_key: String,
    pub gene: Option<String>,
    pub cadd: Option<f64>,
    /// ML pathogenicity score in [0, 1]; None when the model is unavailable
    pub ml_score: Option<f64>,
    pub most_severe_consequence: Option<String>,
    /// gnomAD allele frequency
    pub allele_freq: Option<f64>,
    /// Maximum allele frequency across reported populations
    pub max_allele_freq: Option<f64>,
    pub omim: Option<String>,
    /// ClinVar clinical significance, comma-joined when multiple
    pub clinsig: Option<String>,
}

/// Per-transcript annotation detail for a variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub transcript_id: String,
    pub polyphen: Option<f64>,
    /// HGVS.p protein notation
    pub protein_notation: Option<String>,
    pub revel: Option<f64>,
    /// Maximum SpliceAI delta score
    pub splice_ai: Option<f64>,
    /// True when this is the MANE transcript for the gene
    pub mane: bool,
    pub loftee: Option<Loftee>,
    pub impact: Option<Impact>,
    /// GERP++ conservation score
    pub gerp: Option<f64>,
    /// HGVS.c cDNA notation
    pub cdna_notation: Option<String>,
    /// Comma-joined consequence terms
    pub consequences: Option<String>,
}

/// A fully parsed annotation for one variant: the variant-level record
/// plus zero or more transcript rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantAnnotation {
    #[serde(flatten)]
    pub record: AnnotationRecord,
    pub transcripts: Vec<TranscriptRecord>,
}

impl VariantAnnotation {
    /// The transcript the scorer and gene extraction treat as canonical:
    /// the MANE transcript when present, otherwise the first listed.
    pub fn canonical_transcript(&self) -> Option<&TranscriptRecord> {
        self.transcripts
            .iter()
            .find(|t| t.mane)
            .or_else(|| self.transcripts.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impact_parse() {
        assert_eq!(Impact::parse("HIGH"), Some(Impact::High));
        assert_eq!(Impact::parse("moderate"), Some(Impact::Moderate));
        assert_eq!(Impact::parse(""), None);
        assert_eq!(Impact::parse("SEVERE"), None);
        assert_eq!(Impact::High.as_str(), "HIGH");
    }

    #[test]
    fn test_loftee_parse() {
        assert_eq!(Loftee::parse("HC"), Some(Loftee::Hc));
        assert_eq!(Loftee::parse("lc"), Some(Loftee::Lc));
        assert_eq!(Loftee::parse("0"), None);
        assert_eq!(Loftee::Hc.as_str(), "HC");
    }

    #[test]
    fn test_canonical_transcript_prefers_mane() {
        let transcript = |id: &str, mane: bool| TranscriptRecord {
            transcript_id: id.to_string(),
            polyphen: None,
            protein_notation: None,
            revel: None,
            splice_ai: None,
            mane,
            loftee: None,
            impact: None,
            gerp: None,
            cdna_notation: None,
            consequences: None,
        };

        let annotation = VariantAnnotation {
            record: AnnotationRecord {
                variant_key: "1:1:A>G".to_string(),
                gene: None,
                cadd: None,
                ml_score: None,
                most_severe_consequence: None,
                allele_freq: None,
                max_allele_freq: None,
                omim: None,
                clinsig: None,
            },
            transcripts: vec![transcript("ENST1", false), transcript("ENST2", true)],
        };
        assert_eq!(
            annotation.canonical_transcript().unwrap().transcript_id,
            "ENST2"
        );

        let first_fallback = VariantAnnotation {
            transcripts: vec![transcript("ENST1", false), transcript("ENST2", false)],
            ..annotation
        };
        assert_eq!(
            first_fallback.canonical_transcript().unwrap().transcript_id,
            "ENST1"
        );
    }
}
