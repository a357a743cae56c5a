// ==============================================================================
// ml/features.rs - ML Feature Vector Extraction
// ==============================================================================
// Description: Nine-feature encoding of an annotation record for the
//              pathogenicity model
// Author: Matt Barham
// Created: 2026-06-24
// Modified: 2026-07-24
// Version: 1.0.0
// ==============================================================================

use crate::models::{Impact, Loftee, VariantAnnotation};

/// Fixed model input width. Order: consequence, impact, allele frequency,
/// max allele frequency, SpliceAI, GERP++, LOFTEE, PolyPhen-2, CADD.
pub const FEATURE_COUNT: usize = 9;

// Training-time imputation constants. PolyPhen defaults to its neutral
// midpoint; every other numeric feature was trained with 0.0 for absent.
const POLYPHEN_DEFAULT: f64 = 0.5;

/// Ordinal encoding of a consequence term, as used at training time.
/// Unknown terms encode to 0.
pub fn encode_consequence(term: &str) -> f64 {
    match term.trim().to_lowercase().as_str() {
        "transcript_ablation" => 4.0,
        "frameshift_variant"
        | "splice_acceptor_variant"
        | "splice_donor_variant"
        | "splice_donor_5th_base_variant"
        | "splice_donor_region_variant"
        | "splice_polypyrimidine_tract_variant"
        | "splice_region_variant"
        | "start_lost"
        | "stop_gained"
        | "stop_lost" => 3.0,
        "inframe_deletion" | "inframe_insertion" => 2.5,
        "coding_sequence_variant" => 2.0,
        "missense_variant" | "protein_altering_variant" => 2.0,
        "3_prime_utr_variant"
        | "5_prime_utr_variant"
        | "mature_mirna_variant"
        | "non_coding_transcript_exon_variant"
        | "stop_retained_variant" => 1.0,
        "downstream_gene_variant" | "upstream_gene_variant" => 0.5,
        "intron_variant" | "synonymous_variant" => 0.1,
        _ => 0.0,
    }
}

/// Ordinal encoding of the VEP impact class. Absent encodes to 0.
pub fn encode_impact(impact: Option<Impact>) -> f64 {
    match impact {
        Some(Impact::High) => 1.0,
        Some(Impact::Moderate) => 0.5,
        Some(Impact::Low) => 0.25,
        Some(Impact::Modifier) => 0.1,
        None => 0.0,
    }
}

/// Ordinal encoding of the LOFTEE class. Absent encodes to 0.
pub fn encode_loftee(loftee: Option<Loftee>) -> f64 {
    match loftee {
        Some(Loftee::Hc) => 1.0,
        Some(Loftee::Lc) => 0.5,
        None => 0.0,
    }
}

/// Build the model's nine-feature input from a parsed annotation.
///
/// The consequence feature uses the canonical transcript's first
/// consequence term, falling back to the record's most severe
/// consequence. Numeric scores come from the canonical transcript
/// (SpliceAI, GERP++, PolyPhen) and the record (frequencies, CADD).
pub fn feature_vector(annotation: &VariantAnnotation) -> [f64; FEATURE_COUNT] {
    let record = &annotation.record;
    let canonical = annotation.canonical_transcript();

    let consequence_term = canonical
        .and_then(|tc| tc.consequences.as_deref())
        .and_then(|terms| terms.split(',').next())
        .or(record.most_severe_consequence.as_deref())
        .unwrap_or_default();

    [
        encode_consequence(consequence_term),
        encode_impact(canonical.and_then(|tc| tc.impact)),
        record.allele_freq.unwrap_or(0.0),
        record.max_allele_freq.unwrap_or(0.0),
        canonical.and_then(|tc| tc.splice_ai).unwrap_or(0.0),
        canonical.and_then(|tc| tc.gerp).unwrap_or(0.0),
        encode_loftee(canonical.and_then(|tc| tc.loftee)),
        canonical
            .and_then(|tc| tc.polyphen)
            .unwrap_or(POLYPHEN_DEFAULT),
        record.cadd.unwrap_or(0.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnnotationRecord, TranscriptRecord};

    fn annotation() -> VariantAnnotation {
        VariantAnnotation {
            record: AnnotationRecord {
                variant_key: "1:12345:A>G".to_string(),
                gene: Some("BRCA1".to_string()),
                cadd: Some(23.4),
                ml_score: None,
                most_severe_consequence: Some("missense_variant".to_string()),
                allele_freq: Some(0.0001),
                max_allele_freq: Some(0.003),
                omim: None,
                clinsig: None,
            },
            transcripts: vec![TranscriptRecord {
                transcript_id: "ENST00000001".to_string(),
                polyphen: Some(0.97),
                protein_notation: None,
                revel: Some(0.81),
                splice_ai: Some(0.34),
                mane: true,
                loftee: Some(Loftee::Hc),
                impact: Some(Impact::Moderate),
                gerp: Some(4.58),
                cdna_notation: None,
                consequences: Some("missense_variant,splice_region_variant".to_string()),
            }],
        }
    }

    #[test]
    fn test_encode_consequence() {
        assert_eq!(encode_consequence("frameshift_variant"), 3.0);
        assert_eq!(encode_consequence("missense_variant"), 2.0);
        assert_eq!(encode_consequence("Intron_Variant"), 0.1);
        assert_eq!(encode_consequence("upstream_gene_variant"), 0.5);
        assert_eq!(encode_consequence("transcript_ablation"), 4.0);
        assert_eq!(encode_consequence("something_new"), 0.0);
        assert_eq!(encode_consequence(""), 0.0);
    }

    #[test]
    fn test_encode_impact_and_loftee() {
        assert_eq!(encode_impact(Some(Impact::High)), 1.0);
        assert_eq!(encode_impact(Some(Impact::Modifier)), 0.1);
        assert_eq!(encode_impact(None), 0.0);
        assert_eq!(encode_loftee(Some(Loftee::Hc)), 1.0);
        assert_eq!(encode_loftee(Some(Loftee::Lc)), 0.5);
        assert_eq!(encode_loftee(None), 0.0);
    }

    #[test]
    fn test_feature_vector_order() {
        let features = feature_vector(&annotation());
        assert_eq!(
            features,
            [2.0, 0.5, 0.0001, 0.003, 0.34, 4.58, 1.0, 0.97, 23.4]
        );
    }

    #[test]
    fn test_feature_vector_imputation() {
        let mut sparse = annotation();
        sparse.record.allele_freq = None;
        sparse.record.max_allele_freq = None;
        sparse.record.cadd = None;
        sparse.transcripts.clear();

        let features = feature_vector(&sparse);
        // consequence falls back to most_severe_consequence
        assert_eq!(features[0], 2.0);
        // impact, frequencies, spliceai, gerp, loftee, cadd impute to 0
        assert_eq!(features[1], 0.0);
        assert_eq!(features[2], 0.0);
        assert_eq!(features[3], 0.0);
        assert_eq!(features[4], 0.0);
        assert_eq!(features[5], 0.0);
        assert_eq!(features[6], 0.0);
        // polyphen imputes to its neutral midpoint, not zero
        assert_eq!(features[7], 0.5);
        assert_eq!(features[8], 0.0);
    }
}
