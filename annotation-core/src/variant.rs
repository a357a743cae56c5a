// ==============================================================================
// variant.rs - Variant Identity and Key Normalization
// ==============================================================================
// Description: Canonical variant keys and Ensembl region formatting
// Author: Matt Barham
// Created: 2026-06-18
// Modified: 2026-07-24
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Variant parsing/validation errors
#[derive(Error, Debug)]
pub enum VariantError {
    #[error("Invalid chromosome: '{0}' (expected 1-22, X, Y or MT)")]
    InvalidChromosome(String),

    #[error("Invalid position: {0} (must be >= 1)")]
    InvalidPosition(i64),

    #[error("Invalid REF allele: '{0}'")]
    InvalidRef(String),

    #[error("Invalid ALT allele: '{0}'")]
    InvalidAlt(String),

    #[error("Malformed variant key: '{0}' (expected chrom:pos:ref>alt)")]
    MalformedKey(String),
}

/// A single-nucleotide (or small indel) variant in canonical form.
///
/// Canonical form: chromosome without the `chr` prefix, upper-cased,
/// mitochondrial `M` normalized to `MT`; alleles upper-cased. The same
/// form is used on every path - submit, poll, store reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub chrom: String,
    pub pos: u64,
    pub ref_allele: String,
    pub alt_allele: String,
}

impl Variant {
    /// Validate and normalize raw submission fields into a variant.
    pub fn parse(chrom: &str, pos: i64, ref_allele: &str, alt_allele: &str) -> Result<Self, VariantError> {
        let chrom = normalize_chromosome(chrom)?;

        if pos < 1 {
            return Err(VariantError::InvalidPosition(pos));
        }

        let ref_allele = ref_allele.to_uppercase();
        if !is_valid_allele(&ref_allele) {
            return Err(VariantError::InvalidRef(ref_allele));
        }

        let alt_allele = alt_allele.to_uppercase();
        if !is_valid_allele(&alt_allele) {
            return Err(VariantError::InvalidAlt(alt_allele));
        }

        Ok(Self {
            chrom,
            pos: pos as u64,
            ref_allele,
            alt_allele,
        })
    }

    /// Parse a variant key string ("1:12345:A>G"), applying the same
    /// normalization as `parse`.
    pub fn from_key(key: &str) -> Result<Self, VariantError> {
        let mut parts = key.splitn(3, ':');
        let (chrom, pos, alleles) = match (parts.next(), parts.next(), parts.next()) {
            (Some(c), Some(p), Some(a)) => (c, p, a),
            _ => return Err(VariantError::MalformedKey(key.to_string())),
        };

        let pos: i64 = pos
            .parse()
            .map_err(|_| VariantError::MalformedKey(key.to_string()))?;

        let (ref_allele, alt_allele) = alleles
            .split_once('>')
            .ok_or_else(|| VariantError::MalformedKey(key.to_string()))?;

        Self::parse(chrom, pos, ref_allele, alt_allele)
    }

    /// Canonical variant key: "{chrom}:{pos}:{ref}>{alt}".
    pub fn key(&self) -> String {
        format!("{}:{}:{}>{}", self.chrom, self.pos, self.ref_allele, self.alt_allele)
    }

    /// Format the variant as an Ensembl VEP region string:
    /// "{chrom} {start} {end} {ref}/{alt} +".
    ///
    /// End position is start + len(ref) - 1 for SNVs, deletions and
    /// same-length substitutions. Insertions use end == start (VEP expects
    /// a single anchor base for simple insertions).
    pub fn to_region(&self) -> String {
        let end = if self.alt_allele.len() > self.ref_allele.len() {
            self.pos
        } else {
            self.pos + self.ref_allele.len() as u64 - 1
        };
        format!(
            "{} {} {} {}/{} +",
            self.chrom, self.pos, end, self.ref_allele, self.alt_allele
        )
    }
}

/// Map a VEP response `input` string ("1 12345 12345 A/G +") back to the
/// canonical variant key it was generated from. Returns None when the
/// string does not look like a region descriptor.
pub fn key_from_region_input(input: &str) -> Option<String> {
    let fields: Vec<&str> = input.split_whitespace().collect();
    if fields.len() < 4 {
        return None;
    }
    let (ref_allele, alt_allele) = fields[3].split_once('/')?;
    Some(format!("{}:{}:{}>{}", fields[0], fields[1], ref_allele, alt_allele))
}

fn normalize_chromosome(chrom: &str) -> Result<String, VariantError> {
    let stripped = chrom
        .strip_prefix("chr")
        .or_else(|| chrom.strip_prefix("Chr"))
        .or_else(|| chrom.strip_prefix("CHR"))
        .unwrap_or(chrom);

    let upper = stripped.to_uppercase();
    let canonical = if upper == "M" { "MT".to_string() } else { upper };

    let valid = match canonical.as_str() {
        "X" | "Y" | "MT" => true,
        n => matches!(n.parse::<u8>(), Ok(1..=22)),
    };

    if valid {
        Ok(canonical)
    } else {
        Err(VariantError::InvalidChromosome(chrom.to_string()))
    }
}

fn is_valid_allele(allele: &str) -> bool {
    !allele.is_empty() && allele.bytes().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_chr_prefix() {
        let v = Variant::parse("chr1", 12345, "a", "g").unwrap();
        assert_eq!(v.key(), "1:12345:A>G");
    }

    #[test]
    fn test_parse_normalizes_mitochondrial() {
        let v = Variant::parse("chrM", 100, "A", "T").unwrap();
        assert_eq!(v.chrom, "MT");
        let v = Variant::parse("mt", 100, "A", "T").unwrap();
        assert_eq!(v.chrom, "MT");
    }

    #[test]
    fn test_parse_rejects_invalid_chromosome() {
        assert!(matches!(
            Variant::parse("chr25", 1, "A", "G"),
            Err(VariantError::InvalidChromosome(_))
        ));
        assert!(matches!(
            Variant::parse("banana", 1, "A", "G"),
            Err(VariantError::InvalidChromosome(_))
        ));
    }

    #[test]
    fn test_parse_rejects_invalid_bases() {
        // N is not a valid base
        assert!(matches!(
            Variant::parse("X", 1, "N", "N"),
            Err(VariantError::InvalidRef(_))
        ));
        assert!(matches!(
            Variant::parse("1", 1, "A", "Z"),
            Err(VariantError::InvalidAlt(_))
        ));
        assert!(matches!(
            Variant::parse("1", 1, "", "G"),
            Err(VariantError::InvalidRef(_))
        ));
    }

    #[test]
    fn test_parse_rejects_nonpositive_position() {
        assert!(matches!(
            Variant::parse("1", 0, "A", "G"),
            Err(VariantError::InvalidPosition(0))
        ));
        assert!(matches!(
            Variant::parse("1", -5, "A", "G"),
            Err(VariantError::InvalidPosition(-5))
        ));
    }

    #[test]
    fn test_from_key_round_trip() {
        let v = Variant::from_key("chr2:148483494:c>a").unwrap();
        assert_eq!(v.key(), "2:148483494:C>A");
        assert!(Variant::from_key("not-a-key").is_err());
        assert!(Variant::from_key("1:abc:A>G").is_err());
        assert!(Variant::from_key("1:100:AG").is_err());
    }

    #[test]
    fn test_region_snv() {
        let v = Variant::parse("1", 12345, "A", "G").unwrap();
        assert_eq!(v.to_region(), "1 12345 12345 A/G +");
    }

    #[test]
    fn test_region_deletion_end_position() {
        let v = Variant::parse("1", 100, "GCG", "C").unwrap();
        assert_eq!(v.to_region(), "1 100 102 GCG/C +");
    }

    #[test]
    fn test_region_insertion_anchors_start() {
        let v = Variant::parse("1", 100, "C", "CAT").unwrap();
        assert_eq!(v.to_region(), "1 100 100 C/CAT +");
    }

    #[test]
    fn test_key_from_region_input() {
        let v = Variant::parse("2", 148483494, "C", "A").unwrap();
        assert_eq!(
            key_from_region_input(&v.to_region()).as_deref(),
            Some("2:148483494:C>A")
        );
        assert_eq!(key_from_region_input("garbage"), None);
    }
}
