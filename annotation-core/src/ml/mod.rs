// ==============================================================================
// ml/mod.rs - Pathogenicity Scoring
// ==============================================================================
// Description: Feature extraction and tree-ensemble pathogenicity scorer
// Author: Matt Barham
// Created: 2026-06-24
// Modified: 2026-07-24
// Version: 1.0.0
// ==============================================================================

pub mod features;
pub mod forest;

use std::path::Path;

use tracing::{info, warn};

use crate::models::VariantAnnotation;
use forest::ForestModel;

/// Pathogenicity scorer wrapping the serialized tree-ensemble model.
///
/// The model file is a deployment artifact, not a code dependency; a
/// missing or unreadable model puts the scorer into degraded mode and
/// every score comes back None (stored as NULL, never as zero).
pub struct PathogenicityScorer {
    model: Option<ForestModel>,
}

impl PathogenicityScorer {
    /// Load the model from disk. Failure degrades rather than aborts.
    pub fn from_path(path: Option<&Path>) -> Self {
        let model = match path {
            Some(path) => match ForestModel::load(path) {
                Ok(model) => {
                    info!("Loaded ML model from {:?} ({} trees)", path, model.tree_count());
                    Some(model)
                }
                Err(e) => {
                    warn!("ML model unavailable ({}); scores will be null", e);
                    None
                }
            },
            None => {
                warn!("No ML model path configured; scores will be null");
                None
            }
        };
        Self { model }
    }

    /// A scorer with no model, for degraded-mode operation.
    pub fn disabled() -> Self {
        Self { model: None }
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    /// Score one annotation record, once per variant (not per transcript).
    /// Features come from the record and its canonical transcript.
    pub fn score(&self, annotation: &VariantAnnotation) -> Option<f64> {
        let model = self.model.as_ref()?;
        let features = features::feature_vector(annotation);
        Some(model.predict(&features))
    }
}
