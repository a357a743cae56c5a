// ==============================================================================
// facade.rs - Submission Facade
// ==============================================================================
// Description: Entry point between the HTTP layer and the batch core:
//              cache short-circuit, registry admission, enqueue
// Author: Matt Barham
// Created: 2026-06-30
// Modified: 2026-07-28
// Version: 1.1.0
// ==============================================================================

use std::sync::Arc;

use annotation_core::models::VariantAnnotation;
use annotation_core::variant::{Variant, VariantError};
use thiserror::Error;
use tracing::{debug, info};

use crate::batch::BatchProcessor;
use crate::registry::{Admission, PendingRegistry, PendingState};
use crate::store::AnnotationStore;

/// Synchronous submission failures. Everything else surfaces through
/// polling.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] VariantError),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// Successful submission outcome plus the canonical key it resolved to.
#[derive(Debug)]
pub struct SubmitResult {
    pub variant_key: String,
    pub outcome: SubmitOutcome,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// The cache already holds a record; nothing was enqueued.
    Cached(Box<VariantAnnotation>),
    /// A fresh Queued entry entered the batch queue.
    Accepted { attempts: u32 },
    /// An entry for this key is already in flight.
    AlreadyPending { attempts: u32 },
    /// The key is terminally Failed and still within retention.
    RetryExhausted { attempts: u32 },
}

/// Poll outcome for one variant key
#[derive(Debug)]
pub enum PollOutcome {
    Processing { attempts: u32 },
    Completed(Box<VariantAnnotation>),
    Failed { attempts: u32, reason: Option<String> },
    RetryAvailable { attempts: u32 },
    NotFound,
}

/// Thin entry point called by the HTTP handlers. Owns no state of its
/// own; the registry and queue live in the processor's world and are
/// injected here.
pub struct SubmissionFacade {
    store: AnnotationStore,
    registry: Arc<PendingRegistry>,
    processor: BatchProcessor,
}

impl SubmissionFacade {
    pub fn new(store: AnnotationStore, registry: Arc<PendingRegistry>, processor: BatchProcessor) -> Self {
        Self {
            store,
            registry,
            processor,
        }
    }

    /// Submit one variant. Idempotent with respect to in-flight work:
    /// concurrent submissions of the same key coalesce onto one pending
    /// entry and one batch membership.
    pub async fn submit(
        &self,
        chrom: &str,
        pos: i64,
        ref_allele: &str,
        alt_allele: &str,
    ) -> Result<SubmitResult, SubmitError> {
        let variant = Variant::parse(chrom, pos, ref_allele, alt_allele)?;
        let variant_key = variant.key();

        if self.processor.is_shutting_down() {
            return Err(SubmitError::Unavailable("Service is shutting down".to_string()));
        }

        // Cache hit short-circuits the whole pipeline.
        match self.store.get_annotation(&variant_key).await {
            Ok(Some(annotation)) => {
                debug!("Cache hit for {}", variant_key);
                return Ok(SubmitResult {
                    variant_key,
                    outcome: SubmitOutcome::Cached(Box::new(annotation)),
                });
            }
            Ok(None) => {}
            Err(e) => {
                return Err(SubmitError::Unavailable(format!(
                    "Annotation store unreachable: {}",
                    e
                )));
            }
        }

        let outcome = match self.registry.admit(&variant_key) {
            Admission::Admitted { attempts } => {
                if self.processor.enqueue(variant).is_err() {
                    // Roll the entry back so shutdown leaves no orphaned
                    // Queued state behind.
                    self.registry.remove(&variant_key);
                    return Err(SubmitError::Unavailable("Service is shutting down".to_string()));
                }
                info!(
                    "Accepted {} (attempt {}/{})",
                    variant_key,
                    attempts + 1,
                    self.processor.max_retries()
                );
                SubmitOutcome::Accepted { attempts }
            }
            Admission::AlreadyPending { attempts } => SubmitOutcome::AlreadyPending { attempts },
            Admission::RetryExhausted { attempts } => SubmitOutcome::RetryExhausted { attempts },
        };

        Ok(SubmitResult {
            variant_key,
            outcome,
        })
    }

    /// Poll one variant key: cache first, then registry state.
    pub async fn poll(&self, raw_key: &str) -> Result<PollOutcome, SubmitError> {
        // Apply the same normalization as submit so pollers can use
        // either form of the key.
        let variant_key = match Variant::from_key(raw_key) {
            Ok(variant) => variant.key(),
            Err(_) => return Ok(PollOutcome::NotFound),
        };

        match self.store.get_annotation(&variant_key).await {
            Ok(Some(annotation)) => return Ok(PollOutcome::Completed(Box::new(annotation))),
            Ok(None) => {}
            Err(e) => {
                return Err(SubmitError::Unavailable(format!(
                    "Annotation store unreachable: {}",
                    e
                )));
            }
        }

        let Some(entry) = self.registry.get(&variant_key) else {
            return Ok(PollOutcome::NotFound);
        };

        let outcome = match entry.state {
            PendingState::Queued | PendingState::Processing => PollOutcome::Processing {
                attempts: entry.attempts,
            },
            PendingState::RetryAvailable => PollOutcome::RetryAvailable {
                attempts: entry.attempts,
            },
            PendingState::Failed => PollOutcome::Failed {
                attempts: entry.attempts,
                reason: entry.failure_reason,
            },
            PendingState::Completed => {
                // The registry says completed, so the row committed after
                // our read above; fetch it again.
                match self.store.get_annotation(&variant_key).await {
                    Ok(Some(annotation)) => PollOutcome::Completed(Box::new(annotation)),
                    _ => PollOutcome::Processing {
                        attempts: entry.attempts,
                    },
                }
            }
        };
        Ok(outcome)
    }
}
