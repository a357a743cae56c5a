// ==============================================================================
// state.rs - Application State Management
// ==============================================================================
// Description: Shared application state for the annotation API
// Author: Matt Barham
// Created: 2026-06-30
// Modified: 2026-07-24
// Version: 1.0.0
// ==============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::batch::BatchProcessor;
use crate::facade::SubmissionFacade;
use crate::registry::PendingRegistry;
use crate::store::AnnotationStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: AnnotationStore,
    registry: Arc<PendingRegistry>,
    processor: BatchProcessor,
    facade: SubmissionFacade,
    max_batch_size: usize,
    max_wait_time: Duration,
}

impl AppState {
    pub fn new(
        store: AnnotationStore,
        registry: Arc<PendingRegistry>,
        processor: BatchProcessor,
        facade: SubmissionFacade,
        max_batch_size: usize,
        max_wait_time: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                registry,
                processor,
                facade,
                max_batch_size,
                max_wait_time,
            }),
        }
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.inner.store
    }

    pub fn registry(&self) -> &PendingRegistry {
        &self.inner.registry
    }

    pub fn processor(&self) -> &BatchProcessor {
        &self.inner.processor
    }

    pub fn facade(&self) -> &SubmissionFacade {
        &self.inner.facade
    }

    pub fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size
    }

    pub fn max_wait_time(&self) -> Duration {
        self.inner.max_wait_time
    }
}
