// ==============================================================================
// registry.rs - Pending Variant Registry
// ==============================================================================
// Description: In-memory lifecycle tracking for variants between
//              submission and terminal resolution
// Author: Matt Barham
// Created: 2026-06-26
// Modified: 2026-07-28
// Version: 1.1.0
// ==============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

/// Lifecycle state of a pending variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    Queued,
    Processing,
    Completed,
    Failed,
    RetryAvailable,
}

impl PendingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PendingState::Completed | PendingState::Failed)
    }
}

/// One in-memory lifecycle record. Exists from submission until terminal
/// eviction or explicit resubmission; never persisted.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub variant_key: String,
    pub state: PendingState,
    pub attempts: u32,
    pub failure_reason: Option<String>,
    pub first_enqueued_at: Instant,
    pub last_transition_at: Instant,
}

/// Outcome of an atomic admission check on submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A fresh Queued entry was created (attempts carried forward on a
    /// resubmission after RetryAvailable).
    Admitted { attempts: u32 },
    /// An entry is already queued, processing, or completed.
    AlreadyPending { attempts: u32 },
    /// The entry is Failed and still within its retention window.
    RetryExhausted { attempts: u32 },
}

/// Registry counters for the statistics endpoint
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PendingCounts {
    pub queued: usize,
    pub processing: usize,
    pub retry_available: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Concurrent map from variant key to pending entry. A single lock
/// serializes mutations; pollers may observe a slightly stale state but
/// never an inconsistent one.
#[derive(Default)]
pub struct PendingRegistry {
    entries: Mutex<HashMap<String, PendingEntry>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic admission decision for the submission facade. Holding the
    /// lock for the whole check-and-insert prevents two concurrent
    /// submissions of the same key from both entering the queue.
    pub fn admit(&self, key: &str) -> Admission {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();

        match entries.get(key) {
            None => {
                entries.insert(
                    key.to_string(),
                    PendingEntry {
                        variant_key: key.to_string(),
                        state: PendingState::Queued,
                        attempts: 0,
                        failure_reason: None,
                        first_enqueued_at: now,
                        last_transition_at: now,
                    },
                );
                Admission::Admitted { attempts: 0 }
            }
            Some(entry) => match entry.state {
                PendingState::Queued | PendingState::Processing | PendingState::Completed => {
                    Admission::AlreadyPending {
                        attempts: entry.attempts,
                    }
                }
                PendingState::RetryAvailable => {
                    // Explicit resubmission: replace with a fresh Queued
                    // entry, carrying the attempt count forward.
                    let attempts = entry.attempts;
                    entries.insert(
                        key.to_string(),
                        PendingEntry {
                            variant_key: key.to_string(),
                            state: PendingState::Queued,
                            attempts,
                            failure_reason: None,
                            first_enqueued_at: now,
                            last_transition_at: now,
                        },
                    );
                    Admission::Admitted { attempts }
                }
                PendingState::Failed => Admission::RetryExhausted {
                    attempts: entry.attempts,
                },
            },
        }
    }

    pub fn get(&self, key: &str) -> Option<PendingEntry> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<PendingEntry> {
        self.entries.lock().unwrap().remove(key)
    }

    /// Transition a batch's members from Queued to Processing.
    pub fn mark_processing(&self, keys: &[String]) {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        for key in keys {
            if let Some(entry) = entries.get_mut(key) {
                entry.state = PendingState::Processing;
                entry.last_transition_at = now;
            }
        }
    }

    /// Publish a successful persist. The stored record is addressed by
    /// the variant key itself.
    pub fn complete(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.state = PendingState::Completed;
            entry.failure_reason = None;
            entry.last_transition_at = Instant::now();
        }
    }

    /// Record a failure for one variant and return the resulting state.
    ///
    /// Transient failures consume one attempt and leave the entry
    /// retriable until `max_retries` attempts are spent. Non-transient
    /// failures are terminal immediately.
    pub fn record_failure(
        &self,
        key: &str,
        reason: &str,
        transient: bool,
        max_retries: u32,
    ) -> Option<PendingState> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(key)?;

        entry.failure_reason = Some(reason.to_string());
        entry.last_transition_at = Instant::now();
        entry.state = if transient {
            entry.attempts += 1;
            if entry.attempts < max_retries {
                PendingState::RetryAvailable
            } else {
                PendingState::Failed
            }
        } else {
            PendingState::Failed
        };
        Some(entry.state)
    }

    /// Evict Completed/Failed entries older than the retention window.
    /// RetryAvailable entries stay until the client resubmits.
    pub fn sweep_terminal(&self, older_than: Duration) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| !(e.state.is_terminal() && e.last_transition_at.elapsed() >= older_than));
        let swept = before - entries.len();
        if swept > 0 {
            debug!("Swept {} terminal registry entries", swept);
        }
        swept
    }

    pub fn counts(&self) -> PendingCounts {
        let entries = self.entries.lock().unwrap();
        let mut counts = PendingCounts::default();
        for entry in entries.values() {
            match entry.state {
                PendingState::Queued => counts.queued += 1,
                PendingState::Processing => counts.processing += 1,
                PendingState::RetryAvailable => counts.retry_available += 1,
                PendingState::Completed => counts.completed += 1,
                PendingState::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_RETRIES: u32 = 3;

    #[test]
    fn test_admit_coalesces_duplicate_submissions() {
        let registry = PendingRegistry::new();

        assert_eq!(registry.admit("1:1:A>G"), Admission::Admitted { attempts: 0 });
        assert_eq!(
            registry.admit("1:1:A>G"),
            Admission::AlreadyPending { attempts: 0 }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_transient_failure_lifecycle() {
        let registry = PendingRegistry::new();
        registry.admit("1:1:A>G");
        registry.mark_processing(&["1:1:A>G".to_string()]);

        // First failure: one attempt spent, retry still available
        let state = registry
            .record_failure("1:1:A>G", "transient_upstream", true, MAX_RETRIES)
            .unwrap();
        assert_eq!(state, PendingState::RetryAvailable);
        assert_eq!(registry.get("1:1:A>G").unwrap().attempts, 1);

        // Resubmission carries the attempt count forward
        assert_eq!(registry.admit("1:1:A>G"), Admission::Admitted { attempts: 1 });
        assert_eq!(registry.get("1:1:A>G").unwrap().state, PendingState::Queued);

        // Two more failed attempts exhaust the budget
        registry.record_failure("1:1:A>G", "transient_upstream", true, MAX_RETRIES);
        registry.admit("1:1:A>G");
        let state = registry
            .record_failure("1:1:A>G", "transient_upstream", true, MAX_RETRIES)
            .unwrap();
        assert_eq!(state, PendingState::Failed);
        assert_eq!(registry.get("1:1:A>G").unwrap().attempts, 3);

        // Exhausted entries are not re-admitted while retained
        assert_eq!(
            registry.admit("1:1:A>G"),
            Admission::RetryExhausted { attempts: 3 }
        );
    }

    #[test]
    fn test_non_retriable_failure_is_terminal() {
        let registry = PendingRegistry::new();
        registry.admit("1:1:A>G");
        let state = registry
            .record_failure("1:1:A>G", "no_annotation_returned", false, MAX_RETRIES)
            .unwrap();
        assert_eq!(state, PendingState::Failed);
        // Attempts are not consumed by non-retriable failures
        assert_eq!(registry.get("1:1:A>G").unwrap().attempts, 0);
    }

    #[test]
    fn test_complete_and_sweep() {
        let registry = PendingRegistry::new();
        registry.admit("1:1:A>G");
        registry.admit("2:2:C>T");
        registry.complete("1:1:A>G");

        assert_eq!(
            registry.get("1:1:A>G").unwrap().state,
            PendingState::Completed
        );

        // Zero retention sweeps terminal entries immediately; the queued
        // entry survives.
        let swept = registry.sweep_terminal(Duration::ZERO);
        assert_eq!(swept, 1);
        assert!(registry.get("1:1:A>G").is_none());
        assert!(registry.get("2:2:C>T").is_some());

        // After eviction a fresh submission starts over at zero attempts
        assert_eq!(registry.admit("1:1:A>G"), Admission::Admitted { attempts: 0 });
    }

    #[test]
    fn test_sweep_respects_retention_window() {
        let registry = PendingRegistry::new();
        registry.admit("1:1:A>G");
        registry.complete("1:1:A>G");

        let swept = registry.sweep_terminal(Duration::from_secs(60));
        assert_eq!(swept, 0);
        assert!(registry.get("1:1:A>G").is_some());
    }

    #[test]
    fn test_counts() {
        let registry = PendingRegistry::new();
        registry.admit("1:1:A>G");
        registry.admit("2:2:C>T");
        registry.mark_processing(&["2:2:C>T".to_string()]);
        registry.admit("3:3:G>A");
        registry.record_failure("3:3:G>A", "transient_upstream", true, MAX_RETRIES);

        let counts = registry.counts();
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.retry_available, 1);
        assert_eq!(counts.completed, 0);
        assert_eq!(counts.failed, 0);
    }
}
