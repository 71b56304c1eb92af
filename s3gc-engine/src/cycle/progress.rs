//! Shared cycle bookkeeping: atomic counters, the bounded error list, and
//! the fatal-fault slot that aborts the cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use s3gc_core::constants::CYCLE_MAX_ERRORS;
use s3gc_core::errors::GcError;
use s3gc_core::models::{ObjectFailure, OperationCounters};

#[derive(Default)]
pub(crate) struct CycleProgress {
    pub candidates_found: AtomicU64,
    pub verified_orphans: AtomicU64,
    pub deleted_count: AtomicU64,
    pub excluded_count: AtomicU64,
    pub retained_count: AtomicU64,
    pub registry_stale_count: AtomicU64,
    pub bytes_original: AtomicU64,
    pub bytes_stored: AtomicU64,
    error_count: AtomicU64,
    errors: Mutex<Vec<ObjectFailure>>,
    orphans: Mutex<Vec<String>>,
    fatal: Mutex<Option<GcError>>,
}

impl CycleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a per-object failure. Counted always, listed while under the
    /// bound.
    pub fn push_failure(&self, failure: ObjectFailure) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        let mut errors = self.errors.lock().unwrap();
        if errors.len() < CYCLE_MAX_ERRORS {
            errors.push(failure);
        }
    }

    /// Record a warning entry (e.g. `registry_stale`) without bumping the
    /// failure count.
    pub fn push_warning(&self, warning: ObjectFailure) {
        let mut errors = self.errors.lock().unwrap();
        if errors.len() < CYCLE_MAX_ERRORS {
            errors.push(warning);
        }
    }

    pub fn push_orphan(&self, key: &str) {
        self.orphans.lock().unwrap().push(key.to_string());
    }

    /// First infrastructure fault wins; later ones are logged by callers.
    pub fn set_fatal(&self, error: GcError) {
        let mut fatal = self.fatal.lock().unwrap();
        if fatal.is_none() {
            *fatal = Some(error);
        }
    }

    pub fn has_fatal(&self) -> bool {
        self.fatal.lock().unwrap().is_some()
    }

    pub fn take_fatal(&self) -> Option<GcError> {
        self.fatal.lock().unwrap().take()
    }

    pub fn counters(&self) -> OperationCounters {
        OperationCounters {
            candidates_found: self.candidates_found.load(Ordering::Relaxed),
            verified_orphans: self.verified_orphans.load(Ordering::Relaxed),
            deleted_count: self.deleted_count.load(Ordering::Relaxed),
            excluded_count: self.excluded_count.load(Ordering::Relaxed),
            retained_count: self.retained_count.load(Ordering::Relaxed),
            registry_stale_count: self.registry_stale_count.load(Ordering::Relaxed),
            bytes_original: self.bytes_original.load(Ordering::Relaxed),
            bytes_stored: self.bytes_stored.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
        }
    }

    pub fn take_errors(&self) -> Vec<ObjectFailure> {
        std::mem::take(&mut self.errors.lock().unwrap())
    }

    pub fn take_orphans(&self) -> Vec<String> {
        std::mem::take(&mut self.orphans.lock().unwrap())
    }
}
