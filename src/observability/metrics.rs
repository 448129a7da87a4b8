//! Store operation counters
//!
//! - Counters only, monotonic
//! - Shared by `Arc` between clients working on the same container
//! - Relaxed ordering; values are exact once all operations have returned

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::store::{StoreError, StoreErrorKind};

/// Counters for one set of clients
#[derive(Debug, Default)]
pub struct StoreMetrics {
    creates: AtomicU64,
    upserts: AtomicU64,
    reads: AtomicU64,
    /// Point reads answered 404
    read_misses: AtomicU64,
    query_pages: AtomicU64,
    batches: AtomicU64,
    /// Documents patched by successful batch operations
    patched_items: AtomicU64,
    decoding_errors: AtomicU64,
    error_responses: AtomicU64,
    empty_responses: AtomicU64,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_creates(&self) {
        self.creates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_upserts(&self) {
        self.upserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reads(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_read_misses(&self) {
        self.read_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_query_pages(&self) {
        self.query_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_batches(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_patched_items(&self, count: u64) {
        self.patched_items.fetch_add(count, Ordering::Relaxed);
    }

    /// Invalid items seen, whether surfaced as errors or skipped
    pub fn add_decoding_errors(&self, count: u64) {
        self.decoding_errors.fetch_add(count, Ordering::Relaxed);
    }

    /// Counts a returned error under its kind
    pub fn record_error(&self, err: &StoreError) {
        let counter = match err.kind() {
            StoreErrorKind::EmptyResponse => &self.empty_responses,
            StoreErrorKind::DecodingError => &self.decoding_errors,
            StoreErrorKind::ErrorResponse => &self.error_responses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            creates: self.creates.load(Ordering::Relaxed),
            upserts: self.upserts.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            read_misses: self.read_misses.load(Ordering::Relaxed),
            query_pages: self.query_pages.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            patched_items: self.patched_items.load(Ordering::Relaxed),
            decoding_errors: self.decoding_errors.load(Ordering::Relaxed),
            error_responses: self.error_responses.load(Ordering::Relaxed),
            empty_responses: self.empty_responses.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub creates: u64,
    pub upserts: u64,
    pub reads: u64,
    pub read_misses: u64,
    pub query_pages: u64,
    pub batches: u64,
    pub patched_items: u64,
    pub decoding_errors: u64,
    pub error_responses: u64,
    pub empty_responses: u64,
}
