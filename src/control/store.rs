//! store.rs
//! Append-only time series shared between the clock and the ingestion thread.
//!
//! - One `parking_lot::Mutex` guards the rows; every public call takes it once
//!   and releases it before returning, so append/get/set are each atomic.
//! - A version counter is bumped on every mutation. Display code polls
//!   `version()` to learn that new data is available without holding the lock.
//! - Rows are never reordered or removed; `clear()` is the only way to shrink.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;

use crate::control::sample::Sample;
use crate::error::StoreError;

#[derive(Clone, Default)]
pub struct TimeSeriesStore {
    rows: Arc<Mutex<Vec<Sample>>>,
    version: Arc<AtomicU64>,
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples<I: IntoIterator<Item = Sample>>(samples: I) -> Self {
        let store = Self::new();
        store.extend(samples);
        store
    }

    /// Appends to the end and returns the index the sample landed at.
    pub fn append(&self, sample: Sample) -> usize {
        let mut rows = self.rows.lock();
        rows.push(sample);
        self.version.fetch_add(1, Ordering::Release);
        rows.len() - 1
    }

    /// Appends a batch under a single lock acquisition.
    pub fn extend<I: IntoIterator<Item = Sample>>(&self, samples: I) {
        let mut rows = self.rows.lock();
        rows.extend(samples);
        self.version.fetch_add(1, Ordering::Release);
    }

    pub fn get(&self, index: usize) -> Result<Sample, StoreError> {
        let rows = self.rows.lock();
        rows.get(index).copied().ok_or(StoreError::OutOfRange {
            index,
            len: rows.len(),
        })
    }

    /// Overwrites the row at `index` in place.
    pub fn set(&self, index: usize, sample: Sample) -> Result<(), StoreError> {
        let mut rows = self.rows.lock();
        let len = rows.len();
        let slot = rows
            .get_mut(index)
            .ok_or(StoreError::OutOfRange { index, len })?;
        *slot = sample;
        self.version.fetch_add(1, Ordering::Release);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    pub fn clear(&self) {
        self.rows.lock().clear();
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Copies every row under one lock, for rendering and export.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.rows.lock().clone()
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}
