//! Per-client generation counter. The store is injected so the counter can live in
//! memory, in a browser-backed store, or in a test double.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{RelayError, Result};

pub trait UsageStore {
    fn load(&self) -> u32;
    fn save(&self, count: u32);
}

#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    count: AtomicU32,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(count: u32) -> Self {
        Self {
            count: AtomicU32::new(count),
        }
    }
}

impl UsageStore for MemoryUsageStore {
    fn load(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    fn save(&self, count: u32) {
        self.count.store(count, Ordering::Relaxed);
    }
}

pub struct UsageTracker<S: UsageStore> {
    store: S,
    limit: u32,
}

impl<S: UsageStore> UsageTracker<S> {
    pub fn new(store: S, limit: u32) -> Self {
        Self { store, limit }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn count(&self) -> u32 {
        self.store.load()
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count())
    }

    pub fn limit_reached(&self) -> bool {
        self.count() >= self.limit
    }

    /// Counts one generation and returns the new total.
    pub fn record_generation(&self) -> Result<u32> {
        if self.limit_reached() {
            return Err(RelayError::validation(format!(
                "Generation limit of {} reached",
                self.limit
            )));
        }
        let count = self.count() + 1;
        self.store.save(count);
        Ok(count)
    }

    pub fn reset(&self) {
        self.store.save(0);
    }
}
