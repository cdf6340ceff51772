use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use wayfinder_core::{CachedResource, WayfinderError};

/// Content cache keyed by tx id, with per-key single-flight coalescing: a
/// `DashMap` gives lock-free access to the right slot, and the slot's own
/// mutex is what concurrent callers for the *same* tx id block on — the
/// second caller in finds the first caller's fresh entry already installed
/// rather than triggering a duplicate fetch.
pub struct ContentCache {
    entries: DashMap<String, Arc<Mutex<Option<CachedResource>>>>,
    ttl: Duration,
}

impl ContentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub async fn get_or_fetch<F, Fut>(
        &self,
        tx_id: &str,
        fetch: F,
    ) -> Result<CachedResource, WayfinderError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<CachedResource, WayfinderError>>,
    {
        let slot = self
            .entries
            .entry(tx_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut guard = slot.lock().await;
        if let Some(existing) = guard.as_ref() {
            if !existing.is_expired() {
                return Ok(existing.clone());
            }
        }

        let resource = fetch().await?;
        *guard = Some(resource.clone());
        Ok(resource)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
