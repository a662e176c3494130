//! Session cache: per-entity items, summaries and sales context for the
//! lifetime of the process.
//!
//! Writers claim an entity slot first (`claim`); a second claim for the same
//! entity fails until the first guard is dropped. Readers never block on claims.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::NewsItem;

/// Everything the pipeline has produced for one entity, filled stage by stage.
/// `summarized` is set once the summarize stage has run over `items`; an entry
/// without it only holds fetched items.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    #[serde(default)]
    pub items: Vec<NewsItem>,
    #[serde(default)]
    pub summaries: Vec<String>,
    #[serde(default)]
    pub competitor_summaries: Vec<String>,
    #[serde(default)]
    pub sales_context: String,
    #[serde(default)]
    pub summarized: bool,
}

impl CacheEntry {
    /// Items only, as left by a plain fetch.
    pub fn fetched(items: Vec<NewsItem>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    claims: Mutex<HashSet<String>>,
}

/// Entity names are matched trimmed and case-insensitively.
pub fn cache_key(entity: &str) -> String {
    entity.trim().to_lowercase()
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "signals_cache_hits_total",
            "Entity lookups answered from the session cache."
        );
    });
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity: &str) -> Option<CacheEntry> {
        ensure_metrics_described();
        let hit = self
            .entries
            .lock()
            .expect("cache mutex poisoned")
            .get(&cache_key(entity))
            .cloned();
        if hit.is_some() {
            counter!("signals_cache_hits_total").increment(1);
        }
        hit
    }

    pub fn put(&self, entity: &str, entry: CacheEntry) {
        debug!(target: "signals::cache", entity, items = entry.items.len(), "cache put");
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .insert(cache_key(entity), entry);
    }

    /// Drop the entity's entry. Returns whether one existed.
    pub fn invalidate(&self, entity: &str) -> bool {
        let removed = self
            .entries
            .lock()
            .expect("cache mutex poisoned")
            .remove(&cache_key(entity))
            .is_some();
        debug!(target: "signals::cache", entity, removed, "cache invalidate");
        removed
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .contains_key(&cache_key(entity))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claim the single writer slot for `entity`. `None` when another writer holds it.
    pub fn claim(&self, entity: &str) -> Option<CacheClaim<'_>> {
        let key = cache_key(entity);
        let fresh = self
            .claims
            .lock()
            .expect("cache claims mutex poisoned")
            .insert(key.clone());
        fresh.then_some(CacheClaim { cache: self, key })
    }
}

/// Exclusive writer slot for one entity; released on drop.
#[derive(Debug)]
pub struct CacheClaim<'a> {
    cache: &'a SessionCache,
    key: String,
}

impl Drop for CacheClaim<'_> {
    fn drop(&mut self) {
        if let Ok(mut claims) = self.cache.claims.lock() {
            claims.remove(&self.key);
        }
    }
}
