//! Offer Catalog
//!
//! Answers vehicle questions from a static offer list without calling the
//! language model.
//!
//! # Flow
//!
//! ```text
//! message ──► guard (vehicle keyword?) ──► intent ──┬─► list / list-for-model
//!                                                   ├─► surprise
//!                                                   └─► best offer ──► reply
//! ```
//!
//! The offers file is re-read at most once per cache TTL, so edits go live
//! without a restart.

pub mod format;
pub mod intent;
pub mod matcher;
pub mod offer;

pub use intent::{detect_intent, Intent};
pub use matcher::{answer, best_offer, is_catalog_eligible, tokenize};
pub use offer::Offer;

use moka::future::Cache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Read the offers file. Missing, unreadable or non-array files give an empty list.
pub fn load_offers(path: &Path) -> Vec<Offer> {
    if !path.exists() {
        debug!("Offers file not found: {}", path.display());
        return Vec::new();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    let value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            error!("Invalid JSON in {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    if !value.is_array() {
        error!("{} is not a JSON array", path.display());
        return Vec::new();
    }
    match serde_json::from_value(value) {
        Ok(offers) => offers,
        Err(e) => {
            error!("Malformed offer in {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Offers file with a short-lived in-memory copy
#[derive(Clone)]
pub struct OfferCatalog {
    path: PathBuf,
    cache: Cache<PathBuf, Arc<Vec<Offer>>>,
    guard: bool,
}

impl OfferCatalog {
    pub fn new(path: impl Into<PathBuf>, ttl_secs: u64, guard: bool) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(ttl_secs.max(1)))
            .build();
        Self {
            path: path.into(),
            cache,
            guard,
        }
    }

    /// Current offers (cached)
    pub async fn offers(&self) -> Arc<Vec<Offer>> {
        let path = self.path.clone();
        self.cache
            .get_with(self.path.clone(), async move { Arc::new(load_offers(&path)) })
            .await
    }

    /// Drop the cached copy so the next call reads the file
    pub async fn reload(&self) {
        self.cache.invalidate(&self.path).await;
    }

    /// Catalog reply, or `None` when the catalog should stay silent
    pub async fn try_answer(&self, message: &str) -> Option<String> {
        let offers = self.offers().await;
        answer(message, &offers, self.guard)
    }
}
