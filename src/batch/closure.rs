//! Per-run concept closure cache.
//!
//! Ancestor sets are fetched lazily from a [`ConceptHierarchy`] and kept for
//! the lifetime of the cache. A cache is created by its owner (one per batch
//! import run) and passed down explicitly; there is no process-wide instance.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::concept::ConceptId;
use crate::error::ServiceError;

/// Source of transitive ancestors (the terminology server).
pub trait ConceptHierarchy: Send + Sync {
    /// Returns every ancestor of `id` (transitive, excluding `id` itself).
    fn ancestors(&self, id: ConceptId) -> Result<Vec<ConceptId>, ServiceError>;
}

fn lock_err(context: &'static str) -> ServiceError {
    ServiceError::backend(format!("poisoned lock: {context}"))
}

/// Lazily populated ancestor cache.
#[derive(Debug, Default)]
pub struct ClosureCache {
    ancestors: RwLock<HashMap<ConceptId, Arc<HashSet<ConceptId>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ClosureCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ancestors of `id`, fetching them on first use.
    ///
    /// # Errors
    ///
    /// Propagates the hierarchy's error; failed lookups are not cached.
    pub fn ancestors(
        &self,
        id: ConceptId,
        hierarchy: &dyn ConceptHierarchy,
    ) -> Result<Arc<HashSet<ConceptId>>, ServiceError> {
        {
            let guard = self.ancestors.read().map_err(|_| lock_err("closure_cache.read"))?;
            if let Some(found) = guard.get(&id) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(found));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(concept = %id, "closure cache miss");
        let fetched: Arc<HashSet<ConceptId>> = Arc::new(hierarchy.ancestors(id)?.into_iter().collect());

        let mut guard = self.ancestors.write().map_err(|_| lock_err("closure_cache.write"))?;
        Ok(Arc::clone(guard.entry(id).or_insert(fetched)))
    }

    /// Returns true if `id` is `ancestor` or descends from it.
    ///
    /// # Errors
    ///
    /// Propagates the hierarchy's error.
    pub fn is_descendant_or_self(
        &self,
        id: ConceptId,
        ancestor: ConceptId,
        hierarchy: &dyn ConceptHierarchy,
    ) -> Result<bool, ServiceError> {
        if id == ancestor {
            return Ok(true);
        }
        Ok(self.ancestors(id, hierarchy)?.contains(&ancestor))
    }

    /// Number of cached concepts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ancestors.read().map(|g| g.len()).unwrap_or(0)
    }

    /// True when nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lookups answered from the cache.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that had to ask the hierarchy.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.ancestors.write() {
            guard.clear();
        }
    }
}
