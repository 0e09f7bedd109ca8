//! Page-view history: the append-only, time-bounded log of per-visit
//! feature snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use edgematch_core::types::{PageFeature, PageView};

use crate::backend::{get_or_default, set_value, StorageBackend, PAGE_VIEWS_KEY};

/// Owns the ordered page-view sequence persisted under
/// [`PAGE_VIEWS_KEY`]. Insertion order is chronological.
pub struct ViewStore {
    backend: Arc<dyn StorageBackend>,
    page_views: Vec<PageView>,
    /// Hard ceiling on retained views; bounds storage growth even when an
    /// unbounded look-back suppresses time-based trimming.
    max_retained: usize,
}

impl ViewStore {
    /// Construct the store and load persisted history. Missing or corrupt
    /// data initializes to an empty sequence.
    pub fn new(backend: Arc<dyn StorageBackend>, max_retained: usize) -> Self {
        let page_views = get_or_default(backend.as_ref(), PAGE_VIEWS_KEY, Vec::new());
        Self {
            backend,
            page_views,
            max_retained,
        }
    }

    /// Re-read persisted history, replacing the in-memory sequence.
    pub fn load(&mut self) {
        self.page_views = get_or_default(self.backend.as_ref(), PAGE_VIEWS_KEY, Vec::new());
    }

    /// Record a page view built from the non-error features at `now`. If no
    /// feature survives the error filter, nothing is recorded or written.
    pub fn append(&mut self, page_features: &[PageFeature], now: u64) -> Option<&PageView> {
        let features: HashMap<_, _> = page_features
            .iter()
            .filter(|feature| !feature.error)
            .map(|feature| (feature.name.clone(), feature.value.clone()))
            .collect();

        if features.is_empty() {
            return None;
        }

        self.page_views.push(PageView { ts: now, features });
        if self.page_views.len() > self.max_retained {
            let excess = self.page_views.len() - self.max_retained;
            self.page_views.drain(..excess);
        }
        self.save();
        self.page_views.last()
    }

    /// Drop every page view older than `max_age_secs`; persists only when
    /// something was removed.
    pub fn trim(&mut self, max_age_secs: u64, now: u64) {
        let cutoff = now.saturating_sub(max_age_secs);
        let before = self.page_views.len();
        self.page_views.retain(|view| view.ts >= cutoff);
        if self.page_views.len() != before {
            debug!(
                removed = before - self.page_views.len(),
                cutoff, "trimmed page-view history"
            );
            self.save();
        }
    }

    /// Current in-memory sequence, oldest first.
    pub fn all(&self) -> &[PageView] {
        &self.page_views
    }

    fn save(&self) {
        set_value(self.backend.as_ref(), PAGE_VIEWS_KEY, &self.page_views);
    }
}
