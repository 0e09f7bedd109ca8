//! Matched-audience cache: the set of currently-valid match results with
//! TTL-based expiry, persisted as an id-keyed map.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use edgematch_core::types::{CheckedAudience, MatchedAudience};

use crate::backend::{get_or_default, set_value, StorageBackend, MATCHED_AUDIENCES_KEY};

/// Owns the id → [`MatchedAudience`] map persisted under
/// [`MATCHED_AUDIENCES_KEY`].
pub struct MatchedAudienceStore {
    backend: Arc<dyn StorageBackend>,
    audiences: HashMap<String, MatchedAudience>,
    /// Whether re-matching a live entry advances its expiry.
    refresh_on_rematch: bool,
}

impl MatchedAudienceStore {
    pub fn new(backend: Arc<dyn StorageBackend>, refresh_on_rematch: bool) -> Self {
        let mut store = Self {
            backend,
            audiences: HashMap::new(),
            refresh_on_rematch,
        };
        store.load();
        store
    }

    /// Re-read the persisted map, replacing in-memory state. Loaded entries
    /// were matched on an earlier page, so the current-page flag resets.
    pub fn load(&mut self) {
        self.audiences =
            get_or_default(self.backend.as_ref(), MATCHED_AUDIENCES_KEY, HashMap::new());
        for audience in self.audiences.values_mut() {
            audience.matched_on_current_page_view = false;
        }
    }

    /// Drop every entry whose expiry has passed, persist the purged map,
    /// and return it. Called once per run before new matches are merged so
    /// expired audiences neither block re-matching nor leak into results.
    pub fn get_and_purge(&mut self, now: u64) -> &HashMap<String, MatchedAudience> {
        let before = self.audiences.len();
        self.audiences.retain(|_, audience| !audience.is_expired(now));
        if self.audiences.len() != before {
            debug!(
                purged = before - self.audiences.len(),
                "purged expired audiences"
            );
        }
        self.save();
        &self.audiences
    }

    /// Merge newly-checked audiences. Entries with `matched == false` are
    /// ignored; already-present ids are left untouched unless the refresh
    /// policy is enabled, in which case only the expiry advances.
    pub fn update(&mut self, checked: &[CheckedAudience], now: u64) {
        for audience in checked.iter().filter(|a| a.matched) {
            match self.audiences.entry(audience.id.clone()) {
                Entry::Occupied(mut existing) => {
                    if self.refresh_on_rematch {
                        existing.get_mut().expires_at = now + audience.ttl;
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(MatchedAudience {
                        id: audience.id.clone(),
                        matched_at: now,
                        expires_at: now + audience.ttl,
                        matched_on_current_page_view: true,
                        matched: true,
                    });
                }
            }
        }
        self.save();
    }

    /// Current entries, id-sorted for stable output.
    pub fn matched(&self) -> Vec<MatchedAudience> {
        let mut audiences: Vec<_> = self.audiences.values().cloned().collect();
        audiences.sort_by(|a, b| a.id.cmp(&b.id));
        audiences
    }

    fn save(&self) {
        set_value(self.backend.as_ref(), MATCHED_AUDIENCES_KEY, &self.audiences);
    }
}
