//! Matching orchestrator: the `run` entry point driving history update,
//! audience evaluation, and match-cache maintenance for one subject.
//!
//! The engine holds explicit handles to both stores (constructed once and
//! injected), not ambient singletons. One `run` call completes before
//! persisted state is considered consistent; the design assumes a single
//! active caller per storage namespace.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use edgematch_core::time::epoch_secs;
use edgematch_core::types::{
    AudienceDefinition, CheckedAudience, FeatureValue, MatchedAudience, PageFeature,
};
use edgematch_engine::{evaluate_plan, translate};
use edgematch_store::{MatchedAudienceStore, ViewStore};

pub use edgematch_core::{EdgeConfig, EdgeError, EdgeResult};
pub use edgematch_store::{InMemoryStorage, StorageBackend};

/// Client-side behavioral audience-matching engine.
pub struct AudienceEngine {
    config: EdgeConfig,
    view_store: ViewStore,
    matched_store: MatchedAudienceStore,
}

impl AudienceEngine {
    pub fn new(backend: Arc<dyn StorageBackend>, config: EdgeConfig) -> Self {
        let view_store = ViewStore::new(backend.clone(), config.max_retained_views);
        let matched_store = MatchedAudienceStore::new(backend, config.refresh_on_rematch);
        Self {
            config,
            view_store,
            matched_store,
        }
    }

    /// Record the current page's features, evaluate every audience
    /// definition against the retained history, merge new matches into the
    /// cache, and return the full current match set.
    ///
    /// With `consent_granted == false` the call is a no-op with respect to
    /// both stores and returns the last known match set. A malformed
    /// definition aborts the run with a translation error before either
    /// store is touched.
    ///
    /// `async` so hosts can suspend at external collection boundaries;
    /// evaluation and persistence themselves are synchronous.
    pub async fn run(
        &mut self,
        page_features: HashMap<String, FeatureValue>,
        audience_definitions: &[AudienceDefinition],
        consent_granted: bool,
    ) -> EdgeResult<Vec<MatchedAudience>> {
        if !consent_granted {
            debug!("consent withheld, skipping run");
            return Ok(self.matched_store.matched());
        }

        // Fail fast on malformed definitions before any store mutation.
        let plans = audience_definitions
            .iter()
            .map(translate)
            .collect::<EdgeResult<Vec<_>>>()?;

        let now = epoch_secs();

        let features: Vec<PageFeature> = page_features
            .into_iter()
            .map(|(name, value)| PageFeature {
                name,
                error: false,
                value,
            })
            .collect();
        self.view_store.append(&features, now);

        self.trim_history(audience_definitions, now);

        let purged = self.matched_store.get_and_purge(now);

        // Audiences still live in the cache are skipped, unless a re-match
        // must refresh their TTL.
        let checked: Vec<CheckedAudience> = plans
            .iter()
            .filter(|plan| self.config.refresh_on_rematch || !purged.contains_key(&plan.id))
            .map(|plan| CheckedAudience {
                id: plan.id.clone(),
                matched: evaluate_plan(plan, self.view_store.all(), now),
                ttl: plan.ttl,
            })
            .collect();

        self.matched_store.update(&checked, now);

        let matched = self.matched_store.matched();
        info!(
            audiences = audience_definitions.len(),
            matched = matched.len(),
            views = self.view_store.all().len(),
            "run complete"
        );
        Ok(matched)
    }

    /// Current match set as of the last purge.
    pub fn matched_audiences(&self) -> Vec<MatchedAudience> {
        self.matched_store.matched()
    }

    /// Page-view history, oldest first.
    pub fn page_views(&self) -> &[edgematch_core::types::PageView] {
        self.view_store.all()
    }

    /// Trim history to the maximum finite look-back across the run's
    /// audiences. Any unbounded look-back suppresses time-trimming entirely
    /// (the retention ceiling still bounds storage); with no audiences at
    /// all, the configured default age applies.
    fn trim_history(&mut self, audience_definitions: &[AudienceDefinition], now: u64) {
        let mut max_finite = None;
        for definition in audience_definitions {
            match definition.look_back.finite_secs() {
                Some(secs) => max_finite = Some(max_finite.unwrap_or(0).max(secs)),
                None => return,
            }
        }
        let max_age = max_finite.unwrap_or(self.config.default_max_age_secs);
        self.view_store.trim(max_age, now);
    }
}
