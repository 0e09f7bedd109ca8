//! Core data model: versioned page features, page views, audience
//! definitions with their condition vocabulary, and match results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─── Page Features ──────────────────────────────────────────────────────

/// A feature value as stored on a page view. The `version` tag partitions
/// incompatible payload shapes: a query written for version 2 must never be
/// evaluated against a value recorded under version 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureValue {
    pub version: u32,
    pub value: FeaturePayload,
}

/// Closed union of feature payload shapes. Serialized untagged: a JSON
/// array of numbers is a `Vector`, an array of strings a `StringSet`.
/// Matchers dispatch exhaustively on this, so a query aimed at the wrong
/// shape evaluates false instead of silently no-opping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeaturePayload {
    Vector(Vec<f32>),
    StringSet(Vec<String>),
}

impl FeaturePayload {
    pub fn as_string_set(&self) -> Option<&[String]> {
        match self {
            FeaturePayload::StringSet(s) => Some(s),
            FeaturePayload::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f32]> {
        match self {
            FeaturePayload::Vector(v) => Some(v),
            FeaturePayload::StringSet(_) => None,
        }
    }
}

/// One named feature observation handed in by a collector. Collectors that
/// failed set `error`; errored features are dropped before recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageFeature {
    pub name: String,
    pub error: bool,
    pub value: FeatureValue,
}

/// A timestamped snapshot of the features observed on one page visit.
/// Immutable once created; removed only by history trimming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    /// Seconds since the Unix epoch.
    pub ts: u64,
    pub features: HashMap<String, FeatureValue>,
}

// ─── Audience Definitions ───────────────────────────────────────────────

/// Time window bounding which page views an audience may consider.
/// On the wire this is a single integer where `0` means unbounded; the
/// explicit variant removes that magic-value overload in code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub enum LookBack {
    /// Consider the entire retained history. Retention itself is still
    /// bounded by the store's hard ceiling, so this is "back to the
    /// beginning of retained history", not infinite real time.
    Unbounded,
    /// Consider page views no older than this many seconds.
    Bounded(u64),
}

impl LookBack {
    /// Inclusive window start for evaluation, or `None` when unbounded.
    pub fn window_start(&self, now: u64) -> Option<u64> {
        match self {
            LookBack::Unbounded => None,
            LookBack::Bounded(secs) => Some(now.saturating_sub(*secs)),
        }
    }

    pub fn finite_secs(&self) -> Option<u64> {
        match self {
            LookBack::Unbounded => None,
            LookBack::Bounded(secs) => Some(*secs),
        }
    }
}

impl From<u64> for LookBack {
    fn from(secs: u64) -> Self {
        if secs == 0 {
            LookBack::Unbounded
        } else {
            LookBack::Bounded(secs)
        }
    }
}

impl From<LookBack> for u64 {
    fn from(look_back: LookBack) -> Self {
        match look_back {
            LookBack::Unbounded => 0,
            LookBack::Bounded(secs) => secs,
        }
    }
}

/// Declarative description of a behavioral segment. Supplied fresh on every
/// run by the caller; only match *results* are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudienceDefinition {
    pub id: String,
    pub name: String,
    /// Seconds a match stays valid before it is purged.
    pub ttl: u64,
    pub look_back: LookBack,
    /// Default occurrence threshold for rules that do not carry their own.
    #[serde(default)]
    pub occurrences: u32,
    pub definition: Vec<EngineCondition>,
}

/// One condition of an audience definition: a filter producing a boolean
/// per page view, and the rules that aggregate those booleans. An audience
/// matches only if every condition's rules all pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineCondition {
    pub filter: ConditionFilter,
    #[serde(default)]
    pub rules: Vec<ConditionRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionFilter {
    /// `true` ⇒ queries combine with OR, otherwise AND.
    #[serde(default)]
    pub any: bool,
    pub queries: Vec<ConditionQuery>,
}

/// One query against one named feature of a page view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionQuery {
    pub property: String,
    /// Must equal the stored feature's version or the query is a hard skip
    /// for that page view.
    pub feature_version: u32,
    pub value: QueryValue,
}

/// Comparison payload of a query, tagged by matcher kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum QueryValue {
    /// True iff the stored string set and `strings` intersect.
    StringSet { strings: Vec<String> },
    /// True iff `metric(stored, vector) <= threshold`.
    VectorDistance {
        vector: Vec<f32>,
        threshold: f32,
        #[serde(default)]
        metric: DistanceMetric,
    },
    /// True iff `cosine_similarity(stored, vector) >= threshold`.
    CosineSimilarity { vector: Vec<f32>, threshold: f32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionRule {
    pub reducer: Reducer,
    #[serde(default)]
    pub matcher: RuleMatcher,
}

/// Aggregation over the per-page-view boolean stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "name")]
pub enum Reducer {
    /// Number of page views for which the filter evaluated true.
    Count,
}

/// Comparator applied to the reduced value. `args` defaults to the
/// audience's `occurrences` when omitted; translation resolves it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleMatcher {
    #[serde(default)]
    pub name: Comparator,
    #[serde(default)]
    pub args: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Eq,
    Gt,
    Lt,
    #[default]
    Ge,
    Le,
}

impl Comparator {
    pub fn compare(&self, value: i64, threshold: i64) -> bool {
        match self {
            Comparator::Eq => value == threshold,
            Comparator::Gt => value > threshold,
            Comparator::Lt => value < threshold,
            Comparator::Ge => value >= threshold,
            Comparator::Le => value <= threshold,
        }
    }
}

// ─── Match Results ──────────────────────────────────────────────────────

/// A cached audience match with its expiry. Created the first time an
/// audience's conditions evaluate true; dropped on the first read after
/// `expires_at` has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedAudience {
    pub id: String,
    pub matched_at: u64,
    pub expires_at: u64,
    pub matched_on_current_page_view: bool,
    /// Always `true` for stored entries; kept for wire compatibility.
    pub matched: bool,
}

impl MatchedAudience {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at < now
    }
}

/// Outcome of evaluating one audience during a run, fed to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedAudience {
    pub id: String,
    pub matched: bool,
    pub ttl: u64,
}
