//! Evaluates a compiled [`AudiencePlan`] over a page-view history. Pure:
//! takes the history and a caller-supplied `now` so one run sees a single
//! consistent clock.

use tracing::debug;

use edgematch_core::types::{ConditionQuery, FeaturePayload, PageView, QueryValue, Reducer};

use crate::filters;
use crate::translate::{AudiencePlan, CompiledCondition};

/// True iff every condition of the plan satisfies all of its rules over the
/// windowed view of `views`.
pub fn evaluate_plan(plan: &AudiencePlan, views: &[PageView], now: u64) -> bool {
    let window_start = plan.look_back.window_start(now);

    let matched = plan.conditions.iter().all(|condition| {
        let windowed = views
            .iter()
            .filter(|view| window_start.map_or(true, |start| view.ts >= start));
        condition_satisfied(condition, windowed)
    });

    debug!(audience_id = %plan.id, matched, "audience evaluated");
    matched
}

fn condition_satisfied<'a>(
    condition: &CompiledCondition,
    views: impl Iterator<Item = &'a PageView>,
) -> bool {
    let count = views
        .filter(|view| filter_matches(condition, view))
        .count() as i64;

    condition.rules.iter().all(|rule| match rule.reducer {
        Reducer::Count => rule.comparator.compare(count, rule.threshold),
    })
}

fn filter_matches(condition: &CompiledCondition, view: &PageView) -> bool {
    if condition.any {
        condition.queries.iter().any(|q| query_matches(q, view))
    } else {
        condition.queries.iter().all(|q| query_matches(q, view))
    }
}

/// One query against one page view. Absent property, version mismatch, and
/// payload-shape mismatch are all hard skips, never errors.
fn query_matches(query: &ConditionQuery, view: &PageView) -> bool {
    let Some(stored) = view.features.get(&query.property) else {
        return false;
    };
    if stored.version != query.feature_version {
        return false;
    }

    match (&query.value, &stored.value) {
        (QueryValue::StringSet { strings }, FeaturePayload::StringSet(stored_set)) => {
            filters::intersects(stored_set, strings)
        }
        (
            QueryValue::VectorDistance {
                vector,
                threshold,
                metric,
            },
            FeaturePayload::Vector(stored_vec),
        ) => filters::vector_distance(stored_vec, vector, *metric)
            .map(|distance| distance <= *threshold)
            .unwrap_or(false),
        (
            QueryValue::CosineSimilarity { vector, threshold },
            FeaturePayload::Vector(stored_vec),
        ) => filters::cosine_similarity(stored_vec, vector)
            .map(|similarity| similarity >= *threshold)
            .unwrap_or(false),
        // Query aimed at the wrong payload shape.
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check_audience;
    use edgematch_core::types::{
        AudienceDefinition, Comparator, ConditionFilter, ConditionRule, EngineCondition,
        FeatureValue, LookBack, RuleMatcher,
    };
    use std::collections::HashMap;

    const NOW: u64 = 1_700_000_000;

    fn keyword_view(ts: u64, version: u32, keywords: &[&str]) -> PageView {
        let mut features = HashMap::new();
        features.insert(
            "keywords".to_string(),
            FeatureValue {
                version,
                value: FeaturePayload::StringSet(
                    keywords.iter().map(|s| s.to_string()).collect(),
                ),
            },
        );
        PageView { ts, features }
    }

    fn vector_view(ts: u64, version: u32, vector: &[f32]) -> PageView {
        let mut features = HashMap::new();
        features.insert(
            "topic_dist".to_string(),
            FeatureValue {
                version,
                value: FeaturePayload::Vector(vector.to_vec()),
            },
        );
        PageView { ts, features }
    }

    fn audience(
        look_back: LookBack,
        occurrences: u32,
        queries: Vec<ConditionQuery>,
    ) -> AudienceDefinition {
        AudienceDefinition {
            id: "aud".into(),
            name: "aud".into(),
            ttl: 100,
            look_back,
            occurrences,
            definition: vec![EngineCondition {
                filter: ConditionFilter {
                    any: false,
                    queries,
                },
                rules: vec![],
            }],
        }
    }

    fn keyword_query(version: u32, strings: &[&str]) -> ConditionQuery {
        ConditionQuery {
            property: "keywords".into(),
            feature_version: version,
            value: QueryValue::StringSet {
                strings: strings.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    fn eval(definition: &AudienceDefinition, views: &[PageView]) -> bool {
        check_audience(definition, views, NOW).unwrap()
    }

    fn with_ge_rule(mut definition: AudienceDefinition, threshold: i64) -> AudienceDefinition {
        definition.definition[0].rules = vec![ConditionRule {
            reducer: Reducer::Count,
            matcher: RuleMatcher {
                name: Comparator::Ge,
                args: Some(threshold),
            },
        }];
        definition
    }

    // 1. Occurrence thresholds ----------------------------------------------

    #[test]
    fn test_default_rule_requires_count_above_occurrences() {
        let definition = audience(LookBack::Unbounded, 1, vec![keyword_query(1, &["sport"])]);
        let views = vec![
            keyword_view(NOW - 10, 1, &["sport"]),
            keyword_view(NOW - 5, 1, &["sport", "news"]),
        ];
        assert!(eval(&definition, &views));
        assert!(!eval(&definition, &views[..1]));
    }

    #[test]
    fn test_ge_rule_matches_exactly_at_threshold() {
        let definition = with_ge_rule(
            audience(LookBack::Unbounded, 0, vec![keyword_query(1, &["sport"])]),
            2,
        );
        let views = vec![
            keyword_view(NOW - 10, 1, &["sport"]),
            keyword_view(NOW - 5, 1, &["sport"]),
        ];
        assert!(eval(&definition, &views));
        assert!(!eval(&definition, &views[..1]));
    }

    #[test]
    fn test_zero_views_matches_only_non_positive_threshold() {
        let matching = with_ge_rule(
            audience(LookBack::Unbounded, 0, vec![keyword_query(1, &["sport"])]),
            0,
        );
        let non_matching = with_ge_rule(
            audience(LookBack::Unbounded, 0, vec![keyword_query(1, &["sport"])]),
            1,
        );
        assert!(eval(&matching, &[]));
        assert!(!eval(&non_matching, &[]));
    }

    #[test]
    fn test_duplicate_views_each_count() {
        let definition = audience(LookBack::Unbounded, 1, vec![keyword_query(1, &["sport"])]);
        let view = keyword_view(NOW - 10, 1, &["sport"]);
        assert!(!eval(&definition, std::slice::from_ref(&view)));
        assert!(eval(&definition, &[view.clone(), view]));
    }

    // 2. Windowing -----------------------------------------------------------

    #[test]
    fn test_bounded_window_excludes_older_views() {
        let definition = audience(LookBack::Bounded(2), 1, vec![keyword_query(1, &["sport"])]);
        let at_boundary = vec![
            keyword_view(NOW - 2, 1, &["sport"]),
            keyword_view(NOW - 2, 1, &["sport"]),
        ];
        let past_boundary = vec![
            keyword_view(NOW - 3, 1, &["sport"]),
            keyword_view(NOW - 3, 1, &["sport"]),
        ];
        assert!(eval(&definition, &at_boundary));
        assert!(!eval(&definition, &past_boundary));
    }

    #[test]
    fn test_unbounded_window_considers_all_retained_views() {
        let definition = audience(LookBack::Unbounded, 1, vec![keyword_query(1, &["sport"])]);
        let views = vec![
            keyword_view(0, 1, &["sport"]),
            keyword_view(NOW, 1, &["sport"]),
        ];
        assert!(eval(&definition, &views));
    }

    // 3. Version isolation ---------------------------------------------------

    #[test]
    fn test_feature_version_mismatch_never_matches() {
        let definition = audience(LookBack::Unbounded, 1, vec![keyword_query(2, &["sport"])]);
        let views = vec![
            keyword_view(NOW - 10, 1, &["sport"]),
            keyword_view(NOW - 5, 1, &["sport"]),
        ];
        assert!(!eval(&definition, &views));
    }

    // 4. Vector queries ------------------------------------------------------

    #[test]
    fn test_vector_distance_within_threshold() {
        let definition = audience(
            LookBack::Unbounded,
            1,
            vec![ConditionQuery {
                property: "topic_dist".into(),
                feature_version: 1,
                value: QueryValue::VectorDistance {
                    vector: vec![0.4, 0.8, 0.3],
                    threshold: 0.5,
                    metric: Default::default(),
                },
            }],
        );
        let views = vec![
            vector_view(NOW - 2, 1, &[0.2, 0.5, 0.1]),
            vector_view(NOW - 1, 1, &[0.2, 0.5, 0.1]),
        ];
        assert!(eval(&definition, &views));
    }

    #[test]
    fn test_vector_distance_beyond_threshold() {
        let definition = audience(
            LookBack::Unbounded,
            1,
            vec![ConditionQuery {
                property: "topic_dist".into(),
                feature_version: 1,
                value: QueryValue::VectorDistance {
                    vector: vec![0.4, 0.8, 0.3],
                    threshold: 0.1,
                    metric: Default::default(),
                },
            }],
        );
        let views = vec![
            vector_view(NOW - 2, 1, &[0.2, 0.5, 0.1]),
            vector_view(NOW - 1, 1, &[0.2, 0.5, 0.1]),
        ];
        assert!(!eval(&definition, &views));
    }

    #[test]
    fn test_cosine_similarity_at_threshold() {
        let definition = audience(
            LookBack::Unbounded,
            1,
            vec![ConditionQuery {
                property: "topic_dist".into(),
                feature_version: 1,
                value: QueryValue::CosineSimilarity {
                    vector: vec![0.2, 0.5, 0.1],
                    threshold: 0.99,
                },
            }],
        );
        let views = vec![
            vector_view(NOW - 2, 1, &[0.2, 0.5, 0.1]),
            vector_view(NOW - 1, 1, &[0.2, 0.5, 0.1]),
        ];
        assert!(eval(&definition, &views));
    }

    // 5. Shape mismatch and filter combinators -------------------------------

    #[test]
    fn test_vector_query_on_string_set_is_false() {
        let definition = audience(
            LookBack::Unbounded,
            1,
            vec![ConditionQuery {
                property: "keywords".into(),
                feature_version: 1,
                value: QueryValue::CosineSimilarity {
                    vector: vec![1.0, 1.0, 1.0],
                    threshold: 0.8,
                },
            }],
        );
        let views = vec![keyword_view(NOW - 1, 1, &["sport"])];
        assert!(!eval(&definition, &views));
    }

    #[test]
    fn test_any_filter_ors_queries() {
        let mut definition = audience(
            LookBack::Unbounded,
            0,
            vec![
                keyword_query(1, &["cooking"]),
                keyword_query(1, &["sport"]),
            ],
        );
        // AND across queries: view has no "cooking".
        let views = vec![keyword_view(NOW - 1, 1, &["sport"])];
        assert!(!eval(&definition, &views));

        definition.definition[0].filter.any = true;
        assert!(eval(&definition, &views));
    }

    #[test]
    fn test_all_conditions_must_pass() {
        let mut definition = audience(LookBack::Unbounded, 0, vec![keyword_query(1, &["sport"])]);
        definition.definition.push(EngineCondition {
            filter: ConditionFilter {
                any: false,
                queries: vec![keyword_query(1, &["cooking"])],
            },
            rules: vec![],
        });
        let views = vec![keyword_view(NOW - 1, 1, &["sport"])];
        assert!(!eval(&definition, &views));
    }
}
