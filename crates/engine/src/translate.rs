//! Compiles a declarative [`AudienceDefinition`] into an evaluation plan.
//! Translation is where defaults are resolved and where malformed
//! definitions fail fast; evaluation itself never errors.

use edgematch_core::types::{
    AudienceDefinition, Comparator, ConditionQuery, EngineCondition, LookBack, QueryValue, Reducer,
};
use edgematch_core::{EdgeError, EdgeResult};

/// Evaluable form of one audience definition.
#[derive(Debug, Clone)]
pub struct AudiencePlan {
    pub id: String,
    pub ttl: u64,
    pub look_back: LookBack,
    pub conditions: Vec<CompiledCondition>,
}

#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub any: bool,
    pub queries: Vec<ConditionQuery>,
    pub rules: Vec<CompiledRule>,
}

/// A rule with its defaults resolved: reducer, comparator, and a concrete
/// threshold.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub reducer: Reducer,
    pub comparator: Comparator,
    pub threshold: i64,
}

/// Compile `definition` into an [`AudiencePlan`].
///
/// Fails with [`EdgeError::Translation`] on definitions that cannot be
/// evaluated meaningfully: an empty condition list (which would vacuously
/// match every subject), a condition with no queries, an empty query
/// vector, or a non-finite threshold.
pub fn translate(definition: &AudienceDefinition) -> EdgeResult<AudiencePlan> {
    if definition.definition.is_empty() {
        return Err(EdgeError::Translation(format!(
            "audience '{}' has no conditions",
            definition.id
        )));
    }

    let conditions = definition
        .definition
        .iter()
        .map(|condition| compile_condition(definition, condition))
        .collect::<EdgeResult<Vec<_>>>()?;

    Ok(AudiencePlan {
        id: definition.id.clone(),
        ttl: definition.ttl,
        look_back: definition.look_back,
        conditions,
    })
}

fn compile_condition(
    definition: &AudienceDefinition,
    condition: &EngineCondition,
) -> EdgeResult<CompiledCondition> {
    if condition.filter.queries.is_empty() {
        return Err(EdgeError::Translation(format!(
            "audience '{}' has a condition with no queries",
            definition.id
        )));
    }
    for query in &condition.filter.queries {
        validate_query(&definition.id, query)?;
    }

    // A condition without rules gets the default occurrence policy:
    // strictly more page views than `occurrences`. An audience with
    // occurrences = 1 therefore needs two qualifying views, the prior one
    // plus the current page.
    let rules = if condition.rules.is_empty() {
        vec![CompiledRule {
            reducer: Reducer::Count,
            comparator: Comparator::Gt,
            threshold: i64::from(definition.occurrences),
        }]
    } else {
        condition
            .rules
            .iter()
            .map(|rule| CompiledRule {
                reducer: rule.reducer,
                comparator: rule.matcher.name,
                threshold: rule
                    .matcher
                    .args
                    .unwrap_or_else(|| i64::from(definition.occurrences)),
            })
            .collect()
    };

    Ok(CompiledCondition {
        any: condition.filter.any,
        queries: condition.filter.queries.clone(),
        rules,
    })
}

fn validate_query(audience_id: &str, query: &ConditionQuery) -> EdgeResult<()> {
    let (vector, threshold) = match &query.value {
        QueryValue::StringSet { .. } => return Ok(()),
        QueryValue::VectorDistance {
            vector, threshold, ..
        } => (vector, threshold),
        QueryValue::CosineSimilarity { vector, threshold } => (vector, threshold),
    };
    if vector.is_empty() {
        return Err(EdgeError::Translation(format!(
            "audience '{}': query on '{}' has an empty vector",
            audience_id, query.property
        )));
    }
    if !threshold.is_finite() {
        return Err(EdgeError::Translation(format!(
            "audience '{}': query on '{}' has a non-finite threshold",
            audience_id, query.property
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgematch_core::types::{ConditionFilter, ConditionRule, RuleMatcher};

    fn string_set_condition(strings: &[&str]) -> EngineCondition {
        EngineCondition {
            filter: ConditionFilter {
                any: false,
                queries: vec![ConditionQuery {
                    property: "keywords".into(),
                    feature_version: 1,
                    value: QueryValue::StringSet {
                        strings: strings.iter().map(|s| s.to_string()).collect(),
                    },
                }],
            },
            rules: vec![],
        }
    }

    fn audience(definition: Vec<EngineCondition>) -> AudienceDefinition {
        AudienceDefinition {
            id: "aud".into(),
            name: "aud".into(),
            ttl: 100,
            look_back: LookBack::Unbounded,
            occurrences: 2,
            definition,
        }
    }

    // 1. Default resolution --------------------------------------------------

    #[test]
    fn test_empty_rules_get_count_gt_occurrences() {
        let plan = translate(&audience(vec![string_set_condition(&["sport"])])).unwrap();
        let rule = &plan.conditions[0].rules[0];
        assert_eq!(rule.reducer, Reducer::Count);
        assert_eq!(rule.comparator, Comparator::Gt);
        assert_eq!(rule.threshold, 2);
    }

    #[test]
    fn test_explicit_rule_defaults_to_ge_and_occurrences() {
        let mut condition = string_set_condition(&["sport"]);
        condition.rules = vec![ConditionRule {
            reducer: Reducer::Count,
            matcher: RuleMatcher {
                name: Comparator::default(),
                args: None,
            },
        }];
        let plan = translate(&audience(vec![condition])).unwrap();
        let rule = &plan.conditions[0].rules[0];
        assert_eq!(rule.comparator, Comparator::Ge);
        assert_eq!(rule.threshold, 2);
    }

    // 2. Fail-fast validation ------------------------------------------------

    #[test]
    fn test_empty_definition_is_rejected() {
        assert!(translate(&audience(vec![])).is_err());
    }

    #[test]
    fn test_condition_without_queries_is_rejected() {
        let condition = EngineCondition {
            filter: ConditionFilter {
                any: false,
                queries: vec![],
            },
            rules: vec![],
        };
        assert!(translate(&audience(vec![condition])).is_err());
    }

    #[test]
    fn test_nan_threshold_is_rejected() {
        let condition = EngineCondition {
            filter: ConditionFilter {
                any: false,
                queries: vec![ConditionQuery {
                    property: "topic_dist".into(),
                    feature_version: 1,
                    value: QueryValue::CosineSimilarity {
                        vector: vec![1.0, 0.0],
                        threshold: f32::NAN,
                    },
                }],
            },
            rules: vec![],
        };
        assert!(translate(&audience(vec![condition])).is_err());
    }
}
