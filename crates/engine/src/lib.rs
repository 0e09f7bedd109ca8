//! Audience evaluation engine: feature matchers, definition translation,
//! and plan evaluation over a page-view history.

pub mod evaluate;
pub mod filters;
pub mod translate;

pub use evaluate::evaluate_plan;
pub use translate::{translate, AudiencePlan};

use edgematch_core::types::{AudienceDefinition, PageView};
use edgematch_core::EdgeResult;

/// Translate an audience definition and evaluate it over `views` at `now`.
pub fn check_audience(
    definition: &AudienceDefinition,
    views: &[PageView],
    now: u64,
) -> EdgeResult<bool> {
    let plan = translate(definition)?;
    Ok(evaluate_plan(&plan, views, now))
}
