//! Generic set-membership operators
//!
//! Implements: models_match_any, models_match_all, models_match_any_in_timeframe
//!
//! All comparisons use primary keys per category.

use super::timeframe::Window;
use crate::context::EvaluationContext;
use reqeval_model::{LinkCategory, Requirement, RequirementLinks};

/// True when any category shares at least one id between target and input
pub fn models_match_any(target: &RequirementLinks, input: &RequirementLinks) -> bool {
    target.active().iter().any(|(category, wanted)| {
        input
            .ids(*category)
            .iter()
            .any(|id| wanted.contains(id))
    })
}

/// True when every non-empty target category is a subset of the input
///
/// An empty target is vacuously satisfied.
pub fn models_match_all(target: &RequirementLinks, input: &RequirementLinks) -> bool {
    target.active().iter().all(|(category, wanted)| {
        let present = input.ids(*category);
        wanted.iter().all(|id| present.contains(id))
    })
}

/// Like `models_match_any`, but the match has to be dated inside the window
///
/// An input item matches when it is itself a target (same category and id)
/// or when it is a patient-level item referring to a targeted catalog entity.
/// Undated items never match.
pub fn models_match_any_in_timeframe(
    target: &RequirementLinks,
    input: &RequirementLinks,
    requirement: &Requirement,
    ctx: &EvaluationContext,
) -> bool {
    let Some(window) = Window::from_requirement_in_days(requirement, ctx.today()) else {
        log::debug!(
            "requirement '{}' has no usable day window, failing closed",
            requirement.name
        );
        return false;
    };

    LinkCategory::ALL.iter().any(|category| {
        input.dated_items(*category).iter().any(|item| {
            let targeted = target.contains(*category, item.id)
                || item
                    .refers_to
                    .is_some_and(|(ref_category, ref_id)| target.contains(ref_category, ref_id));
            targeted && item.date.is_some_and(|date| window.contains(date))
        })
    })
}
