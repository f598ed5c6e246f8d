//! Requirement set combinators
//!
//! Implements: all, any, none, exactly_1, at_least_1, at_most_1
//!
//! | Combinator   | True when             | Empty input |
//! |--------------|-----------------------|-------------|
//! | `all`        | every value is true   | true        |
//! | `any`        | some value is true    | false       |
//! | `none`       | no value is true      | true        |
//! | `exactly_1`  | exactly one is true   | false       |
//! | `at_least_1` | at least one is true  | false       |
//! | `at_most_1`  | at most one is true   | true        |

use reqeval_model::RequirementSetType;

/// Reduce child results with a set's combinator
pub fn combine(set_type: RequirementSetType, values: &[bool]) -> bool {
    let satisfied = values.iter().filter(|v| **v).count();
    match set_type {
        RequirementSetType::All => satisfied == values.len(),
        RequirementSetType::Any | RequirementSetType::AtLeast1 => satisfied >= 1,
        RequirementSetType::None => satisfied == 0,
        RequirementSetType::Exactly1 => satisfied == 1,
        RequirementSetType::AtMost1 => satisfied <= 1,
    }
}
