//! Transition rule applied after every validation.

use crate::core::types::{Branch, RunContext};

/// Decide where the loop goes next.
///
/// - `Success` if the latest validation passed.
/// - `Exhausted` if it failed and `attempt_count` reached `max_attempts`.
/// - `Continue` otherwise.
pub fn decide_branch(ctx: &RunContext) -> Branch {
    if ctx.success {
        Branch::Success
    } else if ctx.attempt_count >= ctx.max_attempts {
        Branch::Exhausted
    } else {
        Branch::Continue
    }
}
