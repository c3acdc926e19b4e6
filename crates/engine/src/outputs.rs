use std::collections::BTreeSet;

use crate::plan::{OutputPolicy, Plan};

/// Indices of the steps whose results are handed back to the caller.
///
/// A result is final when no step consumes it through a placeholder. A plan
/// that concatenates, or whose planner asked for one combined output,
/// collapses to its last step: the dependency scan alone cannot tell a
/// branch that was merged away from one that stands on its own.
pub fn final_output_indices(plan: &Plan) -> Vec<usize> {
    let last = plan.last_index();
    if last == 0 {
        return Vec::new();
    }

    if plan.has_concatenation() || plan.policy() == OutputPolicy::SingleCombined {
        return vec![last];
    }

    let consumed: BTreeSet<usize> = plan
        .steps()
        .iter()
        .flat_map(|step| step.depends_on())
        .collect();

    let finals: Vec<usize> = plan
        .steps()
        .iter()
        .map(|step| step.index)
        .filter(|index| !consumed.contains(index))
        .collect();

    if finals.is_empty() {
        vec![last]
    } else {
        finals
    }
}
