//! AST-level optimizer passes, invoked by the tier engine when generating tier plans.

pub mod passes;

use std::rc::Rc;

use rustc_hash::FxHashMap;
use strata_feedback::TypeFeedback;
use strata_perf::HotCallChain;

use crate::ast::Procedure;

/// Tier-1 plan: constant folding only.
pub fn baseline_plan(source: &Procedure) -> Procedure {
    let mut plan = source.clone();
    passes::const_fold::run(&mut plan);
    plan
}

/// Tier-2 plan: folding, dead-branch pruning, and feedback-guarded specialization.
pub fn optimized_plan(source: &Procedure, feedback: &TypeFeedback) -> Procedure {
    let mut plan = source.clone();
    passes::const_fold::run(&mut plan);
    passes::dead_branch::run(&mut plan);
    passes::specialize::run(&mut plan, feedback);
    plan
}

/// Tier-3 plan: the tier-2 pipeline preceded by hot-callee inlining, so inlined bodies fold
/// and specialize along with the caller.
pub fn ultra_plan(
    source: &Procedure,
    feedback: &TypeFeedback,
    chains: &[HotCallChain],
    sources: &FxHashMap<String, Rc<Procedure>>,
) -> Procedure {
    let mut plan = source.clone();
    passes::inline_hot::run(&mut plan, chains, sources);
    passes::const_fold::run(&mut plan);
    passes::dead_branch::run(&mut plan);
    passes::specialize::run(&mut plan, feedback);
    plan
}
