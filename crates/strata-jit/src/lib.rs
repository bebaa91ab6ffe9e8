//! The adaptive tier engine for the strata runtime.
//!
//! A procedure starts on the tier-0 interpreter and is recompiled into progressively more
//! optimized AST plans as its call counts cross the per-tier thresholds. Speculative plans
//! guard their assumptions; a failed guard surfaces as a deopt result, the engine pops the
//! tier, and past the deopt ceiling the procedure is pinned at tier 0.
//!
//! Tiers:
//! - 0, interpreter: the installed AST, unchanged.
//! - 1, baseline: constant folding.
//! - 2, optimized: folding, dead-branch pruning, feedback-guarded type specialization.
//! - 3, ultra: tier 2 plus hot-callee inlining from the profiler's call chains.

pub mod ast;
mod error;
mod eval;
mod hooks;
pub mod opt;
mod tier;

pub use error::{CallError, CompileError, EvalError, RuntimeError};
pub use hooks::{DefaultHooks, HostHooks};
pub use tier::{
    CallCtx, Engine, EngineConfig, EngineStats, InlinePromotion, PromotionPolicy, TierLevel,
    TierRecord,
};
