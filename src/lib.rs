//! strata: an adaptive tiered execution engine and p-code lowering pipeline for embedded
//! language runtimes.
//!
//! Two independent paths share this workspace:
//!
//! - the **tier engine** ([`Session::compile`] / [`Session::call`]): interpreted procedures are
//!   recompiled into progressively faster AST plans, driven by the profiling subsystem
//!   (`strata-perf`) and the type/shape feedback collector (`strata-feedback`), with
//!   deoptimization when speculation fails;
//! - the **lowering pipeline** ([`Session::translate_bytecode`], `strata-pcode`): a
//!   fixed-format bytecode stream is decoded, optimized, and emitted as a minimal valid
//!   WebAssembly module.
//!
//! [`Session`] owns all shared mutable state — tier stacks, shape cache, call graph, feedback
//! records — as explicit stores passed by reference. One session, one owner, no singletons.

mod session;
mod snapshot;

pub use session::{OptimizationHints, Session, SpecializationCandidate};
pub use snapshot::{ProfileSnapshot, SnapshotError, PROFILE_VERSION};

pub use strata_feedback::{
    ShapeCache, ShapeDescriptor, ShapeField, TypeFeedback, TypeFeedbackRecord,
    STABILITY_THRESHOLD,
};
pub use strata_jit::{
    ast, CallCtx, CallError, CompileError, DefaultHooks, Engine, EngineConfig, EngineStats,
    EvalError, HostHooks, InlinePromotion, PromotionPolicy, RuntimeError, TierLevel, TierRecord,
};
pub use strata_pcode as pcode;
pub use strata_pcode::{lower, Lowered};
pub use strata_perf::{
    BranchHint, BranchRecord, CallEdge, CallGraph, CallGraphSnapshot, CallNode, ExecRecord,
    HotCallChain, HotPath, LoopHint, LoopHintKind, LoopRecord, ProfileHints, Profiler,
    ProfilerConfig, BRANCH_HISTORY_LIMIT,
};
pub use strata_types::{ObjectValue, TypeTag, Value};
