//! Execution profiling for the strata runtime.
//!
//! The profiler is a leaf subsystem: it accumulates execution records, branch histories, loop
//! statistics, and call-graph edges while the engine runs, and derives hot paths, hot call
//! chains, and self times post hoc when profiling stops. Derived data is always recomputed from
//! the recorded data, never patched incrementally.
//!
//! Everything runs on the caller's execution context. Sampling is a hit counter ticked at the
//! engine's call boundary, not a dedicated worker thread; the only atomic state is the
//! active flag that makes `stop()` idempotent against an in-flight tick.

mod callgraph;
mod hints;
mod profiler;
mod record;

pub use callgraph::{CallEdge, CallGraph, CallGraphSnapshot, CallNode};
pub use hints::{BranchHint, LoopHint, LoopHintKind, ProfileHints};
pub use profiler::{HotCallChain, HotPath, Profiler, ProfilerConfig};
pub use record::{BranchRecord, ExecRecord, LoopRecord, BRANCH_HISTORY_LIMIT};
