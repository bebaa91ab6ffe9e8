use serde::{Deserialize, Serialize};

/// A branch the optimizer may lay out for its dominant direction. Only emitted when
/// predictability is strictly above the configured threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BranchHint {
    pub id: String,
    pub likely_taken: bool,
    pub predictability: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopHintKind {
    /// Short trip counts; candidate for unrolling.
    Unroll,
    /// Long trip counts; candidate for vectorization.
    VectorizeCandidate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoopHint {
    pub id: String,
    pub kind: LoopHintKind,
    pub mean_iterations: f64,
}

/// The profiler's contribution to optimization decisions. The session façade merges in
/// type-specialization candidates from the feedback store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileHints {
    /// Procedures whose total time is above the global 90th-percentile threshold.
    pub hot: Vec<String>,
    /// Procedures with execution count below the cold ceiling.
    pub cold: Vec<String>,
    pub branches: Vec<BranchHint>,
    pub loops: Vec<LoopHint>,
}
