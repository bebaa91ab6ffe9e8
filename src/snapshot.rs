use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use strata_feedback::TypeFeedbackRecord;
use strata_perf::{BranchRecord, CallGraphSnapshot, ExecRecord, HotPath};

pub const PROFILE_VERSION: u32 = 1;

/// The wire form of a profile export.
///
/// Every recorded field round-trips exactly. `hot_paths` is included for human inspection but
/// is derived data: import always recomputes it (and the hot call chains, which are never
/// serialized at all) from the recorded records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    pub version: u32,
    /// Milliseconds since the Unix epoch at export time.
    pub timestamp: u64,
    pub execution_profiles: Vec<(String, ExecRecord)>,
    pub type_profiles: Vec<(String, TypeFeedbackRecord)>,
    pub branch_profiles: Vec<(String, BranchRecord)>,
    pub call_graph: CallGraphSnapshot,
    pub hot_paths: Vec<HotPath>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("unsupported profile version {0}, expected {PROFILE_VERSION}")]
    Version(u32),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
