use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::callgraph::{CallGraph, CallGraphSnapshot};
use crate::hints::{BranchHint, LoopHint, LoopHintKind, ProfileHints};
use crate::record::{BranchRecord, ExecRecord, LoopRecord};

#[derive(Clone, Debug)]
pub struct ProfilerConfig {
    /// Sampler tick interval.
    pub sample_interval: Duration,
    /// Procedures executed more often than this participate in hot-path tracing.
    pub hot_path_min_count: u64,
    /// Direct edges hotter than this become inlining candidates.
    pub hot_chain_min_count: u64,
    /// How many hot paths to retain, ranked by total time.
    pub hot_paths_kept: usize,
    /// Procedures executed fewer times than this are reported cold.
    pub cold_count_ceiling: u64,
    /// Branch hints require predictability strictly above this.
    pub branch_hint_threshold: f64,
    /// Percentile of total time that separates the hot set.
    pub hot_percentile: f64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(1),
            hot_path_min_count: 100,
            hot_chain_min_count: 1_000,
            hot_paths_kept: 10,
            cold_count_ceiling: 10,
            branch_hint_threshold: 0.95,
            hot_percentile: 0.90,
        }
    }
}

/// A call-graph-derived chain of procedures with its aggregate cost.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotPath {
    pub chain: Vec<String>,
    pub count: u64,
    pub total_ns: u64,
    /// Fraction of total profiled time, in [0, 1].
    pub share: f64,
}

/// A single hot caller→callee edge; an inlining candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotCallChain {
    pub caller: String,
    pub callee: String,
    pub count: u64,
    pub mean_ns: f64,
}

struct Frame {
    name: String,
    entered: Instant,
}

/// The profiling subsystem. Owned by the runtime session, driven from the engine's call
/// boundary. See the crate docs for the threading model.
pub struct Profiler {
    config: ProfilerConfig,
    active: AtomicBool,
    last_sample: Option<Instant>,
    sample_hits: FxHashMap<String, u64>,
    stack: Vec<Frame>,
    exec: FxHashMap<String, ExecRecord>,
    branches: FxHashMap<String, BranchRecord>,
    loops: FxHashMap<String, LoopRecord>,
    graph: CallGraph,
    hot_paths: Vec<HotPath>,
    hot_chains: Vec<HotCallChain>,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new(ProfilerConfig::default())
    }
}

impl Profiler {
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            config,
            active: AtomicBool::new(false),
            last_sample: None,
            sample_hits: FxHashMap::default(),
            stack: Vec::new(),
            exec: FxHashMap::default(),
            branches: FxHashMap::default(),
            loops: FxHashMap::default(),
            graph: CallGraph::new(),
            hot_paths: Vec::new(),
            hot_chains: Vec::new(),
        }
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Reset all recorded and derived state and begin profiling.
    pub fn start(&mut self) {
        self.last_sample = Some(Instant::now());
        self.sample_hits.clear();
        self.stack.clear();
        self.exec.clear();
        self.branches.clear();
        self.loops.clear();
        self.graph.clear();
        self.hot_paths.clear();
        self.hot_chains.clear();
        self.active.store(true, Ordering::SeqCst);
    }

    /// Stop profiling and derive hot paths, hot call chains, and self times.
    ///
    /// Idempotent: the first caller to flip the active flag runs the analysis passes; any later
    /// (or racing) call returns immediately. A tick that lost the race against the flag is a
    /// no-op too, so no sample lands after stop.
    pub fn stop(&mut self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        self.recompute_derived();
    }

    /// Sampler tick: attribute one hit to the procedure on top of the shadow stack if the
    /// sample interval has elapsed. Cheap enough to call on every engine call boundary.
    pub fn sample_tick(&mut self) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        let due = match self.last_sample {
            Some(prev) => now.duration_since(prev) >= self.config.sample_interval,
            None => true,
        };
        if !due {
            return;
        }
        self.last_sample = Some(now);
        if let Some(top) = self.stack.last() {
            *self.sample_hits.entry(top.name.clone()).or_default() += 1;
        }
    }

    pub fn on_enter(&mut self, name: &str) {
        if !self.is_active() {
            return;
        }
        self.stack.push(Frame {
            name: name.to_string(),
            entered: Instant::now(),
        });
    }

    pub fn on_exit(&mut self, name: &str) {
        if !self.is_active() {
            return;
        }
        let Some(pos) = self.stack.iter().rposition(|f| f.name == name) else {
            return;
        };
        // Unbalanced inner frames (host unwinds, deopt replays) are discarded with the frame
        // being closed.
        self.stack.truncate(pos + 1);
        let frame = self.stack.pop().expect("frame at pos survives truncate");
        let elapsed = frame.entered.elapsed();
        self.exec.entry(frame.name).or_default().record(elapsed);
        let caller = self.stack.last().map(|f| f.name.clone());
        self.graph.record_call(caller.as_deref(), name, elapsed);
    }

    pub fn record_branch(&mut self, id: &str, taken: bool) {
        if !self.is_active() {
            return;
        }
        self.branches.entry(id.to_string()).or_default().record(taken);
    }

    pub fn record_loop(&mut self, id: &str, iterations: u64) {
        if !self.is_active() {
            return;
        }
        self.loops
            .entry(id.to_string())
            .or_default()
            .record(iterations);
    }

    pub fn exec_record(&self, name: &str) -> Option<&ExecRecord> {
        self.exec.get(name)
    }

    pub fn branch_record(&self, id: &str) -> Option<&BranchRecord> {
        self.branches.get(id)
    }

    pub fn loop_record(&self, id: &str) -> Option<&LoopRecord> {
        self.loops.get(id)
    }

    pub fn sample_hits(&self, name: &str) -> u64 {
        self.sample_hits.get(name).copied().unwrap_or(0)
    }

    pub fn call_graph(&self) -> &CallGraph {
        &self.graph
    }

    pub fn hot_paths(&self) -> &[HotPath] {
        &self.hot_paths
    }

    pub fn hot_call_chains(&self) -> &[HotCallChain] {
        &self.hot_chains
    }

    /// Recompute every derived view from the recorded data, in the fixed order: hot-path
    /// tracing, hot-chain detection, self times. Full recomputation, never an incremental
    /// patch; also used after a snapshot import.
    pub fn recompute_derived(&mut self) {
        self.trace_hot_paths();
        self.detect_hot_chains();
        self.graph.derive_self_times();
    }

    fn trace_hot_paths(&mut self) {
        // Denominator: every procedure's total time. Chains end in distinct procedures, so the
        // retained shares can never sum past 1.
        let profiled_total: u64 = self.exec.values().map(|r| r.total_ns).sum();

        let mut aggregated: FxHashMap<Vec<String>, (u64, u64)> = FxHashMap::default();
        for (name, rec) in &self.exec {
            if rec.count <= self.config.hot_path_min_count {
                continue;
            }
            let mut chain = vec![name.clone()];
            let mut cur = name.clone();
            while let Some((caller, _)) = self.graph.hottest_caller(&cur) {
                if chain.iter().any(|c| c == caller) {
                    break;
                }
                chain.insert(0, caller.to_string());
                cur = caller.to_string();
            }
            let entry = aggregated.entry(chain).or_default();
            entry.0 += rec.count;
            entry.1 += rec.total_ns;
        }

        let mut paths: Vec<HotPath> = aggregated
            .into_iter()
            .map(|(chain, (count, total_ns))| HotPath {
                chain,
                count,
                total_ns,
                share: if profiled_total == 0 {
                    0.0
                } else {
                    total_ns as f64 / profiled_total as f64
                },
            })
            .collect();
        paths.sort_by(|a, b| b.total_ns.cmp(&a.total_ns).then(a.chain.cmp(&b.chain)));
        paths.truncate(self.config.hot_paths_kept);
        self.hot_paths = paths;
    }

    fn detect_hot_chains(&mut self) {
        let mut chains: Vec<HotCallChain> = self
            .graph
            .edges()
            .filter(|(_, edge)| edge.count > self.config.hot_chain_min_count)
            .map(|((caller, callee), edge)| HotCallChain {
                caller: caller.clone(),
                callee: callee.clone(),
                count: edge.count,
                mean_ns: edge.mean_ns(),
            })
            .collect();
        chains.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| (&a.caller, &a.callee).cmp(&(&b.caller, &b.callee)))
        });
        self.hot_chains = chains;
    }

    /// Hot/cold sets, branch hints, and loop hints from the recorded data.
    pub fn hints(&self) -> ProfileHints {
        let mut totals: Vec<u64> = self.exec.values().map(|r| r.total_ns).collect();
        totals.sort_unstable();
        let threshold = if totals.is_empty() {
            0
        } else {
            let idx = ((totals.len() - 1) as f64 * self.config.hot_percentile).floor() as usize;
            totals[idx]
        };

        let mut hot: Vec<String> = self
            .exec
            .iter()
            .filter(|(_, r)| !totals.is_empty() && r.total_ns > threshold)
            .map(|(name, _)| name.clone())
            .collect();
        hot.sort();

        let mut cold: Vec<String> = self
            .exec
            .iter()
            .filter(|(_, r)| r.count < self.config.cold_count_ceiling)
            .map(|(name, _)| name.clone())
            .collect();
        cold.sort();

        let mut branches: Vec<BranchHint> = self
            .branches
            .iter()
            .filter(|(_, rec)| rec.predictability() > self.config.branch_hint_threshold)
            .map(|(id, rec)| BranchHint {
                id: id.clone(),
                likely_taken: rec.taken >= rec.not_taken,
                predictability: rec.predictability(),
            })
            .collect();
        branches.sort_by(|a, b| a.id.cmp(&b.id));

        let mut loops: Vec<LoopHint> = self
            .loops
            .iter()
            .filter_map(|(id, rec)| {
                let mean = rec.mean_iterations();
                let kind = if mean > 0.0 && mean < 10.0 {
                    LoopHintKind::Unroll
                } else if mean > 100.0 {
                    LoopHintKind::VectorizeCandidate
                } else {
                    return None;
                };
                Some(LoopHint {
                    id: id.clone(),
                    kind,
                    mean_iterations: mean,
                })
            })
            .collect();
        loops.sort_by(|a, b| a.id.cmp(&b.id));

        ProfileHints {
            hot,
            cold,
            branches,
            loops,
        }
    }

    // ---- Snapshot plumbing (recorded fields only; derived views are recomputed) ----

    pub fn exec_snapshot(&self) -> Vec<(String, ExecRecord)> {
        let mut out: Vec<(String, ExecRecord)> =
            self.exec.iter().map(|(k, v)| (k.clone(), *v)).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn branch_snapshot(&self) -> Vec<(String, BranchRecord)> {
        let mut out: Vec<(String, BranchRecord)> = self
            .branches
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn graph_snapshot(&self) -> CallGraphSnapshot {
        self.graph.snapshot()
    }

    /// Restore recorded state from a snapshot, then recompute all derived views. Hot paths and
    /// hot call chains in the snapshot are never restored verbatim.
    pub fn restore(
        &mut self,
        exec: Vec<(String, ExecRecord)>,
        branches: Vec<(String, BranchRecord)>,
        graph: CallGraphSnapshot,
    ) {
        self.exec = exec.into_iter().collect();
        self.branches = branches.into_iter().collect();
        self.graph.restore(graph);
        self.recompute_derived();
    }
}
