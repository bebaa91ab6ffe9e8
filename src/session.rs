use serde::{Deserialize, Serialize};

use strata_feedback::{ShapeCache, TypeFeedback};
use strata_jit::ast::Procedure;
use strata_jit::{CallCtx, CallError, DefaultHooks, Engine, EngineConfig, HostHooks};
use strata_perf::{BranchHint, LoopHint, Profiler, ProfilerConfig};
use strata_pcode::{lower, Lowered};
use strata_types::{TypeTag, Value};

use crate::snapshot::{ProfileSnapshot, SnapshotError, PROFILE_VERSION};

/// A feedback key whose dominant tag a specialized path may assume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecializationCandidate {
    pub key: String,
    pub tag: TypeTag,
    pub stability: f64,
}

/// The merged hint set: the profiler's hot/cold/branch/loop analysis plus type-specialization
/// candidates from the feedback store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationHints {
    pub hot: Vec<String>,
    pub cold: Vec<String>,
    pub branches: Vec<BranchHint>,
    pub loops: Vec<LoopHint>,
    pub specialize: Vec<SpecializationCandidate>,
}

/// One runtime session: the tier engine plus the injectable stores it runs against.
///
/// The session is the single owner of the shape cache, the call graph, the feedback records,
/// and the tier stacks; everything is passed down by reference and nothing hides in a global.
pub struct Session {
    engine: Engine,
    profiler: Profiler,
    feedback: TypeFeedback,
    shapes: ShapeCache,
    hooks: Box<dyn HostHooks>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default(), ProfilerConfig::default())
    }

    pub fn with_config(engine: EngineConfig, profiler: ProfilerConfig) -> Self {
        Self {
            engine: Engine::new(engine),
            profiler: Profiler::new(profiler),
            feedback: TypeFeedback::new(),
            shapes: ShapeCache::new(),
            hooks: Box::new(DefaultHooks),
        }
    }

    /// Replace the host hooks (the external evaluator contract).
    pub fn set_hooks(&mut self, hooks: Box<dyn HostHooks>) {
        self.hooks = hooks;
    }

    /// Register a procedure from the upstream front end. The callable behavior lives behind
    /// [`Session::call`] under the procedure's name and original signature.
    pub fn compile(&mut self, proc: Procedure) {
        self.engine.install(proc, &mut self.feedback);
    }

    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, CallError> {
        let mut cx = CallCtx {
            profiler: &mut self.profiler,
            feedback: &mut self.feedback,
            shapes: &mut self.shapes,
            hooks: self.hooks.as_mut(),
        };
        self.engine.call(name, args, &mut cx)
    }

    pub fn deoptimize(&mut self, name: &str) -> bool {
        self.engine.deoptimize(name)
    }

    pub fn start_profiling(&mut self) {
        self.profiler.start();
    }

    pub fn stop_profiling(&mut self) {
        self.profiler.stop();
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn feedback(&self) -> &TypeFeedback {
        &self.feedback
    }

    pub fn shapes(&self) -> &ShapeCache {
        &self.shapes
    }

    pub fn shapes_mut(&mut self) -> &mut ShapeCache {
        &mut self.shapes
    }

    /// The profiler's hints merged with the feedback store's specialization candidates.
    pub fn optimization_hints(&self) -> OptimizationHints {
        let profile = self.profiler.hints();
        let specialize = self
            .feedback
            .specialization_candidates()
            .into_iter()
            .map(|(key, tag, stability)| SpecializationCandidate {
                key,
                tag,
                stability,
            })
            .collect();
        OptimizationHints {
            hot: profile.hot,
            cold: profile.cold,
            branches: profile.branches,
            loops: profile.loops,
            specialize,
        }
    }

    /// Snapshot every recorded profile field. Hot paths ride along for inspection but are
    /// derived data; import recomputes them.
    pub fn export_profile(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            version: PROFILE_VERSION,
            timestamp: crate::snapshot::unix_millis(),
            execution_profiles: self.profiler.exec_snapshot(),
            type_profiles: self.feedback.snapshot(),
            branch_profiles: self.profiler.branch_snapshot(),
            call_graph: self.profiler.graph_snapshot(),
            hot_paths: self.profiler.hot_paths().to_vec(),
        }
    }

    pub fn export_profile_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(&self.export_profile())?)
    }

    /// Restore recorded profile state. Derived views (hot paths, hot call chains, self times)
    /// are recomputed from the imported records, never taken from the snapshot.
    pub fn import_profile(&mut self, snapshot: ProfileSnapshot) -> Result<(), SnapshotError> {
        if snapshot.version != PROFILE_VERSION {
            return Err(SnapshotError::Version(snapshot.version));
        }
        tracing::debug!(
            procedures = snapshot.execution_profiles.len(),
            branches = snapshot.branch_profiles.len(),
            types = snapshot.type_profiles.len(),
            "importing profile snapshot"
        );
        self.profiler.restore(
            snapshot.execution_profiles,
            snapshot.branch_profiles,
            snapshot.call_graph,
        );
        self.feedback.restore(snapshot.type_profiles);
        Ok(())
    }

    pub fn import_profile_json(&mut self, json: &str) -> Result<(), SnapshotError> {
        self.import_profile(serde_json::from_str(json)?)
    }

    /// Lower a raw p-code buffer to a binary module; the independent sibling path of the tier
    /// engine.
    pub fn translate_bytecode(&self, buf: &[u8]) -> Lowered {
        lower(buf)
    }
}
