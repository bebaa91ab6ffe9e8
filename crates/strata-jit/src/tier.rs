//! The tier engine: per-procedure tier-record stacks, synchronous promotion, deoptimization,
//! and pinning.

use std::rc::Rc;
use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use strata_feedback::{ShapeCache, TypeFeedback};
use strata_perf::Profiler;
use strata_types::Value;

use crate::ast::{annotate_sites, count_nodes, Procedure};
use crate::error::{CallError, CompileError, EvalError, RuntimeError};
use crate::eval::{exec_procedure, param_key};
use crate::hooks::HostHooks;
use crate::opt;

/// The four increasingly optimized forms of a procedure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TierLevel {
    Interpreter = 0,
    Baseline = 1,
    Optimized = 2,
    Ultra = 3,
}

impl TierLevel {
    pub fn as_index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<TierLevel> {
        match self {
            TierLevel::Interpreter => Some(TierLevel::Baseline),
            TierLevel::Baseline => Some(TierLevel::Optimized),
            TierLevel::Optimized => Some(TierLevel::Ultra),
            TierLevel::Ultra => None,
        }
    }
}

/// One tier of one procedure. A procedure owns an ordered stack of these; the most recent is
/// active. `since_activation` resets whenever the record becomes active, so promotion
/// thresholds are per-tier-since-activation, never cumulative-forever.
#[derive(Clone, Debug)]
pub struct TierRecord {
    pub level: TierLevel,
    pub plan: Rc<Procedure>,
    pub exec_count: u64,
    pub since_activation: u64,
    pub compile_ns: u64,
    pub deopt_count: u32,
}

impl TierRecord {
    fn interpreter(plan: Rc<Procedure>) -> Self {
        Self {
            level: TierLevel::Interpreter,
            plan,
            exec_count: 0,
            since_activation: 0,
            compile_ns: 0,
            deopt_count: 0,
        }
    }
}

struct ProcEntry {
    source: Rc<Procedure>,
    tiers: Vec<TierRecord>,
    pinned: bool,
    total_deopts: u32,
    /// Set after a failed or deferred promotion: the `since_activation` count at which the next
    /// attempt happens.
    retry_at: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Calls since tier activation that trigger promotion out of tiers 0, 1, and 2.
    pub thresholds: [u64; 3],
    /// A procedure whose cumulative deopt count exceeds this is pinned at tier 0 for good.
    pub deopt_ceiling: u32,
    /// Tier generation fails when a transformed plan grows past this many AST nodes.
    pub max_plan_nodes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: [100, 1_000, 10_000],
            deopt_ceiling: 5,
            max_plan_nodes: 4_096,
        }
    }
}

/// Scheduling seam for promotion. The default compiles inline on the triggering call; a
/// concurrent host can decline and take compilation elsewhere without touching the engine.
pub trait PromotionPolicy {
    fn promote_now(&mut self, name: &str, next: TierLevel) -> bool;
}

/// Synchronous in-call promotion; compilation blocks the triggering call.
#[derive(Debug, Default)]
pub struct InlinePromotion;

impl PromotionPolicy for InlinePromotion {
    fn promote_now(&mut self, _name: &str, _next: TierLevel) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub promotions: u64,
    pub deopts: u64,
    pub pins: u64,
    pub compile_failures: u64,
    pub compile_ns_by_level: [u64; 4],
}

/// The injectable stores a call runs against. Owned by the runtime session and passed down by
/// reference; the engine never holds globals.
pub struct CallCtx<'a> {
    pub profiler: &'a mut Profiler,
    pub feedback: &'a mut TypeFeedback,
    pub shapes: &'a mut ShapeCache,
    pub hooks: &'a mut dyn HostHooks,
}

pub struct Engine {
    procs: FxHashMap<String, ProcEntry>,
    config: EngineConfig,
    policy: Box<dyn PromotionPolicy>,
    stats: EngineStats,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_policy(config, Box::new(InlinePromotion))
    }

    pub fn with_policy(config: EngineConfig, policy: Box<dyn PromotionPolicy>) -> Self {
        Self {
            procs: FxHashMap::default(),
            config,
            policy,
            stats: EngineStats::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Register a procedure: number its branch/loop sites, create the tier-0 record, and
    /// install empty feedback records for its parameters. Reinstalling a name replaces the
    /// procedure and discards its tier history.
    pub fn install(&mut self, mut proc: Procedure, feedback: &mut TypeFeedback) {
        annotate_sites(&mut proc);
        for param in &proc.params {
            feedback.install(&param_key(&proc.name, param));
        }
        let name = proc.name.clone();
        let source = Rc::new(proc);
        self.procs.insert(
            name,
            ProcEntry {
                source: Rc::clone(&source),
                tiers: vec![TierRecord::interpreter(source)],
                pinned: false,
                total_deopts: 0,
                retry_at: None,
            },
        );
    }

    pub fn has_procedure(&self, name: &str) -> bool {
        self.procs.contains_key(name)
    }

    pub fn procedure_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.procs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn tier_level(&self, name: &str) -> Option<TierLevel> {
        self.procs
            .get(name)
            .map(|e| e.tiers.last().expect("tier 0 always present").level)
    }

    pub fn tier_records(&self, name: &str) -> Option<&[TierRecord]> {
        self.procs.get(name).map(|e| e.tiers.as_slice())
    }

    pub fn is_pinned(&self, name: &str) -> Option<bool> {
        self.procs.get(name).map(|e| e.pinned)
    }

    /// The wrapped callable: profiling, feedback, promotion bookkeeping, and deopt absorption
    /// around one procedure call.
    pub fn call(
        &mut self,
        name: &str,
        args: &[Value],
        cx: &mut CallCtx<'_>,
    ) -> Result<Value, CallError> {
        self.call_inner(name, args, cx)
    }

    pub(crate) fn call_inner(
        &mut self,
        name: &str,
        args: &[Value],
        cx: &mut CallCtx<'_>,
    ) -> Result<Value, CallError> {
        if !self.procs.contains_key(name) {
            return Err(CallError::UnknownProcedure(name.to_string()));
        }

        cx.profiler.sample_tick();
        self.bump_and_maybe_promote(name, cx);

        let params = self.procs[name].source.params.clone();
        for (param, arg) in params.iter().zip(args) {
            cx.feedback.record(&param_key(name, param), arg);
        }

        cx.profiler.on_enter(name);
        let result = self.exec_active(name, args, cx);
        cx.profiler.on_exit(name);
        result
    }

    fn exec_active(
        &mut self,
        name: &str,
        args: &[Value],
        cx: &mut CallCtx<'_>,
    ) -> Result<Value, CallError> {
        loop {
            let (level, plan) = {
                let record = self.procs[name]
                    .tiers
                    .last()
                    .expect("tier 0 always present");
                (record.level, Rc::clone(&record.plan))
            };
            match exec_procedure(self, cx, &plan, args) {
                Ok(value) => return Ok(value),
                Err(EvalError::Deopt { expected, actual }) => {
                    if level == TierLevel::Interpreter {
                        // Tier 0 carries no specialized nodes; nothing is left to pop.
                        return Err(CallError::Runtime(RuntimeError::Type(format!(
                            "speculation failed on the interpreter tier: expected {expected:?}, saw {actual:?}"
                        ))));
                    }
                    debug!(proc = name, ?expected, ?actual, "speculation failed");
                    self.deoptimize(name);
                    // Re-execute the call on the tier that is now active.
                }
                Err(EvalError::Fault(err)) => return Err(CallError::Runtime(err)),
            }
        }
    }

    fn bump_and_maybe_promote(&mut self, name: &str, cx: &mut CallCtx<'_>) {
        let (level, count, pinned, retry_at) = {
            let Some(entry) = self.procs.get_mut(name) else {
                return;
            };
            let active = entry.tiers.last_mut().expect("tier 0 always present");
            active.exec_count += 1;
            active.since_activation += 1;
            (
                active.level,
                active.since_activation,
                entry.pinned,
                entry.retry_at,
            )
        };

        if pinned {
            return;
        }
        let Some(next) = level.next() else {
            return;
        };
        let target = retry_at.unwrap_or(self.config.thresholds[level.as_index()]);
        if count < target {
            return;
        }

        if !self.policy.promote_now(name, next) {
            let retry = self.next_retry_target(target);
            if let Some(entry) = self.procs.get_mut(name) {
                entry.retry_at = Some(retry);
            }
            return;
        }
        self.promote(name, next, target, cx);
    }

    fn promote(&mut self, name: &str, next: TierLevel, target: u64, cx: &mut CallCtx<'_>) {
        let started = Instant::now();
        let generated = self.generate_plan(name, next, cx);
        let compile_ns = started.elapsed().as_nanos() as u64;

        match generated {
            Ok(plan) => {
                self.stats.promotions += 1;
                let slot = &mut self.stats.compile_ns_by_level[next.as_index()];
                *slot = slot.saturating_add(compile_ns);
                if let Some(entry) = self.procs.get_mut(name) {
                    entry.retry_at = None;
                    entry.tiers.push(TierRecord {
                        level: next,
                        plan: Rc::new(plan),
                        exec_count: 0,
                        since_activation: 0,
                        compile_ns,
                        deopt_count: 0,
                    });
                }
                debug!(proc = name, level = ?next, compile_ns, "promoted");
            }
            Err(err) => {
                // The failure never reaches the caller; execution continues on the current
                // tier and the attempt is retried at the next threshold crossing.
                self.stats.compile_failures += 1;
                let retry = self.next_retry_target(target);
                if let Some(entry) = self.procs.get_mut(name) {
                    entry.retry_at = Some(retry);
                }
                warn!(proc = name, level = ?next, error = %err, "tier generation failed");
            }
        }
    }

    fn next_retry_target(&self, failed_at: u64) -> u64 {
        self.config
            .thresholds
            .iter()
            .copied()
            .find(|&t| t > failed_at)
            .unwrap_or_else(|| failed_at.saturating_mul(2))
    }

    fn generate_plan(
        &self,
        name: &str,
        next: TierLevel,
        cx: &CallCtx<'_>,
    ) -> Result<Procedure, CompileError> {
        let source = &self.procs[name].source;
        let plan = match next {
            TierLevel::Interpreter => source.as_ref().clone(),
            TierLevel::Baseline => opt::baseline_plan(source),
            TierLevel::Optimized => opt::optimized_plan(source, cx.feedback),
            TierLevel::Ultra => {
                let sources: FxHashMap<String, Rc<Procedure>> = self
                    .procs
                    .iter()
                    .map(|(k, v)| (k.clone(), Rc::clone(&v.source)))
                    .collect();
                opt::ultra_plan(
                    source,
                    cx.feedback,
                    cx.profiler.hot_call_chains(),
                    &sources,
                )
            }
        };

        let nodes = count_nodes(&plan);
        if nodes > self.config.max_plan_nodes {
            return Err(CompileError::PlanTooLarge {
                name: name.to_string(),
                nodes,
                limit: self.config.max_plan_nodes,
            });
        }
        Ok(plan)
    }

    /// Abandon the active tier after a failed speculation. Increments the abandoned record's
    /// deopt count; past the ceiling the procedure is pinned at tier 0 permanently, otherwise
    /// the record is popped and the previous tier resumes. Tier 0 itself is never deleted.
    pub fn deoptimize(&mut self, name: &str) -> bool {
        let ceiling = self.config.deopt_ceiling;
        let mut pinned_now = false;
        let deopted = {
            let Some(entry) = self.procs.get_mut(name) else {
                return false;
            };
            if entry.tiers.len() <= 1 {
                return false;
            }
            entry.total_deopts += 1;
            let abandoned = entry.tiers.last_mut().expect("checked non-empty");
            abandoned.deopt_count += 1;
            let from = abandoned.level;

            if entry.total_deopts > ceiling {
                entry.pinned = true;
                entry.retry_at = None;
                entry.tiers.truncate(1);
                pinned_now = true;
                warn!(
                    proc = name,
                    from = ?from,
                    deopts = entry.total_deopts,
                    "deopt ceiling exceeded; pinned at tier 0"
                );
            } else {
                entry.tiers.pop();
                debug!(proc = name, from = ?from, "deoptimized");
            }
            // The tier resuming execution starts a fresh activation window.
            entry
                .tiers
                .last_mut()
                .expect("tier 0 always present")
                .since_activation = 0;
            true
        };

        if deopted {
            self.stats.deopts += 1;
            if pinned_now {
                self.stats.pins += 1;
            }
        }
        deopted
    }
}
