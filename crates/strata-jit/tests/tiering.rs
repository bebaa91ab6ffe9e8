use strata_feedback::{ShapeCache, TypeFeedback};
use strata_jit::ast::{BinOp, Expr, Procedure, Stmt};
use strata_jit::{CallCtx, DefaultHooks, Engine, EngineConfig, TierLevel};
use strata_perf::{Profiler, ProfilerConfig};
use strata_types::Value;

struct Harness {
    profiler: Profiler,
    feedback: TypeFeedback,
    shapes: ShapeCache,
    hooks: DefaultHooks,
}

impl Harness {
    fn new() -> Self {
        Self {
            profiler: Profiler::default(),
            feedback: TypeFeedback::new(),
            shapes: ShapeCache::new(),
            hooks: DefaultHooks,
        }
    }

    fn with_profiler(config: ProfilerConfig) -> Self {
        Self {
            profiler: Profiler::new(config),
            ..Self::new()
        }
    }

    fn cx(&mut self) -> CallCtx<'_> {
        CallCtx {
            profiler: &mut self.profiler,
            feedback: &mut self.feedback,
            shapes: &mut self.shapes,
            hooks: &mut self.hooks,
        }
    }
}

/// `add(a, b) { return a + b; }`
fn add_proc() -> Procedure {
    Procedure::new(
        "add",
        &["a", "b"],
        vec![Stmt::Return(Some(Expr::binary(
            BinOp::Add,
            Expr::var("a"),
            Expr::var("b"),
        )))],
    )
}

fn call_ints(engine: &mut Engine, harness: &mut Harness, n: u64) {
    for i in 0..n {
        let out = engine
            .call(
                "add",
                &[Value::Int(i as i64), Value::Int(1)],
                &mut harness.cx(),
            )
            .unwrap();
        assert_eq!(out, Value::Int(i as i64 + 1));
    }
}

#[test]
fn one_hundred_fifty_calls_yield_exactly_one_baseline_record() {
    let mut engine = Engine::default();
    let mut harness = Harness::new();
    engine.install(add_proc(), &mut harness.feedback);

    call_ints(&mut engine, &mut harness, 150);

    let records = engine.tier_records("add").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].level, TierLevel::Interpreter);
    assert_eq!(records[1].level, TierLevel::Baseline);
    assert_eq!(engine.tier_level("add"), Some(TierLevel::Baseline));
    // 100 calls landed on tier 0, the remaining 50 on tier 1.
    assert_eq!(records[1].exec_count, 50);
}

#[test]
fn tier_level_is_weakly_increasing_without_deopts() {
    let mut engine = Engine::new(EngineConfig {
        thresholds: [5, 10, 20],
        ..EngineConfig::default()
    });
    let mut harness = Harness::new();
    engine.install(add_proc(), &mut harness.feedback);

    let mut last = TierLevel::Interpreter;
    for i in 0..60u64 {
        engine
            .call("add", &[Value::Int(i as i64), Value::Int(2)], &mut harness.cx())
            .unwrap();
        let level = engine.tier_level("add").unwrap();
        assert!(level >= last, "tier regressed without a deopt");
        last = level;
    }
    assert_eq!(last, TierLevel::Ultra);
}

#[test]
fn specialized_tier_deopts_and_resumes_on_previous_tier() {
    let mut engine = Engine::new(EngineConfig {
        thresholds: [3, 5, 1_000],
        ..EngineConfig::default()
    });
    let mut harness = Harness::new();
    engine.install(add_proc(), &mut harness.feedback);

    call_ints(&mut engine, &mut harness, 10);
    assert_eq!(engine.tier_level("add"), Some(TierLevel::Optimized));

    // Monomorphic integer feedback means the optimized plan speculates on integers; a float
    // call violates the guard, pops the tier, and the same call completes one tier down.
    let out = engine
        .call(
            "add",
            &[Value::Float(2.0), Value::Float(3.0)],
            &mut harness.cx(),
        )
        .unwrap();
    assert_eq!(out, Value::Float(5.0));
    assert_eq!(engine.tier_level("add"), Some(TierLevel::Baseline));
    assert_eq!(engine.stats().deopts, 1);
}

#[test]
fn sixth_deopt_pins_the_procedure_at_tier_zero() {
    let mut engine = Engine::new(EngineConfig {
        thresholds: [3, 5, 100_000],
        ..EngineConfig::default()
    });
    let mut harness = Harness::new();
    engine.install(add_proc(), &mut harness.feedback);

    for round in 1..=6u32 {
        // Re-warm to the speculating tier, keep the integer feedback dominant, then violate
        // the guard.
        while engine.tier_level("add") != Some(TierLevel::Optimized) {
            engine
                .call("add", &[Value::Int(1), Value::Int(2)], &mut harness.cx())
                .unwrap();
        }
        call_ints(&mut engine, &mut harness, 20);
        let out = engine
            .call(
                "add",
                &[Value::Float(1.0), Value::Float(2.0)],
                &mut harness.cx(),
            )
            .unwrap();
        assert_eq!(out, Value::Float(3.0));
        assert_eq!(engine.stats().deopts as u32, round);
    }

    assert_eq!(engine.is_pinned("add"), Some(true));
    assert_eq!(engine.tier_level("add"), Some(TierLevel::Interpreter));
    assert_eq!(engine.tier_records("add").unwrap().len(), 1);
    assert_eq!(engine.stats().pins, 1);

    // No tier above 0 is ever created again, regardless of further calls.
    call_ints(&mut engine, &mut harness, 50);
    assert_eq!(engine.tier_level("add"), Some(TierLevel::Interpreter));
    assert_eq!(engine.tier_records("add").unwrap().len(), 1);
}

#[test]
fn failed_tier_generation_keeps_the_call_alive_and_retries_later() {
    let mut engine = Engine::new(EngineConfig {
        thresholds: [3, 5, 1_000],
        max_plan_nodes: 1,
        ..EngineConfig::default()
    });
    let mut harness = Harness::new();
    engine.install(add_proc(), &mut harness.feedback);

    call_ints(&mut engine, &mut harness, 3);
    assert_eq!(engine.stats().compile_failures, 1);
    assert_eq!(engine.tier_level("add"), Some(TierLevel::Interpreter));

    // The retry waits for the next threshold crossing (5), then fails again.
    call_ints(&mut engine, &mut harness, 1);
    assert_eq!(engine.stats().compile_failures, 1);
    call_ints(&mut engine, &mut harness, 1);
    assert_eq!(engine.stats().compile_failures, 2);

    // Still fully callable throughout.
    let out = engine
        .call("add", &[Value::Int(20), Value::Int(22)], &mut harness.cx())
        .unwrap();
    assert_eq!(out, Value::Int(42));
}

#[test]
fn ultra_tier_inlines_hot_single_expression_callees() {
    let mut engine = Engine::new(EngineConfig {
        thresholds: [2, 3, 4],
        ..EngineConfig::default()
    });
    let mut harness = Harness::with_profiler(ProfilerConfig {
        hot_chain_min_count: 5,
        ..ProfilerConfig::default()
    });

    engine.install(
        Procedure::new(
            "double",
            &["x"],
            vec![Stmt::Return(Some(Expr::binary(
                BinOp::Mul,
                Expr::var("x"),
                Expr::literal(2i64),
            )))],
        ),
        &mut harness.feedback,
    );
    engine.install(
        Procedure::new(
            "driver",
            &["x"],
            vec![Stmt::Return(Some(Expr::binary(
                BinOp::Add,
                Expr::call("double", vec![Expr::var("x")]),
                Expr::literal(1i64),
            )))],
        ),
        &mut harness.feedback,
    );

    // Record the driver→double edge, then freeze the hot chains.
    harness.profiler.start();
    for i in 0..8 {
        engine
            .call("driver", &[Value::Int(i)], &mut harness.cx())
            .unwrap();
    }
    harness.profiler.stop();
    assert!(!harness.profiler.hot_call_chains().is_empty());

    // Drive the caller to the ultra tier; its plan should no longer call out.
    for i in 0..8 {
        engine
            .call("driver", &[Value::Int(i)], &mut harness.cx())
            .unwrap();
    }
    assert_eq!(engine.tier_level("driver"), Some(TierLevel::Ultra));
    let ultra = engine.tier_records("driver").unwrap().last().unwrap();
    assert!(
        !contains_call(&ultra.plan.body),
        "hot callee should be inlined in the ultra plan"
    );

    let out = engine
        .call("driver", &[Value::Int(5)], &mut harness.cx())
        .unwrap();
    assert_eq!(out, Value::Int(11));
}

fn contains_call(stmts: &[Stmt]) -> bool {
    fn expr_has_call(expr: &Expr) -> bool {
        match expr {
            Expr::Call { .. } => true,
            Expr::Literal(_) | Expr::Var(_) => false,
            Expr::Unary { operand, .. } => expr_has_call(operand),
            Expr::Binary { lhs, rhs, .. } | Expr::SpecializedBinary { lhs, rhs, .. } => {
                expr_has_call(lhs) || expr_has_call(rhs)
            }
            Expr::Field { object, .. } => expr_has_call(object),
            Expr::ArrayLit(items) => items.iter().any(expr_has_call),
            Expr::ObjectLit { fields, .. } => fields.iter().any(|(_, e)| expr_has_call(e)),
        }
    }
    stmts.iter().any(|stmt| match stmt {
        Stmt::Let { value, .. } | Stmt::Assign { value, .. } | Stmt::Expr(value) => {
            expr_has_call(value)
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
            ..
        } => expr_has_call(cond) || contains_call(then_body) || contains_call(else_body),
        Stmt::While { cond, body, .. } => expr_has_call(cond) || contains_call(body),
        Stmt::Return(Some(value)) => expr_has_call(value),
        Stmt::Return(None) => false,
    })
}
