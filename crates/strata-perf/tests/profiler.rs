use std::time::Duration;

use strata_perf::{LoopHintKind, Profiler, ProfilerConfig};

fn run_once(profiler: &mut Profiler, chain: &[&str]) {
    for name in chain {
        profiler.on_enter(name);
    }
    for name in chain.iter().rev() {
        profiler.on_exit(name);
    }
}

#[test]
fn branch_predictability_at_exactly_threshold_emits_no_hint() {
    let mut profiler = Profiler::default();
    profiler.start();
    for _ in 0..19 {
        profiler.record_branch("f:br:0", true);
    }
    profiler.record_branch("f:br:0", false);
    profiler.stop();

    let rec = profiler.branch_record("f:br:0").unwrap();
    assert!((rec.predictability() - 0.95).abs() < 1e-12);
    // 0.95 is not strictly above the 0.95 threshold.
    assert!(profiler.hints().branches.is_empty());
}

#[test]
fn branch_predictability_is_one_until_opposite_outcome() {
    let mut profiler = Profiler::default();
    profiler.start();
    for _ in 0..40 {
        profiler.record_branch("b", true);
    }
    assert_eq!(profiler.branch_record("b").unwrap().predictability(), 1.0);

    profiler.record_branch("b", false);
    let p = profiler.branch_record("b").unwrap().predictability();
    assert!(p < 1.0);
    assert!(p >= 0.5);
    profiler.stop();
}

#[test]
fn hot_paths_are_sorted_and_shares_bounded() {
    let mut profiler = Profiler::default();
    profiler.start();
    // "main -> hot" dominates; "main -> warm" qualifies too.
    for _ in 0..150 {
        run_once(&mut profiler, &["main", "hot"]);
    }
    for _ in 0..120 {
        run_once(&mut profiler, &["main", "warm"]);
    }
    profiler.stop();

    let paths = profiler.hot_paths();
    assert!(!paths.is_empty());
    assert!(paths.len() <= 10);
    for pair in paths.windows(2) {
        assert!(pair[0].total_ns >= pair[1].total_ns);
    }
    let share_sum: f64 = paths.iter().map(|p| p.share).sum();
    assert!(share_sum <= 1.0 + 1e-9);

    // The chain for "hot" is rooted at its only caller.
    let hot = paths
        .iter()
        .find(|p| p.chain.last().map(String::as_str) == Some("hot"))
        .unwrap();
    assert_eq!(hot.chain, ["main", "hot"]);
    assert_eq!(hot.count, 150);
}

#[test]
fn hot_chain_detection_requires_over_thousand_calls() {
    let mut profiler = Profiler::new(ProfilerConfig {
        hot_chain_min_count: 5,
        ..ProfilerConfig::default()
    });
    profiler.start();
    for _ in 0..6 {
        run_once(&mut profiler, &["outer", "inner"]);
    }
    run_once(&mut profiler, &["outer", "other"]);
    profiler.stop();

    let chains = profiler.hot_call_chains();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].caller, "outer");
    assert_eq!(chains[0].callee, "inner");
    assert_eq!(chains[0].count, 6);
}

#[test]
fn stop_is_idempotent() {
    let mut profiler = Profiler::default();
    profiler.start();
    run_once(&mut profiler, &["a"]);
    profiler.stop();
    let first = profiler.hot_paths().to_vec();
    profiler.stop();
    assert_eq!(profiler.hot_paths(), first.as_slice());
    assert!(!profiler.is_active());
}

#[test]
fn sample_tick_attributes_hits_to_stack_top() {
    let mut profiler = Profiler::new(ProfilerConfig {
        sample_interval: Duration::from_millis(1),
        ..ProfilerConfig::default()
    });
    profiler.start();
    profiler.on_enter("busy");
    std::thread::sleep(Duration::from_millis(3));
    profiler.sample_tick();
    profiler.on_exit("busy");
    profiler.stop();
    let hits = profiler.sample_hits("busy");
    assert!(hits >= 1);

    // No samples land after stop.
    std::thread::sleep(Duration::from_millis(3));
    profiler.sample_tick();
    assert_eq!(profiler.sample_hits("busy"), hits);
}

#[test]
fn loop_hints_split_by_mean_iterations() {
    let mut profiler = Profiler::default();
    profiler.start();
    for _ in 0..4 {
        profiler.record_loop("short", 3);
    }
    profiler.record_loop("long", 500);
    profiler.record_loop("mid", 50);
    profiler.stop();

    let hints = profiler.hints();
    assert_eq!(hints.loops.len(), 2);
    let short = hints.loops.iter().find(|h| h.id == "short").unwrap();
    assert_eq!(short.kind, LoopHintKind::Unroll);
    let long = hints.loops.iter().find(|h| h.id == "long").unwrap();
    assert_eq!(long.kind, LoopHintKind::VectorizeCandidate);
}

#[test]
fn cold_set_lists_rarely_executed_procedures() {
    let mut profiler = Profiler::default();
    profiler.start();
    for _ in 0..20 {
        run_once(&mut profiler, &["warm"]);
    }
    run_once(&mut profiler, &["rare"]);
    profiler.stop();

    let hints = profiler.hints();
    assert!(hints.cold.contains(&"rare".to_string()));
    assert!(!hints.cold.contains(&"warm".to_string()));
}

#[test]
fn restore_recomputes_derived_views() {
    let mut profiler = Profiler::default();
    profiler.start();
    for _ in 0..150 {
        run_once(&mut profiler, &["main", "hot"]);
    }
    profiler.stop();

    let exec = profiler.exec_snapshot();
    let branches = profiler.branch_snapshot();
    let graph = profiler.graph_snapshot();
    let hot_paths = profiler.hot_paths().to_vec();

    let mut restored = Profiler::default();
    restored.restore(exec.clone(), branches, graph);
    assert_eq!(restored.exec_snapshot(), exec);
    assert_eq!(restored.hot_paths(), hot_paths.as_slice());
}
