use std::collections::BTreeSet;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Per-procedure call-graph node. `self_ns` is derived when profiling stops.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallNode {
    pub self_ns: u64,
    pub total_ns: u64,
    pub call_count: u64,
    pub callers: BTreeSet<String>,
    pub callees: BTreeSet<String>,
}

impl CallNode {
    pub fn mean_total_ns(&self) -> f64 {
        if self.call_count == 0 {
            0.0
        } else {
            self.total_ns as f64 / self.call_count as f64
        }
    }
}

/// Caller → callee edge statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdge {
    pub count: u64,
    pub total_ns: u64,
}

impl CallEdge {
    pub fn mean_ns(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ns as f64 / self.count as f64
        }
    }
}

/// Serializable call-graph contents as sorted entry lists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CallGraphSnapshot {
    pub nodes: Vec<(String, CallNode)>,
    pub edges: Vec<(String, String, CallEdge)>,
}

/// The session-owned call graph. One logical owner; passed by reference, never a singleton.
#[derive(Debug, Default)]
pub struct CallGraph {
    nodes: FxHashMap<String, CallNode>,
    edges: FxHashMap<(String, String), CallEdge>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    /// Record one completed call of `callee`, attributed to `caller` when there is one.
    pub fn record_call(&mut self, caller: Option<&str>, callee: &str, elapsed: Duration) {
        let ns = elapsed.as_nanos() as u64;
        let node = self.nodes.entry(callee.to_string()).or_default();
        node.call_count += 1;
        node.total_ns = node.total_ns.saturating_add(ns);

        if let Some(caller) = caller {
            node.callers.insert(caller.to_string());
            self.nodes
                .entry(caller.to_string())
                .or_default()
                .callees
                .insert(callee.to_string());

            let edge = self
                .edges
                .entry((caller.to_string(), callee.to_string()))
                .or_default();
            edge.count += 1;
            edge.total_ns = edge.total_ns.saturating_add(ns);
        }
    }

    pub fn node(&self, name: &str) -> Option<&CallNode> {
        self.nodes.get(name)
    }

    pub fn edge(&self, caller: &str, callee: &str) -> Option<&CallEdge> {
        self.edges.get(&(caller.to_string(), callee.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&String, &CallNode)> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&(String, String), &CallEdge)> {
        self.edges.iter()
    }

    /// The caller edge into `callee` with the highest count; ties break lexicographically so
    /// hot-path derivation is deterministic.
    pub fn hottest_caller(&self, callee: &str) -> Option<(&str, &CallEdge)> {
        self.edges
            .iter()
            .filter(|((_, to), _)| to == callee)
            .max_by(|((a, _), ea), ((b, _), eb)| ea.count.cmp(&eb.count).then(b.cmp(a)))
            .map(|((from, _), edge)| (from.as_str(), edge))
    }

    /// Derive self time: total minus each distinct callee's average total time scaled by the
    /// edge count, floored at zero. Uses the callee's global average rather than per-call-site
    /// cost; an accepted approximation that undercounts recursive or variable-cost callees.
    pub fn derive_self_times(&mut self) {
        let mean_totals: FxHashMap<String, f64> = self
            .nodes
            .iter()
            .map(|(name, node)| (name.clone(), node.mean_total_ns()))
            .collect();

        let mut callee_cost: FxHashMap<String, f64> = FxHashMap::default();
        for ((caller, callee), edge) in &self.edges {
            let mean = mean_totals.get(callee).copied().unwrap_or(0.0);
            *callee_cost.entry(caller.clone()).or_default() += mean * edge.count as f64;
        }

        for (name, node) in self.nodes.iter_mut() {
            let spent = callee_cost.get(name).copied().unwrap_or(0.0);
            let self_ns = node.total_ns as f64 - spent;
            node.self_ns = if self_ns > 0.0 { self_ns as u64 } else { 0 };
        }
    }

    pub fn snapshot(&self) -> CallGraphSnapshot {
        let mut nodes: Vec<(String, CallNode)> = self
            .nodes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        nodes.sort_by(|a, b| a.0.cmp(&b.0));

        let mut edges: Vec<(String, String, CallEdge)> = self
            .edges
            .iter()
            .map(|((from, to), e)| (from.clone(), to.clone(), *e))
            .collect();
        edges.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

        CallGraphSnapshot { nodes, edges }
    }

    pub fn restore(&mut self, snapshot: CallGraphSnapshot) {
        self.nodes.clear();
        self.edges.clear();
        for (name, node) in snapshot.nodes {
            self.nodes.insert(name, node);
        }
        for (from, to, edge) in snapshot.edges {
            self.edges.insert((from, to), edge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_time_floors_at_zero() {
        let mut graph = CallGraph::new();
        // Callee reported as more expensive than the caller's own total.
        graph.record_call(None, "callee", Duration::from_nanos(1_000));
        graph.record_call(Some("caller"), "callee", Duration::from_nanos(3_000));
        graph.record_call(None, "caller", Duration::from_nanos(100));
        graph.derive_self_times();

        assert_eq!(graph.node("caller").unwrap().self_ns, 0);
        let callee = graph.node("callee").unwrap();
        assert_eq!(callee.self_ns, callee.total_ns);
    }

    #[test]
    fn hottest_caller_picks_highest_count_edge() {
        let mut graph = CallGraph::new();
        for _ in 0..3 {
            graph.record_call(Some("a"), "x", Duration::from_nanos(10));
        }
        graph.record_call(Some("b"), "x", Duration::from_nanos(10));
        let (caller, edge) = graph.hottest_caller("x").unwrap();
        assert_eq!(caller, "a");
        assert_eq!(edge.count, 3);
    }
}
