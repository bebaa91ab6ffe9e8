use std::rc::Rc;

use rustc_hash::FxHashMap;
use strata_perf::HotCallChain;

use crate::ast::{Expr, Procedure, Stmt};

/// Inline hot single-expression callees.
///
/// Candidates come from the profiler's hot call chains (direct edges past the count
/// threshold). A callee is inlinable when its body is exactly `return <expr>` and the
/// substitution cannot duplicate side effects: a parameter referenced more than once only
/// accepts literal or variable arguments.
pub fn run(
    proc: &mut Procedure,
    chains: &[HotCallChain],
    sources: &FxHashMap<String, Rc<Procedure>>,
) -> bool {
    let hot_callees: Vec<&str> = chains
        .iter()
        .filter(|c| c.caller == proc.name && c.callee != proc.name)
        .map(|c| c.callee.as_str())
        .collect();
    if hot_callees.is_empty() {
        return false;
    }

    let caller = proc.name.clone();
    let mut changed = false;
    for stmt in &mut proc.body {
        changed |= walk_stmt(stmt, &caller, &hot_callees, sources);
    }
    changed
}

fn walk_stmt(
    stmt: &mut Stmt,
    caller: &str,
    hot: &[&str],
    sources: &FxHashMap<String, Rc<Procedure>>,
) -> bool {
    match stmt {
        Stmt::Let { value, .. } | Stmt::Assign { value, .. } | Stmt::Expr(value) => {
            walk_expr(value, caller, hot, sources)
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
            ..
        } => {
            let mut changed = walk_expr(cond, caller, hot, sources);
            for s in then_body.iter_mut().chain(else_body.iter_mut()) {
                changed |= walk_stmt(s, caller, hot, sources);
            }
            changed
        }
        Stmt::While { cond, body, .. } => {
            let mut changed = walk_expr(cond, caller, hot, sources);
            for s in body.iter_mut() {
                changed |= walk_stmt(s, caller, hot, sources);
            }
            changed
        }
        Stmt::Return(Some(value)) => walk_expr(value, caller, hot, sources),
        Stmt::Return(None) => false,
    }
}

fn walk_expr(
    expr: &mut Expr,
    caller: &str,
    hot: &[&str],
    sources: &FxHashMap<String, Rc<Procedure>>,
) -> bool {
    let mut changed = match expr {
        Expr::Literal(_) | Expr::Var(_) => false,
        Expr::Unary { operand, .. } => walk_expr(operand, caller, hot, sources),
        Expr::Binary { lhs, rhs, .. } | Expr::SpecializedBinary { lhs, rhs, .. } => {
            walk_expr(lhs, caller, hot, sources) | walk_expr(rhs, caller, hot, sources)
        }
        Expr::Call { args, .. } => {
            let mut c = false;
            for arg in args.iter_mut() {
                c |= walk_expr(arg, caller, hot, sources);
            }
            c
        }
        Expr::Field { object, .. } => walk_expr(object, caller, hot, sources),
        Expr::ArrayLit(items) => {
            let mut c = false;
            for item in items.iter_mut() {
                c |= walk_expr(item, caller, hot, sources);
            }
            c
        }
        Expr::ObjectLit { fields, .. } => {
            let mut c = false;
            for (_, e) in fields.iter_mut() {
                c |= walk_expr(e, caller, hot, sources);
            }
            c
        }
    };

    if let Expr::Call { callee, args } = expr {
        if hot.contains(&callee.as_str()) {
            if let Some(replacement) = try_inline(callee, args, sources) {
                *expr = replacement;
                changed = true;
            }
        }
    }
    changed
}

fn try_inline(
    callee: &str,
    args: &[Expr],
    sources: &FxHashMap<String, Rc<Procedure>>,
) -> Option<Expr> {
    let source = sources.get(callee)?;
    if source.params.len() != args.len() {
        return None;
    }
    let [Stmt::Return(Some(ret))] = source.body.as_slice() else {
        return None;
    };

    for (param, arg) in source.params.iter().zip(args) {
        let refs = count_var_refs(ret, param);
        let duplicable = matches!(arg, Expr::Literal(_) | Expr::Var(_));
        if refs > 1 && !duplicable {
            return None;
        }
    }

    let mut inlined = ret.clone();
    substitute(&mut inlined, &source.params, args);
    Some(inlined)
}

fn count_var_refs(expr: &Expr, name: &str) -> usize {
    match expr {
        Expr::Var(n) => usize::from(n == name),
        Expr::Literal(_) => 0,
        Expr::Unary { operand, .. } => count_var_refs(operand, name),
        Expr::Binary { lhs, rhs, .. } | Expr::SpecializedBinary { lhs, rhs, .. } => {
            count_var_refs(lhs, name) + count_var_refs(rhs, name)
        }
        Expr::Call { args, .. } => args.iter().map(|a| count_var_refs(a, name)).sum(),
        Expr::Field { object, .. } => count_var_refs(object, name),
        Expr::ArrayLit(items) => items.iter().map(|i| count_var_refs(i, name)).sum(),
        Expr::ObjectLit { fields, .. } => {
            fields.iter().map(|(_, e)| count_var_refs(e, name)).sum()
        }
    }
}

fn substitute(expr: &mut Expr, params: &[String], args: &[Expr]) {
    match expr {
        Expr::Var(name) => {
            if let Some(idx) = params.iter().position(|p| p == name) {
                *expr = args[idx].clone();
            }
        }
        Expr::Literal(_) => {}
        Expr::Unary { operand, .. } => substitute(operand, params, args),
        Expr::Binary { lhs, rhs, .. } | Expr::SpecializedBinary { lhs, rhs, .. } => {
            substitute(lhs, params, args);
            substitute(rhs, params, args);
        }
        Expr::Call { args: call_args, .. } => {
            for arg in call_args.iter_mut() {
                substitute(arg, params, args);
            }
        }
        Expr::Field { object, .. } => substitute(object, params, args),
        Expr::ArrayLit(items) => {
            for item in items.iter_mut() {
                substitute(item, params, args);
            }
        }
        Expr::ObjectLit { fields, .. } => {
            for (_, e) in fields.iter_mut() {
                substitute(e, params, args);
            }
        }
    }
}
