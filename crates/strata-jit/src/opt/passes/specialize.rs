use rustc_hash::{FxHashMap, FxHashSet};
use strata_feedback::TypeFeedback;
use strata_types::{TypeTag, Value};

use crate::ast::{Expr, Procedure, Stmt, UnOp};
use crate::eval::param_key;

/// Rewrite generic arithmetic to guarded specialized form where the operand types are known.
///
/// A parameter's type is trusted only when its feedback record is monomorphic or stable above
/// the threshold, and the specialized node assumes exactly the dominant tag — the guard deopts
/// on anything else. Parameters reassigned anywhere in the body are never trusted.
pub fn run(proc: &mut Procedure, feedback: &TypeFeedback) -> bool {
    let mut env: FxHashMap<String, TypeTag> = FxHashMap::default();
    for param in &proc.params {
        let Some(record) = feedback.get(&param_key(&proc.name, param)) else {
            continue;
        };
        if !record.specialization_allowed() {
            continue;
        }
        if let Some(tag) = &record.dominant {
            if tag.is_numeric() {
                env.insert(param.clone(), tag.clone());
            }
        }
    }

    let mut assigned = FxHashSet::default();
    collect_assigned(&proc.body, &mut assigned);
    for name in &assigned {
        env.remove(name);
    }

    if env.is_empty() {
        return false;
    }
    walk_block(&mut proc.body, &env)
}

fn collect_assigned(stmts: &[Stmt], out: &mut FxHashSet<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign { name, .. } => {
                out.insert(name.clone());
            }
            // A `let` shadows the parameter for the rest of the body; stop trusting it too.
            Stmt::Let { name, .. } => {
                out.insert(name.clone());
            }
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                collect_assigned(then_body, out);
                collect_assigned(else_body, out);
            }
            Stmt::While { body, .. } => collect_assigned(body, out),
            _ => {}
        }
    }
}

fn walk_block(stmts: &mut [Stmt], env: &FxHashMap<String, TypeTag>) -> bool {
    let mut changed = false;
    for stmt in stmts {
        changed |= match stmt {
            Stmt::Let { value, .. } | Stmt::Assign { value, .. } | Stmt::Expr(value) => {
                walk_expr(value, env)
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
                ..
            } => walk_expr(cond, env) | walk_block(then_body, env) | walk_block(else_body, env),
            Stmt::While { cond, body, .. } => walk_expr(cond, env) | walk_block(body, env),
            Stmt::Return(Some(value)) => walk_expr(value, env),
            Stmt::Return(None) => false,
        };
    }
    changed
}

fn walk_expr(expr: &mut Expr, env: &FxHashMap<String, TypeTag>) -> bool {
    let mut changed = match expr {
        Expr::Literal(_) | Expr::Var(_) => false,
        Expr::Unary { operand, .. } => walk_expr(operand, env),
        Expr::Binary { lhs, rhs, .. } | Expr::SpecializedBinary { lhs, rhs, .. } => {
            walk_expr(lhs, env) | walk_expr(rhs, env)
        }
        Expr::Call { args, .. } => args
            .iter_mut()
            .map(|a| walk_expr(a, env))
            .fold(false, |a, b| a | b),
        Expr::Field { object, .. } => walk_expr(object, env),
        Expr::ArrayLit(items) => items
            .iter_mut()
            .map(|i| walk_expr(i, env))
            .fold(false, |a, b| a | b),
        Expr::ObjectLit { fields, .. } => fields
            .iter_mut()
            .map(|(_, e)| walk_expr(e, env))
            .fold(false, |a, b| a | b),
    };

    if let Expr::Binary { op, lhs, rhs } = expr {
        if op.is_arithmetic() {
            if let (Some(lt), Some(rt)) = (static_tag(lhs, env), static_tag(rhs, env)) {
                if lt == rt && lt.is_numeric() {
                    let op = *op;
                    let lhs = std::mem::replace(lhs, Box::new(Expr::Literal(Value::Null)));
                    let rhs = std::mem::replace(rhs, Box::new(Expr::Literal(Value::Null)));
                    *expr = Expr::SpecializedBinary {
                        op,
                        tag: lt,
                        lhs,
                        rhs,
                    };
                    changed = true;
                }
            }
        }
    }
    changed
}

fn static_tag(expr: &Expr, env: &FxHashMap<String, TypeTag>) -> Option<TypeTag> {
    match expr {
        Expr::Literal(value) => Some(value.type_tag()),
        Expr::Var(name) => env.get(name).cloned(),
        Expr::SpecializedBinary { tag, .. } if tag.is_numeric() => Some(tag.clone()),
        Expr::Unary {
            op: UnOp::Neg,
            operand,
        } => static_tag(operand, env).filter(TypeTag::is_numeric),
        _ => None,
    }
}
