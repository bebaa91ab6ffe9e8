use crate::ast::{Expr, Procedure, Stmt};

/// Prune branches the folded AST already decided: literal `if` conditions select their body,
/// never-entered `while` loops disappear, and statements after a `return` are dropped. The
/// pass only removes code along existing control edges; it never second-guesses a dynamic
/// condition.
pub fn run(proc: &mut Procedure) -> bool {
    simplify_block(&mut proc.body)
}

fn simplify_block(stmts: &mut Vec<Stmt>) -> bool {
    let mut changed = false;
    let old = std::mem::take(stmts);

    for stmt in old {
        match stmt {
            Stmt::If {
                cond: Expr::Literal(cond),
                mut then_body,
                mut else_body,
                ..
            } => {
                changed = true;
                let chosen = if cond.truthy() {
                    simplify_block(&mut then_body);
                    then_body
                } else {
                    simplify_block(&mut else_body);
                    else_body
                };
                stmts.extend(chosen);
            }
            Stmt::While {
                cond: Expr::Literal(cond),
                ..
            } if !cond.truthy() => {
                changed = true;
            }
            Stmt::If {
                id,
                cond,
                mut then_body,
                mut else_body,
            } => {
                changed |= simplify_block(&mut then_body) | simplify_block(&mut else_body);
                stmts.push(Stmt::If {
                    id,
                    cond,
                    then_body,
                    else_body,
                });
            }
            Stmt::While { id, cond, mut body } => {
                changed |= simplify_block(&mut body);
                stmts.push(Stmt::While { id, cond, body });
            }
            other => stmts.push(other),
        }
    }

    if let Some(pos) = stmts.iter().position(|s| matches!(s, Stmt::Return(_))) {
        if pos + 1 < stmts.len() {
            stmts.truncate(pos + 1);
            changed = true;
        }
    }
    changed
}
