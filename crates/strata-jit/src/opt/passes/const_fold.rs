use strata_types::Value;

use crate::ast::{BinOp, Expr, Procedure, Stmt, UnOp};

/// Fold literal-only subexpressions. Only same-type numeric arithmetic, comparisons, and
/// boolean logic fold; anything involving coercion belongs to the host and is left alone.
pub fn run(proc: &mut Procedure) -> bool {
    fold_block(&mut proc.body)
}

fn fold_block(stmts: &mut [Stmt]) -> bool {
    let mut changed = false;
    for stmt in stmts {
        changed |= match stmt {
            Stmt::Let { value, .. } | Stmt::Assign { value, .. } | Stmt::Expr(value) => {
                fold_expr(value)
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
                ..
            } => fold_expr(cond) | fold_block(then_body) | fold_block(else_body),
            Stmt::While { cond, body, .. } => fold_expr(cond) | fold_block(body),
            Stmt::Return(Some(value)) => fold_expr(value),
            Stmt::Return(None) => false,
        };
    }
    changed
}

fn fold_expr(expr: &mut Expr) -> bool {
    let mut changed = match expr {
        Expr::Literal(_) | Expr::Var(_) => false,
        Expr::Unary { operand, .. } => fold_expr(operand),
        Expr::Binary { lhs, rhs, .. } | Expr::SpecializedBinary { lhs, rhs, .. } => {
            fold_expr(lhs) | fold_expr(rhs)
        }
        Expr::Call { args, .. } => args.iter_mut().map(fold_expr).fold(false, |a, b| a | b),
        Expr::Field { object, .. } => fold_expr(object),
        Expr::ArrayLit(items) => items.iter_mut().map(fold_expr).fold(false, |a, b| a | b),
        Expr::ObjectLit { fields, .. } => fields
            .iter_mut()
            .map(|(_, e)| fold_expr(e))
            .fold(false, |a, b| a | b),
    };

    let folded = match expr {
        Expr::Binary { op, lhs, rhs } => match (lhs.as_ref(), rhs.as_ref()) {
            (Expr::Literal(a), Expr::Literal(b)) => fold_binary(*op, a, b),
            _ => None,
        },
        Expr::Unary { op, operand } => match operand.as_ref() {
            Expr::Literal(v) => fold_unary(*op, v),
            _ => None,
        },
        _ => None,
    };
    if let Some(value) = folded {
        *expr = Expr::Literal(value);
        changed = true;
    }
    changed
}

fn fold_binary(op: BinOp, a: &Value, b: &Value) -> Option<Value> {
    match op {
        BinOp::Eq => return Some(Value::Bool(a == b)),
        BinOp::Ne => return Some(Value::Bool(a != b)),
        BinOp::And => return Some(Value::Bool(a.truthy() && b.truthy())),
        BinOp::Or => return Some(Value::Bool(a.truthy() || b.truthy())),
        _ => {}
    }

    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(match op {
            BinOp::Add => Value::Int(a.wrapping_add(*b)),
            BinOp::Sub => Value::Int(a.wrapping_sub(*b)),
            BinOp::Mul => Value::Int(a.wrapping_mul(*b)),
            // Folding a division by zero would hide the runtime fault.
            BinOp::Div if *b != 0 => Value::Int(a.wrapping_div(*b)),
            BinOp::Div => return None,
            BinOp::Lt => Value::Bool(a < b),
            BinOp::Le => Value::Bool(a <= b),
            BinOp::Gt => Value::Bool(a > b),
            BinOp::Ge => Value::Bool(a >= b),
            _ => return None,
        }),
        (Value::Float(a), Value::Float(b)) => Some(match op {
            BinOp::Add => Value::Float(a + b),
            BinOp::Sub => Value::Float(a - b),
            BinOp::Mul => Value::Float(a * b),
            BinOp::Div => Value::Float(a / b),
            BinOp::Lt => Value::Bool(a < b),
            BinOp::Le => Value::Bool(a <= b),
            BinOp::Gt => Value::Bool(a > b),
            BinOp::Ge => Value::Bool(a >= b),
            _ => return None,
        }),
        (Value::Str(a), Value::Str(b)) => Some(match op {
            BinOp::Lt => Value::Bool(a < b),
            BinOp::Le => Value::Bool(a <= b),
            BinOp::Gt => Value::Bool(a > b),
            BinOp::Ge => Value::Bool(a >= b),
            _ => return None,
        }),
        _ => None,
    }
}

fn fold_unary(op: UnOp, value: &Value) -> Option<Value> {
    match (op, value) {
        (UnOp::Neg, Value::Int(n)) => Some(Value::Int(n.wrapping_neg())),
        (UnOp::Neg, Value::Float(f)) => Some(Value::Float(-f)),
        (UnOp::Not, value) => Some(Value::Bool(!value.truthy())),
        _ => None,
    }
}
