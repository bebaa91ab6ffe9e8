//! The tree-walking evaluator behind every tier plan.
//!
//! Tier 0 runs the installed AST unchanged; higher tiers run transformed copies of it. The only
//! runtime difference is `SpecializedBinary`, whose tag guard turns a violated assumption into
//! `EvalError::Deopt` instead of a wrong answer.

use rustc_hash::FxHashMap;
use strata_types::{ObjectValue, Value};

use crate::ast::{BinOp, Expr, Procedure, Stmt, UnOp};
use crate::error::{EvalError, RuntimeError};
use crate::tier::{CallCtx, Engine};

pub(crate) type Env = FxHashMap<String, Value>;

enum Flow {
    Normal,
    Return(Value),
}

pub(crate) fn exec_procedure(
    engine: &mut Engine,
    cx: &mut CallCtx<'_>,
    proc: &Procedure,
    args: &[Value],
) -> Result<Value, EvalError> {
    if args.len() != proc.params.len() {
        return Err(RuntimeError::Arity {
            name: proc.name.clone(),
            expected: proc.params.len(),
            got: args.len(),
        }
        .into());
    }

    let mut env: Env = proc
        .params
        .iter()
        .cloned()
        .zip(args.iter().cloned())
        .collect();

    match exec_block(engine, cx, proc, &mut env, &proc.body)? {
        Flow::Return(value) => Ok(value),
        Flow::Normal => Ok(Value::Empty),
    }
}

fn exec_block(
    engine: &mut Engine,
    cx: &mut CallCtx<'_>,
    proc: &Procedure,
    env: &mut Env,
    stmts: &[Stmt],
) -> Result<Flow, EvalError> {
    for stmt in stmts {
        if let Flow::Return(value) = exec_stmt(engine, cx, proc, env, stmt)? {
            return Ok(Flow::Return(value));
        }
    }
    Ok(Flow::Normal)
}

fn exec_stmt(
    engine: &mut Engine,
    cx: &mut CallCtx<'_>,
    proc: &Procedure,
    env: &mut Env,
    stmt: &Stmt,
) -> Result<Flow, EvalError> {
    match stmt {
        Stmt::Let { name, value } => {
            let value = eval_expr(engine, cx, proc, env, value)?;
            env.insert(name.clone(), value);
            Ok(Flow::Normal)
        }
        Stmt::Assign { name, value } => {
            if !env.contains_key(name) {
                return Err(RuntimeError::UndefinedVariable(name.clone()).into());
            }
            let value = eval_expr(engine, cx, proc, env, value)?;
            env.insert(name.clone(), value);
            Ok(Flow::Normal)
        }
        Stmt::Expr(expr) => {
            eval_expr(engine, cx, proc, env, expr)?;
            Ok(Flow::Normal)
        }
        Stmt::If {
            id,
            cond,
            then_body,
            else_body,
        } => {
            let taken = eval_expr(engine, cx, proc, env, cond)?.truthy();
            cx.profiler
                .record_branch(&branch_key(&proc.name, *id), taken);
            let body = if taken { then_body } else { else_body };
            exec_block(engine, cx, proc, env, body)
        }
        Stmt::While { id, cond, body } => {
            let mut iterations = 0u64;
            let flow = loop {
                if !eval_expr(engine, cx, proc, env, cond)?.truthy() {
                    break Flow::Normal;
                }
                iterations += 1;
                if let Flow::Return(value) = exec_block(engine, cx, proc, env, body)? {
                    break Flow::Return(value);
                }
            };
            cx.profiler
                .record_loop(&loop_key(&proc.name, *id), iterations);
            Ok(flow)
        }
        Stmt::Return(value) => {
            let value = match value {
                Some(expr) => eval_expr(engine, cx, proc, env, expr)?,
                None => Value::Empty,
            };
            Ok(Flow::Return(value))
        }
    }
}

fn eval_expr(
    engine: &mut Engine,
    cx: &mut CallCtx<'_>,
    proc: &Procedure,
    env: &mut Env,
    expr: &Expr,
) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Var(name) => env
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::from(RuntimeError::UndefinedVariable(name.clone()))),
        Expr::Unary { op, operand } => {
            let value = eval_expr(engine, cx, proc, env, operand)?;
            eval_unary(*op, value).map_err(EvalError::from)
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = eval_expr(engine, cx, proc, env, lhs)?;
            // And/Or short-circuit before the right operand runs.
            match op {
                BinOp::And if !lhs.truthy() => return Ok(Value::Bool(false)),
                BinOp::Or if lhs.truthy() => return Ok(Value::Bool(true)),
                _ => {}
            }
            let rhs = eval_expr(engine, cx, proc, env, rhs)?;
            eval_binary(cx, *op, lhs, rhs)
        }
        Expr::SpecializedBinary { op, tag, lhs, rhs } => {
            let lhs = eval_expr(engine, cx, proc, env, lhs)?;
            let rhs = eval_expr(engine, cx, proc, env, rhs)?;
            for value in [&lhs, &rhs] {
                let actual = value.type_tag();
                if actual != *tag {
                    return Err(EvalError::Deopt {
                        expected: tag.clone(),
                        actual,
                    });
                }
            }
            // Guard passed; the fast path assumes the dominant tag without re-dispatch.
            match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => int_arith(*op, *a, *b).map_err(EvalError::from),
                (Value::Float(a), Value::Float(b)) => Ok(float_arith(*op, *a, *b)),
                _ => eval_binary(cx, *op, lhs, rhs),
            }
        }
        Expr::Call { callee, args } => {
            let mut argv = Vec::with_capacity(args.len());
            for arg in args {
                argv.push(eval_expr(engine, cx, proc, env, arg)?);
            }
            if engine.has_procedure(callee) {
                engine
                    .call_inner(callee, &argv, cx)
                    .map_err(EvalError::from_call)
            } else {
                cx.hooks.call_host(callee, &argv).map_err(EvalError::from)
            }
        }
        Expr::Field { object, field } => {
            let object = eval_expr(engine, cx, proc, env, object)?;
            match object {
                Value::Object(obj) => {
                    let shape = cx.shapes.shape_of(&obj);
                    // Fields resolve through the descriptor's sorted-order offset.
                    Ok(match shape.offset_of(field) {
                        Some(offset) => obj
                            .fields
                            .values()
                            .nth(offset as usize)
                            .cloned()
                            .unwrap_or(Value::Null),
                        None => Value::Null,
                    })
                }
                other => Err(RuntimeError::Type(format!(
                    "field `{field}` on non-object {:?}",
                    other.type_tag()
                ))
                .into()),
            }
        }
        Expr::ArrayLit(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(engine, cx, proc, env, item)?);
            }
            Ok(Value::Array(values))
        }
        Expr::ObjectLit { class, fields } => {
            let mut obj = ObjectValue {
                class: class.clone(),
                fields: Default::default(),
            };
            for (name, expr) in fields {
                let value = eval_expr(engine, cx, proc, env, expr)?;
                obj.fields.insert(name.clone(), value);
            }
            // Construction sites learn shapes too, not just field accesses.
            cx.shapes.shape_of(&obj);
            Ok(Value::Object(obj))
        }
    }
}

pub(crate) fn branch_key(proc: &str, id: u32) -> String {
    format!("{proc}:br:{id}")
}

pub(crate) fn loop_key(proc: &str, id: u32) -> String {
    format!("{proc}:loop:{id}")
}

pub(crate) fn param_key(proc: &str, param: &str) -> String {
    format!("{proc}.{param}")
}

fn eval_unary(op: UnOp, value: Value) -> Result<Value, RuntimeError> {
    match (op, value) {
        (UnOp::Neg, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
        (UnOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnOp::Not, value) => Ok(Value::Bool(!value.truthy())),
        (UnOp::Neg, other) => Err(RuntimeError::Type(format!(
            "cannot negate {:?}",
            other.type_tag()
        ))),
    }
}

fn eval_binary(
    cx: &mut CallCtx<'_>,
    op: BinOp,
    lhs: Value,
    rhs: Value,
) -> Result<Value, EvalError> {
    match op {
        BinOp::Eq => return Ok(Value::Bool(lhs == rhs)),
        BinOp::Ne => return Ok(Value::Bool(lhs != rhs)),
        BinOp::And => return Ok(Value::Bool(lhs.truthy() && rhs.truthy())),
        BinOp::Or => return Ok(Value::Bool(lhs.truthy() || rhs.truthy())),
        _ => {}
    }

    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => {
            if op.is_arithmetic() {
                int_arith(op, *a, *b).map_err(EvalError::from)
            } else {
                Ok(Value::Bool(int_compare(op, *a, *b)))
            }
        }
        (Value::Float(a), Value::Float(b)) => {
            if op.is_arithmetic() {
                Ok(float_arith(op, *a, *b))
            } else {
                Ok(Value::Bool(float_compare(op, *a, *b)))
            }
        }
        (Value::Str(a), Value::Str(b)) if !op.is_arithmetic() => {
            Ok(Value::Bool(str_compare(op, a, b)))
        }
        // Everything else is the hosting language's business.
        _ => cx
            .hooks
            .coerce_binary(op, &lhs, &rhs)
            .map_err(EvalError::from),
    }
}

fn int_arith(op: BinOp, a: i64, b: i64) -> Result<Value, RuntimeError> {
    Ok(Value::Int(match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a.wrapping_div(b)
        }
        _ => unreachable!("arithmetic op"),
    }))
}

fn float_arith(op: BinOp, a: f64, b: f64) -> Value {
    Value::Float(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        _ => unreachable!("arithmetic op"),
    })
}

fn int_compare(op: BinOp, a: i64, b: i64) -> bool {
    match op {
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        BinOp::Gt => a > b,
        BinOp::Ge => a >= b,
        _ => unreachable!("comparison op"),
    }
}

fn float_compare(op: BinOp, a: f64, b: f64) -> bool {
    match op {
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        BinOp::Gt => a > b,
        BinOp::Ge => a >= b,
        _ => unreachable!("comparison op"),
    }
}

fn str_compare(op: BinOp, a: &str, b: &str) -> bool {
    match op {
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        BinOp::Gt => a > b,
        BinOp::Ge => a >= b,
        _ => unreachable!("comparison op"),
    }
}

impl EvalError {
    fn from_call(err: crate::error::CallError) -> EvalError {
        match err {
            crate::error::CallError::Runtime(e) => EvalError::Fault(e),
            crate::error::CallError::UnknownProcedure(name) => {
                EvalError::Fault(RuntimeError::UndefinedCallee(name))
            }
        }
    }
}
