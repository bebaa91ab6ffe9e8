use crate::inst::{OpAttrs, PInstr, POp, ScalarType};
use crate::opt::jump_target_set;

/// Rewrite generic arithmetic to its fixed-type form when a conservative linear abstract
/// interpretation proves both operands share one primitive numeric type.
///
/// The abstract stack is discarded at every join point (jump target) and after every branch, so
/// only straight-line facts are used. Upstream-provided `meta.inferred` annotations seed the
/// abstract value for loads whose type the p-code producer already knew.
pub fn run(code: &mut Vec<PInstr>) -> bool {
    let mut changed = false;
    let targets = jump_target_set(code);
    let mut stack: Vec<Option<ScalarType>> = Vec::new();

    for i in 0..code.len() {
        if targets.contains(&(i as u32)) {
            stack.clear();
        }

        let inferred = code[i].meta.inferred;
        match code[i].op {
            POp::LoadConst => stack.push(Some(ScalarType::Int)),
            POp::LoadConstF => stack.push(Some(ScalarType::Float)),
            POp::Load => stack.push(inferred),
            POp::Store => {
                // Stores peek; the stack is unchanged.
            }
            POp::Dup => {
                let top = stack.last().copied().unwrap_or(None);
                stack.push(top);
            }
            POp::Drop => {
                stack.pop();
            }
            POp::Add | POp::Sub | POp::Mul | POp::Div => {
                let rhs = stack.pop().unwrap_or(None);
                let lhs = stack.pop().unwrap_or(None);
                let result = match (lhs, rhs) {
                    (Some(ScalarType::Int), Some(ScalarType::Int)) => {
                        code[i].op = fixed_int(code[i].op);
                        changed = true;
                        Some(ScalarType::Int)
                    }
                    (Some(ScalarType::Float), Some(ScalarType::Float)) => {
                        code[i].op = fixed_float(code[i].op);
                        changed = true;
                        Some(ScalarType::Float)
                    }
                    _ => None,
                };
                code[i].meta.inferred = result;
                stack.push(result);
            }
            POp::AddI | POp::SubI | POp::MulI | POp::DivI => {
                stack.pop();
                stack.pop();
                code[i].meta.inferred = Some(ScalarType::Int);
                stack.push(Some(ScalarType::Int));
            }
            POp::AddF | POp::SubF | POp::MulF | POp::DivF => {
                stack.pop();
                stack.pop();
                code[i].meta.inferred = Some(ScalarType::Float);
                stack.push(Some(ScalarType::Float));
            }
            POp::JumpIfZero => {
                stack.pop();
                stack.clear();
            }
            POp::Jump | POp::Return | POp::Halt => {
                stack.clear();
            }
            POp::Nop => {}
        }

        debug_assert!(
            !code[i].op.attrs().contains(OpAttrs::GENERIC_ARITH) || code[i].meta.inferred.is_none()
        );
    }

    changed
}

fn fixed_int(op: POp) -> POp {
    match op {
        POp::Add => POp::AddI,
        POp::Sub => POp::SubI,
        POp::Mul => POp::MulI,
        POp::Div => POp::DivI,
        other => other,
    }
}

fn fixed_float(op: POp) -> POp {
    match op {
        POp::Add => POp::AddF,
        POp::Sub => POp::SubF,
        POp::Mul => POp::MulF,
        POp::Div => POp::DivF,
        other => other,
    }
}
