use crate::inst::{PInstr, POp};
use crate::opt::{is_jump_target, shift_targets_after_removal};

/// Local pattern rewrites, iterated until no window matches:
///
/// - two adjacent integer-constant loads followed by an add collapse into one constant load of
///   the wrapping sum;
/// - a store immediately followed by a load of the same address collapses the load into `Dup`
///   (stores peek, so the stored value is still on top).
pub fn run(code: &mut Vec<PInstr>) -> bool {
    let mut changed = false;
    loop {
        if !run_once(code) {
            break;
        }
        changed = true;
    }
    changed
}

fn run_once(code: &mut Vec<PInstr>) -> bool {
    // Constant-add folding. Skipped when a jump lands inside the window: the folded sequence
    // would present a different stack to that edge.
    for i in 0..code.len().saturating_sub(2) {
        let (Some(a), Some(b)) = (code[i].int_immediate(), code[i + 1].int_immediate()) else {
            continue;
        };
        if code[i].op != POp::LoadConst || code[i + 1].op != POp::LoadConst {
            continue;
        }
        if !matches!(code[i + 2].op, POp::Add | POp::AddI) {
            continue;
        }
        if is_jump_target(code, i + 1) || is_jump_target(code, i + 2) {
            continue;
        }

        let mut folded = PInstr::const_int(a.wrapping_add(b));
        folded.meta = code[i].meta;
        code[i] = folded;
        code.drain(i + 1..i + 3);
        shift_targets_after_removal(code, i + 1, 2);
        return true;
    }

    // Store/load-of-same-address collapse; positional 1:1, so no target fixup.
    for i in 0..code.len().saturating_sub(1) {
        if code[i].op == POp::Store
            && code[i + 1].op == POp::Load
            && code[i].operands.first() == code[i + 1].operands.first()
        {
            let meta = code[i + 1].meta;
            code[i + 1] = PInstr::new(POp::Dup);
            code[i + 1].meta = meta;
            return true;
        }
    }

    false
}
