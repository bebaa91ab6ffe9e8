use crate::inst::{OpAttrs, PInstr};

/// Reachability-based dead-code elimination.
///
/// Successors follow the existing control edges only: an unconditional jump has one successor,
/// a conditional jump has its target plus fallthrough, terminators have none, and everything
/// else falls through. Instructions unreachable from instruction 0 are dropped and the
/// surviving jump targets are re-indexed.
pub fn run(code: &mut Vec<PInstr>) -> bool {
    if code.is_empty() {
        return false;
    }

    let len = code.len();
    let mut reachable = vec![false; len];
    let mut worklist = vec![0usize];
    while let Some(i) = worklist.pop() {
        if i >= len || reachable[i] {
            continue;
        }
        reachable[i] = true;

        let attrs = code[i].op.attrs();
        let target = code[i].target().map(|t| t as usize);
        if attrs.contains(OpAttrs::JUMP) {
            if let Some(t) = target {
                worklist.push(t);
            }
        } else if attrs.contains(OpAttrs::COND_JUMP) {
            if let Some(t) = target {
                worklist.push(t);
            }
            worklist.push(i + 1);
        } else if !attrs.contains(OpAttrs::TERMINATOR) {
            worklist.push(i + 1);
        }
    }

    if reachable.iter().all(|&r| r) {
        return false;
    }

    // Old index → new index for survivors.
    let mut remap = vec![None; len];
    let mut next = 0u32;
    for (i, keep) in reachable.iter().enumerate() {
        if *keep {
            remap[i] = Some(next);
            next += 1;
        }
    }

    let old = std::mem::take(code);
    for (i, mut instr) in old.into_iter().enumerate() {
        if !reachable[i] {
            continue;
        }
        if let Some(target) = instr.target() {
            // A reachable jump's in-range target is itself reachable; out-of-range targets are
            // left untouched.
            if let Some(Some(new_target)) = remap.get(target as usize) {
                instr.set_target(*new_target);
            }
        }
        code.push(instr);
    }

    true
}
