//! The p-code optimizer: peephole → constant propagation → dead-code elimination → type
//! specialization, in that fixed order.

pub mod passes;

use rustc_hash::FxHashSet;

use crate::inst::PInstr;

/// Run the optimizer to a fixed point.
///
/// One round applies the four passes in their strict order; rounds repeat while any pass made a
/// change (a folded constant can become a propagated store, a specialized add can expose a new
/// peephole window). Every pass only ever shrinks the stream or strengthens an instruction in
/// place, so the loop terminates; re-running the whole stage on its own output changes nothing.
pub fn optimize(code: &mut Vec<PInstr>) -> bool {
    let mut any = false;
    loop {
        let mut changed = false;
        changed |= passes::peephole::run(code);
        changed |= passes::const_prop::run(code);
        changed |= passes::dce::run(code);
        changed |= passes::type_spec::run(code);
        if !changed {
            break;
        }
        any = true;
    }
    any
}

/// Indices that some jump in `code` targets.
pub(crate) fn jump_target_set(code: &[PInstr]) -> FxHashSet<u32> {
    code.iter().filter_map(PInstr::target).collect()
}

pub(crate) fn is_jump_target(code: &[PInstr], index: usize) -> bool {
    code.iter().any(|i| i.target() == Some(index as u32))
}

/// After removing `removed` instructions starting at index `start`, pull every target beyond
/// the gap back into place. Callers guarantee nothing targets the removed window itself.
pub(crate) fn shift_targets_after_removal(code: &mut [PInstr], start: usize, removed: u32) {
    for instr in code.iter_mut() {
        if let Some(target) = instr.target() {
            if target >= start as u32 + removed {
                instr.set_target(target - removed);
            }
        }
    }
}
