use rustc_hash::FxHashMap;

use crate::inst::{Immediate, PInstr, POp};
use crate::opt::jump_target_set;

/// Forward constant propagation through memory slots.
///
/// A constant load immediately followed by a store populates the address→constant table; loads
/// from tracked addresses are replaced by the tracked constant; any other store to a tracked
/// address invalidates its entry. The table is discarded at join points (jump targets) and after
/// branch instructions, so propagation only ever follows straight-line facts.
pub fn run(code: &mut Vec<PInstr>) -> bool {
    let mut changed = false;
    let targets = jump_target_set(code);
    let mut table: FxHashMap<u32, Immediate> = FxHashMap::default();
    let mut pending_const: Option<Immediate> = None;

    for i in 0..code.len() {
        if targets.contains(&(i as u32)) {
            table.clear();
            pending_const = None;
        }

        match code[i].op {
            POp::LoadConst | POp::LoadConstF => {
                pending_const = code[i].immediate;
                continue;
            }
            POp::Store => {
                let Some(addr) = code[i].operands.first().copied() else {
                    pending_const = None;
                    continue;
                };
                match pending_const {
                    Some(imm) => {
                        table.insert(addr, imm);
                    }
                    None => {
                        table.remove(&addr);
                    }
                }
            }
            POp::Load => {
                let Some(addr) = code[i].operands.first().copied() else {
                    pending_const = None;
                    continue;
                };
                if let Some(imm) = table.get(&addr).copied() {
                    let meta = code[i].meta;
                    code[i] = match imm {
                        Immediate::Int(v) => PInstr::const_int(v),
                        Immediate::Float(v) => PInstr::const_float(v),
                    };
                    code[i].meta = meta;
                    pending_const = Some(imm);
                    changed = true;
                    continue;
                }
            }
            POp::Jump | POp::JumpIfZero => {
                table.clear();
            }
            _ => {}
        }
        pending_const = None;
    }

    changed
}
