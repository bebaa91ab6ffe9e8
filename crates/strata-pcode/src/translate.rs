use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::warn;

use crate::inst::{PInstr, POp};

/// The minimal target instruction set: the integer subset of the p-code machine, expressed as
/// operations over one linear memory and an implicit operand stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetOp {
    I32Const(i32),
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    Dup,
    Drop,
    /// Load the 32-bit word at the fixed slot.
    LoadSlot(u32),
    /// Store the top of stack to the fixed slot without popping it.
    StoreSlot(u32),
    Return,
}

impl TargetOp {
    /// Operand-stack values this instruction consumes.
    pub fn inputs(self) -> u32 {
        match self {
            TargetOp::I32Const(_) | TargetOp::LoadSlot(_) | TargetOp::Return => 0,
            TargetOp::Dup | TargetOp::Drop | TargetOp::StoreSlot(_) => 1,
            TargetOp::I32Add | TargetOp::I32Sub | TargetOp::I32Mul | TargetOp::I32DivS => 2,
        }
    }
}

/// A target instruction with its declared net stack effect. The effect is bookkeeping only: the
/// emitter uses it to keep the encoded function balanced, it carries no semantic weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetInstr {
    pub op: TargetOp,
    pub stack_effect: i32,
}

impl TargetInstr {
    pub fn new(op: TargetOp, stack_effect: i32) -> Self {
        Self { op, stack_effect }
    }
}

/// Why an instruction produced no target code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("no generator registered")]
    Unregistered,
}

/// One dropped instruction. Dropping is diagnosed, never fatal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub index: usize,
    pub op: POp,
    pub reason: DropReason,
}

type Generator = fn(&PInstr) -> Vec<TargetInstr>;

/// Fixed opcode→generator table. Opcodes without an entry are skipped with a diagnostic; they
/// never abort the lowering.
pub struct Translator {
    table: FxHashMap<POp, Generator>,
}

impl Default for Translator {
    fn default() -> Self {
        Self::with_default_table()
    }
}

impl Translator {
    pub fn empty() -> Self {
        Self {
            table: FxHashMap::default(),
        }
    }

    /// The default table covers the integer subset. The branch family needs structured control
    /// flow and the float family a typed operand stack; both stay unregistered in the minimal
    /// target and degrade to diagnostics.
    pub fn with_default_table() -> Self {
        let mut translator = Self::empty();
        translator.register(POp::Nop, |_| Vec::new());
        translator.register(POp::LoadConst, |instr| {
            vec![TargetInstr::new(
                TargetOp::I32Const(instr.int_immediate().unwrap_or(0)),
                1,
            )]
        });
        translator.register(POp::Load, |instr| {
            let slot = instr.operands.first().copied().unwrap_or(0);
            vec![TargetInstr::new(TargetOp::LoadSlot(slot), 1)]
        });
        translator.register(POp::Store, |instr| {
            let slot = instr.operands.first().copied().unwrap_or(0);
            vec![TargetInstr::new(TargetOp::StoreSlot(slot), 0)]
        });
        translator.register(POp::Dup, |_| vec![TargetInstr::new(TargetOp::Dup, 1)]);
        translator.register(POp::Drop, |_| vec![TargetInstr::new(TargetOp::Drop, -1)]);
        for op in [POp::Add, POp::AddI] {
            translator.register(op, |_| vec![TargetInstr::new(TargetOp::I32Add, -1)]);
        }
        for op in [POp::Sub, POp::SubI] {
            translator.register(op, |_| vec![TargetInstr::new(TargetOp::I32Sub, -1)]);
        }
        for op in [POp::Mul, POp::MulI] {
            translator.register(op, |_| vec![TargetInstr::new(TargetOp::I32Mul, -1)]);
        }
        for op in [POp::Div, POp::DivI] {
            translator.register(op, |_| vec![TargetInstr::new(TargetOp::I32DivS, -1)]);
        }
        translator.register(POp::Return, |_| vec![TargetInstr::new(TargetOp::Return, 0)]);
        translator
    }

    pub fn register(&mut self, op: POp, generator: Generator) {
        self.table.insert(op, generator);
    }

    /// Map each surviving instruction through the table. Unregistered opcodes are dropped with
    /// a diagnostic; translation always completes.
    pub fn translate(&self, code: &[PInstr]) -> (Vec<TargetInstr>, Vec<Diagnostic>) {
        let mut out = Vec::with_capacity(code.len());
        let mut diagnostics = Vec::new();
        for (index, instr) in code.iter().enumerate() {
            match self.table.get(&instr.op) {
                Some(generator) => out.extend(generator(instr)),
                None => {
                    warn!(op = ?instr.op, index, "no generator for opcode; instruction dropped");
                    diagnostics.push(Diagnostic {
                        index,
                        op: instr.op,
                        reason: DropReason::Unregistered,
                    });
                }
            }
        }
        (out, diagnostics)
    }
}
