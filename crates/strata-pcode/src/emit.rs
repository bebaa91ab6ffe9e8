use wasm_encoder::{
    CodeSection, ExportKind, ExportSection, Function, FunctionSection, GlobalSection,
    ImportSection, Instruction, MemArg, MemorySection, MemoryType, Module, TypeSection, ValType,
};

use crate::translate::{TargetInstr, TargetOp};

/// Memory slots are 32-bit words; slot `n` lives at byte offset `n * 4`.
const SLOT_BYTES: u64 = 4;

fn memarg(slot: u32) -> MemArg {
    MemArg {
        offset: slot as u64 * SLOT_BYTES,
        align: 2,
        memory_index: 0,
    }
}

/// Serialize the target instructions into a minimal valid module.
///
/// Layout, in order: magic + version, Type (one `[] -> []` function type), Import (empty),
/// Function (one function of that type), Memory (one region, 1 initial page, no maximum),
/// Global (empty), Export (`"main"`), Code (the concatenated target instructions plus the end
/// marker). Empty sections are still emitted so the section order is fixed.
pub fn emit_module(instrs: &[TargetInstr]) -> Vec<u8> {
    let mut module = Module::new();

    let mut types = TypeSection::new();
    types.ty().function([], []);
    module.section(&types);

    module.section(&ImportSection::new());

    let mut functions = FunctionSection::new();
    functions.function(0);
    module.section(&functions);

    let mut memories = MemorySection::new();
    memories.memory(MemoryType {
        minimum: 1,
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    });
    module.section(&memories);

    module.section(&GlobalSection::new());

    let mut exports = ExportSection::new();
    exports.export("main", ExportKind::Func, 0);
    module.section(&exports);

    let mut codes = CodeSection::new();
    codes.function(&encode_body(instrs));
    module.section(&codes);

    module.finish()
}

/// Encode the function body, keeping the operand stack balanced.
///
/// The declared stack effects drive the bookkeeping: an instruction short of inputs (possible
/// after upstream instructions were dropped with diagnostics) is padded with zero constants,
/// and leftover values are dropped before the end marker. In a fully-translated stream neither
/// correction fires.
fn encode_body(instrs: &[TargetInstr]) -> Function {
    // Local 0 is the i32 scratch slot used by Dup and StoreSlot.
    let mut func = Function::new([(1, ValType::I32)]);
    let mut depth: i32 = 0;

    for instr in instrs {
        let needed = instr.op.inputs() as i32;
        while depth < needed {
            func.instruction(&Instruction::I32Const(0));
            depth += 1;
        }

        match instr.op {
            TargetOp::I32Const(v) => {
                func.instruction(&Instruction::I32Const(v));
            }
            TargetOp::I32Add => {
                func.instruction(&Instruction::I32Add);
            }
            TargetOp::I32Sub => {
                func.instruction(&Instruction::I32Sub);
            }
            TargetOp::I32Mul => {
                func.instruction(&Instruction::I32Mul);
            }
            TargetOp::I32DivS => {
                func.instruction(&Instruction::I32DivS);
            }
            TargetOp::Dup => {
                func.instruction(&Instruction::LocalTee(0));
                func.instruction(&Instruction::LocalGet(0));
            }
            TargetOp::Drop => {
                func.instruction(&Instruction::Drop);
            }
            TargetOp::LoadSlot(slot) => {
                func.instruction(&Instruction::I32Const(0));
                func.instruction(&Instruction::I32Load(memarg(slot)));
            }
            TargetOp::StoreSlot(slot) => {
                // Keep the stored value on the stack: stash it, push the address, store the
                // stashed copy.
                func.instruction(&Instruction::LocalTee(0));
                func.instruction(&Instruction::I32Const(0));
                func.instruction(&Instruction::LocalGet(0));
                func.instruction(&Instruction::I32Store(memarg(slot)));
            }
            TargetOp::Return => {
                func.instruction(&Instruction::Return);
            }
        }

        depth += instr.stack_effect;
    }

    for _ in 0..depth.max(0) {
        func.instruction(&Instruction::Drop);
    }
    func.instruction(&Instruction::End);
    func
}
