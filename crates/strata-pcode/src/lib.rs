//! The p-code lowering pipeline: decode → optimize → translate → emit.
//!
//! An independent sibling of the tiered execution engine: it consumes a fixed-format bytecode
//! buffer and produces a minimal, valid WebAssembly module. Lowering is best-effort throughout —
//! malformed buffers truncate at the decode boundary, unsupported opcodes degrade to
//! diagnostics — so the pipeline always makes forward progress and never aborts.

pub mod decode;
mod emit;
mod inst;
pub mod opt;
mod translate;

pub use decode::decode;
pub use emit::emit_module;
pub use inst::{
    encode_stream, Immediate, InstrMeta, OpAttrs, PInstr, POp, ScalarType, SECTION_MARKER,
};
pub use opt::optimize;
pub use translate::{Diagnostic, DropReason, TargetInstr, TargetOp, Translator};

/// The result of lowering one p-code buffer.
#[derive(Clone, Debug)]
pub struct Lowered {
    /// The serialized module.
    pub module: Vec<u8>,
    /// Instructions decoded from the buffer.
    pub decoded: usize,
    /// Instructions surviving optimization.
    pub optimized: usize,
    /// Target instructions emitted into the module body.
    pub target_count: usize,
    /// One entry per dropped instruction.
    pub diagnostics: Vec<Diagnostic>,
}

/// Run the whole pipeline over a raw buffer.
pub fn lower(buf: &[u8]) -> Lowered {
    let mut code = decode(buf);
    let decoded = code.len();
    optimize(&mut code);
    let optimized = code.len();
    let (target, diagnostics) = Translator::with_default_table().translate(&code);
    let module = emit_module(&target);
    Lowered {
        module,
        decoded,
        optimized,
        target_count: target.len(),
        diagnostics,
    }
}
