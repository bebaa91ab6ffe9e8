use strata_pcode::{encode_stream, lower, PInstr, POp};

fn validate_wasm(bytes: &[u8]) {
    let mut validator = wasmparser::Validator::new();
    validator.validate_all(bytes).unwrap();
}

fn split_sections(module: &[u8]) -> Vec<(u8, Vec<u8>)> {
    assert!(module.len() >= 8);
    assert_eq!(&module[0..4], &[0x00, 0x61, 0x73, 0x6D]);
    assert_eq!(&module[4..8], &[0x01, 0x00, 0x00, 0x00]);

    let mut sections = Vec::new();
    let mut pos = 8;
    while pos < module.len() {
        let id = module[pos];
        pos += 1;
        // LEB128 section length.
        let mut len: usize = 0;
        let mut shift = 0;
        loop {
            let byte = module[pos];
            pos += 1;
            len |= ((byte & 0x7F) as usize) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                break;
            }
        }
        sections.push((id, module[pos..pos + len].to_vec()));
        pos += len;
    }
    sections
}

#[test]
fn lowered_module_has_the_fixed_section_layout() {
    let buf = encode_stream(&[
        PInstr::const_int(2),
        PInstr::const_int(3),
        PInstr::new(POp::Add),
        PInstr::new(POp::Return),
    ]);
    let lowered = lower(&buf);
    assert!(lowered.diagnostics.is_empty());
    assert_eq!(lowered.decoded, 4);
    // The const/const/add triple folded before translation.
    assert_eq!(lowered.optimized, 2);

    let ids: Vec<u8> = split_sections(&lowered.module)
        .iter()
        .map(|(id, _)| *id)
        .collect();
    assert_eq!(ids, [0x01, 0x02, 0x03, 0x05, 0x06, 0x07, 0x0A]);
}

#[test]
fn lowered_module_validates() {
    let buf = encode_stream(&[
        PInstr::const_int(7),
        PInstr::with_operand(POp::Store, 0),
        PInstr::with_operand(POp::Load, 0),
        PInstr::new(POp::Dup),
        PInstr::new(POp::Mul),
        PInstr::new(POp::Drop),
        PInstr::new(POp::Return),
    ]);
    let lowered = lower(&buf);
    validate_wasm(&lowered.module);
}

#[test]
fn module_exports_main_and_nothing_else() {
    let lowered = lower(&encode_stream(&[PInstr::new(POp::Return)]));
    let sections = split_sections(&lowered.module);
    let export = sections
        .iter()
        .find(|(id, _)| *id == 0x07)
        .map(|(_, payload)| payload.clone())
        .expect("export section present");
    // One export: the 4-byte name "main", kind func, index 0.
    assert_eq!(export, [0x01, 0x04, b'm', b'a', b'i', b'n', 0x00, 0x00]);
}

#[test]
fn empty_sections_are_still_emitted() {
    let lowered = lower(&encode_stream(&[PInstr::new(POp::Return)]));
    let sections = split_sections(&lowered.module);
    let import = sections.iter().find(|(id, _)| *id == 0x02).unwrap();
    let global = sections.iter().find(|(id, _)| *id == 0x06).unwrap();
    // Just the zero entry count.
    assert_eq!(import.1, [0x00]);
    assert_eq!(global.1, [0x00]);
}

#[test]
fn unsupported_opcodes_degrade_to_diagnostics() {
    let buf = encode_stream(&[
        PInstr::const_int(1),
        PInstr::with_operand(POp::JumpIfZero, 0),
        PInstr::const_float(1.5),
        PInstr::new(POp::Return),
    ]);
    let lowered = lower(&buf);
    // The conditional jump and the float constant are outside the minimal target.
    assert_eq!(lowered.diagnostics.len(), 2);
    assert!(lowered.diagnostics.iter().any(|d| d.op == POp::JumpIfZero));
    assert!(lowered.diagnostics.iter().any(|d| d.op == POp::LoadConstF));
    validate_wasm(&lowered.module);
}

#[test]
fn malformed_buffer_still_lowers_best_effort() {
    let mut buf = encode_stream(&[PInstr::const_int(3), PInstr::const_int(4)]);
    // Chop off the sentinel and half of the final immediate.
    buf.truncate(buf.len() - 3);
    let lowered = lower(&buf);
    assert_eq!(lowered.decoded, 1);
    validate_wasm(&lowered.module);
}

#[test]
fn empty_input_yields_an_empty_but_valid_module() {
    let lowered = lower(&[]);
    assert_eq!(lowered.decoded, 0);
    assert_eq!(lowered.target_count, 0);
    validate_wasm(&lowered.module);
}
