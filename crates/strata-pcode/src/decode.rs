use crate::inst::{Immediate, InstrMeta, OpAttrs, PInstr, POp, SECTION_MARKER};

fn find_marker(buf: &[u8]) -> Option<usize> {
    buf.windows(SECTION_MARKER.len())
        .position(|w| w == SECTION_MARKER)
}

fn read_u32(buf: &[u8], pos: &mut usize) -> Option<u32> {
    let bytes = buf.get(*pos..*pos + 4)?;
    *pos += 4;
    Some(u32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
}

/// Decode a raw p-code buffer into instructions.
///
/// Locates the section marker, then reads one opcode byte, the opcode's fixed operand count of
/// 4-byte little-endian operands, and a 4-byte immediate for constant-loading opcodes, until the
/// sentinel opcode or the end of the buffer.
///
/// Malformed input (no marker, unknown opcode byte, truncated operands) stops decoding at the
/// failure point: the instructions decoded so far are returned and no error escapes this
/// boundary.
pub fn decode(buf: &[u8]) -> Vec<PInstr> {
    let mut out = Vec::new();
    let Some(marker) = find_marker(buf) else {
        return out;
    };
    let mut pos = marker + SECTION_MARKER.len();

    while pos < buf.len() {
        let src_offset = pos as u32;
        let byte = buf[pos];
        pos += 1;
        let Some(op) = POp::from_byte(byte) else {
            break;
        };
        if op == POp::Halt {
            break;
        }

        let mut operands = Vec::with_capacity(op.operand_count());
        let mut truncated = false;
        for _ in 0..op.operand_count() {
            match read_u32(buf, &mut pos) {
                Some(word) => operands.push(word),
                None => {
                    truncated = true;
                    break;
                }
            }
        }
        if truncated {
            break;
        }

        let immediate = if op.attrs().contains(OpAttrs::CONST_LOADING) {
            match read_u32(buf, &mut pos) {
                Some(raw) => Some(match op {
                    POp::LoadConstF => Immediate::Float(f32::from_le_bytes(raw.to_le_bytes())),
                    _ => Immediate::Int(raw as i32),
                }),
                None => break,
            }
        } else {
            None
        };

        out.push(PInstr {
            op,
            operands,
            immediate,
            meta: InstrMeta {
                src_offset,
                ..InstrMeta::default()
            },
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::encode_stream;

    #[test]
    fn round_trips_a_simple_program() {
        let program = vec![
            PInstr::const_int(7),
            PInstr::with_operand(POp::Store, 0),
            PInstr::with_operand(POp::Load, 0),
            PInstr::new(POp::Return),
        ];
        let buf = encode_stream(&program);
        let decoded = decode(&buf);
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0].int_immediate(), Some(7));
        assert_eq!(decoded[1].operands, [0]);
        assert_eq!(decoded[3].op, POp::Return);
    }

    #[test]
    fn missing_marker_yields_nothing() {
        assert!(decode(&[0x10, 0x05, 0, 0, 0]).is_empty());
    }

    #[test]
    fn decode_stops_at_unknown_opcode() {
        let mut buf = SECTION_MARKER.to_vec();
        PInstr::const_int(1).encode(&mut buf);
        buf.push(0xEE); // not an opcode
        PInstr::const_int(2).encode(&mut buf);
        let decoded = decode(&buf);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].int_immediate(), Some(1));
    }

    #[test]
    fn decode_stops_on_truncated_operand() {
        let mut buf = SECTION_MARKER.to_vec();
        PInstr::const_int(1).encode(&mut buf);
        buf.push(POp::Jump.to_byte());
        buf.extend_from_slice(&[0x01, 0x02]); // half an operand
        let decoded = decode(&buf);
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn leading_garbage_before_marker_is_skipped() {
        let mut buf = vec![0xAA, 0xBB, 0xCC];
        buf.extend_from_slice(&encode_stream(&[PInstr::const_int(9)]));
        let decoded = decode(&buf);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].int_immediate(), Some(9));
    }
}
