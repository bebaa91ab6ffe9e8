use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use strata_pcode::{optimize, PInstr, POp};

#[test]
fn adjacent_const_loads_and_add_fold_to_one_load() {
    let mut code = vec![
        PInstr::const_int(2),
        PInstr::const_int(3),
        PInstr::new(POp::Add),
    ];
    assert!(optimize(&mut code));
    assert_eq!(code.len(), 1);
    assert_eq!(code[0].op, POp::LoadConst);
    assert_eq!(code[0].int_immediate(), Some(5));
}

#[test]
fn fold_chains_collapse_fully() {
    // ((2 + 3) + 4): the first fold exposes the second window.
    let mut code = vec![
        PInstr::const_int(2),
        PInstr::const_int(3),
        PInstr::new(POp::Add),
        PInstr::const_int(4),
        PInstr::new(POp::Add),
        PInstr::new(POp::Return),
    ];
    optimize(&mut code);
    assert_eq!(code.len(), 2);
    assert_eq!(code[0].int_immediate(), Some(9));
}

#[test]
fn store_then_load_of_same_slot_becomes_dup() {
    let mut code = vec![
        PInstr::const_int(5),
        PInstr::with_operand(POp::Store, 2),
        PInstr::with_operand(POp::Load, 2),
        PInstr::new(POp::Return),
    ];
    optimize(&mut code);
    assert_eq!(code[1].op, POp::Store);
    assert_eq!(code[2].op, POp::Dup);
}

#[test]
fn constant_store_propagates_to_later_load() {
    let mut code = vec![
        PInstr::const_int(7),
        PInstr::with_operand(POp::Store, 0),
        PInstr::new(POp::Drop),
        PInstr::with_operand(POp::Load, 0),
        PInstr::new(POp::Return),
    ];
    optimize(&mut code);
    assert_eq!(code[3].op, POp::LoadConst);
    assert_eq!(code[3].int_immediate(), Some(7));
}

#[test]
fn non_constant_store_invalidates_tracked_slot() {
    let mut code = vec![
        PInstr::const_int(7),
        PInstr::with_operand(POp::Store, 0),
        PInstr::new(POp::Drop),
        PInstr::with_operand(POp::Load, 9), // unknown value
        PInstr::with_operand(POp::Store, 0),
        PInstr::new(POp::Drop),
        PInstr::with_operand(POp::Load, 0),
        PInstr::new(POp::Return),
    ];
    optimize(&mut code);
    assert_eq!(code[6].op, POp::Load, "slot 0 was overwritten; no propagation");
}

#[test]
fn unreachable_instructions_are_dropped_and_targets_reindexed() {
    let mut code = vec![
        PInstr::const_int(1),
        PInstr::with_operand(POp::Jump, 3),
        PInstr::const_int(99), // unreachable
        PInstr::new(POp::Return),
    ];
    optimize(&mut code);
    assert_eq!(code.len(), 3);
    assert_eq!(code[1].op, POp::Jump);
    assert_eq!(code[1].operands, [2]);
    assert_eq!(code[2].op, POp::Return);
}

#[test]
fn fold_is_blocked_by_a_jump_into_the_window() {
    let mut code = vec![
        PInstr::with_operand(POp::JumpIfZero, 3),
        PInstr::const_int(2),
        PInstr::const_int(3),
        PInstr::new(POp::Add),
        PInstr::new(POp::Return),
    ];
    optimize(&mut code);
    // The add is a join point; the window must survive.
    assert!(code.iter().any(|i| i.op == POp::Add));
    assert_eq!(code.len(), 5);
}

#[test]
fn generic_arithmetic_specializes_when_types_agree() {
    let mut code = vec![
        PInstr::const_int(2),
        PInstr::const_int(3),
        PInstr::new(POp::Mul),
        PInstr::new(POp::Return),
    ];
    optimize(&mut code);
    assert_eq!(code[2].op, POp::MulI);

    let mut code = vec![
        PInstr::const_float(1.5),
        PInstr::const_float(2.5),
        PInstr::new(POp::Add),
        PInstr::new(POp::Return),
    ];
    optimize(&mut code);
    assert_eq!(code[2].op, POp::AddF);
}

#[test]
fn mixed_or_unknown_operands_stay_generic() {
    let mut code = vec![
        PInstr::const_int(2),
        PInstr::with_operand(POp::Load, 4),
        PInstr::new(POp::Sub),
        PInstr::new(POp::Return),
    ];
    optimize(&mut code);
    assert_eq!(code[2].op, POp::Sub);
}

#[test]
fn optimize_twice_is_a_fixed_point() {
    let mut code = vec![
        PInstr::const_int(2),
        PInstr::const_int(3),
        PInstr::new(POp::Add),
        PInstr::const_int(7),
        PInstr::with_operand(POp::Store, 1),
        PInstr::with_operand(POp::Load, 1),
        PInstr::with_operand(POp::Jump, 7),
        PInstr::const_int(42), // unreachable
        PInstr::new(POp::Return),
    ];
    optimize(&mut code);
    let settled = code.clone();
    assert!(!optimize(&mut code));
    assert_eq!(code, settled);
}

#[test]
fn optimize_reaches_a_fixed_point_on_random_streams() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5742_1CE5);
    for _ in 0..200 {
        let len = rng.gen_range(1..40usize);
        let mut code: Vec<PInstr> = (0..len)
            .map(|_| match rng.gen_range(0..10u32) {
                0 | 1 => PInstr::const_int(rng.gen_range(-64..64)),
                2 => PInstr::const_float(rng.gen_range(-4.0..4.0)),
                3 => PInstr::with_operand(POp::Load, rng.gen_range(0..8)),
                4 => PInstr::with_operand(POp::Store, rng.gen_range(0..8)),
                5 => PInstr::new(POp::Add),
                6 => PInstr::new(POp::Mul),
                7 => PInstr::with_operand(POp::Jump, rng.gen_range(0..len as u32)),
                8 => PInstr::with_operand(POp::JumpIfZero, rng.gen_range(0..len as u32)),
                _ => PInstr::new(POp::Drop),
            })
            .collect();
        code.push(PInstr::new(POp::Return));

        optimize(&mut code);
        let settled = code.clone();
        assert!(!optimize(&mut code), "second optimize changed the stream");
        assert_eq!(code, settled);
    }
}
