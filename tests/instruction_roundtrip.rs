use proptest::prelude::*;
use t3vm::instruction::{Instruction, Opcode, INSTRUCTION_TRITS};

const OPCODES: [Opcode; 37] = [
    Opcode::Load, Opcode::Store, Opcode::Move, Opcode::Loadi, Opcode::Push, Opcode::Pop,
    Opcode::Add, Opcode::Sub, Opcode::Mul, Opcode::Div, Opcode::Neg, Opcode::Abs,
    Opcode::Nand, Opcode::Cons, Opcode::Any, Opcode::Not,
    Opcode::Cmp, Opcode::Test,
    Opcode::Jmp, Opcode::Jz, Opcode::Jn, Opcode::Jp, Opcode::Call, Opcode::Ret, Opcode::Calli,
    Opcode::Tshl, Opcode::Tshr, Opcode::Rotl, Opcode::Rotr,
    Opcode::Syscall, Opcode::Halt, Opcode::Nop, Opcode::Break,
    Opcode::Print, Opcode::Input, Opcode::Printi, Opcode::Prints,
];

#[test]
fn every_opcode_round_trips_through_encode_decode() {
    for &opcode in OPCODES.iter() {
        let instr = Instruction::new(opcode, 1, 2, 3, 100);
        let word = instr.encode().unwrap();
        assert_eq!(word.len(), INSTRUCTION_TRITS);
        let back = Instruction::decode(&word).unwrap();
        assert_eq!(instr, back);
    }
}

proptest! {
    #[test]
    fn arbitrary_valid_operands_round_trip(
        opcode_idx in 0usize..37,
        reg1 in 0usize..=10,
        reg2 in 0usize..=10,
        reg3 in 0usize..=10,
        immediate in -((3i64.pow(14) - 1) / 2)..=((3i64.pow(14) - 1) / 2),
    ) {
        let opcode = OPCODES[opcode_idx];
        let instr = Instruction::new(opcode, reg1, reg2, reg3, immediate);
        let word = instr.encode().unwrap();
        let back = Instruction::decode(&word).unwrap();
        prop_assert_eq!(instr, back);
    }
}

#[test]
fn decode_rejects_wrong_width() {
    use t3vm::trit::TritWord;
    let short = TritWord::zero(10);
    assert!(Instruction::decode(&short).is_err());
}
