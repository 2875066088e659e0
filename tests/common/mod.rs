use ratc::backend::config::OutputConfig;
use ratc::backend::defs::avr::Op;
use ratc::backend::model::{Instruction, Operand, Relocation};
use ratc::backend::phases::types::Loc;
use ratc::backend::{Generator, Program};

pub fn at(line: usize) -> Loc {
    Loc::new(line, 1)
}

pub fn reg(n: i64) -> Operand {
    Operand::Number(n)
}

pub fn imm(n: i64) -> Operand {
    Operand::Number(n)
}

pub fn rel(label: &str) -> Operand {
    Operand::label(label, Relocation::RelativeWord)
}

pub fn avr(gen: &mut Generator, line: usize, op: Op, operands: Vec<Operand>) {
    gen.emit(at(line), Instruction::Avr(op), operands);
}

pub fn hex_of(program: &Program, config: &OutputConfig) -> String {
    let mut out = Vec::new();
    program.write_hex(config, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}
