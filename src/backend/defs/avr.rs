use crate::backend::model::{check_count, check_range, EncodeError, Operand, OperandValue};
use crate::backend::sink::ByteSink;
use crate::hw::Word;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

static STORAGE: Lazy<HashMap<String, Op>> = Lazy::new(|| {
    Op::iter()
        .map(|op| (sanitize_name(&op.to_string()), op))
        .collect()
});

fn sanitize_name(name: &str) -> String {
    name.to_lowercase()
}

/// Operand layouts, named after the AVR instruction set manual's encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Implied,
    // k in -64..=63 words, `.... ..kk kkkk k...`
    Branch,
    // k in -2048..=2047 words, `.... kkkk kkkk kkkk`
    RelativeJump,
    // 22-bit word address, split over two words
    AbsoluteJump,
    // Rd in r16..=r31, `.... KKKK dddd KKKK`
    RegImm,
    // `.... ..rd dddd rrrr`
    RegReg,
    // `.... ...d dddd ....`
    Reg,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Op {
    Nop,
    Ret,
    Reti,
    Sei,
    Cli,
    Sleep,
    Wdr,
    Ijmp,
    Icall,

    Breq,
    Brne,
    Brcs,
    Brcc,
    Brsh,
    Brlo,
    Brmi,
    Brpl,
    Brge,
    Brlt,

    Rjmp,
    Rcall,
    Jmp,
    Call,

    Ldi,
    Cpi,
    Subi,
    Ori,
    Andi,

    Mov,
    Add,
    Adc,
    Sub,
    Cp,
    Cpc,
    And,
    Or,
    Eor,

    Push,
    Pop,
    Inc,
    Dec,
}

const REG_MAX: OperandValue = 31;
const HIGH_REG_MIN: OperandValue = 16;

impl Op {
    pub fn lookup(mnemonic: &str) -> Option<Op> {
        STORAGE.get(&sanitize_name(mnemonic)).copied()
    }

    fn opcode(self) -> Word {
        match self {
            Op::Nop => 0x0000,
            Op::Ret => 0x9508,
            Op::Reti => 0x9518,
            Op::Sei => 0x9478,
            Op::Cli => 0x94f8,
            Op::Sleep => 0x9588,
            Op::Wdr => 0x95a8,
            Op::Ijmp => 0x9409,
            Op::Icall => 0x9509,

            Op::Breq => 0xf001,
            Op::Brne => 0xf401,
            Op::Brcs | Op::Brlo => 0xf000,
            Op::Brcc | Op::Brsh => 0xf400,
            Op::Brmi => 0xf002,
            Op::Brpl => 0xf402,
            Op::Brge => 0xf404,
            Op::Brlt => 0xf004,

            Op::Rjmp => 0xc000,
            Op::Rcall => 0xd000,
            Op::Jmp => 0x940c,
            Op::Call => 0x940e,

            Op::Ldi => 0xe000,
            Op::Cpi => 0x3000,
            Op::Subi => 0x5000,
            Op::Ori => 0x6000,
            Op::Andi => 0x7000,

            Op::Mov => 0x2c00,
            Op::Add => 0x0c00,
            Op::Adc => 0x1c00,
            Op::Sub => 0x1800,
            Op::Cp => 0x1400,
            Op::Cpc => 0x0400,
            Op::And => 0x2000,
            Op::Or => 0x2800,
            Op::Eor => 0x2400,

            Op::Push => 0x920f,
            Op::Pop => 0x900f,
            Op::Inc => 0x9403,
            Op::Dec => 0x940a,
        }
    }

    fn form(self) -> Form {
        match self {
            Op::Nop
            | Op::Ret
            | Op::Reti
            | Op::Sei
            | Op::Cli
            | Op::Sleep
            | Op::Wdr
            | Op::Ijmp
            | Op::Icall => Form::Implied,
            Op::Breq
            | Op::Brne
            | Op::Brcs
            | Op::Brcc
            | Op::Brsh
            | Op::Brlo
            | Op::Brmi
            | Op::Brpl
            | Op::Brge
            | Op::Brlt => Form::Branch,
            Op::Rjmp | Op::Rcall => Form::RelativeJump,
            Op::Jmp | Op::Call => Form::AbsoluteJump,
            Op::Ldi | Op::Cpi | Op::Subi | Op::Ori | Op::Andi => Form::RegImm,
            Op::Mov
            | Op::Add
            | Op::Adc
            | Op::Sub
            | Op::Cp
            | Op::Cpc
            | Op::And
            | Op::Or
            | Op::Eor => Form::RegReg,
            Op::Push | Op::Pop | Op::Inc | Op::Dec => Form::Reg,
        }
    }

    fn arity(self) -> usize {
        match self.form() {
            Form::Implied => 0,
            Form::Branch | Form::RelativeJump | Form::AbsoluteJump | Form::Reg => 1,
            Form::RegImm | Form::RegReg => 2,
        }
    }

    /// The branch with the opposite condition, if there is one.
    pub fn inverse(self) -> Option<Op> {
        Some(match self {
            Op::Breq => Op::Brne,
            Op::Brne => Op::Breq,
            Op::Brcs => Op::Brcc,
            Op::Brcc => Op::Brcs,
            Op::Brsh => Op::Brlo,
            Op::Brlo => Op::Brsh,
            Op::Brmi => Op::Brpl,
            Op::Brpl => Op::Brmi,
            Op::Brge => Op::Brlt,
            Op::Brlt => Op::Brge,
            _ => return None,
        })
    }

    pub fn size(self, _operands: &[Operand]) -> usize {
        match self.form() {
            Form::AbsoluteJump => 4,
            _ => 2,
        }
    }

    pub fn encode<S: ByteSink + ?Sized>(
        self,
        sink: &mut S,
        operands: &[Operand],
    ) -> Result<(), EncodeError> {
        check_count(operands, self.arity())?;
        let code = self.opcode();

        let word = match self.form() {
            Form::Implied => code,
            Form::Branch => {
                let k = check_range(operands[0].value()?, -64, 63)?;
                code | (((k & 0x7f) << 3) as Word)
            }
            Form::RelativeJump => {
                let k = check_range(operands[0].value()?, -2048, 2047)?;
                code | ((k & 0xfff) as Word)
            }
            Form::AbsoluteJump => {
                let k = check_range(operands[0].value()?, 0, (1 << 22) - 1)?;
                let hi = (k >> 16) & 0xffff;
                let rd = ((hi << 3) & 0x1f0) | (hi & 0x1);
                sink.add_word(code | (rd as Word))?;
                sink.add_word((k & 0xffff) as Word)?;
                return Ok(());
            }
            Form::RegImm => {
                let rd = check_range(operands[0].value()?, HIGH_REG_MIN, REG_MAX)? - HIGH_REG_MIN;
                let k = check_range(operands[1].value()?, -128, 255)? & 0xff;
                code | ((rd << 4) | ((k & 0xf0) << 4) | (k & 0x0f)) as Word
            }
            Form::RegReg => {
                let rd = check_range(operands[0].value()?, 0, REG_MAX)?;
                let rr = check_range(operands[1].value()?, 0, REG_MAX)?;
                code | ((rd << 4) | ((rr & 0x10) << 5) | (rr & 0x0f)) as Word
            }
            Form::Reg => {
                let rd = check_range(operands[0].value()?, 0, REG_MAX)?;
                code | (rd << 4) as Word
            }
        };

        sink.add_word(word)?;
        Ok(())
    }

    pub fn render(self, operands: &[Operand]) -> String {
        let reg = |operand: &Operand| match operand {
            Operand::Number(n) => format!("r{}", n),
            other => other.to_string(),
        };

        let args: Vec<String> = match self.form() {
            Form::Implied => vec![],
            Form::Branch | Form::RelativeJump | Form::AbsoluteJump => {
                operands.iter().map(ToString::to_string).collect()
            }
            Form::RegImm => operands
                .iter()
                .enumerate()
                .map(|(i, op)| if i == 0 { reg(op) } else { op.to_string() })
                .collect(),
            Form::RegReg | Form::Reg => operands.iter().map(reg).collect(),
        };

        if args.is_empty() {
            self.to_string()
        } else {
            format!("{}\t{}", self, args.join(", "))
        }
    }
}
