use super::ast::Node;
use super::defs::avr;
use super::phases::types::Loc;
use super::sink::{ByteSink, SinkError};
use crate::hw::{self, Address, Byte, Dword, Word};
use std::fmt::Display;
use strum_macros::{Display, EnumIter};

/*
    The architecture of the instruction representation:

        An `Entry` is one `Instruction` applied to a list of `Operand`s. The byte width of every
        entry is fixed the moment it is emitted, even if the value of one of its operands is not
        known yet (it depends on a label defined further down).

        Such operands are "deferred": `Operand::Label` and `Operand::Deferred` carry a
        `Relocation` (how the final value is computed from the symbol's address and the address
        of the instruction using it) and a `Resolution`, which starts out `Unresolved` and is set
        exactly once, by the resolution pass in `phases::resolve`. Encoding only ever reads the
        cached `Resolution`.

        `Operand::Number` needs no resolution. `Operand::Extern` names a symbol which only an
        external assembler/linker can resolve, so it can be rendered but never encoded.
*/

/// Operand values are wide enough for any relocation result, including negative displacements.
pub type OperandValue = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Unresolved,
    Resolved(T),
}

impl<T> Resolution<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn as_resolved(&self) -> Option<&T> {
        match self {
            Resolution::Unresolved => None,
            Resolution::Resolved(t) => Some(t),
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Relocation {
    /// The target address itself.
    Absolute,
    /// The target as a program-memory word address (AVR `jmp`/`call`).
    AbsoluteWord,
    /// Byte displacement from the referencing instruction.
    Relative,
    /// Word displacement from the instruction after the referencing one (AVR `rjmp`/`br*`).
    RelativeWord,
    HighByte,
    LowByte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocError {
    Misaligned(OperandValue),
}

impl Display for RelocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelocError::Misaligned(v) => write!(f, "Word relocation of odd byte offset {}", v),
        }
    }
}

impl Relocation {
    pub fn apply(
        self,
        current: Address,
        target: OperandValue,
    ) -> Result<OperandValue, RelocError> {
        let current = OperandValue::from(current);
        match self {
            Relocation::Absolute => Ok(target),
            Relocation::AbsoluteWord if target % 2 != 0 => Err(RelocError::Misaligned(target)),
            Relocation::AbsoluteWord => Ok(target / 2),
            Relocation::Relative => Ok(target - current),
            Relocation::RelativeWord if (target - current) % 2 != 0 => {
                Err(RelocError::Misaligned(target - current))
            }
            Relocation::RelativeWord => Ok((target - current) / 2 - 1),
            Relocation::HighByte => Ok(OperandValue::from(hw::hi_byte(target as Word))),
            Relocation::LowByte => Ok(OperandValue::from(hw::lo_byte(target as Word))),
        }
    }
}

/// The symbol a label operand was bound to, and the relocated value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub symbol: String,
    pub value: OperandValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRef {
    pub name: String,
    // The scope-qualified name, which is tried before `name`.
    pub local_name: String,
    pub relocation: Relocation,
    resolved: Resolution<Bound>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredValue {
    pub node: Node,
    pub relocation: Relocation,
    resolved: Resolution<OperandValue>,
}

impl LabelRef {
    pub fn resolved(&self) -> &Resolution<Bound> {
        &self.resolved
    }

    pub(crate) fn bind(&mut self, bound: Bound) {
        debug_assert!(!self.resolved.is_resolved());
        self.resolved = Resolution::Resolved(bound);
    }
}

impl DeferredValue {
    pub fn resolved(&self) -> &Resolution<OperandValue> {
        &self.resolved
    }

    pub(crate) fn bind(&mut self, value: OperandValue) {
        debug_assert!(!self.resolved.is_resolved());
        self.resolved = Resolution::Resolved(value);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Number(OperandValue),
    Label(LabelRef),
    Deferred(DeferredValue),
    Extern(String),
}

impl Operand {
    pub fn label(name: &str, relocation: Relocation) -> Self {
        Operand::local_label(name, name, relocation)
    }

    pub fn local_label(name: &str, local_name: &str, relocation: Relocation) -> Self {
        Operand::Label(LabelRef {
            name: name.to_owned(),
            local_name: local_name.to_owned(),
            relocation,
            resolved: Resolution::Unresolved,
        })
    }

    pub fn deferred(node: Node, relocation: Relocation) -> Self {
        Operand::Deferred(DeferredValue {
            node,
            relocation,
            resolved: Resolution::Unresolved,
        })
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            Operand::Number(_) | Operand::Extern(_) => true,
            Operand::Label(label) => label.resolved.is_resolved(),
            Operand::Deferred(deferred) => deferred.resolved.is_resolved(),
        }
    }

    pub fn value(&self) -> Result<OperandValue, EncodeError> {
        match self {
            Operand::Number(v) => Ok(*v),
            Operand::Label(label) => label
                .resolved
                .as_resolved()
                .map(|bound| bound.value)
                .ok_or_else(|| EncodeError::Unresolved(self.to_string())),
            Operand::Deferred(deferred) => deferred
                .resolved
                .as_resolved()
                .copied()
                .ok_or_else(|| EncodeError::Unresolved(self.to_string())),
            Operand::Extern(name) => Err(EncodeError::NotNumeric(name.clone())),
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Number(v) => write!(f, "{}", v),
            Operand::Label(label) => match &label.resolved {
                Resolution::Resolved(bound) => write!(f, "{}", bound.symbol),
                Resolution::Unresolved if label.name == label.local_name => {
                    write!(f, "{}", label.name)
                }
                Resolution::Unresolved => write!(f, "{} ({})", label.name, label.local_name),
            },
            Operand::Deferred(deferred) => match &deferred.resolved {
                Resolution::Resolved(v) => write!(f, "{}", v),
                Resolution::Unresolved => write!(f, "{}", deferred.node.as_value()),
            },
            Operand::Extern(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    OperandCount { expected: usize, found: usize },
    OutOfRange {
        value: OperandValue,
        min: OperandValue,
        max: OperandValue,
    },
    Unresolved(String),
    NotNumeric(String),
    Sink(SinkError),
}

impl From<SinkError> for EncodeError {
    fn from(err: SinkError) -> Self {
        EncodeError::Sink(err)
    }
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::OperandCount { expected, found } => write!(
                f,
                "Wrong number of operands: expected {}, found {}",
                expected, found
            ),
            EncodeError::OutOfRange { value, min, max } => {
                write!(f, "Operand out of range ({} <= x <= {}): {}", min, max, value)
            }
            EncodeError::Unresolved(what) => write!(f, "Operand unresolved: {}", what),
            EncodeError::NotNumeric(what) => write!(f, "Number expected: {}", what),
            EncodeError::Sink(err) => write!(f, "{}", err),
        }
    }
}

pub(crate) fn check_range(
    value: OperandValue,
    min: OperandValue,
    max: OperandValue,
) -> Result<OperandValue, EncodeError> {
    if value < min || value > max {
        Err(EncodeError::OutOfRange { value, min, max })
    } else {
        Ok(value)
    }
}

pub(crate) fn check_count(operands: &[Operand], expected: usize) -> Result<(), EncodeError> {
    if operands.len() != expected {
        Err(EncodeError::OperandCount {
            expected,
            found: operands.len(),
        })
    } else {
        Ok(())
    }
}

/// Raw data accepts both the signed and the unsigned reading of its width.
fn data_range(bytes: usize) -> (OperandValue, OperandValue) {
    let bits = 8 * bytes as u32;
    (-(1 << (bits - 1)), (1 << bits) - 1)
}

fn encode_data<S: ByteSink + ?Sized>(
    sink: &mut S,
    bytes: usize,
    value: OperandValue,
) -> Result<(), EncodeError> {
    let (min, max) = data_range(bytes);
    let value = check_range(value, min, max)?;
    match bytes {
        1 => sink.add_byte(value as Byte)?,
        2 => sink.add_word(value as Word)?,
        _ => sink.add_dword(value as Dword)?,
    }
    Ok(())
}

fn data_directive(bytes: usize) -> &'static str {
    match bytes {
        1 => ".db",
        2 => ".dw",
        _ => ".dd",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    RawByte(OperandValue),
    RawWord(OperandValue),
    RawDword(OperandValue),
    // The value is the single (deferred) operand.
    DeferredByte,
    DeferredWord,
    DeferredDword,
    Avr(avr::Op),
}

impl Instruction {
    pub fn size(&self, operands: &[Operand]) -> usize {
        match self {
            Instruction::RawByte(_) | Instruction::DeferredByte => 1,
            Instruction::RawWord(_) | Instruction::DeferredWord => 2,
            Instruction::RawDword(_) | Instruction::DeferredDword => 4,
            Instruction::Avr(op) => op.size(operands),
        }
    }

    pub fn encode<S: ByteSink + ?Sized>(
        &self,
        sink: &mut S,
        operands: &[Operand],
    ) -> Result<(), EncodeError> {
        match self {
            Instruction::RawByte(v) | Instruction::RawWord(v) | Instruction::RawDword(v) => {
                check_count(operands, 0)?;
                encode_data(sink, self.size(operands), *v)
            }
            Instruction::DeferredByte
            | Instruction::DeferredWord
            | Instruction::DeferredDword => {
                check_count(operands, 1)?;
                encode_data(sink, self.size(operands), operands[0].value()?)
            }
            Instruction::Avr(op) => op.encode(sink, operands),
        }
    }

    pub fn render(&self, operands: &[Operand]) -> String {
        match self {
            Instruction::RawByte(v) | Instruction::RawWord(v) | Instruction::RawDword(v) => {
                format!("{} {}", data_directive(self.size(operands)), v)
            }
            Instruction::DeferredByte
            | Instruction::DeferredWord
            | Instruction::DeferredDword => match operands.first() {
                Some(operand) => format!("{} {}", data_directive(self.size(operands)), operand),
                None => data_directive(self.size(operands)).to_owned(),
            },
            Instruction::Avr(op) => op.render(operands),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    instruction: Instruction,
    operands: Vec<Operand>,
    loc: Loc,
}

// Where an entry came from does not make it a different entry.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.instruction == other.instruction && self.operands == other.operands
    }
}

impl Eq for Entry {}

impl Entry {
    pub fn new(loc: Loc, instruction: Instruction, operands: Vec<Operand>) -> Self {
        Entry {
            instruction,
            operands,
            loc,
        }
    }

    pub fn instruction(&self) -> Instruction {
        self.instruction
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn loc(&self) -> Loc {
        self.loc
    }

    pub fn size(&self) -> usize {
        self.instruction.size(&self.operands)
    }

    pub fn render(&self) -> String {
        self.instruction.render(&self.operands)
    }

    pub(crate) fn operands_mut(&mut self) -> &mut [Operand] {
        &mut self.operands
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::ast::{binary, ident, num, BinaryOp};
    use crate::hw::Endian;
    use strum::IntoEnumIterator;

    /// Collects bytes in order, ignoring positioning.
    #[derive(Default)]
    pub(crate) struct Collect {
        pub endian: Endian,
        pub bytes: Vec<Byte>,
    }

    impl ByteSink for Collect {
        fn goto_address(&mut self, _: Address) -> Result<(), SinkError> {
            Ok(())
        }

        fn add_byte(&mut self, v: Byte) -> Result<(), SinkError> {
            self.bytes.push(v);
            Ok(())
        }

        fn add_word(&mut self, v: Word) -> Result<(), SinkError> {
            self.bytes.extend_from_slice(&self.endian.word_bytes(v));
            Ok(())
        }

        fn add_dword(&mut self, v: Dword) -> Result<(), SinkError> {
            self.bytes.extend_from_slice(&self.endian.dword_bytes(v));
            Ok(())
        }
    }

    fn encode(inst: Instruction, operands: &[Operand]) -> Result<Vec<Byte>, EncodeError> {
        let mut sink = Collect {
            endian: Endian::Big,
            ..Collect::default()
        };
        inst.encode(&mut sink, operands)?;
        Ok(sink.bytes)
    }

    #[test]
    fn relocations() {
        assert_eq!(Relocation::Absolute.apply(0x10, 0x1234), Ok(0x1234));
        assert_eq!(Relocation::AbsoluteWord.apply(0x10, 0x1234), Ok(0x91A));
        assert_eq!(Relocation::Relative.apply(0x10, 0x08), Ok(-8));
        assert_eq!(Relocation::RelativeWord.apply(0x10, 0x10), Ok(-1));
        assert_eq!(Relocation::RelativeWord.apply(0x10, 0x20), Ok(7));
        assert_eq!(Relocation::HighByte.apply(0, 0x1234), Ok(0x12));
        assert_eq!(Relocation::LowByte.apply(0, 0x1234), Ok(0x34));
    }

    #[test]
    fn word_relocations_reject_odd_offsets() {
        assert_eq!(
            Relocation::AbsoluteWord.apply(0, 0x101),
            Err(RelocError::Misaligned(0x101))
        );
        assert_eq!(
            Relocation::RelativeWord.apply(0x10, 0x13),
            Err(RelocError::Misaligned(3))
        );
    }

    #[test]
    fn relocations_are_pure() {
        for reloc in Relocation::iter() {
            assert_eq!(reloc.apply(0x40, 0x80), reloc.apply(0x40, 0x80));
        }
    }

    #[test]
    fn raw_data_encodes_big_endian_in_order() {
        assert_eq!(encode(Instruction::RawByte(0x12), &[]), Ok(vec![0x12]));
        assert_eq!(encode(Instruction::RawWord(0xABCD), &[]), Ok(vec![0xAB, 0xCD]));
        assert_eq!(
            encode(Instruction::RawDword(0x5678_9ABC), &[]),
            Ok(vec![0x56, 0x78, 0x9A, 0xBC])
        );
        assert_eq!(encode(Instruction::RawByte(-1), &[]), Ok(vec![0xFF]));
    }

    #[test]
    fn raw_data_out_of_range() {
        assert_eq!(
            encode(Instruction::RawByte(256), &[]),
            Err(EncodeError::OutOfRange {
                value: 256,
                min: -128,
                max: 255
            })
        );
        assert!(encode(Instruction::RawWord(-32769), &[]).is_err());
        assert!(encode(Instruction::RawDword(0xFFFF_FFFF), &[]).is_ok());
    }

    #[test]
    fn deferred_data_needs_resolution() {
        let node = binary(BinaryOp::Div, ident("tbl"), num(2));
        let op = Operand::deferred(node, Relocation::Absolute);
        assert_eq!(
            encode(Instruction::DeferredWord, &[op.clone()]),
            Err(EncodeError::Unresolved("tbl / 2".to_owned()))
        );

        let mut op = op;
        if let Operand::Deferred(deferred) = &mut op {
            deferred.bind(0x80);
        }
        assert_eq!(encode(Instruction::DeferredWord, &[op.clone()]), Ok(vec![0x00, 0x80]));
        assert_eq!(Instruction::DeferredWord.render(&[op]), ".dw 128");
    }

    #[test]
    fn externs_render_but_never_encode() {
        let op = Operand::Extern("_printf".to_owned());
        assert_eq!(Instruction::DeferredWord.render(&[op.clone()]), ".dw _printf");
        assert_eq!(
            encode(Instruction::DeferredWord, &[op]),
            Err(EncodeError::NotNumeric("_printf".to_owned()))
        );
    }

    #[test]
    fn label_display() {
        let mut op = Operand::local_label("loop", "main@loop", Relocation::RelativeWord);
        assert_eq!(op.to_string(), "loop (main@loop)");
        if let Operand::Label(label) = &mut op {
            label.bind(Bound {
                symbol: "main@loop".to_owned(),
                value: -3,
            });
        }
        assert_eq!(op.to_string(), "main@loop");
        assert_eq!(op.value(), Ok(-3));
    }

    #[test]
    fn entry_equality_ignores_location() {
        let a = Entry::new(Loc::new(1, 1), Instruction::RawByte(1), vec![]);
        let b = Entry::new(Loc::new(9, 9), Instruction::RawByte(1), vec![]);
        let c = Entry::new(Loc::new(1, 1), Instruction::RawByte(2), vec![]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
