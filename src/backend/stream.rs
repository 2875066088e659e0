use super::model::{EncodeError, Entry, Instruction, Operand};
use super::phases::types::{Loc, Located};
use super::sink::ByteSink;
use crate::hw::Address;
use crate::image::BinaryImage;

/// A run of entries laid out contiguously from `origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    origin: Address,
    entries: Vec<Entry>,
    byte_len: usize,
}

impl Block {
    fn new(origin: Address) -> Self {
        Block {
            origin,
            entries: Vec::new(),
            byte_len: 0,
        }
    }

    pub fn origin(&self) -> Address {
        self.origin
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Each entry together with the address it is laid out at.
    pub fn addressed(&self) -> impl Iterator<Item = (Address, &Entry)> {
        self.entries.iter().scan(self.origin, |addr, entry| {
            let here = *addr;
            *addr += entry.size() as Address;
            Some((here, entry))
        })
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }
}

/// Emitted code and data, kept in emission order. Origins need not be increasing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructionStream {
    blocks: Vec<Block>,
    offset: Address,
}

impl InstructionStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_origin(&mut self, addr: Address) {
        // An origin with nothing emitted under it leaves no trace.
        if self.blocks.last().map_or(false, Block::is_empty) {
            self.blocks.pop();
        }

        self.blocks.push(Block::new(addr));
        self.offset = addr;
    }

    /// Appends an entry at the running offset and returns its address.
    pub fn emit(&mut self, loc: Loc, instruction: Instruction, operands: Vec<Operand>) -> Address {
        if self.blocks.is_empty() {
            self.blocks.push(Block::new(self.offset));
        }

        let addr = self.offset;
        let entry = Entry::new(loc, instruction, operands);
        let size = entry.size();

        if let Some(block) = self.blocks.last_mut() {
            block.entries.push(entry);
            block.byte_len += size;
        }
        self.offset += size as Address;

        addr
    }

    pub fn offset(&self) -> Address {
        self.offset
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(Block::is_empty)
    }

    fn laid_out(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|block| !block.is_empty())
    }

    /// Reserves the footprint of every block, so the image can size its pages.
    pub fn reserve(&self, image: &mut BinaryImage) {
        for block in self.laid_out() {
            image.goto_address(block.origin);
            image.reserve(block.byte_len);
        }
    }

    pub fn compile<S: ByteSink + ?Sized>(
        &self,
        sink: &mut S,
    ) -> Result<(), Located<EncodeError>> {
        for block in self.laid_out() {
            sink.goto_address(block.origin)
                .map_err(|err| Located::from(EncodeError::from(err)))?;

            for entry in &block.entries {
                entry
                    .instruction()
                    .encode(sink, entry.operands())
                    .map_err(|err| Located::with_loc(entry.loc(), err))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::defs::avr::Op;
    use crate::backend::model::tests::Collect;
    use crate::backend::model::Relocation;
    use crate::hw::Endian;

    fn here() -> Loc {
        Loc::new(1, 1)
    }

    #[test]
    fn emission_tracks_offsets() {
        let mut stream = InstructionStream::new();
        assert_eq!(stream.emit(here(), Instruction::RawByte(1), vec![]), 0);
        assert_eq!(stream.emit(here(), Instruction::RawWord(2), vec![]), 1);
        assert_eq!(stream.offset(), 3);

        stream.set_origin(0x100);
        assert_eq!(stream.emit(here(), Instruction::Avr(Op::Jmp), vec![Operand::Number(0)]), 0x100);
        assert_eq!(stream.offset(), 0x104);

        let lens: Vec<_> = stream.blocks().iter().map(|b| (b.origin(), b.byte_len())).collect();
        assert_eq!(lens, vec![(0, 3), (0x100, 4)]);
    }

    #[test]
    fn origins_keep_emission_order() {
        let mut stream = InstructionStream::new();
        stream.set_origin(0x40);
        stream.emit(here(), Instruction::RawByte(1), vec![]);
        stream.set_origin(0x10);
        stream.emit(here(), Instruction::RawByte(2), vec![]);

        let origins: Vec<_> = stream.blocks().iter().map(Block::origin).collect();
        assert_eq!(origins, vec![0x40, 0x10]);
    }

    #[test]
    fn empty_origins_are_dropped() {
        let mut stream = InstructionStream::new();
        stream.set_origin(0x40);
        stream.set_origin(0x80);
        stream.emit(here(), Instruction::RawByte(1), vec![]);
        assert_eq!(stream.blocks().len(), 1);
        assert_eq!(stream.blocks()[0].origin(), 0x80);
    }

    #[test]
    fn addressed_entries() {
        let mut stream = InstructionStream::new();
        stream.set_origin(0x10);
        stream.emit(here(), Instruction::RawWord(1), vec![]);
        stream.emit(here(), Instruction::RawByte(2), vec![]);
        stream.emit(here(), Instruction::RawDword(3), vec![]);
        let addrs: Vec<_> = stream.blocks()[0].addressed().map(|(a, _)| a).collect();
        assert_eq!(addrs, vec![0x10, 0x12, 0x13]);
    }

    #[test]
    fn compile_stops_at_first_failure_with_its_loc() {
        let mut stream = InstructionStream::new();
        stream.emit(here(), Instruction::RawByte(7), vec![]);
        stream.emit(
            Loc::new(5, 3),
            Instruction::Avr(Op::Rjmp),
            vec![Operand::label("nowhere", Relocation::RelativeWord)],
        );
        stream.emit(here(), Instruction::RawByte(8), vec![]);

        let mut sink = Collect {
            endian: Endian::Little,
            ..Collect::default()
        };
        let err = stream.compile(&mut sink).unwrap_err();
        assert_eq!(err.loc(), Some(Loc::new(5, 3)));
        assert_eq!(err.value(), EncodeError::Unresolved("nowhere".to_owned()));
        assert_eq!(sink.bytes, vec![7]);
    }
}
