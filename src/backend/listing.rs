use super::phases::resolve::SymbolTable;
use super::stream::InstructionStream;
use crate::hw::Address;
use std::collections::BTreeMap;
use std::io::Write;

/// Renders `stream` as assembler source, with each label on its own line ahead of the entry
/// it names.
pub fn write_listing<W: Write + ?Sized>(
    stream: &InstructionStream,
    symbols: &SymbolTable,
    out: &mut W,
) -> std::io::Result<()> {
    let mut labels: BTreeMap<Address, Vec<&str>> = BTreeMap::new();
    for symbol in symbols.by_address() {
        labels.entry(symbol.address).or_default().push(&symbol.name);
    }

    let mut put_labels = |out: &mut W, addr: Address| -> std::io::Result<()> {
        for name in labels.remove(&addr).unwrap_or_default() {
            writeln!(out, "{}:", name)?;
        }
        Ok(())
    };

    for block in stream.blocks() {
        writeln!(out, ".org {}", block.origin())?;

        for (addr, entry) in block.addressed() {
            put_labels(out, addr)?;
            writeln!(out, "\t{}", entry.render())?;
        }

        put_labels(out, block.origin() + block.byte_len() as Address)?;
    }

    // Labels under an empty origin, or between blocks.
    for (addr, names) in labels {
        writeln!(out, ".org {}", addr)?;
        for name in names {
            writeln!(out, "{}:", name)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::defs::avr::Op;
    use crate::backend::model::{Instruction, Operand, Relocation};
    use crate::backend::phases::types::Loc;

    #[test]
    fn labels_precede_their_entries() {
        let here = Loc::new(1, 1);
        let mut stream = InstructionStream::new();
        let mut symbols = SymbolTable::new();

        stream.set_origin(0);
        stream.emit(
            here,
            Instruction::Avr(Op::Rjmp),
            vec![Operand::label("main", Relocation::RelativeWord)],
        );
        stream.set_origin(0x20);
        symbols.define("main", stream.offset(), None).unwrap();
        stream.emit(
            here,
            Instruction::Avr(Op::Ldi),
            vec![Operand::Number(16), Operand::Number(255)],
        );
        stream.emit(here, Instruction::RawByte(7), vec![]);
        symbols.define("end", stream.offset(), None).unwrap();

        let mut out = Vec::new();
        write_listing(&stream, &symbols, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            ".org 0\n\trjmp\tmain\n.org 32\nmain:\n\tldi\tr16, 255\n\t.db 7\nend:\n"
        );
    }

    #[test]
    fn labels_outside_every_block_keep_their_origin() {
        let here = Loc::new(1, 1);
        let mut stream = InstructionStream::new();
        let mut symbols = SymbolTable::new();

        stream.set_origin(0x40);
        symbols.define("isr", stream.offset(), None).unwrap();
        stream.set_origin(0);
        stream.emit(
            here,
            Instruction::Avr(Op::Jmp),
            vec![Operand::label("isr", Relocation::AbsoluteWord)],
        );
        symbols.define("vectors_end", 0x10, None).unwrap();

        let mut out = Vec::new();
        write_listing(&stream, &symbols, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            ".org 0\n\tjmp\tisr\n.org 16\nvectors_end:\n.org 64\nisr:\n"
        );
    }
}
