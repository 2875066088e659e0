use super::ast::Node;
use super::config::{OutputConfig, OutputFormat};
use super::listing;
use super::model::{Instruction, Operand, OperandValue, Relocation};
use super::phases::decompose::{self, Jump, LabelScope, Step};
use super::phases::fold;
use super::phases::resolve::{self, SizeCheck, SymbolTable};
use super::phases::types::{Error, Loc};
use super::stream::InstructionStream;
use crate::hw::Address;
use crate::image::BinaryImage;
use std::io::Write;

/// Collects the output of code generation: origins, labels, entries, and size checks.
#[derive(Debug, Default)]
pub struct Generator {
    stream: InstructionStream,
    symbols: SymbolTable,
    checks: Vec<SizeCheck>,
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn org(&mut self, addr: Address) {
        self.stream.set_origin(addr);
    }

    pub fn offset(&self) -> Address {
        self.stream.offset()
    }

    /// Defines `name` at the current offset.
    pub fn label(&mut self, name: &str, loc: Loc) -> Result<(), Error> {
        Ok(self.symbols.define(name, self.stream.offset(), Some(loc))?)
    }

    pub fn emit(&mut self, loc: Loc, instruction: Instruction, operands: Vec<Operand>) -> Address {
        self.stream.emit(loc, instruction, operands)
    }

    pub fn add_byte(&mut self, loc: Loc, v: OperandValue) -> Address {
        self.emit(loc, Instruction::RawByte(v), vec![])
    }

    pub fn add_word(&mut self, loc: Loc, v: OperandValue) -> Address {
        self.emit(loc, Instruction::RawWord(v), vec![])
    }

    pub fn add_dword(&mut self, loc: Loc, v: OperandValue) -> Address {
        self.emit(loc, Instruction::RawDword(v), vec![])
    }

    // Constant expressions are emitted as raw data straight away.
    fn add_deferred(
        &mut self,
        loc: Loc,
        node: Node,
        raw: fn(OperandValue) -> Instruction,
        deferred: Instruction,
    ) -> Result<Address, Error> {
        Ok(match fold::try_fold(&node)? {
            Some(v) => self.emit(loc, raw(OperandValue::from(v)), vec![]),
            None => self.emit(loc, deferred, vec![Operand::deferred(node, Relocation::Absolute)]),
        })
    }

    pub fn add_deferred_byte(&mut self, loc: Loc, node: Node) -> Result<Address, Error> {
        self.add_deferred(loc, node, Instruction::RawByte, Instruction::DeferredByte)
    }

    pub fn add_deferred_word(&mut self, loc: Loc, node: Node) -> Result<Address, Error> {
        self.add_deferred(loc, node, Instruction::RawWord, Instruction::DeferredWord)
    }

    pub fn add_deferred_dword(&mut self, loc: Loc, node: Node) -> Result<Address, Error> {
        self.add_deferred(loc, node, Instruction::RawDword, Instruction::DeferredDword)
    }

    /// Requires `end - start` to be at most `max` bytes once every label is known.
    pub fn add_size_check(&mut self, loc: Loc, start: &str, end: &str, max: usize) {
        self.checks.push(SizeCheck {
            loc,
            start: start.to_owned(),
            end: end.to_owned(),
            max,
        });
    }

    /// Lowers `if (cond) goto target`, defining the skip labels in place and handing each
    /// primitive jump to `jump` to encode.
    pub fn conditional<F>(
        &mut self,
        loc: Loc,
        cond: &Node,
        target: &str,
        scope: &LabelScope,
        mut jump: F,
    ) -> Result<(), Error>
    where
        F: FnMut(&mut Self, Loc, &Jump) -> Result<(), Error>,
    {
        for step in decompose::decompose(cond, target, scope) {
            match step {
                Step::Label(name) => self.label(&name, loc)?,
                Step::Jump(j) => jump(self, j.cond.loc().unwrap_or(loc), &j)?,
            }
        }
        Ok(())
    }

    /// Resolves every deferred operand and runs the size checks.
    pub fn finish(mut self) -> Result<Program, Error> {
        log::debug!(
            "resolving {} blocks against {} symbols",
            self.stream.blocks().len(),
            self.symbols.len()
        );
        resolve::resolve(&mut self.stream, &self.symbols)?;

        for check in &self.checks {
            check.validate(&self.symbols)?;
        }

        Ok(Program {
            stream: self.stream,
            symbols: self.symbols,
        })
    }
}

/// A fully resolved program, ready for any of the output back ends.
#[derive(Debug)]
pub struct Program {
    stream: InstructionStream,
    symbols: SymbolTable,
}

impl Program {
    pub fn stream(&self) -> &InstructionStream {
        &self.stream
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn to_image(&self, config: &OutputConfig) -> Result<BinaryImage, Error> {
        let mut image = BinaryImage::new(config.endian);
        self.stream.reserve(&mut image);
        image.allocate_pages(config.fill);
        self.stream.compile(&mut image)?;
        Ok(image)
    }

    /// Renders into memory first, so that nothing reaches `out` unless the whole render succeeds.
    pub fn write<W: Write + ?Sized>(
        &self,
        format: OutputFormat,
        config: &OutputConfig,
        out: &mut W,
    ) -> Result<(), Error> {
        let mut buf = Vec::new();
        match format {
            OutputFormat::Hex => self
                .to_image(config)?
                .to_intel_hex(&mut buf, config.record_width)?,
            OutputFormat::Bin => self.to_image(config)?.write_binary(&mut buf)?,
            OutputFormat::Listing => listing::write_listing(&self.stream, &self.symbols, &mut buf)?,
            OutputFormat::Map => self.symbols.write_map(&mut buf)?,
        }

        log::debug!("writing {} bytes of {} output", buf.len(), format);
        out.write_all(&buf)?;
        out.flush()?;
        Ok(())
    }

    pub fn write_hex<W: Write + ?Sized>(
        &self,
        config: &OutputConfig,
        out: &mut W,
    ) -> Result<(), Error> {
        self.write(OutputFormat::Hex, config, out)
    }

    pub fn write_binary<W: Write + ?Sized>(
        &self,
        config: &OutputConfig,
        out: &mut W,
    ) -> Result<(), Error> {
        self.write(OutputFormat::Bin, config, out)
    }

    pub fn write_listing<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), Error> {
        self.write(OutputFormat::Listing, &OutputConfig::default(), out)
    }

    pub fn write_map<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), Error> {
        self.write(OutputFormat::Map, &OutputConfig::default(), out)
    }
}
