use super::fold::{self, ArithmeticError};
use super::types::{Loc, Located};
use crate::backend::ast::Value;
use crate::backend::model::{Bound, Operand, OperandValue, RelocError};
use crate::backend::stream::InstructionStream;
use crate::hw::Address;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Display;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    UnresolvedSymbol(String),
    DuplicateLabel(String),
    BlockTooLarge { expected: usize, found: i64 },
    Relocation(RelocError),
    Arithmetic(ArithmeticError),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnresolvedSymbol(name) => write!(f, "Unresolved symbol '{}'", name),
            Error::DuplicateLabel(name) => write!(f, "Label '{}' already defined", name),
            Error::BlockTooLarge { expected, found } => write!(
                f,
                "Block too large: expected at most {} bytes, but found {} bytes",
                expected, found
            ),
            Error::Relocation(err) => write!(f, "{}", err),
            Error::Arithmetic(err) => write!(f, "{}", err),
        }
    }
}

pub trait LabelResolver {
    fn resolve(&self, name: &str) -> Option<Address>;
}

impl LabelResolver for HashMap<String, Address> {
    fn resolve(&self, name: &str) -> Option<Address> {
        self.get(name).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: Address,
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines `name` at `address`. A duplicate leaves the first definition in place.
    pub fn define(
        &mut self,
        name: &str,
        address: Address,
        loc: Option<Loc>,
    ) -> Result<(), Located<Error>> {
        match self.symbols.entry(name.to_owned()) {
            Entry::Occupied(_) => {
                let err = Error::DuplicateLabel(name.to_owned());
                Err(match loc {
                    Some(loc) => Located::with_loc(loc, err),
                    None => Located::from(err),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(Symbol {
                    name: name.to_owned(),
                    address,
                    loc,
                });
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in ascending address order, ties broken by name.
    pub fn by_address(&self) -> Vec<&Symbol> {
        let mut symbols: Vec<_> = self.symbols.values().collect();
        symbols.sort_by(|a, b| a.address.cmp(&b.address).then_with(|| a.name.cmp(&b.name)));
        symbols
    }

    /// One `XXXX: name` line per symbol.
    pub fn write_map<W: Write + ?Sized>(&self, out: &mut W) -> std::io::Result<()> {
        for symbol in self.by_address() {
            writeln!(out, "{:04X}: {}", symbol.address, symbol.name)?;
        }
        Ok(())
    }
}

impl LabelResolver for SymbolTable {
    fn resolve(&self, name: &str) -> Option<Address> {
        self.get(name).map(|symbol| symbol.address)
    }
}

/// Looks the scope-qualified name up first, then the plain one.
pub fn lookup_label<R: LabelResolver + ?Sized>(
    resolver: &R,
    local_name: &str,
    name: &str,
) -> Option<(String, Address)> {
    resolver
        .resolve(local_name)
        .map(|addr| (local_name.to_owned(), addr))
        .or_else(|| resolver.resolve(name).map(|addr| (name.to_owned(), addr)))
}

fn resolve_operand<R: LabelResolver + ?Sized>(
    operand: &mut Operand,
    current: Address,
    resolver: &R,
) -> Result<bool, Located<Error>> {
    match operand {
        Operand::Label(label) if !label.resolved().is_resolved() => {
            let (symbol, target) = lookup_label(resolver, &label.local_name, &label.name)
                .ok_or_else(|| Error::UnresolvedSymbol(label.name.clone()))?;
            let value = label
                .relocation
                .apply(current, OperandValue::from(target))
                .map_err(Error::Relocation)?;
            label.bind(Bound { symbol, value });
            Ok(true)
        }
        Operand::Deferred(deferred) if !deferred.resolved().is_resolved() => {
            let lookup = |name: &str| resolver.resolve(name).map(|addr| addr as Value);
            let target = fold::evaluate(&deferred.node, &lookup).map_err(|err| {
                err.map(|err| match err {
                    fold::Error::NotConstant(name) => Error::UnresolvedSymbol(name),
                    fold::Error::Arithmetic(arith) => Error::Arithmetic(arith),
                })
            })?;
            let value = deferred
                .relocation
                .apply(current, OperandValue::from(target))
                .map_err(Error::Relocation)?;
            deferred.bind(value);
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Resolves every deferred operand of `stream` against `resolver`, returning how many were
/// resolved by this call. Operands resolved by an earlier call are left alone.
pub fn resolve<R: LabelResolver + ?Sized>(
    stream: &mut InstructionStream,
    resolver: &R,
) -> Result<usize, Located<Error>> {
    let mut count = 0;

    for block in stream.blocks_mut() {
        let mut current = block.origin();
        for entry in block.entries_mut() {
            let loc = entry.loc();
            let size = entry.size();
            for operand in entry.operands_mut() {
                if resolve_operand(operand, current, resolver)
                    .map_err(|err| err.proximate_to_loc(loc))?
                {
                    count += 1;
                }
            }
            current += size as Address;
        }
    }

    log::debug!("resolved {} deferred operands", count);
    Ok(count)
}

/// Requires the distance between two labels to be at most `max` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeCheck {
    pub loc: Loc,
    pub start: String,
    pub end: String,
    pub max: usize,
}

impl SizeCheck {
    pub fn validate<R: LabelResolver + ?Sized>(&self, resolver: &R) -> Result<(), Located<Error>> {
        let lookup = |name: &String| {
            resolver
                .resolve(name)
                .ok_or_else(|| Located::with_loc(self.loc, Error::UnresolvedSymbol(name.clone())))
        };
        let found = i64::from(lookup(&self.end)?) - i64::from(lookup(&self.start)?);

        if found > self.max as i64 {
            return Err(Located::with_loc(
                self.loc,
                Error::BlockTooLarge {
                    expected: self.max,
                    found,
                },
            ));
        }

        Ok(())
    }
}
