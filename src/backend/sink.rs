use crate::hw::{Address, Byte, Dword, Word};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    Unreserved(Address),
    Overrun(Address),
}

impl Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Unreserved(addr) => {
                write!(f, "No reserved page contains address {:#06X}", addr)
            }
            SinkError::Overrun(addr) => {
                write!(f, "Write past the end of a reserved page at {:#06X}", addr)
            }
        }
    }
}

impl std::error::Error for SinkError {}

/// Where `InstructionStream::compile` puts its bytes.
pub trait ByteSink {
    fn goto_address(&mut self, addr: Address) -> Result<(), SinkError>;

    fn add_byte(&mut self, v: Byte) -> Result<(), SinkError>;

    fn add_word(&mut self, v: Word) -> Result<(), SinkError>;

    fn add_dword(&mut self, v: Dword) -> Result<(), SinkError>;
}
