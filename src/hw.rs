use strum_macros::{Display, EnumIter, EnumString};

pub type Byte = u8;
pub type Word = u16;
pub type Dword = u32;

/// A byte address in the target's program memory.
pub type Address = u32;

pub const BYTE_WIDTH: usize = 8;

/// Intel HEX data records only carry 16 bits of address.
pub const ADDRESS_MASK: Address = 0xFFFF;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Endian {
    Little,
    Big,
}

impl Default for Endian {
    // AVR program memory is little-endian.
    fn default() -> Endian {
        Endian::Little
    }
}

impl Endian {
    pub fn word_bytes(self, w: Word) -> [Byte; 2] {
        match self {
            Endian::Little => w.to_le_bytes(),
            Endian::Big => w.to_be_bytes(),
        }
    }

    pub fn dword_bytes(self, dw: Dword) -> [Byte; 4] {
        match self {
            Endian::Little => dw.to_le_bytes(),
            Endian::Big => dw.to_be_bytes(),
        }
    }
}

pub const fn lo_byte(v: Word) -> Byte {
    (v & 0x00FF) as Byte
}

pub const fn hi_byte(v: Word) -> Byte {
    ((v & 0xFF00) >> BYTE_WIDTH) as Byte
}
