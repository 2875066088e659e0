use crate::hw::Byte;

pub const DEFAULT_HEX_EXT: &str = "hex";
pub const DEFAULT_BINARY_EXT: &str = "bin";
pub const DEFAULT_LISTING_EXT: &str = "asm";
pub const DEFAULT_MAP_EXT: &str = "map";

pub const DEFAULT_RECORD_WIDTH: usize = 16;
pub const DEFAULT_FILL: Byte = 0x00;
