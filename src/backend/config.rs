use crate::assets;
use crate::hw::{Byte, Endian};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    Hex,
    Bin,
    Listing,
    Map,
}

impl OutputFormat {
    pub fn default_ext(self) -> &'static str {
        match self {
            OutputFormat::Hex => assets::DEFAULT_HEX_EXT,
            OutputFormat::Bin => assets::DEFAULT_BINARY_EXT,
            OutputFormat::Listing => assets::DEFAULT_LISTING_EXT,
            OutputFormat::Map => assets::DEFAULT_MAP_EXT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub endian: Endian,
    /// Written to every reserved byte nothing was encoded into, and to gaps in raw binaries.
    pub fill: Byte,
    pub record_width: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            endian: Endian::default(),
            fill: assets::DEFAULT_FILL,
            record_width: assets::DEFAULT_RECORD_WIDTH,
        }
    }
}
