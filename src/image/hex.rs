use super::BinaryImage;
use crate::backend::phases::types::{Loc, Located};
use crate::backend::sink::{ByteSink, SinkError};
use crate::hw::{self, Address, Byte, Endian};
use itertools::Itertools;
use std::fmt::Display;
use std::io::Write;

const DATA_RECORD: Byte = 0x00;
const EOF_RECORD: Byte = 0x01;

pub const EOF_LINE: &str = ":00000001FF";

/// The largest payload a single record can declare.
pub const MAX_RECORD_WIDTH: usize = 0xFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub address: Address,
    pub data: Vec<Byte>,
}

fn checksum(bytes: &[Byte]) -> Byte {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)).wrapping_neg()
}

fn write_record<W: Write + ?Sized>(
    out: &mut W,
    address: Address,
    kind: Byte,
    data: &[Byte],
) -> std::io::Result<()> {
    let address = address & hw::ADDRESS_MASK;
    let mut header = vec![data.len() as Byte];
    header.extend_from_slice(&(address as u16).to_be_bytes());
    header.push(kind);

    let sum = checksum(&header.iter().chain(data.iter()).copied().collect::<Vec<_>>());
    writeln!(
        out,
        ":{}{:02X}",
        header.iter().chain(data.iter()).map(|b| format!("{:02X}", b)).join(""),
        sum
    )
}

/// Splits `data`, laid out from `start`, into record-sized chunks. A run longer than one record
/// which starts off a record boundary is cut at the next boundary first.
pub fn chunks(start: Address, data: &[Byte], width: usize) -> Vec<(Address, &[Byte])> {
    let mut out = Vec::new();
    let mut offset = start as usize;
    let mut rest = data;

    while !rest.is_empty() {
        let part = if rest.len() <= width {
            rest.len()
        } else if offset % width != 0 {
            width - offset % width
        } else {
            width
        };

        let (head, tail) = rest.split_at(part);
        out.push((offset as Address, head));
        offset += part;
        rest = tail;
    }

    out
}

impl BinaryImage {
    pub fn to_intel_hex<W: Write + ?Sized>(
        &self,
        out: &mut W,
        width: usize,
    ) -> std::io::Result<()> {
        self.check_allocated()?;
        if width == 0 || width > MAX_RECORD_WIDTH {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("record width must be 1..={}, not {}", MAX_RECORD_WIDTH, width),
            ));
        }

        let mut records = 0;
        for page in self.pages() {
            for (address, data) in chunks(page.start(), page.data(), width) {
                write_record(out, address, DATA_RECORD, data)?;
                records += 1;
            }
        }
        log::trace!("wrote {} data records", records);

        writeln!(out, "{}", EOF_LINE)
    }

    /// Rebuilds an image from parsed records, padding any gap inside a page with `fill`.
    pub fn from_records(records: &[Record], endian: Endian, fill: Byte) -> Result<Self, SinkError> {
        let mut image = BinaryImage::new(endian);

        for record in records {
            image.goto_address(record.address);
            image.reserve(record.data.len());
        }
        image.allocate_pages(fill);

        for record in records.iter().filter(|r| !r.data.is_empty()) {
            ByteSink::goto_address(&mut image, record.address)?;
            for b in &record.data {
                image.add_byte(*b)?;
            }
        }

        Ok(image)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    MissingColon,
    BadDigit(char),
    OddLength,
    BadLength { declared: usize, found: usize },
    BadChecksum { expected: Byte, found: Byte },
    // Extended segment/linear address records and the like.
    Unsupported(Byte),
    MissingEof,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MissingColon => write!(f, "Record does not start with ':'"),
            Error::BadDigit(c) => write!(f, "Invalid hex digit '{}'", c),
            Error::OddLength => write!(f, "Record has an odd number of digits"),
            Error::BadLength { declared, found } => write!(
                f,
                "Record declares {} data bytes but carries {}",
                declared, found
            ),
            Error::BadChecksum { expected, found } => write!(
                f,
                "Bad checksum: expected {:02X}, found {:02X}",
                expected, found
            ),
            Error::Unsupported(kind) => write!(f, "Unsupported record type {:02X}", kind),
            Error::MissingEof => write!(f, "Missing end-of-file record"),
        }
    }
}

impl std::error::Error for Error {}

fn decode(line: &str) -> Result<Vec<Byte>, (usize, Error)> {
    let digits = line.strip_prefix(':').ok_or((1, Error::MissingColon))?;
    if digits.len() % 2 != 0 {
        return Err((1, Error::OddLength));
    }

    digits
        .chars()
        .enumerate()
        .map(|(i, c)| c.to_digit(16).map(|d| d as Byte).ok_or((i + 2, Error::BadDigit(c))))
        .collect::<Result<Vec<_>, _>>()
        .map(|nibbles| nibbles.chunks(2).map(|p| (p[0] << 4) | p[1]).collect())
}

fn parse_record(line: &str) -> Result<Option<Record>, (usize, Error)> {
    let bytes = decode(line)?;
    let declared = bytes.first().copied().map_or(0, usize::from);
    if bytes.len() < 5 || bytes.len() != declared + 5 {
        return Err((
            1,
            Error::BadLength {
                declared,
                found: bytes.len().saturating_sub(5),
            },
        ));
    }

    let (body, found) = bytes.split_at(bytes.len() - 1);
    let expected = checksum(body);
    if expected != found[0] {
        return Err((
            line.len() - 1,
            Error::BadChecksum {
                expected,
                found: found[0],
            },
        ));
    }

    match body[3] {
        DATA_RECORD => Ok(Some(Record {
            address: Address::from(u16::from_be_bytes([body[1], body[2]])),
            data: body[4..].to_vec(),
        })),
        EOF_RECORD => Ok(None),
        kind => Err((8, Error::Unsupported(kind))),
    }
}

/// Parses Intel HEX text up to its end-of-file record. Errors carry the line and column.
pub fn parse(text: &str) -> Result<Vec<Record>, Located<Error>> {
    let mut records = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_record(line) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => return Ok(records),
            Err((col, err)) => return Err(Located::with_loc(Loc::new(i + 1, col), err)),
        }
    }

    Err(Located::from(Error::MissingEof))
}
