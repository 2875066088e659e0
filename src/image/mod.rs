use crate::backend::sink::{ByteSink, SinkError};
use crate::hw::{Address, Byte, Dword, Endian, Word};
use std::io::Write;

pub mod hex;

/*
    Images are built in two phases:

        1.  Reserve: `goto_address` and `reserve` walk the program once, growing the current page
            while the writes stay contiguous and starting a new page at each discontinuity.
            `allocate_pages` then sorts the pages, merges any which touch or overlap, and allocates
            each buffer exactly once.

        2.  Fill: the same walk is repeated through `ByteSink`, which only ever writes inside the
            reserved pages.
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    start: Address,
    len: usize,
    data: Vec<Byte>,
}

impl Page {
    fn new(start: Address) -> Self {
        Page {
            start,
            len: 0,
            data: Vec::new(),
        }
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn end(&self) -> Address {
        self.start + self.len as Address
    }

    pub fn data(&self) -> &[Byte] {
        &self.data
    }

    fn contains(&self, addr: Address) -> bool {
        self.start <= addr && addr <= self.end()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BinaryImage {
    endian: Endian,
    pages: Vec<Page>,
    current: Option<usize>,
    address: Address,
    fill: Option<Byte>,
}

impl BinaryImage {
    pub fn new(endian: Endian) -> Self {
        BinaryImage {
            endian,
            ..Default::default()
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn is_allocated(&self) -> bool {
        self.fill.is_some()
    }

    /// Positions the cursor. While reserving, an address outside every page starts a new one.
    pub fn goto_address(&mut self, addr: Address) {
        self.address = addr;
        self.current = self.pages.iter().position(|page| page.contains(addr));

        if self.current.is_none() && !self.is_allocated() {
            self.pages.push(Page::new(addr));
            self.current = Some(self.pages.len() - 1);
        }
    }

    /// Grows the current page by `bytes`. Does nothing once the pages are allocated.
    pub fn reserve(&mut self, bytes: usize) {
        debug_assert!(!self.is_allocated(), "reserve after allocate_pages");
        if self.is_allocated() {
            return;
        }

        if self.current.is_none() {
            self.goto_address(self.address);
        }

        let addr = self.address;
        if let Some(page) = self.current.and_then(|i| self.pages.get_mut(i)) {
            let end = (addr - page.start) as usize + bytes;
            page.len = page.len.max(end);
        }
        self.address += bytes as Address;
    }

    pub fn allocate_pages(&mut self, fill: Byte) {
        self.pages.retain(|page| !page.is_empty());
        self.pages.sort_by_key(|page| page.start);

        let mut merged: Vec<Page> = Vec::with_capacity(self.pages.len());
        for page in self.pages.drain(..) {
            match merged.last_mut() {
                Some(last) if page.start <= last.end() => {
                    if page.start < last.end() {
                        log::warn!(
                            "reserved span {:#06X}..{:#06X} overlaps {:#06X}..{:#06X}",
                            page.start,
                            page.end(),
                            last.start,
                            last.end()
                        );
                    }
                    last.len = last.len.max((page.end() - last.start) as usize);
                }
                _ => merged.push(page),
            }
        }

        for page in &mut merged {
            page.data = vec![fill; page.len];
        }

        log::debug!(
            "allocated {} pages ({} bytes)",
            merged.len(),
            merged.iter().map(Page::len).sum::<usize>()
        );

        self.pages = merged;
        self.current = None;
        self.fill = Some(fill);
    }

    // Reserved pages have no bytes until `allocate_pages` runs.
    fn check_allocated(&self) -> std::io::Result<()> {
        if self.is_allocated() || self.pages.is_empty() {
            return Ok(());
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} reserved pages were never allocated", self.pages.len()),
        ))
    }

    /// The raw image from address 0, with every gap filled.
    pub fn write_binary<W: Write + ?Sized>(&self, out: &mut W) -> std::io::Result<()> {
        self.check_allocated()?;

        let fill = self.fill.unwrap_or_default();
        let mut buf = Vec::new();

        for page in &self.pages {
            let gap = page.start as usize - buf.len().min(page.start as usize);
            buf.extend(std::iter::repeat(fill).take(gap));
            buf.extend_from_slice(&page.data);
        }

        out.write_all(&buf)
    }

    fn put(&mut self, v: Byte) -> Result<(), SinkError> {
        let addr = self.address;
        let page = self
            .current
            .and_then(|i| self.pages.get_mut(i))
            .ok_or(SinkError::Unreserved(addr))?;

        let slot = page
            .data
            .get_mut((addr - page.start) as usize)
            .ok_or(SinkError::Overrun(addr))?;
        *slot = v;

        self.address += 1;
        Ok(())
    }
}

impl ByteSink for BinaryImage {
    fn goto_address(&mut self, addr: Address) -> Result<(), SinkError> {
        BinaryImage::goto_address(self, addr);
        match self.current {
            Some(_) => Ok(()),
            None => Err(SinkError::Unreserved(addr)),
        }
    }

    fn add_byte(&mut self, v: Byte) -> Result<(), SinkError> {
        self.put(v)
    }

    fn add_word(&mut self, v: Word) -> Result<(), SinkError> {
        for b in self.endian.word_bytes(v).iter() {
            self.put(*b)?;
        }
        Ok(())
    }

    fn add_dword(&mut self, v: Dword) -> Result<(), SinkError> {
        for b in self.endian.dword_bytes(v).iter() {
            self.put(*b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_pages() -> BinaryImage {
        let mut image = BinaryImage::new(Endian::Big);
        image.goto_address(0x0000);
        for _ in 0..4 {
            image.reserve(2);
        }
        image.goto_address(0x0100);
        image.reserve(2);
        image.reserve(2);
        image.reserve(16);
        image
    }

    #[test]
    fn reserve_groups_contiguous_runs() {
        let image = two_pages();
        let shape: Vec<_> = image.pages().iter().map(|p| (p.start(), p.len())).collect();
        assert_eq!(shape, vec![(0, 8), (0x100, 20)]);
    }

    #[test]
    fn fill_honours_endianness() {
        let mut image = two_pages();
        image.allocate_pages(0);

        ByteSink::goto_address(&mut image, 0).unwrap();
        image.add_byte(0x12).unwrap();
        image.add_byte(0x34).unwrap();
        image.add_word(0xABCD).unwrap();
        image.add_dword(0x5678_9ABC).unwrap();

        ByteSink::goto_address(&mut image, 0x100).unwrap();
        for i in 0..20 {
            image.add_byte(i).unwrap();
        }

        assert_eq!(
            image.pages()[0].data(),
            &[0x12, 0x34, 0xAB, 0xCD, 0x56, 0x78, 0x9A, 0xBC]
        );
        assert_eq!(image.pages()[1].data().len(), 20);
        assert_eq!(image.pages()[1].data()[19], 19);
    }

    #[test]
    fn pages_are_sorted_after_allocation() {
        let mut image = BinaryImage::new(Endian::Little);
        image.goto_address(100);
        image.reserve(2);
        image.goto_address(50);
        image.reserve(4);
        image.allocate_pages(0);

        ByteSink::goto_address(&mut image, 100).unwrap();
        image.add_word(0x1234).unwrap();
        ByteSink::goto_address(&mut image, 50).unwrap();
        image.add_dword(0x1234_5678).unwrap();

        assert_eq!(image.pages()[0].start(), 50);
        assert_eq!(image.pages()[0].data(), &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(image.pages()[1].start(), 100);
        assert_eq!(image.pages()[1].data(), &[0x34, 0x12]);
    }

    #[test]
    fn adjacent_and_overlapping_reservations_merge() {
        let mut image = BinaryImage::new(Endian::Little);
        image.goto_address(0x10);
        image.reserve(4);
        image.goto_address(0x08);
        image.reserve(10);
        image.goto_address(0x20);
        image.reserve(2);
        image.goto_address(0x1E);
        image.reserve(2);
        assert_eq!(image.pages().len(), 4);
        image.allocate_pages(0xFF);

        let shape: Vec<_> = image.pages().iter().map(|p| (p.start(), p.len())).collect();
        assert_eq!(shape, vec![(0x08, 12), (0x1E, 4)]);
        assert!(image.pages()[0].data().iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn writes_outside_reservations_are_errors() {
        let mut image = BinaryImage::new(Endian::Little);
        image.goto_address(0x10);
        image.reserve(2);
        image.allocate_pages(0);

        assert_eq!(
            ByteSink::goto_address(&mut image, 0x40),
            Err(SinkError::Unreserved(0x40))
        );
        assert_eq!(image.add_byte(1), Err(SinkError::Unreserved(0x40)));

        ByteSink::goto_address(&mut image, 0x10).unwrap();
        assert_eq!(image.add_dword(0), Err(SinkError::Overrun(0x12)));
    }

    #[test]
    fn binary_output_fills_gaps() {
        let mut image = BinaryImage::new(Endian::Little);
        image.goto_address(2);
        image.reserve(1);
        image.goto_address(5);
        image.reserve(1);
        image.allocate_pages(0xEE);

        ByteSink::goto_address(&mut image, 2).unwrap();
        image.add_byte(0xAA).unwrap();
        ByteSink::goto_address(&mut image, 5).unwrap();
        image.add_byte(0xBB).unwrap();

        let mut out = Vec::new();
        image.write_binary(&mut out).unwrap();
        assert_eq!(out, vec![0xEE, 0xEE, 0xAA, 0xEE, 0xEE, 0xBB]);
    }

    #[test]
    fn empty_reservations_leave_no_page() {
        let mut image = BinaryImage::new(Endian::Little);
        image.goto_address(0);
        image.reserve(1);
        image.goto_address(0x1000);
        image.reserve(0);
        image.allocate_pages(0xEE);

        ByteSink::goto_address(&mut image, 0).unwrap();
        image.add_byte(0xAA).unwrap();

        assert_eq!(image.pages().len(), 1);
        let mut out = Vec::new();
        image.write_binary(&mut out).unwrap();
        assert_eq!(out, vec![0xAA]);
    }

    #[test]
    fn unallocated_images_refuse_to_serialize() {
        let mut image = BinaryImage::new(Endian::Little);
        image.goto_address(0x10);
        image.reserve(4);

        let mut out = Vec::new();
        assert!(image.write_binary(&mut out).is_err());
        assert!(image.to_intel_hex(&mut out, 16).is_err());
        assert!(out.is_empty());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "reserve after allocate_pages")]
    fn reserving_after_allocation_is_a_bug() {
        let mut image = BinaryImage::new(Endian::Little);
        image.goto_address(0x10);
        image.reserve(4);
        image.allocate_pages(0);
        image.reserve(4);
    }
}
