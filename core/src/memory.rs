use crate::{Error, Word, RAM_WORDS};

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};

use log::trace;

/// A memory-mapped peripheral. Offsets are relative to the start of the
/// mapped region. Handlers run on the driver's stack, mid-cycle, so they
/// must not block.
pub trait MmioHandler: Send {
    fn load(&mut self, offset: Word) -> Word;
    fn store(&mut self, offset: Word, value: Word) -> Result<(), Error>;
}

/// A closed-open interval [start, start + length) of the address space.
/// A zero-length region is valid but contains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: Word,
    pub length: Word,
}

impl Region {
    pub fn new(start: Word, length: Word) -> Region {
        Region { start, length }
    }

    /// First address not contained in the region. Widened so a region
    /// ending at the top of the address space doesn't wrap.
    pub fn end(&self) -> u32 {
        self.start as u32 + self.length as u32
    }

    pub fn contains(&self, address: Word) -> bool {
        (address as u32) >= (self.start as u32) && (address as u32) < self.end()
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        (self.start as u32) < other.end() && (other.start as u32) < self.end()
    }

    /// Smallest region covering both.
    pub fn union(&self, other: &Region) -> Region {
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        Region {
            start,
            length: (end - start as u32) as Word,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#06x}, {:#07x})", self.start, self.end())
    }
}

struct MappedRegion {
    region: Region,
    handler: Arc<Mutex<dyn MmioHandler>>,
}

/// Backing store plus two ordered side lists: protected regions, whose
/// writes fault, and mapped regions, whose accesses are redirected to a
/// handler. Both lists stay sorted by start and never overlap themselves.
pub struct Memory {
    ram: Vec<Word>,
    protected: Vec<Region>,
    mapped: Vec<MappedRegion>,
}

impl Default for Memory {
    fn default() -> Self {
        Memory {
            ram: vec![0; RAM_WORDS],
            protected: Vec::new(),
            mapped: Vec::new(),
        }
    }
}

impl Memory {
    pub fn new() -> Memory {
        Default::default()
    }

    /// Reads never fault: mapped regions answer through their handler,
    /// everything else through the backing store.
    pub fn load(&self, address: Word) -> Word {
        for mapped in &self.mapped {
            if mapped.region.contains(address) {
                return mapped.handler.lock().unwrap().load(address - mapped.region.start);
            }
            if mapped.region.start > address {
                break;
            }
        }
        self.ram[address as usize]
    }

    pub fn store(&mut self, address: Word, value: Word) -> Result<(), Error> {
        for mapped in &self.mapped {
            if mapped.region.contains(address) {
                return mapped.handler.lock().unwrap().store(address - mapped.region.start, value);
            }
            if mapped.region.start > address {
                break;
            }
        }
        for region in &self.protected {
            if region.contains(address) {
                return Err(Error::Protection(address));
            }
            if region.start > address {
                break;
            }
        }
        trace!("mem: {value:#06x} -> [{address:#06x}]");
        self.ram[address as usize] = value;
        Ok(())
    }

    /// Redirects [start, start+length) to `handler`. Fails if the range
    /// runs past the address space or touches an existing mapped region.
    pub fn map_region(
        &mut self,
        start: Word,
        length: Word,
        handler: Arc<Mutex<dyn MmioHandler>>,
    ) -> Result<(), Error> {
        if start as usize + length as usize > RAM_WORDS {
            return Err(Error::OutOfBounds);
        }
        let region = Region::new(start, length);
        for mapped in &self.mapped {
            if mapped.region.overlaps(&region) {
                return Err(Error::RegionConflict);
            }
        }
        let at = self
            .mapped
            .iter()
            .position(|m| m.region.start > start)
            .unwrap_or(self.mapped.len());
        self.mapped.insert(at, MappedRegion { region, handler });
        Ok(())
    }

    /// Removes a mapping. The range must match an existing region exactly.
    pub fn unmap_region(&mut self, start: Word, length: Word) -> Result<(), Error> {
        if start as usize + length as usize > RAM_WORDS {
            return Err(Error::OutOfBounds);
        }
        for i in 0..self.mapped.len() {
            let region = self.mapped[i].region;
            if region.start == start && region.length == length {
                self.mapped.remove(i);
                return Ok(());
            }
            if region.start > start {
                break;
            }
        }
        Err(Error::NoRegionMatches)
    }

    /// Marks [start, start+length) as protected or unprotected. Adding
    /// coalesces with any region it touches or overlaps; removing splits
    /// regions that extend past the range.
    pub fn mem_protect(&mut self, start: Word, length: Word, protected: bool) -> Result<(), Error> {
        if start as usize + length as usize > RAM_WORDS {
            return Err(Error::OutOfBounds);
        }
        if protected {
            self.protect(Region::new(start, length));
        } else {
            self.unprotect(Region::new(start, length));
        }
        Ok(())
    }

    fn protect(&mut self, region: Region) {
        let mut merged = region;
        let mut i = 0;
        while i < self.protected.len() {
            let existing = self.protected[i];
            if existing.start as u32 > merged.end() {
                break;
            }
            if existing.end() >= merged.start as u32 {
                merged = merged.union(&existing);
                self.protected.remove(i);
            } else {
                i += 1;
            }
        }
        let at = self
            .protected
            .iter()
            .position(|r| r.start > merged.start)
            .unwrap_or(self.protected.len());
        self.protected.insert(at, merged);
    }

    fn unprotect(&mut self, region: Region) {
        let mut i = 0;
        while i < self.protected.len() {
            let existing = self.protected[i];
            if existing.start as u32 >= region.end() {
                break;
            }
            if existing.end() <= region.start as u32 {
                i += 1;
                continue;
            }
            // Some overlap. Keep whatever sticks out on either side.
            let left = Region {
                start: existing.start,
                length: region.start.saturating_sub(existing.start),
            };
            let right = Region {
                start: region.end() as Word,
                length: (existing.end().saturating_sub(region.end())) as Word,
            };
            self.protected.remove(i);
            if left.length > 0 {
                self.protected.insert(i, left);
                i += 1;
            }
            if right.length > 0 {
                self.protected.insert(i, right);
                i += 1;
            }
        }
    }

    /// Copies a program image into the backing store at `offset`.
    pub fn load_program(&mut self, words: &[Word], offset: Word) -> Result<(), Error> {
        if words.len() + offset as usize > RAM_WORDS {
            return Err(Error::OutOfBounds);
        }
        self.ram[offset as usize..offset as usize + words.len()].copy_from_slice(words);
        Ok(())
    }

    /// Direct view of the backing store, mainly for tests. Mapped regions
    /// are not consulted.
    pub fn slice(&self, start: Word, end: Word) -> &[Word] {
        &self.ram[start as usize..end as usize]
    }

    /// Debug helper: writes every row of eight words that is non-zero or
    /// holds a highlighted address, as `0000: 1111 2222 ...`. Highlighted
    /// words (typically PC) are wrapped in ANSI reverse video.
    pub fn dump(&self, out: &mut impl io::Write, highlights: &[Word]) -> io::Result<()> {
        const WIDTH: usize = 8;
        for (row, chunk) in self.ram.chunks(WIDTH).enumerate() {
            let base = row * WIDTH;
            let marked = |i: usize| highlights.contains(&((base + i) as Word));
            let interesting =
                chunk.iter().any(|&w| w != 0) || (0..chunk.len()).any(&marked);
            if !interesting {
                continue;
            }
            write!(out, "{base:04x}:")?;
            for (i, word) in chunk.iter().enumerate() {
                if marked(i) {
                    write!(out, " \x1b[7m{word:04x}\x1b[m")?;
                } else {
                    write!(out, " {word:04x}")?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }

    pub(crate) fn protected_regions(&self) -> &[Region] {
        &self.protected
    }
}
