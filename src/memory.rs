//! Linear trit-addressable memory, partitioned into fixed segments.
//!
//! Grounded on the teacher's `memory::RAM`/`Bus` split: a flat backing
//! store plus simple bounds-checked accessors, without the teacher's
//! multi-device bus (this VM's memory has a single backing store, and
//! I/O is routed through [`crate::devices`] instead).

use crate::error::T3Error;
use crate::trit::{Trit, TritWord};

pub const WORD_TRITS: usize = 27;

/// One of the five fixed memory segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Code,
    Data,
    Stack,
    Heap,
    Kernel,
}

/// Flat balanced-ternary memory split into code/data/stack/heap/kernel
/// quarters (kernel takes the remainder), addressed by trit offset.
pub struct Memory {
    trits: Vec<Trit>,
    bounds: [(usize, usize); 5],
}

impl Memory {
    /// Allocate `size` trits of zeroed memory, split into five segments:
    /// code/data/stack/heap each get one quarter of the page count,
    /// kernel gets the remainder in pages. Segment boundaries are
    /// computed in pages first so every boundary lands on a 27-trit
    /// page edge, not in raw trits.
    pub fn new(size: usize) -> Self {
        let pages = (size + WORD_TRITS - 1) / WORD_TRITS;
        let seg_pages = pages / 4;
        let quarter = seg_pages * WORD_TRITS;
        let code = (0, quarter);
        let data = (quarter, 2 * quarter);
        let stack = (2 * quarter, 3 * quarter);
        let heap = (3 * quarter, 4 * quarter);
        let kernel = (4 * quarter, size);
        Memory {
            trits: vec![Trit::NEUTRAL; size],
            bounds: [code, data, stack, heap, kernel],
        }
    }

    pub fn size(&self) -> usize {
        self.trits.len()
    }

    /// Number of 27-trit pages the memory spans, rounded up.
    pub fn page_count(&self) -> usize {
        (self.trits.len() + WORD_TRITS - 1) / WORD_TRITS
    }

    pub fn segment_bounds(&self, segment: Segment) -> (usize, usize) {
        self.bounds[segment as usize]
    }

    fn check(&self, addr: usize) -> Result<(), T3Error> {
        if addr >= self.trits.len() {
            return Err(T3Error::AddressOutOfRange { address: addr, size: self.trits.len() });
        }
        Ok(())
    }

    pub fn load_trit(&self, addr: usize) -> Result<Trit, T3Error> {
        self.check(addr)?;
        Ok(self.trits[addr])
    }

    pub fn store_trit(&mut self, addr: usize, value: Trit) -> Result<(), T3Error> {
        self.check(addr)?;
        self.trits[addr] = value;
        Ok(())
    }

    pub fn load_word(&self, addr: usize, len: usize) -> Result<TritWord, T3Error> {
        if addr + len > self.trits.len() {
            return Err(T3Error::AddressOutOfRange { address: addr + len, size: self.trits.len() });
        }
        Ok(TritWord::new(self.trits[addr..addr + len].to_vec()))
    }

    pub fn store_word(&mut self, addr: usize, word: &TritWord) -> Result<(), T3Error> {
        if addr + word.len() > self.trits.len() {
            return Err(T3Error::AddressOutOfRange { address: addr + word.len(), size: self.trits.len() });
        }
        for (i, t) in word.trits().iter().enumerate() {
            self.trits[addr + i] = *t;
        }
        Ok(())
    }

    pub fn copy_segment(&mut self, from: Segment, to: Segment) -> Result<(), T3Error> {
        let (fs, fe) = self.segment_bounds(from);
        let (ts, te) = self.segment_bounds(to);
        let len = (fe - fs).min(te - ts);
        let data: Vec<Trit> = self.trits[fs..fs + len].to_vec();
        self.trits[ts..ts + len].copy_from_slice(&data);
        Ok(())
    }

    pub fn clear_segment(&mut self, segment: Segment) {
        let (s, e) = self.segment_bounds(segment);
        for t in &mut self.trits[s..e] {
            *t = Trit::NEUTRAL;
        }
    }

    /// Dump a segment's raw trits for diagnostics.
    pub fn dump(&self, segment: Segment) -> &[Trit] {
        let (s, e) = self.segment_bounds(segment);
        &self.trits[s..e]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_partition_without_overlap() {
        let mem = Memory::new(729);
        let (cs, ce) = mem.segment_bounds(Segment::Code);
        let (ds, de) = mem.segment_bounds(Segment::Data);
        let (ss, se) = mem.segment_bounds(Segment::Stack);
        let (hs, he) = mem.segment_bounds(Segment::Heap);
        let (ks, ke) = mem.segment_bounds(Segment::Kernel);
        assert_eq!(cs, 0);
        assert_eq!(ce, ds);
        assert_eq!(de, ss);
        assert_eq!(se, hs);
        assert_eq!(he, ks);
        assert_eq!(ke, 729);
    }

    #[test]
    fn out_of_range_access_errors() {
        let mem = Memory::new(27);
        assert!(mem.load_trit(27).is_err());
    }

    #[test]
    fn store_and_load_word_roundtrip() {
        let mut mem = Memory::new(81);
        let w = TritWord::from_decimal(13, 9).unwrap();
        mem.store_word(0, &w).unwrap();
        let back = mem.load_word(0, 9).unwrap();
        assert_eq!(back, w);
    }
}
