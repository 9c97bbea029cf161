//! Memory manager: composes paging, one buddy allocator per segment,
//! protection, and the flat backing store into the single surface the
//! rest of the VM talks to.
//!
//! Grounded on `original_source/.../memory/memory_manager.py`, which
//! plays the same composing role over its own paging/buddy/protection
//! modules, each scoped to its own memory region.

use std::collections::HashMap;

use crate::buddy::BuddyAllocator;
use crate::error::T3Error;
use crate::gc::{GarbageCollector, ObjectKind};
use crate::memory::{Memory, Segment, WORD_TRITS};
use crate::paging::PageTable;
use crate::protection::{AccessKind, MemoryProtection, ProtectionLevel, SecurityLevel};
use crate::trit::TritWord;

const REGIONS: [Segment; 5] = [Segment::Code, Segment::Data, Segment::Stack, Segment::Heap, Segment::Kernel];

pub struct MemoryManager {
    memory: Memory,
    pages: PageTable,
    buddies: HashMap<Segment, BuddyAllocator>,
    protection: MemoryProtection,
    gc: GarbageCollector,
    tick: u64,
}

/// A virtual allocation: the block handle needed to free it, plus the
/// virtual base address a caller should use for reads/writes.
#[derive(Debug, Clone, Copy)]
pub struct Allocation {
    pub block_id: u64,
    pub region: Segment,
    pub vaddr: usize,
    pub pages: usize,
}

impl MemoryManager {
    pub fn new(memory_trits: usize) -> Self {
        let memory = Memory::new(memory_trits);
        let num_pages = memory.page_count();
        let mut buddies = HashMap::new();
        for &region in &REGIONS {
            let (start, end) = memory.segment_bounds(region);
            let region_pages = (end - start) / WORD_TRITS;
            buddies.insert(region, BuddyAllocator::new(region_pages.max(1)));
        }
        MemoryManager {
            pages: PageTable::new(num_pages),
            buddies,
            protection: MemoryProtection::new(),
            gc: GarbageCollector::new(),
            memory,
            tick: 0,
        }
    }

    pub fn tick(&mut self) {
        self.tick += 1;
    }

    /// Allocate `size_trits` worth of memory out of `region`, rounding
    /// up to whole pages, mapping them 1:1 virtual-to-physical within
    /// that region's own page range, and protecting the range for the
    /// given security level. Each region has its own buddy pool, so a
    /// heap allocation can never hand out a page that belongs to the
    /// code, data, or stack segment.
    pub fn allocate(&mut self, size_trits: usize, region: Segment, level: ProtectionLevel, security: SecurityLevel) -> Result<Allocation, T3Error> {
        let pages_needed = (size_trits + WORD_TRITS - 1) / WORD_TRITS;
        let (region_start, region_end) = self.memory.segment_bounds(region);
        let region_pages = (region_end - region_start) / WORD_TRITS;
        if pages_needed > region_pages {
            return Err(T3Error::AllocationFailed { requested: pages_needed, available: region_pages });
        }
        let region_base_page = region_start / WORD_TRITS;
        let buddy = self.buddies.get_mut(&region).expect("every region has a buddy allocator");
        let (block_id, page_indices) = buddy.allocate(pages_needed)?;
        let vbase_page = region_base_page + page_indices[0];
        for &p in &page_indices {
            let vpage = region_base_page + p;
            self.pages.map_page(vpage, vpage)?;
        }
        let vaddr = vbase_page * WORD_TRITS;
        let end = vaddr + pages_needed * WORD_TRITS;
        self.protection.set_protection(vaddr, end, level, security);
        self.gc.register_object(vaddr, pages_needed * WORD_TRITS, ObjectKind::Raw, self.tick);
        Ok(Allocation { block_id, region, vaddr, pages: pages_needed })
    }

    pub fn deallocate(&mut self, alloc: Allocation) -> Result<(), T3Error> {
        for p in alloc.vaddr / WORD_TRITS..alloc.vaddr / WORD_TRITS + alloc.pages {
            self.pages.unmap_page(p)?;
        }
        let buddy = self.buddies.get_mut(&alloc.region).expect("every region has a buddy allocator");
        buddy.deallocate(alloc.block_id)
    }

    /// Reads a word from a page-managed (dynamically allocated) range,
    /// subject to both protection and paging. Used for heap memory
    /// obtained from [`Self::allocate`].
    pub fn read_word(&mut self, vaddr: usize, len: usize, security: SecurityLevel) -> Result<TritWord, T3Error> {
        self.protection.check_access(vaddr, AccessKind::Read, security)?;
        self.translate_range(vaddr, len)?;
        self.memory.load_word(vaddr, len)
    }

    /// Writes a word to a page-managed range; see [`Self::read_word`].
    pub fn write_word(&mut self, vaddr: usize, word: &TritWord, security: SecurityLevel) -> Result<(), T3Error> {
        self.protection.check_access(vaddr, AccessKind::Write, security)?;
        self.translate_range(vaddr, word.len())?;
        self.memory.store_word(vaddr, word)?;
        self.pages.mark_modified(vaddr / WORD_TRITS)
    }

    /// Reads a word from the flat address space without paging,
    /// subject only to protection. Used for the statically-present
    /// code/data/stack segments, which are not buddy-managed.
    pub fn read_word_raw(&mut self, vaddr: usize, len: usize, security: SecurityLevel) -> Result<TritWord, T3Error> {
        self.protection.check_access(vaddr, AccessKind::Read, security)?;
        self.memory.load_word(vaddr, len)
    }

    /// Writes a word to the flat address space without paging; see
    /// [`Self::read_word_raw`].
    pub fn write_word_raw(&mut self, vaddr: usize, word: &TritWord, security: SecurityLevel) -> Result<(), T3Error> {
        self.protection.check_access(vaddr, AccessKind::Write, security)?;
        self.memory.store_word(vaddr, word)
    }

    fn translate_range(&mut self, vaddr: usize, len: usize) -> Result<(), T3Error> {
        let first_page = vaddr / WORD_TRITS;
        let last_page = (vaddr + len.saturating_sub(1)) / WORD_TRITS;
        for p in first_page..=last_page {
            self.pages.translate(p)?;
        }
        Ok(())
    }

    pub fn garbage_collect(&mut self) -> u64 {
        let used: usize = self.buddies.values().map(|b| b.get_allocated_pages()).sum();
        let total: usize = self.buddies.values().map(|b| b.total_pages()).sum();
        self.gc.collect(&mut self.memory, used, total, self.tick)
    }

    /// Defragments every region's buddy pool plus the page table.
    /// Returns the total merge count across all regions.
    pub fn defragment(&mut self) -> (u64, usize) {
        let merges: u64 = self.buddies.values_mut().map(|b| b.defragment()).sum();
        (merges, self.pages.defragment())
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn buddy(&self, region: Segment) -> &BuddyAllocator {
        &self.buddies[&region]
    }

    pub fn protection(&self) -> &MemoryProtection {
        &self.protection
    }

    pub fn protection_mut(&mut self) -> &mut MemoryProtection {
        &mut self.protection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_then_write_then_read_roundtrips() {
        let mut mm = MemoryManager::new(729);
        let alloc = mm
            .allocate(27, Segment::Heap, ProtectionLevel::ReadWrite, SecurityLevel::User)
            .unwrap();
        let word = TritWord::from_decimal(42, WORD_TRITS).unwrap();
        mm.write_word(alloc.vaddr, &word, SecurityLevel::User).unwrap();
        let back = mm.read_word(alloc.vaddr, WORD_TRITS, SecurityLevel::User).unwrap();
        assert_eq!(back, word);
    }

    #[test]
    fn deallocate_then_access_page_faults() {
        let mut mm = MemoryManager::new(729);
        let alloc = mm
            .allocate(27, Segment::Heap, ProtectionLevel::ReadWrite, SecurityLevel::User)
            .unwrap();
        mm.deallocate(alloc).unwrap();
        assert!(mm.read_word(alloc.vaddr, WORD_TRITS, SecurityLevel::User).is_err());
    }

    #[test]
    fn user_cannot_write_kernel_region() {
        let mut mm = MemoryManager::new(729);
        let alloc = mm
            .allocate(27, Segment::Heap, ProtectionLevel::ReadWrite, SecurityLevel::Kernel)
            .unwrap();
        let word = TritWord::zero(WORD_TRITS);
        assert!(mm.write_word(alloc.vaddr, &word, SecurityLevel::User).is_err());
    }
}
