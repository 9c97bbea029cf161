//! Mark-and-sweep garbage collector over registered heap objects.
//!
//! Grounded on `original_source/.../memory/garbage_collector.py`'s
//! `TernaryGarbageCollector`: objects are registered with a base address
//! and size, roots are tracked separately, and `collect()` conditionally
//! runs a mark phase followed by a sweep phase, gated by a memory-usage
//! threshold and a minimum interval between collections.

use std::collections::{HashMap, HashSet};

use crate::memory::Memory;
use crate::trit::Trit;

pub const DEFAULT_COLLECTION_THRESHOLD: f64 = 0.8;
pub const DEFAULT_MIN_COLLECTION_INTERVAL_TICKS: u64 = 1;

/// Stride, in trits, at which the mark phase conservatively scans a
/// live object's body for values that look like addresses. Chosen as
/// the full 15-trit virtual-address width rather than the narrower
/// 3-trit register-field width, since scanning at the address width
/// cannot miss a reference this scan is meant to find.
pub const SCAN_STRIDE_TRITS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Raw,
    Array,
    Record,
}

#[derive(Debug, Clone)]
struct HeapObject {
    base: usize,
    size: usize,
    kind: ObjectKind,
    marked: bool,
    timestamp: u64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GcStats {
    pub collections: u64,
    pub objects_collected: u64,
    pub bytes_reclaimed: u64,
}

pub struct GarbageCollector {
    objects: HashMap<u64, HeapObject>,
    roots: HashSet<u64>,
    next_object_id: u64,
    stats: GcStats,
    collection_threshold: f64,
    min_collection_interval: u64,
    last_collection_tick: u64,
}

impl GarbageCollector {
    pub fn new() -> Self {
        GarbageCollector {
            objects: HashMap::new(),
            roots: HashSet::new(),
            next_object_id: 0,
            stats: GcStats::default(),
            collection_threshold: DEFAULT_COLLECTION_THRESHOLD,
            min_collection_interval: DEFAULT_MIN_COLLECTION_INTERVAL_TICKS,
            last_collection_tick: 0,
        }
    }

    pub fn register_object(&mut self, base: usize, size: usize, kind: ObjectKind, tick: u64) -> u64 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        self.objects.insert(id, HeapObject { base, size, kind, marked: false, timestamp: tick });
        id
    }

    pub fn unregister_object(&mut self, id: u64) {
        self.objects.remove(&id);
        self.roots.remove(&id);
    }

    pub fn add_root_object(&mut self, id: u64) {
        self.roots.insert(id);
    }

    pub fn remove_root_object(&mut self, id: u64) {
        self.roots.remove(&id);
    }

    fn should_collect(&self, used_pages: usize, total_pages: usize, tick: u64) -> bool {
        if tick.saturating_sub(self.last_collection_tick) < self.min_collection_interval {
            return false;
        }
        if total_pages == 0 {
            return false;
        }
        (used_pages as f64 / total_pages as f64) >= self.collection_threshold
    }

    /// Runs mark-then-sweep if the usage threshold and minimum interval
    /// allow it. Returns the number of objects collected. Always usable
    /// directly via [`Self::collect_now`] to bypass the gate.
    pub fn collect(&mut self, memory: &mut Memory, used_pages: usize, total_pages: usize, tick: u64) -> u64 {
        if !self.should_collect(used_pages, total_pages, tick) {
            return 0;
        }
        self.collect_now(memory, tick)
    }

    /// Runs mark-then-sweep unconditionally.
    pub fn collect_now(&mut self, memory: &mut Memory, tick: u64) -> u64 {
        self.mark(memory);
        let collected = self.sweep(memory);
        self.stats.collections += 1;
        self.last_collection_tick = tick;
        collected
    }

    fn mark(&mut self, memory: &Memory) {
        for obj in self.objects.values_mut() {
            obj.marked = false;
        }
        let mut worklist: Vec<u64> = self.roots.iter().copied().collect();
        let mut visited: HashSet<u64> = HashSet::new();
        while let Some(id) = worklist.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(obj) = self.objects.get_mut(&id) else { continue };
            obj.marked = true;
            let base = obj.base;
            let size = obj.size;
            let mut offset = 0;
            while offset + SCAN_STRIDE_TRITS <= size {
                if let Ok(word) = memory.load_word(base + offset, SCAN_STRIDE_TRITS) {
                    let candidate = word.to_decimal();
                    if candidate >= 0 {
                        if let Some((&id2, _)) = self.objects.iter().find(|(_, o)| o.base as i64 == candidate) {
                            worklist.push(id2);
                        }
                    }
                }
                offset += SCAN_STRIDE_TRITS;
            }
        }
    }

    fn sweep(&mut self, memory: &mut Memory) -> u64 {
        let dead: Vec<u64> = self
            .objects
            .iter()
            .filter(|(_, obj)| !obj.marked)
            .map(|(&id, _)| id)
            .collect();
        let mut collected = 0;
        for id in dead {
            if let Some(obj) = self.objects.remove(&id) {
                for offset in 0..obj.size {
                    let _ = memory.store_trit(obj.base + offset, Trit::NEUTRAL);
                }
                self.stats.bytes_reclaimed += obj.size as u64;
                collected += 1;
            }
            self.roots.remove(&id);
        }
        self.stats.objects_collected += collected;
        collected
    }

    pub fn stats(&self) -> GcStats {
        self.stats
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_marked(&self, id: u64) -> bool {
        self.objects.get(&id).map_or(false, |o| o.marked)
    }
}

impl Default for GarbageCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_object_is_collected() {
        let mut mem = Memory::new(729);
        let mut gc = GarbageCollector::new();
        let _unreachable = gc.register_object(0, 9, ObjectKind::Raw, 0);
        let collected = gc.collect_now(&mut mem, 1);
        assert_eq!(collected, 1);
        assert_eq!(gc.object_count(), 0);
    }

    #[test]
    fn rooted_object_survives_collection() {
        let mut mem = Memory::new(729);
        let mut gc = GarbageCollector::new();
        let id = gc.register_object(0, 9, ObjectKind::Raw, 0);
        gc.add_root_object(id);
        let collected = gc.collect_now(&mut mem, 1);
        assert_eq!(collected, 0);
        assert_eq!(gc.object_count(), 1);
    }

    #[test]
    fn collect_below_threshold_is_skipped() {
        let mut mem = Memory::new(729);
        let mut gc = GarbageCollector::new();
        let _ = gc.register_object(0, 9, ObjectKind::Raw, 0);
        let collected = gc.collect(&mut mem, 1, 729, 1);
        assert_eq!(collected, 0);
        assert_eq!(gc.object_count(), 1);
    }

    #[test]
    fn collect_above_threshold_runs() {
        let mut mem = Memory::new(729);
        let mut gc = GarbageCollector::new();
        let _ = gc.register_object(0, 9, ObjectKind::Raw, 0);
        let collected = gc.collect(&mut mem, 700, 729, 1);
        assert_eq!(collected, 1);
    }
}
