use t3vm::gc::{GarbageCollector, ObjectKind};
use t3vm::memory::Memory;

#[test]
fn sweeping_an_unreachable_object_zeroes_its_memory() {
    let mut mem = Memory::new(729);
    let mut gc = GarbageCollector::new();
    let word = t3vm::trit::TritWord::from_decimal(13, 9).unwrap();
    mem.store_word(0, &word).unwrap();
    gc.register_object(0, 9, ObjectKind::Raw, 0);

    let collected = gc.collect_now(&mut mem, 1);

    assert_eq!(collected, 1);
    assert!(mem.load_word(0, 9).unwrap().is_zero());
}

#[test]
fn transitively_reachable_object_survives() {
    let mut mem = Memory::new(729);
    let mut gc = GarbageCollector::new();
    let child = gc.register_object(27, 9, ObjectKind::Raw, 0);
    let parent = gc.register_object(0, 27, ObjectKind::Record, 0);
    // Parent's body (scanned at the 15-trit stride) encodes the child's
    // base address as a reference.
    let ptr = t3vm::trit::TritWord::from_decimal(27, 15).unwrap();
    mem.store_word(0, &ptr).unwrap();
    gc.add_root_object(parent);

    gc.collect_now(&mut mem, 1);

    assert!(gc.is_marked(parent));
    let _ = child;
}

#[test]
fn min_collection_interval_blocks_rapid_recollection() {
    let mut mem = Memory::new(729);
    let mut gc = GarbageCollector::new();
    let _ = gc.register_object(0, 9, ObjectKind::Raw, 0);
    let collected_first = gc.collect(&mut mem, 700, 729, 1);
    assert_eq!(collected_first, 1);

    let _ = gc.register_object(0, 9, ObjectKind::Raw, 1);
    let collected_second = gc.collect(&mut mem, 700, 729, 1);
    assert_eq!(collected_second, 0);
}
