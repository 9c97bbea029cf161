use t3vm::memory::{Memory, Segment};
use t3vm::paging::PageTable;
use t3vm::trit::TritWord;

#[test]
fn memory_segments_cover_the_whole_address_space_without_gaps() {
    let mem = Memory::new(729);
    let (cs, ce) = mem.segment_bounds(Segment::Code);
    let (_, ke) = mem.segment_bounds(Segment::Kernel);
    assert_eq!(cs, 0);
    assert_eq!(ke, mem.size());
    assert!(ce > cs);
}

#[test]
fn writes_outside_memory_are_rejected() {
    let mut mem = Memory::new(27);
    let word = TritWord::zero(9);
    assert!(mem.store_word(25, &word).is_err());
}

#[test]
fn clear_segment_zeroes_only_that_segment() {
    let mut mem = Memory::new(108);
    let word = TritWord::from_decimal(5, 9).unwrap();
    let (ds, _) = mem.segment_bounds(Segment::Data);
    mem.store_word(ds, &word).unwrap();
    mem.clear_segment(Segment::Data);
    assert!(mem.load_word(ds, 9).unwrap().is_zero());
}

#[test]
fn page_table_defragment_compacts_to_lowest_physical_pages() {
    let mut pt = PageTable::new(6);
    pt.map_page(0, 5).unwrap();
    pt.map_page(1, 3).unwrap();
    let moved = pt.defragment();
    assert!(moved > 0);
    assert_eq!(pt.translate(0).unwrap(), 0);
    assert_eq!(pt.translate(1).unwrap(), 1);
}
