//! Regression pins for free-list removal and fit-search behavior.
//!
//! Two historical defect shapes in segregated-fit allocators: unlinking
//! a block at one end of a multi-element free list must not orphan the
//! rest of that list, and the fit search must visit intermediate size
//! classes rather than only the final catch-all.

use tagheap_core::Heap;

#[test]
fn end_of_list_removal_keeps_remaining_blocks_allocatable() {
    let mut heap = Heap::new();
    // Layout: [a0][b0][a1][b1][a2][b2][tail free]. The b-blocks keep
    // the a-blocks from coalescing with each other when freed.
    let mut a = Vec::new();
    let mut b = Vec::new();
    for _ in 0..3 {
        a.push(heap.allocate(100).expect("a block"));
        b.push(heap.allocate(100).expect("b block"));
    }
    // Free all three a-blocks into one class; LIFO order makes a0 the
    // list tail and a1 an interior element.
    for &ptr in &a {
        heap.release(ptr);
    }
    // Freeing b0 coalesces a0 + b0 + a1, which must unlink the list
    // tail and an interior element while leaving a2 reachable.
    heap.release(b[0]);
    assert!(heap.check(), "an orphaned free block fails the census");

    let len = heap.region_len();
    let reused = heap.allocate(100).expect("reuse without growth");
    assert_eq!(reused, a[2], "the surviving list element serves the request");
    assert_eq!(heap.region_len(), len, "no growth was needed");
}

#[test]
fn fit_search_visits_intermediate_classes() {
    let mut heap = Heap::new();
    let p1 = heap.allocate(100).expect("p1");
    let _barrier = heap.allocate(100).expect("barrier");
    heap.release(p1);

    // p1's block now sits in a non-final size class. A smaller request
    // must find it there instead of growing the region.
    let len = heap.region_len();
    let grows = heap.stats().grows;
    let p3 = heap.allocate(50).expect("reuse");
    assert_eq!(p3, p1);
    assert_eq!(heap.region_len(), len);
    assert_eq!(heap.stats().grows, grows);
}

#[test]
fn catch_all_class_serves_lower_class_requests() {
    let mut heap = Heap::new();
    let big = heap.allocate(20_000).expect("big");
    let _barrier = heap.allocate(100).expect("barrier");
    heap.release(big);

    // The freed block files under the catch-all; a mid-class request
    // scans upward and must reach it.
    let len = heap.region_len();
    let reused = heap.allocate(5000).expect("reuse");
    assert_eq!(reused, big);
    assert_eq!(heap.region_len(), len);
    assert!(heap.check());
}
