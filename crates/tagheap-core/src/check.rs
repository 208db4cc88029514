//! Whole-region consistency checker.
//!
//! Advisory and caller-invoked: [`Heap::check`] walks the region with
//! the same codec the allocator uses, verifies the sentinel words, every
//! block's tags, and the free-list census, and reports the first
//! violation as an error event. It never panics and never repairs:
//! corrupted tags are reported, not trusted.

use std::collections::HashSet;

use crate::allocator::Heap;
use crate::codec::{self, DWORD, MIN_BLOCK, WORD};
use crate::events::EventLevel;
use crate::freelist::{FreeIndex, NIL, NUM_CLASSES, class_of};

impl Heap {
    /// Verifies the whole managed region.
    ///
    /// Returns `true` when every invariant holds. On failure an error
    /// event naming the failed check and the offending offset is
    /// recorded and `false` is returned; the region is left as it was.
    /// An uninitialized heap has no region to verify and passes.
    pub fn check(&mut self) -> bool {
        if !self.initialized {
            return true;
        }
        self.check_sentinels() && self.check_blocks() && self.check_free_index()
    }

    /// Both sentinel words must encode a zero-size allocated block and
    /// sit at the region's fixed ends.
    fn check_sentinels(&mut self) -> bool {
        let expected = codec::pack(0, true);
        let prologue = self.region.word(0);
        if prologue != expected {
            return self.fail("bad_prologue", 0, format!("word={prologue:#x}"));
        }
        let at = self.region.len() - WORD;
        let epilogue = self.region.word(at);
        if epilogue != expected {
            return self.fail("bad_epilogue", at, format!("word={epilogue:#x}"));
        }
        true
    }

    /// Linear walk: every block must be aligned, at least the minimum
    /// size, within bounds, tag-consistent, and never free next to a
    /// free neighbor.
    fn check_blocks(&mut self) -> bool {
        let epilogue = self.region.len() - WORD;
        let mut header = WORD;
        let mut prev_free = false;
        while header < epilogue {
            if header % DWORD != WORD {
                return self.fail("misaligned_header", header, "header offset not 8 mod 16");
            }
            let (size, alloc) = codec::unpack(self.region.word(header));
            if size < MIN_BLOCK || size % DWORD != 0 {
                return self.fail("bad_block_size", header, format!("size={size}"));
            }
            let Some(end) = header.checked_add(size) else {
                return self.fail("block_overruns_region", header, format!("size={size}"));
            };
            if end > epilogue {
                return self.fail(
                    "block_overruns_region",
                    header,
                    format!("size={size} end={end}"),
                );
            }
            let head_word = self.region.word(header);
            let foot_word = self.region.word(codec::footer_of(header, size));
            if head_word != foot_word {
                return self.fail(
                    "tag_mismatch",
                    header,
                    format!("header={head_word:#x} footer={foot_word:#x}"),
                );
            }
            if !alloc && prev_free {
                return self.fail("adjacent_free_blocks", header, "coalescing missed a merge");
            }
            prev_free = !alloc;
            header = end;
        }
        true
    }

    /// The union of all free-list memberships must equal the set of
    /// blocks flagged free on the linear walk, each filed under its own
    /// size class with mutually consistent links.
    ///
    /// Runs after [`Heap::check_blocks`] has validated the walk.
    fn check_free_index(&mut self) -> bool {
        let epilogue = self.region.len() - WORD;
        let mut free_walk = HashSet::new();
        let mut header = WORD;
        while header < epilogue {
            let (size, alloc) = codec::unpack(self.region.word(header));
            if !alloc {
                free_walk.insert(header);
            }
            header += size;
        }

        let mut listed = HashSet::new();
        for class in 0..NUM_CLASSES {
            let mut prev = NIL;
            let mut cursor = self.index.head(class);
            while cursor != NIL {
                if !listed.insert(cursor) {
                    return self.fail("free_list_cycle", cursor, format!("class={class}"));
                }
                if !free_walk.contains(&cursor) {
                    return self.fail("listed_block_not_free", cursor, format!("class={class}"));
                }
                let size = codec::word_size(self.region.word(cursor));
                if class_of(size) != class {
                    return self.fail(
                        "wrong_class",
                        cursor,
                        format!("size={size} filed_under={class}"),
                    );
                }
                if FreeIndex::prev_of(&self.region, cursor) != prev {
                    return self.fail("broken_back_link", cursor, format!("class={class}"));
                }
                prev = cursor;
                cursor = FreeIndex::next_of(&self.region, cursor);
            }
        }
        if listed.len() != free_walk.len() {
            return self.fail(
                "free_census_mismatch",
                0,
                format!("walked={} listed={}", free_walk.len(), listed.len()),
            );
        }
        true
    }

    fn fail(&mut self, event: &'static str, offset: usize, details: impl Into<String>) -> bool {
        self.record(
            EventLevel::Error,
            "check",
            event,
            Some(offset),
            None,
            None,
            "corrupt",
            details,
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last_check_failure(heap: &Heap) -> &'static str {
        heap.events()
            .iter()
            .rev()
            .find(|e| e.symbol == "check" && e.level == EventLevel::Error)
            .map(|e| e.event)
            .expect("a check failure event")
    }

    #[test]
    fn uninitialized_heap_checks_clean() {
        let mut heap = Heap::new();
        assert!(heap.check());
    }

    #[test]
    fn check_passes_after_mixed_operations() {
        let mut heap = Heap::new();
        let p1 = heap.allocate(100).expect("p1");
        let p2 = heap.allocate(2000).expect("p2");
        let p3 = heap.resize(p1, 500).expect("p3");
        heap.release(p2);
        let p4 = heap.zero_allocate(16, 16).expect("p4");
        assert!(heap.check());
        heap.release(p3);
        heap.release(p4);
        assert!(heap.check());
    }

    #[test]
    fn detects_corrupted_epilogue() {
        let mut heap = Heap::new();
        heap.init();
        let at = heap.region.len() - WORD;
        heap.region.set_word(at, codec::pack(0, false));
        assert!(!heap.check());
        assert_eq!(last_check_failure(&heap), "bad_epilogue");
    }

    #[test]
    fn detects_corrupted_prologue() {
        let mut heap = Heap::new();
        heap.init();
        heap.region.set_word(0, codec::pack(32, true));
        assert!(!heap.check());
        assert_eq!(last_check_failure(&heap), "bad_prologue");
    }

    #[test]
    fn detects_header_footer_mismatch() {
        let mut heap = Heap::new();
        let ptr = heap.allocate(64).expect("alloc");
        let header = codec::header_of(ptr);
        let size = codec::word_size(heap.region.word(header));
        heap.region
            .set_word(codec::footer_of(header, size), codec::pack(size, false));
        assert!(!heap.check());
        assert_eq!(last_check_failure(&heap), "tag_mismatch");
    }

    #[test]
    fn detects_undersized_block() {
        let mut heap = Heap::new();
        let ptr = heap.allocate(64).expect("alloc");
        let header = codec::header_of(ptr);
        heap.region.set_word(header, codec::pack(DWORD, true));
        assert!(!heap.check());
        assert_eq!(last_check_failure(&heap), "bad_block_size");
    }

    #[test]
    fn detects_adjacent_free_blocks() {
        let mut heap = Heap::new();
        let p1 = heap.allocate(64).expect("p1");
        let p2 = heap.allocate(64).expect("p2");
        heap.allocate(64).expect("p3 keeps the tail allocated");
        heap.release(p1);
        // Hand-flip p2's tags to free without coalescing or indexing.
        let header = codec::header_of(p2);
        let size = codec::word_size(heap.region.word(header));
        let word = codec::pack(size, false);
        heap.region.set_word(header, word);
        heap.region.set_word(codec::footer_of(header, size), word);
        assert!(!heap.check());
        assert_eq!(last_check_failure(&heap), "adjacent_free_blocks");
    }

    #[test]
    fn detects_orphaned_free_block() {
        let mut heap = Heap::new();
        let p1 = heap.allocate(100).expect("p1");
        heap.allocate(100).expect("p2 isolates p1 from the tail");
        heap.release(p1);
        // Drop the class head as the collapsing-removal defect would:
        // the block stays flagged free but unreachable from the index.
        let size = codec::word_size(heap.region.word(codec::header_of(p1)));
        heap.index.heads[class_of(size)] = NIL;
        assert!(!heap.check());
        assert_eq!(last_check_failure(&heap), "free_census_mismatch");
    }

    #[test]
    fn detects_listed_block_that_is_not_free() {
        let mut heap = Heap::new();
        let p1 = heap.allocate(100).expect("p1");
        heap.allocate(100).expect("p2 isolates p1 from the tail");
        heap.release(p1);
        // Flip the freed block back to allocated behind the index's back.
        let header = codec::header_of(p1);
        let size = codec::word_size(heap.region.word(header));
        let word = codec::pack(size, true);
        heap.region.set_word(header, word);
        heap.region.set_word(codec::footer_of(header, size), word);
        assert!(!heap.check());
        assert_eq!(last_check_failure(&heap), "listed_block_not_free");
    }
}
