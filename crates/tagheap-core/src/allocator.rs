//! Heap façade.
//!
//! [`Heap`] owns the managed region and the free-list index and serves
//! the four request operations: allocate, release, resize and
//! zero_allocate. Placement, splitting, coalescing and region growth
//! are internal; callers only ever see payload offsets (`0` is the null
//! offset, never a valid payload).
//!
//! Region layout once initialized:
//!
//! ```text
//!  offset 0        8                                    len-8
//!  | prologue word | block | block | ... | block | epilogue word |
//! ```
//!
//! Both sentinel words encode a zero-size allocated block, so the
//! coalescer can probe either neighbor of any real block without bounds
//! special-casing: the flag bit alone terminates the merge.

use crate::codec::{self, DWORD, MIN_BLOCK, WORD};
use crate::config::HeapConfig;
use crate::events::{EventLevel, HeapEvent};
use crate::freelist::{FreeIndex, NIL, NUM_CLASSES, class_of};
use crate::region::Region;

/// Running counters over a heap's lifetime.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapStats {
    /// Blocks currently allocated.
    pub active_count: usize,
    /// Usable payload bytes currently allocated.
    pub total_allocated: usize,
    /// Requests served from an existing free block.
    pub fit_hits: u64,
    /// Requests that had to grow the region first.
    pub fit_misses: u64,
    /// Region extensions performed.
    pub grows: u64,
    /// Placements that split the chosen block.
    pub splits: u64,
    /// Coalesce calls that merged at least one neighbor.
    pub merges: u64,
}

/// A single-threaded heap allocator instance.
///
/// All state is private to the instance; callers needing to share one
/// across threads must provide their own mutual exclusion.
#[derive(Debug)]
pub struct Heap {
    pub(crate) region: Region,
    pub(crate) index: FreeIndex,
    pub(crate) initialized: bool,
    pub(crate) stats: HeapStats,
    chunk: usize,
    next_decision_id: u64,
    events: Vec<HeapEvent>,
}

impl Heap {
    /// Creates an uninitialized heap with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HeapConfig::default())
    }

    /// Creates an uninitialized heap with explicit limits.
    #[must_use]
    pub fn with_config(config: HeapConfig) -> Self {
        Self {
            region: Region::new(config.region_limit),
            index: FreeIndex::new(),
            initialized: false,
            stats: HeapStats::default(),
            chunk: config.effective_chunk(),
            next_decision_id: 1,
            events: Vec::new(),
        }
    }

    /// Installs the two sentinel words and one initial chunk of free
    /// space. Idempotent: once a heap is initialized, further calls
    /// succeed without effect. Returns `false` when the region refuses
    /// to grow.
    pub fn init(&mut self) -> bool {
        if self.initialized {
            return true;
        }
        if self.region.extend(2 * WORD).is_none() {
            self.record(
                EventLevel::Warn,
                "init",
                "sentinels_refused",
                None,
                Some(2 * WORD),
                None,
                "oom",
                "region limit below sentinel footprint",
            );
            return false;
        }
        self.region.set_word(0, codec::pack(0, true));
        self.region.set_word(WORD, codec::pack(0, true));
        self.initialized = true;
        let chunk = self.chunk;
        if self.grow(chunk).is_none() {
            self.record(
                EventLevel::Warn,
                "init",
                "initial_chunk_refused",
                None,
                Some(chunk),
                None,
                "oom",
                "region limit below initial chunk",
            );
            return false;
        }
        self.record(
            EventLevel::Debug,
            "init",
            "init",
            None,
            Some(self.region.len()),
            None,
            "success",
            format!("chunk={chunk}"),
        );
        true
    }

    /// Allocates `size` usable bytes and returns the payload offset.
    ///
    /// A zero-byte request returns `None` without touching the region.
    /// `None` otherwise means the region refused to grow; the heap's
    /// state is unchanged in that case.
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        if !self.initialized && !self.init() {
            self.record(
                EventLevel::Warn,
                "allocate",
                "init_failed",
                None,
                Some(size),
                None,
                "oom",
                "lazy initialization failed",
            );
            return None;
        }
        if size == 0 {
            self.record(
                EventLevel::Trace,
                "allocate",
                "empty_request",
                None,
                Some(0),
                None,
                "noop",
                "zero-byte request",
            );
            return None;
        }
        let Some(asize) = aligned_request(size) else {
            self.record(
                EventLevel::Warn,
                "allocate",
                "size_overflow",
                None,
                Some(size),
                None,
                "denied",
                "request too large to round up",
            );
            return None;
        };
        let class = class_of(asize);
        let header = match self.find_fit(asize) {
            Some(header) => {
                self.stats.fit_hits += 1;
                header
            }
            None => {
                self.stats.fit_misses += 1;
                let Some(header) = self.grow(asize.max(self.chunk)) else {
                    self.record(
                        EventLevel::Warn,
                        "allocate",
                        "region_exhausted",
                        None,
                        Some(asize),
                        Some(class),
                        "oom",
                        format!(
                            "region_len={} limit={}",
                            self.region.len(),
                            self.region.limit()
                        ),
                    );
                    return None;
                };
                header
            }
        };
        self.place(header, asize);
        let block_size = codec::word_size(self.region.word(header));
        self.stats.active_count += 1;
        self.stats.total_allocated += codec::payload_len(block_size);
        let payload = codec::payload_of(header);
        self.record(
            EventLevel::Trace,
            "allocate",
            "alloc",
            Some(payload),
            Some(size),
            Some(class),
            "success",
            format!("block_size={block_size}"),
        );
        Some(payload)
    }

    /// Releases the block whose payload starts at `ptr`.
    ///
    /// The null offset `0` is ignored. Releasing a block that is
    /// already free is a defined no-op, recorded as a warning, as is an
    /// offset that does not name a block this heap handed out.
    pub fn release(&mut self, ptr: usize) {
        if ptr == 0 {
            self.record(
                EventLevel::Trace,
                "release",
                "release_null",
                Some(0),
                None,
                None,
                "noop",
                "null offset",
            );
            return;
        }
        let Some(header) = self.block_at(ptr) else {
            self.record(
                EventLevel::Warn,
                "release",
                "foreign_offset",
                Some(ptr),
                None,
                None,
                "ignored",
                "offset does not name a block",
            );
            return;
        };
        let (size, alloc) = codec::unpack(self.region.word(header));
        if !alloc {
            self.record(
                EventLevel::Warn,
                "release",
                "double_release",
                Some(ptr),
                Some(size),
                None,
                "ignored",
                "block already free",
            );
            return;
        }
        self.stats.active_count = self.stats.active_count.saturating_sub(1);
        self.stats.total_allocated = self
            .stats
            .total_allocated
            .saturating_sub(codec::payload_len(size));
        self.write_tags(header, size, false);
        let merged = self.coalesce(header);
        self.record(
            EventLevel::Trace,
            "release",
            "release",
            Some(ptr),
            Some(size),
            Some(class_of(size)),
            "success",
            format!("merged_header={merged}"),
        );
    }

    /// Resizes the block at `ptr` to `size` usable bytes.
    ///
    /// `size == 0` behaves as [`Heap::release`] and returns `None`;
    /// `ptr == 0` behaves as [`Heap::allocate`]. Otherwise the contents
    /// move to a fresh block, with `min(size, old payload)` bytes
    /// preserved; on allocation failure the original block is left
    /// untouched and `None` is returned.
    pub fn resize(&mut self, ptr: usize, size: usize) -> Option<usize> {
        if size == 0 {
            self.release(ptr);
            self.record(
                EventLevel::Trace,
                "resize",
                "resize_zero_as_release",
                Some(ptr),
                Some(0),
                None,
                "released",
                "zero-byte resize",
            );
            return None;
        }
        if ptr == 0 {
            return self.allocate(size);
        }
        let Some(header) = self.block_at(ptr) else {
            self.record(
                EventLevel::Warn,
                "resize",
                "foreign_offset",
                Some(ptr),
                Some(size),
                None,
                "denied",
                "offset does not name a block",
            );
            return None;
        };
        let (old_size, alloc) = codec::unpack(self.region.word(header));
        if !alloc {
            self.record(
                EventLevel::Warn,
                "resize",
                "resize_freed_block",
                Some(ptr),
                Some(size),
                None,
                "denied",
                "source block is free",
            );
            return None;
        }
        let Some(new_ptr) = self.allocate(size) else {
            self.record(
                EventLevel::Warn,
                "resize",
                "resize_alloc_failed",
                Some(ptr),
                Some(size),
                None,
                "oom",
                "original block left untouched",
            );
            return None;
        };
        let copied = size.min(codec::payload_len(old_size));
        self.region.copy(ptr, new_ptr, copied);
        self.release(ptr);
        self.record(
            EventLevel::Trace,
            "resize",
            "resize_move",
            Some(new_ptr),
            Some(size),
            None,
            "success",
            format!("from={ptr} copied={copied}"),
        );
        Some(new_ptr)
    }

    /// Allocates room for `count` objects of `size` bytes each and
    /// zero-fills the payload. Fails with `None`, before any region
    /// growth, when `count * size` overflows.
    pub fn zero_allocate(&mut self, count: usize, size: usize) -> Option<usize> {
        let Some(total) = count.checked_mul(size) else {
            self.record(
                EventLevel::Warn,
                "zero_allocate",
                "mul_overflow",
                None,
                None,
                None,
                "denied",
                format!("count={count} elem_size={size}"),
            );
            return None;
        };
        let ptr = self.allocate(total)?;
        self.region.fill(ptr, total, 0);
        self.record(
            EventLevel::Trace,
            "zero_allocate",
            "zeroed",
            Some(ptr),
            Some(total),
            None,
            "success",
            format!("count={count} elem_size={size}"),
        );
        Some(ptr)
    }

    /// Borrows the usable payload of the allocated block at `ptr`.
    ///
    /// `None` when the offset does not name a currently allocated block.
    #[must_use]
    pub fn payload(&self, ptr: usize) -> Option<&[u8]> {
        let header = self.block_at(ptr)?;
        let (size, alloc) = codec::unpack(self.region.word(header));
        if !alloc {
            return None;
        }
        Some(self.region.slice(ptr, codec::payload_len(size)))
    }

    /// Mutably borrows the usable payload of the allocated block at
    /// `ptr`.
    pub fn payload_mut(&mut self, ptr: usize) -> Option<&mut [u8]> {
        let header = self.block_at(ptr)?;
        let (size, alloc) = codec::unpack(self.region.word(header));
        if !alloc {
            return None;
        }
        Some(self.region.slice_mut(ptr, codec::payload_len(size)))
    }

    /// Running lifetime counters.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Current region length in bytes.
    #[must_use]
    pub fn region_len(&self) -> usize {
        self.region.len()
    }

    /// Whether [`Heap::init`] has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Recorded lifecycle events.
    #[must_use]
    pub fn events(&self) -> &[HeapEvent] {
        &self.events
    }

    /// Drains and returns the recorded lifecycle events.
    pub fn drain_events(&mut self) -> Vec<HeapEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Scans every class from the request's own class through the
    /// catch-all, first fit within each class.
    fn find_fit(&self, asize: usize) -> Option<usize> {
        for class in class_of(asize)..NUM_CLASSES {
            let mut cursor = self.index.head(class);
            while cursor != NIL {
                let size = codec::word_size(self.region.word(cursor));
                if size >= asize {
                    return Some(cursor);
                }
                cursor = FreeIndex::next_of(&self.region, cursor);
            }
        }
        None
    }

    /// Carves `asize` bytes out of the free block at `header`. The
    /// remainder becomes a new free block when it can stand on its own;
    /// otherwise the whole block is handed out.
    fn place(&mut self, header: usize, asize: usize) {
        let total = codec::word_size(self.region.word(header));
        self.index.remove(&mut self.region, header);
        if total - asize >= MIN_BLOCK {
            self.write_tags(header, asize, true);
            let rest = codec::next_physical(header, asize);
            self.write_tags(rest, total - asize, false);
            self.index.insert(&mut self.region, rest);
            self.stats.splits += 1;
        } else {
            self.write_tags(header, total, true);
        }
    }

    /// Merges the free block at `header` with free physical neighbors,
    /// discovered through the boundary tags on either side. The merged
    /// block is inserted into the index exactly once, at its final
    /// size. Returns the merged block's header offset.
    fn coalesce(&mut self, header: usize) -> usize {
        let mut size = codec::word_size(self.region.word(header));
        let (prev_size, prev_alloc) = codec::unpack(self.region.word(header - WORD));
        let next = codec::next_physical(header, size);
        let (next_size, next_alloc) = codec::unpack(self.region.word(next));

        let merged = match (prev_alloc, next_alloc) {
            (true, true) => header,
            (true, false) => {
                self.index.remove(&mut self.region, next);
                size += next_size;
                self.stats.merges += 1;
                header
            }
            (false, true) => {
                let prev = codec::prev_physical(header, prev_size);
                self.index.remove(&mut self.region, prev);
                size += prev_size;
                self.stats.merges += 1;
                prev
            }
            (false, false) => {
                let prev = codec::prev_physical(header, prev_size);
                self.index.remove(&mut self.region, prev);
                self.index.remove(&mut self.region, next);
                size += prev_size + next_size;
                self.stats.merges += 1;
                prev
            }
        };
        self.write_tags(merged, size, false);
        self.index.insert(&mut self.region, merged);
        merged
    }

    /// Extends the region by at least `min_bytes`, installs the granted
    /// span as one free block over the old epilogue, terminates the
    /// region with a fresh epilogue, and coalesces. `None` leaves the
    /// region untouched.
    fn grow(&mut self, min_bytes: usize) -> Option<usize> {
        let bytes = codec::round_up(min_bytes, DWORD);
        let old_end = self.region.extend(bytes)?;
        let header = old_end - WORD;
        self.write_tags(header, bytes, false);
        let epilogue = self.region.len() - WORD;
        self.region.set_word(epilogue, codec::pack(0, true));
        self.stats.grows += 1;
        self.record(
            EventLevel::Debug,
            "grow",
            "region_extended",
            Some(header),
            Some(bytes),
            None,
            "success",
            format!("region_len={}", self.region.len()),
        );
        Some(self.coalesce(header))
    }

    /// Writes matching header and footer words for a block.
    fn write_tags(&mut self, header: usize, size: usize, alloc: bool) {
        let word = codec::pack(size, alloc);
        self.region.set_word(header, word);
        self.region.set_word(codec::footer_of(header, size), word);
    }

    /// Resolves a payload offset to its block header, rejecting offsets
    /// that cannot name a block of this heap: misaligned, out of range,
    /// or carrying an implausible size tag.
    fn block_at(&self, ptr: usize) -> Option<usize> {
        if !self.initialized || ptr < DWORD || ptr % DWORD != 0 {
            return None;
        }
        let header = codec::header_of(ptr);
        if header + WORD > self.region.len() {
            return None;
        }
        let (size, _) = codec::unpack(self.region.word(header));
        if size < MIN_BLOCK || size % DWORD != 0 {
            return None;
        }
        // The size tag is untrusted until the extent check passes.
        let end = header.checked_add(size)?.checked_add(WORD)?;
        (end <= self.region.len()).then_some(header)
    }

    pub(crate) fn record(
        &mut self,
        level: EventLevel,
        symbol: &'static str,
        event: &'static str,
        offset: Option<usize>,
        size: Option<usize>,
        class: Option<usize>,
        outcome: &'static str,
        details: impl Into<String>,
    ) {
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        let trace_id = format!("core::heap::{symbol}::{decision_id:016x}");
        self.events.push(HeapEvent {
            decision_id,
            trace_id,
            level,
            symbol,
            event,
            offset,
            size,
            class,
            outcome,
            details: details.into(),
            active_count: self.stats.active_count,
            total_allocated: self.stats.total_allocated,
        });
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// Adjusted block size for a request: overhead added, clamped to the
/// block minimum, rounded to the alignment unit. `None` on arithmetic
/// overflow.
fn aligned_request(size: usize) -> Option<usize> {
    let needed = size.checked_add(DWORD)?.max(MIN_BLOCK);
    let rounded = needed.checked_add(DWORD - 1)? & !(DWORD - 1);
    Some(rounded)
}
