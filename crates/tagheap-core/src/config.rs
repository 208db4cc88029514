//! Heap configuration.
//!
//! Construction-time knobs only; a heap never changes its limits after
//! it is built. Independent instances with different configurations can
//! coexist, which keeps exhaustion paths testable with tiny regions.

use crate::codec::{CHUNK, DWORD, MIN_BLOCK, round_up};

/// Construction-time limits for a [`crate::Heap`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Hard ceiling on the managed region in bytes. Growth past this
    /// fails the way an exhausted address space would.
    pub region_limit: usize,
    /// Minimum extension granularity for the region in bytes.
    pub chunk: usize,
}

impl HeapConfig {
    /// Chunk size clamped to a legal block size.
    #[must_use]
    pub(crate) fn effective_chunk(&self) -> usize {
        round_up(self.chunk.max(MIN_BLOCK), DWORD)
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            region_limit: 64 * 1024 * 1024,
            chunk: CHUNK,
        }
    }
}
