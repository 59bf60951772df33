//! Header for all heap blocks
//!
//! Every block, free or used, starts with a header recording its
//! total size (header included), whether it is free and the next
//! block in address order. The payload handed to clients starts
//! immediately after the header.

use std::mem::size_of;
use std::ptr;

use super::block::REGION_ALIGN;

/// Alignment unit for payload sizes
pub const ALIGNMENT: usize = size_of::<usize>();

/// Bytes occupied by a block header
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Smallest fragment worth splitting off: its own header plus one
/// alignment unit of payload
pub const MIN_SPLIT: usize = HEADER_SIZE + ALIGNMENT;

/// Round `size` up to the next multiple of the word size
pub fn align_size(size: usize) -> Option<usize> {
    size.checked_add(ALIGNMENT - 1).map(|s| s & !(ALIGNMENT - 1))
}

/// Block header
#[repr(C)]
#[derive(Debug)]
pub struct BlockHeader {
    /// Total size in bytes including this header
    size: usize,
    /// Next block in address order
    next: *mut BlockHeader,
    /// Available for allocation
    free: bool,
}

impl BlockHeader {
    pub fn new(size: usize, free: bool, next: *mut BlockHeader) -> Self {
        BlockHeader { size, next, free }
    }

    /// Write a fresh header at `at`
    ///
    /// # Safety
    ///
    /// `at` must be aligned for `BlockHeader` and valid for writes of
    /// `HEADER_SIZE` bytes.
    pub unsafe fn write_at(at: *mut u8, size: usize, free: bool, next: *mut BlockHeader) -> *mut BlockHeader {
        debug_assert_eq!(at as usize % REGION_ALIGN, 0);
        let header = at as *mut BlockHeader;
        ptr::write(header, BlockHeader::new(size, free, next));
        header
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    /// Usable payload bytes
    pub fn capacity(&self) -> usize {
        self.size - HEADER_SIZE
    }

    pub fn is_free(&self) -> bool {
        self.free
    }

    pub fn set_free(&mut self, free: bool) {
        self.free = free;
    }

    pub fn next(&self) -> *mut BlockHeader {
        self.next
    }

    pub fn set_next(&mut self, next: *mut BlockHeader) {
        self.next = next;
    }

    /// Address of the first byte after this block
    pub fn end(&self) -> usize {
        self as *const BlockHeader as usize + self.size
    }

    /// Payload address for a header
    pub fn payload(header: *mut BlockHeader) -> *mut u8 {
        (header as *mut u8).wrapping_add(HEADER_SIZE)
    }
}
