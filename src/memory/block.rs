//! Regions of memory acquired from the OS
//!
//! The backing store knows nothing about blocks or free lists. It
//! hands out coarse, word-aligned regions on request and gives them
//! back to the platform allocator when they are dropped.

use std::alloc::{alloc, dealloc, Layout};
use std::mem::align_of;
use std::ptr::NonNull;

use thiserror::Error;

/// Alignment of every region and of every block header within it
pub const REGION_ALIGN: usize = align_of::<usize>();

/// A region of memory allocated by the OS / upstream allocator
#[derive(Debug, PartialEq)]
pub struct Region {
    /// Pointer to memory
    ptr: NonNull<u8>,
    /// Size of region
    size: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("region size must be a non-zero multiple of the word size")]
    BadSize,
    #[error("platform allocator refused the request")]
    OOM,
    #[error("backing store limit of {limit} bytes reached ({requested} more requested)")]
    LimitExceeded { limit: usize, requested: usize },
}

impl Region {
    pub fn new(size: usize) -> Result<Self, BlockError> {
        if size == 0 || size % REGION_ALIGN != 0 {
            Err(BlockError::BadSize)
        } else {
            Ok(Region {
                ptr: Self::alloc_region(size)?,
                size,
            })
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Address one past the final byte
    pub fn end(&self) -> usize {
        self.ptr.as_ptr() as usize + self.size
    }

    /// True if `address` falls inside this region
    pub fn contains(&self, address: usize) -> bool {
        let start = self.ptr.as_ptr() as usize;
        address >= start && address < self.end()
    }

    /// Byte offset of `address` within the region, if it lies inside
    pub fn offset_of(&self, address: usize) -> Option<usize> {
        if self.contains(address) {
            Some(address - self.ptr.as_ptr() as usize)
        } else {
            None
        }
    }

    fn alloc_region(size: usize) -> Result<NonNull<u8>, BlockError> {
        let layout = Layout::from_size_align(size, REGION_ALIGN).map_err(|_| BlockError::BadSize)?;
        // SAFETY: layout has non-zero size (checked in `new`)
        let ptr = unsafe { alloc(layout) };
        NonNull::new(ptr).ok_or(BlockError::OOM)
    }

    fn dealloc_region(ptr: NonNull<u8>, size: usize) {
        unsafe {
            dealloc(
                ptr.as_ptr(),
                Layout::from_size_align_unchecked(size, REGION_ALIGN),
            )
        }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        Self::dealloc_region(self.ptr, self.size);
    }
}

/// Source of coarse memory for a heap: "give me N more bytes"
pub trait BackingStore {
    /// Acquire a fresh region of exactly `bytes` bytes
    fn acquire(&mut self, bytes: usize) -> Result<Region, BlockError>;

    /// Total bytes handed out so far
    fn acquired(&self) -> usize;

    /// Upper bound on total bytes, if any
    fn limit(&self) -> Option<usize> {
        None
    }
}

/// Backing store drawing on the platform allocator, optionally capped
#[derive(Debug, Default)]
pub struct SystemStore {
    acquired: usize,
    limit: Option<usize>,
}

impl SystemStore {
    pub fn new() -> Self {
        SystemStore::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        SystemStore {
            acquired: 0,
            limit: Some(limit),
        }
    }
}

impl BackingStore for SystemStore {
    fn acquire(&mut self, bytes: usize) -> Result<Region, BlockError> {
        if let Some(limit) = self.limit {
            let total = self.acquired.checked_add(bytes);
            if total.map_or(true, |t| t > limit) {
                return Err(BlockError::LimitExceeded {
                    limit,
                    requested: bytes,
                });
            }
        }
        let region = Region::new(bytes)?;
        self.acquired += bytes;
        Ok(region)
    }

    fn acquired(&self) -> usize {
        self.acquired
    }

    fn limit(&self) -> Option<usize> {
        self.limit
    }
}
