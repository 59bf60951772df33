//! The free-list heap implementation
//!
//! A first-fit allocator over regions acquired from a
//! [`BackingStore`]. Every block (free or used) lives on a single
//! address-ordered chain. Allocation finds the first free block large
//! enough for the request, growing the backing store if there is
//! none, and splits off any usable remainder. Freeing marks a block
//! free and then coalesces address-adjacent free blocks across the
//! whole chain.
//!
//! Payload addresses are raw pointers but are always validated
//! against the chain before their header is touched, so a foreign or
//! stale pointer is reported rather than trusted.

use std::fmt::{self, Debug, Display};
use std::ptr::{self, NonNull};
use std::slice::{from_raw_parts, from_raw_parts_mut};
use std::sync::Mutex;

use thiserror::Error;

use super::{
    block::{BackingStore, Region, SystemStore},
    header::{align_size, BlockHeader, ALIGNMENT, HEADER_SIZE, MIN_SPLIT},
};
use crate::common::errno::{EFAULT, EINVAL, ENOMEM};
use crate::text::string::{memcpy, memset};

/// Default growth quantum for the backing store
pub const HEAP_INCREMENT: usize = 4096;

/// Heap configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapConfig {
    /// Backing store grows in multiples of this many bytes
    increment: usize,
    /// Cap on total backing store bytes
    limit: Option<usize>,
    /// Byte written over every freshly allocated payload
    fill: Option<u8>,
}

impl Default for HeapConfig {
    fn default() -> Self {
        HeapConfig {
            increment: HEAP_INCREMENT,
            limit: None,
            fill: None,
        }
    }
}

impl HeapConfig {
    /// Set the growth quantum (rounded up to a whole number of words)
    pub fn with_increment(self, increment: usize) -> Self {
        HeapConfig { increment, ..self }
    }

    /// Cap the backing store at `limit` bytes
    pub fn with_limit(self, limit: usize) -> Self {
        HeapConfig {
            limit: Some(limit),
            ..self
        }
    }

    /// Poison fresh payloads with `byte`
    pub fn with_fill(self, byte: u8) -> Self {
        HeapConfig {
            fill: Some(byte),
            ..self
        }
    }

    /// Normalise the increment to a usable value
    pub fn build(self) -> Self {
        let increment = align_size(self.increment.max(ALIGNMENT)).unwrap_or(HEAP_INCREMENT);
        HeapConfig { increment, ..self }
    }

    pub fn increment(&self) -> usize {
        self.increment
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn fill(&self) -> Option<u8> {
        self.fill
    }
}

/// Snapshot of heap occupancy and activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Number of regions acquired from the backing store
    pub regions: usize,
    /// Total bytes acquired from the backing store
    pub backing_bytes: usize,
    /// Blocks on the chain
    pub blocks: usize,
    /// Blocks currently free
    pub free_blocks: usize,
    /// Bytes in used blocks (headers included)
    pub used_bytes: usize,
    /// Bytes in free blocks (headers included)
    pub free_bytes: usize,
    /// Size of the largest free block (header included)
    pub largest_free: usize,
    /// Counters since the heap was created
    pub counters: HeapCounters,
}

/// Activity counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeapCounters {
    pub allocations: u64,
    pub frees: u64,
    pub resizes: u64,
    pub resized_in_place: u64,
    pub growths: u64,
    pub merges: u64,
    pub failures: u64,
}

impl HeapStats {
    /// Percentage of backing bytes held by used blocks
    pub fn utilisation_percent(&self) -> f64 {
        if self.backing_bytes == 0 {
            0.0
        } else {
            (self.used_bytes as f64 / self.backing_bytes as f64) * 100.0
        }
    }
}

impl Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Heap Regions   : {:10}", self.regions)?;
        writeln!(f, "Heap Bytes     : {:10}", self.backing_bytes)?;
        writeln!(
            f,
            "Heap Blocks    : {:10} ({} free)",
            self.blocks, self.free_blocks
        )?;
        writeln!(
            f,
            "Used / Free    : {:10} / {}",
            self.used_bytes, self.free_bytes
        )?;
        writeln!(f, "Largest Free   : {:10}", self.largest_free)?;
        writeln!(f, "Utilisation    : {:9.1}%", self.utilisation_percent())?;
        writeln!(f, "Allocations    : {:10}", self.counters.allocations)?;
        writeln!(f, "Frees          : {:10}", self.counters.frees)?;
        writeln!(
            f,
            "Resizes        : {:10} ({} in place)",
            self.counters.resizes, self.counters.resized_in_place
        )?;
        writeln!(f, "Growths        : {:10}", self.counters.growths)?;
        writeln!(f, "Merges         : {:10}", self.counters.merges)?;
        writeln!(f, "Failures       : {:10}", self.counters.failures)
    }
}

/// Heap state at the point an allocation failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapContext {
    /// Requested allocation size that failed
    pub requested_size: usize,
    /// Regions acquired so far
    pub regions: usize,
    /// Bytes acquired so far
    pub backing_bytes: usize,
    /// Bytes sitting in free blocks
    pub free_bytes: usize,
    /// Largest free block available
    pub largest_free: usize,
    /// Backing store limit (if configured)
    pub heap_limit: Option<usize>,
}

impl HeapContext {
    /// Calculate fragmentation indicator: free bytes unusable for
    /// the request because no single block is large enough
    pub fn fragmentation_percent(&self) -> f64 {
        if self.free_bytes == 0 {
            0.0
        } else {
            (1.0 - self.largest_free as f64 / self.free_bytes as f64) * 100.0
        }
    }
}

impl Display for HeapContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to allocate {} bytes | heap: {} bytes in {} regions, {} free (largest {}), {:.1}% fragmented",
            self.requested_size,
            self.backing_bytes,
            self.regions,
            self.free_bytes,
            self.largest_free,
            self.fragmentation_percent(),
        )?;
        match self.heap_limit {
            Some(limit) => write!(f, " | limit: {limit} bytes"),
            None => write!(f, " | no limit"),
        }
    }
}

/// Heap-level errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HeapError {
    /// Backing store could not grow
    #[error("out of memory: {context}")]
    OutOfMemory { context: HeapContext },
    /// Zero byte requests issue no pointer
    #[error("zero-sized allocation requested")]
    ZeroSize,
    /// `count * size` does not fit in a usize
    #[error("allocation of {count} x {size} bytes overflows")]
    SizeOverflow { count: usize, size: usize },
    /// Address was not issued by this heap (or is no longer live)
    #[error("pointer {address:#x} was not allocated by this heap")]
    InvalidPointer { address: usize },
    /// Address was already freed
    #[error("pointer {address:#x} freed twice")]
    DoubleFree { address: usize },
    /// Integrity check failed
    #[error("heap corrupt: {0}")]
    Corrupt(String),
}

impl HeapError {
    /// Equivalent C errno value
    pub fn errno(&self) -> i32 {
        match self {
            HeapError::OutOfMemory { .. } | HeapError::SizeOverflow { .. } => ENOMEM,
            HeapError::ZeroSize | HeapError::Corrupt(_) => EINVAL,
            HeapError::InvalidPointer { .. } | HeapError::DoubleFree { .. } => EFAULT,
        }
    }
}

/// One entry of the block map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Address of the header
    pub address: usize,
    /// Index of the containing region (in address order)
    pub region: usize,
    /// Offset of the header within its region
    pub offset: usize,
    /// Total size including header
    pub size: usize,
    /// Available for allocation
    pub free: bool,
}

impl BlockInfo {
    /// Payload capacity of the block
    pub fn capacity(&self) -> usize {
        self.size - HEADER_SIZE
    }
}

/// Free-list heap
///
/// Owns every region it acquires; regions are released only when
/// the heap is dropped.
pub struct Heap {
    /// Source of new regions
    store: Box<dyn BackingStore + Send>,
    /// Regions in address order
    regions: Vec<Region>,
    /// First block in address order
    head: *mut BlockHeader,
    /// Configuration
    config: HeapConfig,
    /// Activity counters
    counters: HeapCounters,
}

// SAFETY: the heap exclusively owns its regions and every header
// pointer refers into them; nothing is shared with other heaps.
unsafe impl Send for Heap {}

impl Default for Heap {
    fn default() -> Self {
        Heap::new(HeapConfig::default())
    }
}

impl Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for info in self.blocks() {
            writeln!(
                f,
                "{:#018x} r{}+{:<8} {:8} {}",
                info.address,
                info.region,
                info.offset,
                info.size,
                if info.free { "free" } else { "used" }
            )?;
        }
        Ok(())
    }
}

impl Heap {
    /// Heap drawing on the platform allocator
    pub fn new(config: HeapConfig) -> Self {
        let config = config.build();
        let store = match config.limit() {
            Some(limit) => SystemStore::with_limit(limit),
            None => SystemStore::new(),
        };
        Heap::with_store(config, Box::new(store))
    }

    /// Heap drawing on a custom backing store
    pub fn with_store(config: HeapConfig, store: Box<dyn BackingStore + Send>) -> Self {
        Heap {
            store,
            regions: vec![],
            head: ptr::null_mut(),
            config: config.build(),
            counters: HeapCounters::default(),
        }
    }

    /// Wrap in a mutex for use across threads
    pub fn shared(self) -> SharedHeap {
        SharedHeap(Mutex::new(self))
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Allocate at least `size` usable bytes
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, HeapError> {
        if size == 0 {
            return Err(HeapError::ZeroSize);
        }

        let total = match align_size(size).and_then(|s| s.checked_add(HEADER_SIZE)) {
            Some(total) => total,
            None => {
                self.counters.failures += 1;
                debug!("allocation of {} bytes failed: size overflows", size);
                return Err(self.out_of_memory_error(size));
            }
        };

        let block = match self.find_free_block(total) {
            Some(block) => block,
            None => self.expand_heap(size, total).map_err(|e| {
                self.counters.failures += 1;
                debug!("allocation of {} bytes failed: {}", size, e);
                e
            })?,
        };

        unsafe {
            (*block).set_free(false);
            self.split_block(block, total);
        }

        let payload = BlockHeader::payload(block);
        if let Some(byte) = self.config.fill() {
            let capacity = unsafe { (*block).capacity() };
            let bytes = unsafe { from_raw_parts_mut(payload, capacity) };
            memset(bytes, byte, capacity);
        }

        self.counters.allocations += 1;
        trace!(
            "allocate {} -> {:p} ({} byte block)",
            size,
            payload,
            unsafe { (*block).size() }
        );

        // SAFETY: payload lies inside a live region
        Ok(unsafe { NonNull::new_unchecked(payload) })
    }

    /// Allocate `count * size` bytes, zero filled
    pub fn zero_allocate(&mut self, count: usize, size: usize) -> Result<NonNull<u8>, HeapError> {
        let total = count
            .checked_mul(size)
            .ok_or(HeapError::SizeOverflow { count, size })?;
        let ptr = self.allocate(total)?;
        let bytes = unsafe { from_raw_parts_mut(ptr.as_ptr(), total) };
        memset(bytes, 0, total);
        Ok(ptr)
    }

    /// Grow (or keep) an allocation
    ///
    /// `None` allocates afresh, a zero size frees and returns `None`.
    /// If the existing capacity suffices the same pointer comes back
    /// unchanged. Otherwise the contents move to a new block; if that
    /// allocation fails the original block is left untouched.
    pub fn resize(
        &mut self,
        ptr: Option<NonNull<u8>>,
        size: usize,
    ) -> Result<Option<NonNull<u8>>, HeapError> {
        let ptr = match ptr {
            None => return self.allocate(size).map(Some),
            Some(ptr) => ptr,
        };

        if size == 0 {
            self.free(Some(ptr))?;
            return Ok(None);
        }

        let block = self.find_live_block(ptr)?;
        let old_capacity = unsafe { (*block).capacity() };
        self.counters.resizes += 1;

        if old_capacity >= size {
            self.counters.resized_in_place += 1;
            trace!("resize {:p} to {} in place", ptr, size);
            return Ok(Some(ptr));
        }

        let new_ptr = self.allocate(size)?;
        let keep = old_capacity.min(size);
        unsafe {
            let src = from_raw_parts(ptr.as_ptr(), keep);
            let dst = from_raw_parts_mut(new_ptr.as_ptr(), keep);
            memcpy(dst, src, keep);
        }
        self.free(Some(ptr))?;
        trace!("resize {:p} to {} moved to {:p}", ptr, size, new_ptr);
        Ok(Some(new_ptr))
    }

    /// Return a block to the free list
    pub fn free(&mut self, ptr: Option<NonNull<u8>>) -> Result<(), HeapError> {
        let ptr = match ptr {
            None => return Ok(()),
            Some(ptr) => ptr,
        };

        let block = self.find_block(ptr)?;
        unsafe {
            if (*block).is_free() {
                return Err(HeapError::DoubleFree {
                    address: ptr.as_ptr() as usize,
                });
            }
            (*block).set_free(true);
        }

        let merges = self.merge_blocks();
        self.counters.frees += 1;
        self.counters.merges += merges as u64;
        trace!("free {:p} ({} merges)", ptr, merges);
        Ok(())
    }

    /// Payload capacity of a live allocation
    pub fn capacity(&self, ptr: NonNull<u8>) -> Result<usize, HeapError> {
        let block = self.find_live_block(ptr)?;
        Ok(unsafe { (*block).capacity() })
    }

    /// View the payload of a live allocation
    pub fn payload(&self, ptr: NonNull<u8>) -> Result<&[u8], HeapError> {
        let capacity = self.capacity(ptr)?;
        Ok(unsafe { from_raw_parts(ptr.as_ptr(), capacity) })
    }

    /// Mutably view the payload of a live allocation
    pub fn payload_mut(&mut self, ptr: NonNull<u8>) -> Result<&mut [u8], HeapError> {
        let capacity = self.capacity(ptr)?;
        Ok(unsafe { from_raw_parts_mut(ptr.as_ptr(), capacity) })
    }

    /// Copy a C string (up to its first NUL) into a fresh allocation,
    /// NUL terminated
    pub fn strdup(&mut self, s: &[u8]) -> Result<NonNull<u8>, HeapError> {
        self.strndup(s, usize::MAX)
    }

    /// As `strdup` but copying at most `n` bytes
    pub fn strndup(&mut self, s: &[u8], n: usize) -> Result<NonNull<u8>, HeapError> {
        let len = crate::text::string::strlen(s).min(n);
        let ptr = self.allocate(len + 1)?;
        let dst = self.payload_mut(ptr)?;
        memcpy(dst, s, len);
        dst[len] = 0;
        Ok(ptr)
    }

    /// Address-ordered block map
    pub fn blocks(&self) -> Vec<BlockInfo> {
        let mut infos = vec![];
        let mut current = self.head;
        while !current.is_null() {
            let address = current as usize;
            let (region, offset) = self
                .region_of(address)
                .map(|i| (i, address - self.regions[i].as_ptr() as usize))
                .unwrap_or((usize::MAX, 0));
            unsafe {
                infos.push(BlockInfo {
                    address,
                    region,
                    offset,
                    size: (*current).size(),
                    free: (*current).is_free(),
                });
                current = (*current).next();
            }
        }
        infos
    }

    /// Statistics
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            regions: self.regions.len(),
            backing_bytes: self.regions.iter().map(Region::size).sum(),
            counters: self.counters.clone(),
            ..HeapStats::default()
        };
        for info in self.blocks() {
            stats.blocks += 1;
            if info.free {
                stats.free_blocks += 1;
                stats.free_bytes += info.size;
                stats.largest_free = stats.largest_free.max(info.size);
            } else {
                stats.used_bytes += info.size;
            }
        }
        stats
    }

    /// Verify the chain invariants
    ///
    /// Blocks must be in strictly increasing address order, each must
    /// be at least a header in size and word aligned, the blocks of
    /// each region must tile it exactly, and no two contiguous blocks
    /// may both be free.
    pub fn check(&self) -> Result<(), HeapError> {
        let blocks = self.blocks();
        let mut covered = vec![0usize; self.regions.len()];

        for (i, info) in blocks.iter().enumerate() {
            if info.region == usize::MAX {
                return Err(HeapError::Corrupt(format!(
                    "block {:#x} lies outside every region",
                    info.address
                )));
            }
            if info.size < HEADER_SIZE || info.size % ALIGNMENT != 0 {
                return Err(HeapError::Corrupt(format!(
                    "block {:#x} has bad size {}",
                    info.address, info.size
                )));
            }
            if info.offset != covered[info.region] {
                return Err(HeapError::Corrupt(format!(
                    "block {:#x} does not follow its predecessor",
                    info.address
                )));
            }
            covered[info.region] += info.size;

            if let Some(next) = blocks.get(i + 1) {
                if next.address <= info.address {
                    return Err(HeapError::Corrupt(format!(
                        "chain out of address order at {:#x}",
                        info.address
                    )));
                }
                if info.free && next.free && next.region == info.region {
                    return Err(HeapError::Corrupt(format!(
                        "adjacent free blocks at {:#x} and {:#x}",
                        info.address, next.address
                    )));
                }
            }
        }

        for (region, bytes) in self.regions.iter().zip(covered) {
            if region.size() != bytes {
                return Err(HeapError::Corrupt(format!(
                    "region {:p} covers {} of {} bytes",
                    region.as_ptr(),
                    bytes,
                    region.size()
                )));
            }
        }

        Ok(())
    }
}

impl Heap {
    /// First fit
    fn find_free_block(&self, total: usize) -> Option<*mut BlockHeader> {
        let mut current = self.head;
        while !current.is_null() {
            unsafe {
                if (*current).is_free() && (*current).size() >= total {
                    return Some(current);
                }
                current = (*current).next();
            }
        }
        None
    }

    /// Locate the block whose payload is `ptr`
    fn find_block(&self, ptr: NonNull<u8>) -> Result<*mut BlockHeader, HeapError> {
        let address = ptr.as_ptr() as usize;
        let invalid = HeapError::InvalidPointer { address };

        if self.region_of(address).is_none() {
            return Err(invalid);
        }

        let mut current = self.head;
        while !current.is_null() {
            let payload = BlockHeader::payload(current) as usize;
            if payload == address {
                return Ok(current);
            }
            if payload > address {
                break;
            }
            current = unsafe { (*current).next() };
        }
        Err(invalid)
    }

    /// Locate a block that is currently allocated
    fn find_live_block(&self, ptr: NonNull<u8>) -> Result<*mut BlockHeader, HeapError> {
        let block = self.find_block(ptr)?;
        if unsafe { (*block).is_free() } {
            Err(HeapError::InvalidPointer {
                address: ptr.as_ptr() as usize,
            })
        } else {
            Ok(block)
        }
    }

    /// Split off the tail of `block` beyond `total` bytes if it can
    /// hold a header plus an alignment unit
    unsafe fn split_block(&mut self, block: *mut BlockHeader, total: usize) {
        let size = (*block).size();
        if size - total >= MIN_SPLIT {
            let at = (block as *mut u8).add(total);
            let remainder = BlockHeader::write_at(at, size - total, true, (*block).next());
            (*block).set_size(total);
            (*block).set_next(remainder);
        }
    }

    /// Merge free neighbours that are contiguous within one region,
    /// repeating until a full sweep makes no change
    fn merge_blocks(&mut self) -> usize {
        let mut merges = 0;
        let mut current = self.head;
        unsafe {
            while !current.is_null() {
                let next = (*current).next();
                if next.is_null() {
                    break;
                }
                if (*current).is_free()
                    && (*next).is_free()
                    && (*current).end() == next as usize
                    && !self.is_region_start(next as usize)
                {
                    (*current).set_size((*current).size() + (*next).size());
                    (*current).set_next((*next).next());
                    merges += 1;
                    continue;
                }
                current = next;
            }
        }
        merges
    }

    /// Acquire a new region big enough for `total` bytes and link it
    /// into the chain as a single free block
    fn expand_heap(&mut self, size: usize, total: usize) -> Result<*mut BlockHeader, HeapError> {
        let increment = self.config.increment();
        let bytes = total
            .checked_add(increment - 1)
            .map(|t| (t / increment) * increment)
            .ok_or_else(|| self.out_of_memory_error(size))?;

        let region = self.store.acquire(bytes).map_err(|e| {
            debug!("backing store refused {} bytes: {}", bytes, e);
            self.out_of_memory_error(size)
        })?;

        let at = region.as_ptr();
        let position = self
            .regions
            .binary_search_by_key(&(at as usize), |r| r.as_ptr() as usize)
            .unwrap_or_else(|p| p);
        self.regions.insert(position, region);

        let block = unsafe { BlockHeader::write_at(at, bytes, true, ptr::null_mut()) };
        self.link(block);
        self.counters.growths += 1;

        debug!(
            "heap grew by {} bytes for a {} byte block ({} regions, {} bytes)",
            bytes,
            total,
            self.regions.len(),
            self.store.acquired()
        );
        Ok(block)
    }

    /// Insert a block into the chain at its address-ordered position
    fn link(&mut self, block: *mut BlockHeader) {
        unsafe {
            if self.head.is_null() || (block as usize) < (self.head as usize) {
                (*block).set_next(self.head);
                self.head = block;
                return;
            }
            let mut current = self.head;
            loop {
                let next = (*current).next();
                if next.is_null() || (block as usize) < (next as usize) {
                    (*block).set_next(next);
                    (*current).set_next(block);
                    return;
                }
                current = next;
            }
        }
    }

    /// Index of the region containing `address`
    fn region_of(&self, address: usize) -> Option<usize> {
        let position = self
            .regions
            .partition_point(|r| (r.as_ptr() as usize) <= address);
        if position == 0 {
            return None;
        }
        let index = position - 1;
        if self.regions[index].contains(address) {
            Some(index)
        } else {
            None
        }
    }

    fn is_region_start(&self, address: usize) -> bool {
        self.regions
            .binary_search_by_key(&address, |r| r.as_ptr() as usize)
            .is_ok()
    }

    /// Create heap context for error reporting
    fn create_heap_context(&self, requested_size: usize) -> HeapContext {
        let stats = self.stats();
        HeapContext {
            requested_size,
            regions: stats.regions,
            backing_bytes: stats.backing_bytes,
            free_bytes: stats.free_bytes,
            largest_free: stats.largest_free,
            heap_limit: self.store.limit(),
        }
    }

    /// Create contextual OutOfMemory error
    fn out_of_memory_error(&self, requested_size: usize) -> HeapError {
        HeapError::OutOfMemory {
            context: self.create_heap_context(requested_size),
        }
    }
}

/// A heap behind a single mutex, so that allocate, free and resize
/// each run as one indivisible unit
pub struct SharedHeap(Mutex<Heap>);

impl SharedHeap {
    /// Run `f` with exclusive access to the heap
    pub fn with<R>(&self, f: impl FnOnce(&mut Heap) -> R) -> R {
        let mut heap = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut heap)
    }

    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, HeapError> {
        self.with(|heap| heap.allocate(size))
    }

    pub fn zero_allocate(&self, count: usize, size: usize) -> Result<NonNull<u8>, HeapError> {
        self.with(|heap| heap.zero_allocate(count, size))
    }

    pub fn resize(
        &self,
        ptr: Option<NonNull<u8>>,
        size: usize,
    ) -> Result<Option<NonNull<u8>>, HeapError> {
        self.with(|heap| heap.resize(ptr, size))
    }

    pub fn free(&self, ptr: Option<NonNull<u8>>) -> Result<(), HeapError> {
        self.with(|heap| heap.free(ptr))
    }

    pub fn stats(&self) -> HeapStats {
        self.with(|heap| heap.stats())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    fn heap() -> Heap {
        Heap::new(HeapConfig::default())
    }

    #[test]
    pub fn test_zero_size_issues_nothing() {
        let mut heap = heap();
        assert_eq!(heap.allocate(0), Err(HeapError::ZeroSize));
        assert_eq!(heap.stats().regions, 0);
    }

    #[test]
    pub fn test_first_allocation_grows_one_increment() {
        let mut heap = heap();
        let ptr = heap.allocate(10).unwrap();

        let blocks = heap.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].size, align_size(10).unwrap() + HEADER_SIZE);
        assert!(!blocks[0].free);
        assert!(blocks[1].free);
        assert_eq!(blocks[0].size + blocks[1].size, HEAP_INCREMENT);
        assert_eq!(
            ptr.as_ptr() as usize - blocks[0].address,
            HEADER_SIZE,
            "payload sits directly after the header"
        );
        heap.check().unwrap();
    }

    #[test]
    pub fn test_first_fit_reuses_freed_block() {
        let mut heap = heap();
        let a = heap.allocate(64).unwrap();
        let _b = heap.allocate(64).unwrap();
        heap.free(Some(a)).unwrap();
        let c = heap.allocate(32).unwrap();
        assert_eq!(a, c);
        heap.check().unwrap();
    }

    #[test]
    pub fn test_no_split_for_small_remainder() {
        let mut heap = heap();
        let a = heap.allocate(64).unwrap();
        let _guard = heap.allocate(8).unwrap();
        heap.free(Some(a)).unwrap();

        // 64 byte payload block; a 64 - 8 byte payload leaves exactly one
        // word: too small to carry a header, so the whole block is used
        let b = heap.allocate(64 - ALIGNMENT).unwrap();
        assert_eq!(a, b);
        assert_eq!(heap.capacity(b).unwrap(), 64);
        heap.check().unwrap();
    }

    #[test]
    pub fn test_large_request_grows_in_increments() {
        let mut heap = heap();
        let ptr = heap.allocate(3 * HEAP_INCREMENT).unwrap();
        assert!(heap.capacity(ptr).unwrap() >= 3 * HEAP_INCREMENT);
        let stats = heap.stats();
        assert_eq!(stats.regions, 1);
        assert_eq!(stats.backing_bytes, 4 * HEAP_INCREMENT);
        heap.check().unwrap();
    }

    #[test]
    pub fn test_free_coalesces_neighbours() {
        let mut heap = heap();
        let a = heap.allocate(100).unwrap();
        let b = heap.allocate(100).unwrap();
        let c = heap.allocate(100).unwrap();

        heap.free(Some(a)).unwrap();
        heap.free(Some(c)).unwrap();
        heap.check().unwrap();
        heap.free(Some(b)).unwrap();
        heap.check().unwrap();

        let blocks = heap.blocks();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].free);
        assert_eq!(blocks[0].size, HEAP_INCREMENT);
    }

    #[test]
    pub fn test_double_free_and_foreign_pointers() {
        let mut heap = heap();
        let a = heap.allocate(16).unwrap();
        let _b = heap.allocate(16).unwrap();
        heap.free(Some(a)).unwrap();
        assert_eq!(
            heap.free(Some(a)),
            Err(HeapError::DoubleFree {
                address: a.as_ptr() as usize
            })
        );

        let mut local = 0u8;
        let foreign = NonNull::from(&mut local);
        assert!(matches!(
            heap.free(Some(foreign)),
            Err(HeapError::InvalidPointer { .. })
        ));
        assert!(matches!(
            heap.capacity(a),
            Err(HeapError::InvalidPointer { .. })
        ));
        assert_eq!(heap.free(None), Ok(()));
    }

    #[test]
    pub fn test_resize_semantics() {
        let mut heap = heap();

        let p = heap.resize(None, 24).unwrap().unwrap();
        heap.payload_mut(p).unwrap()[..24].copy_from_slice(&[7u8; 24]);

        let same = heap.resize(Some(p), 8).unwrap().unwrap();
        assert_eq!(p, same);

        let _pin = heap.allocate(8).unwrap();
        let moved = heap.resize(Some(p), 200).unwrap().unwrap();
        assert_ne!(p, moved);
        assert_eq!(&heap.payload(moved).unwrap()[..24], &[7u8; 24]);
        assert!(matches!(
            heap.capacity(p),
            Err(HeapError::InvalidPointer { .. })
        ));

        assert_eq!(heap.resize(Some(moved), 0), Ok(None));
        let stats = heap.stats();
        assert_eq!(stats.counters.resized_in_place, 1);
        heap.check().unwrap();
    }

    #[test]
    pub fn test_failed_resize_keeps_original() {
        let mut heap = Heap::new(HeapConfig::default().with_limit(HEAP_INCREMENT));
        let p = heap.allocate(32).unwrap();
        heap.payload_mut(p).unwrap().fill(0xab);

        let result = heap.resize(Some(p), 2 * HEAP_INCREMENT);
        assert!(matches!(result, Err(HeapError::OutOfMemory { .. })));
        assert!(heap.payload(p).unwrap().iter().all(|b| *b == 0xab));
        heap.check().unwrap();
    }

    #[test]
    pub fn test_out_of_memory_context() {
        let mut heap = Heap::new(HeapConfig::default().with_limit(HEAP_INCREMENT));
        let _p = heap.allocate(1000).unwrap();
        match heap.allocate(HEAP_INCREMENT) {
            Err(HeapError::OutOfMemory { context }) => {
                assert_eq!(context.requested_size, HEAP_INCREMENT);
                assert_eq!(context.regions, 1);
                assert_eq!(context.heap_limit, Some(HEAP_INCREMENT));
                let message = HeapError::OutOfMemory { context }.to_string();
                assert!(message.starts_with("out of memory: failed to allocate 4096 bytes"));
            }
            other => panic!("expected out of memory, got {:?}", other),
        }
        assert_eq!(heap.stats().counters.failures, 1);
    }

    #[test]
    pub fn test_unrepresentable_size_counts_failure() {
        let mut heap = heap();
        for size in [usize::MAX, usize::MAX - HEADER_SIZE] {
            match heap.allocate(size) {
                Err(HeapError::OutOfMemory { context }) => {
                    assert_eq!(context.requested_size, size);
                    assert_eq!(context.regions, 0);
                }
                other => panic!("expected out of memory, got {:?}", other),
            }
        }
        let stats = heap.stats();
        assert_eq!(stats.counters.failures, 2);
        assert_eq!(stats.counters.allocations, 0);
        assert_eq!(stats.regions, 0);
    }

    #[test]
    pub fn test_zero_allocate() {
        let mut heap = Heap::new(HeapConfig::default().with_fill(0xff));
        let p = heap.zero_allocate(10, 4).unwrap();
        assert!(heap.payload(p).unwrap()[..40].iter().all(|b| *b == 0));
        assert_eq!(
            heap.zero_allocate(usize::MAX, 2),
            Err(HeapError::SizeOverflow {
                count: usize::MAX,
                size: 2
            })
        );
        assert_eq!(heap.zero_allocate(0, 8), Err(HeapError::ZeroSize));
    }

    #[test]
    pub fn test_strdup() {
        let mut heap = heap();
        let p = heap.strdup(b"hello\0ignored").unwrap();
        assert_eq!(&heap.payload(p).unwrap()[..6], b"hello\0");
        let q = heap.strndup(b"hello", 3).unwrap();
        assert_eq!(&heap.payload(q).unwrap()[..4], b"hel\0");
    }

    #[test]
    pub fn test_shared_heap() {
        let shared = std::sync::Arc::new(heap().shared());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for n in 1..50 {
                        let p = shared.allocate(n * (i + 1)).unwrap();
                        shared.free(Some(p)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        shared.with(|heap| heap.check()).unwrap();
        assert_eq!(shared.stats().counters.allocations, 4 * 49);
    }

    #[test]
    pub fn test_errno_mapping() {
        assert_eq!(HeapError::ZeroSize.errno(), EINVAL);
        assert_eq!(HeapError::SizeOverflow { count: 1, size: 1 }.errno(), ENOMEM);
        assert_eq!(HeapError::DoubleFree { address: 0 }.errno(), EFAULT);
    }
}
