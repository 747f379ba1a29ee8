//! # Implicit Allocator
//!
//! A heap allocator with an **implicit free list**: the only bookkeeping is
//! the one-word header in front of every block. Free blocks are found by
//! walking the heap from the first header, stepping over allocated and free
//! blocks alike.
//!
//! ## Memory Layout
//!
//! The allocator manages a single caller-supplied region. Blocks are laid
//! out back to back from offset 0; each starts with one machine word whose
//! low bit is the allocation status and whose remaining bits are the payload
//! size (always a multiple of 8):
//!
//! ```text
//!   offset 0                                                  heap_size
//!   ┌────────┬───────────────┬────────┬─────────┬────────┬─────────────┐
//!   │ header │    payload    │ header │ payload │ header │   payload   │
//!   │ 24|1   │   (24 bytes)  │ 8|0    │ (8 B)   │ 96|1   │  (96 bytes) │
//!   └────────┴───────────────┴────────┴─────────┴────────┴─────────────┘
//!   ▲                        ▲
//!   │                        └── next block = this block + 8 + payload
//!   └── one word: payload size | status bit (1 = allocated, 0 = free)
//! ```
//!
//! ## Allocation Strategy
//!
//! **First fit**: `malloc` walks the blocks in address order and takes the
//! first free block whose payload covers the rounded-up request. If the
//! block is larger than needed by at least a header plus the 8-byte minimum
//! payload, the excess is carved into a trailing free block:
//!
//! ```text
//!   Before malloc(8):           After malloc(8) with split:
//!   ┌────────┬──────────────┐   ┌────────┬─────────┬────────┬─────────┐
//!   │ 40|0   │   40 bytes   │   │  8|1   │  8 B    │ 24|0   │  24 B   │
//!   └────────┴──────────────┘   └────────┴─────────┴────────┴─────────┘
//! ```
//!
//! `free` clears the status bit and nothing else: neighboring free blocks
//! are **not** merged, so the walk sees them as separate blocks forever.
//!
//! ## Trade-offs
//!
//! - Minimal metadata: one word per block.
//! - `malloc` is O(number of blocks), allocated ones included.
//! - No coalescing: workloads that free adjacent blocks fragment over time.

use core::ptr;

use crate::header::Header;
use crate::{roundup, ALIGNMENT, MAX_REQUEST};

/// Size in bytes of the one-word block header.
const HEADER_SIZE: usize = 8;

/// Smallest leftover worth carving into its own free block: one header plus
/// the minimum 8-byte payload.
const MIN_SPLIT: usize = HEADER_SIZE + ALIGNMENT;

/// A first-fit allocator over a fixed region, using implicit in-place
/// headers as its only bookkeeping.
///
/// The region is supplied to [`init`](Self::init) and never grows. All
/// state lives in the instance, so independent allocators over disjoint
/// regions can coexist.
///
/// # Thread Safety
///
/// This allocator is **NOT** thread-safe. For multi-threaded usage,
/// external synchronization (e.g., a `Mutex`) is required.
pub struct ImplicitAllocator {
  /// Start address of the caller-supplied region.
  heap_start: *mut u8,

  /// Total length of the region in bytes.
  heap_size: usize,

  /// Bytes consumed by allocated blocks, headers included.
  size_used: usize,
}

impl ImplicitAllocator {
  /// Creates an allocator with no region attached.
  ///
  /// Every operation other than [`init`](Self::init) is a no-op or a
  /// failure until a region has been supplied.
  pub const fn new() -> Self {
    Self {
      heap_start: ptr::null_mut(),
      heap_size: 0,
      size_used: 0,
    }
  }

  /// Attaches the allocator to the region `[heap_start, heap_start +
  /// heap_size)` and formats it as a single free block spanning the whole
  /// region.
  ///
  /// Returns `false`, leaving the allocator unusable, if `heap_start` is
  /// null, if the region cannot hold even one header, or if its length is
  /// not a multiple of 8 (the block walk could never land exactly on the
  /// region end).
  ///
  /// Calling `init` again re-formats the new region and forgets the old
  /// one; every previously returned pointer becomes invalid.
  ///
  /// # Safety
  ///
  /// The caller must ensure:
  /// - `heap_start` is 8-byte aligned and valid for reads and writes of
  ///   `heap_size` bytes
  /// - the region stays valid, and is not accessed except through this
  ///   allocator's returned payloads, until the allocator is dropped or
  ///   re-initialized
  pub unsafe fn init(
    &mut self,
    heap_start: *mut u8,
    heap_size: usize,
  ) -> bool {
    if heap_start.is_null() {
      return false;
    }
    if heap_size < HEADER_SIZE || heap_size % ALIGNMENT != 0 {
      return false;
    }

    self.heap_start = heap_start;
    self.heap_size = heap_size;
    self.size_used = 0;

    // One free block covering everything after its own header.
    self.write_header(0, Header::free(heap_size - HEADER_SIZE));
    true
  }

  /// Allocates a block with a payload of at least `requested_size` bytes
  /// and returns a pointer to the payload, or null when the request cannot
  /// be satisfied.
  ///
  /// The request is rounded up to a multiple of 8 and served by the first
  /// free block on the walk whose payload covers it. Oversized blocks are
  /// split when the excess can stand alone as a free block.
  ///
  /// # Returns
  ///
  /// An 8-byte-aligned payload pointer, or null when:
  /// - `requested_size` is 0
  /// - the rounded size exceeds [`MAX_REQUEST`]
  /// - the rounded size would not fit in the remaining capacity
  /// - no free block is large enough (fragmentation)
  ///
  /// On a null return the heap is unchanged.
  ///
  /// # Safety
  ///
  /// [`init`](Self::init) must have succeeded and its region contract must
  /// still hold.
  pub unsafe fn malloc(
    &mut self,
    requested_size: usize,
  ) -> *mut u8 {
    if requested_size == 0 {
      return ptr::null_mut();
    }

    let size = roundup!(requested_size);
    if size > MAX_REQUEST || size + self.size_used > self.heap_size {
      return ptr::null_mut();
    }

    match self.find_fit(size) {
      Some((offset, payload)) => {
        self.size_used += self.place(offset, payload, size);
        self.payload_ptr(offset)
      }
      None => ptr::null_mut(),
    }
  }

  /// Releases the block owning the payload at `ptr`.
  ///
  /// The status bit is cleared and the usage counter adjusted; the block
  /// keeps its size and position. Adjacent free blocks are not merged.
  /// A null `ptr` is a no-op, matching C `free` semantics.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a pointer previously returned by
  /// [`malloc`](Self::malloc)/[`realloc`](Self::realloc) on this allocator
  /// and not freed since.
  pub unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) {
    if ptr.is_null() {
      return;
    }

    let offset = self.header_offset_of(ptr);
    let payload = self.header_at(offset).payload;
    self.write_header(offset, Header::free(payload));
    self.size_used -= HEADER_SIZE + payload;
  }

  /// Resizes the allocation at `old_ptr` to hold at least `new_size`
  /// bytes.
  ///
  /// # Behavior
  ///
  /// ```text
  ///   old_ptr == null            -> malloc(new_size)
  ///   new_size == 0              -> free(old_ptr), return null
  ///   rounded size fits in place -> return old_ptr unchanged (no shrink)
  ///   otherwise                  -> first-fit walk for a new block,
  ///                                 free the old one, copy the payload,
  ///                                 return the new pointer
  /// ```
  ///
  /// The first `min(old payload, new_size)` bytes are preserved across a
  /// move. When no block fits, null is returned and the heap, including
  /// the old block, is unchanged.
  ///
  /// # Safety
  ///
  /// As for [`free`](Self::free): `old_ptr` must be null or a live pointer
  /// returned by this allocator.
  pub unsafe fn realloc(
    &mut self,
    old_ptr: *mut u8,
    new_size: usize,
  ) -> *mut u8 {
    if old_ptr.is_null() {
      return unsafe { self.malloc(new_size) };
    }
    if new_size == 0 {
      unsafe { self.free(old_ptr) };
      return ptr::null_mut();
    }

    let size = roundup!(new_size);
    let old_offset = self.header_offset_of(old_ptr);
    let old_payload = self.header_at(old_offset).payload;
    if size <= old_payload {
      // The block already covers the request; it is not shrunk.
      return old_ptr;
    }
    if size > MAX_REQUEST || size + self.size_used > self.heap_size {
      return ptr::null_mut();
    }

    let (offset, payload) = match self.find_fit(size) {
      Some(fit) => fit,
      None => return ptr::null_mut(),
    };

    // The old block is released only once a fit is certain.
    unsafe { self.free(old_ptr) };
    self.size_used += self.place(offset, payload, size);

    let new_ptr = self.payload_ptr(offset);
    unsafe { ptr::copy(old_ptr, new_ptr, old_payload.min(new_size)) };
    new_ptr
  }

  /// Checks the heap's internal consistency without repairing anything.
  ///
  /// A full walk verifies that every block lies inside the region, that
  /// payload sizes are 8-aligned, that the blocks tile the region exactly,
  /// and that the usage counter matches the walk's allocated total. Each
  /// failure prints a diagnostic to stderr and yields `false`.
  ///
  /// # Safety
  ///
  /// [`init`](Self::init) must have succeeded and its region contract must
  /// still hold.
  pub unsafe fn validate_heap(&self) -> bool {
    if self.size_used > self.heap_size {
      eprintln!(
        "validate: size_used {} exceeds heap size {}",
        self.size_used, self.heap_size
      );
      return false;
    }

    let mut used = 0;
    let mut freed = 0;
    let mut offset = 0;

    while offset < self.heap_size {
      if offset + HEADER_SIZE > self.heap_size {
        eprintln!("validate: header at offset {offset} straddles the region end");
        return false;
      }

      let header = self.header_at(offset);
      if header.payload % ALIGNMENT != 0 {
        eprintln!(
          "validate: misaligned payload size {} at offset {offset}",
          header.payload
        );
        return false;
      }

      let block_end = offset + HEADER_SIZE + header.payload;
      if block_end > self.heap_size {
        eprintln!("validate: block at offset {offset} extends past the region end");
        return false;
      }

      if header.allocated {
        used += HEADER_SIZE + header.payload;
      } else {
        freed += HEADER_SIZE + header.payload;
      }

      offset = block_end;
    }

    if used + freed != self.heap_size {
      eprintln!(
        "validate: blocks cover {} bytes of a {}-byte heap",
        used + freed,
        self.heap_size
      );
      return false;
    }
    if used != self.size_used {
      eprintln!(
        "validate: walk found {used} allocated bytes but size_used is {}",
        self.size_used
      );
      return false;
    }

    true
  }

  /// Prints the region bounds, usage, and every block's decoded header.
  /// Diagnostic only; the heap is not touched.
  ///
  /// # Safety
  ///
  /// [`init`](Self::init) must have succeeded and its region contract must
  /// still hold.
  pub unsafe fn dump_heap(&self) {
    println!(
      "Heap starts at address {:p} and ends at {:p}. {} bytes currently used.",
      self.heap_start,
      unsafe { self.heap_start.add(self.heap_size) },
      self.size_used
    );

    let mut offset = 0;
    while offset < self.heap_size {
      let header = self.header_at(offset);
      println!(
        "  [{:#010x}] payload = {:<10} {}",
        offset,
        header.payload,
        if header.allocated { "allocated" } else { "free" }
      );
      offset += HEADER_SIZE + header.payload;
    }
  }

  /// Bytes consumed by allocated blocks, headers included.
  pub fn size_used(&self) -> usize {
    self.size_used
  }

  /// Total length of the attached region in bytes.
  pub fn heap_size(&self) -> usize {
    self.heap_size
  }

  /// Walks the heap from the first header and returns the offset and
  /// payload size of the first free block that can hold `size` bytes.
  fn find_fit(
    &self,
    size: usize,
  ) -> Option<(usize, usize)> {
    let mut offset = 0;

    while offset < self.heap_size {
      let header = self.header_at(offset);
      if !header.allocated && header.payload >= size {
        return Some((offset, header.payload));
      }
      offset += HEADER_SIZE + header.payload;
    }

    None
  }

  /// Carves `size` bytes out of the free block at `offset` and marks the
  /// result allocated. The leftover becomes a trailing free block when it
  /// can hold a header plus the minimum payload; otherwise the whole block
  /// is handed out. Returns the footprint consumed (header plus final
  /// payload).
  fn place(
    &mut self,
    offset: usize,
    payload: usize,
    size: usize,
  ) -> usize {
    let final_payload = if payload - size >= MIN_SPLIT {
      let split_offset = offset + HEADER_SIZE + size;
      self.write_header(split_offset, Header::free(payload - size - HEADER_SIZE));
      size
    } else {
      payload
    };

    self.write_header(offset, Header::allocated(final_payload));
    HEADER_SIZE + final_payload
  }

  /// Reads the machine word at `offset` bytes into the region.
  fn word_at(
    &self,
    offset: usize,
  ) -> usize {
    debug_assert!(offset + HEADER_SIZE <= self.heap_size, "read past region end");
    unsafe { self.heap_start.add(offset).cast::<usize>().read() }
  }

  /// Writes the machine word at `offset` bytes into the region.
  fn set_word_at(
    &mut self,
    offset: usize,
    value: usize,
  ) {
    debug_assert!(offset + HEADER_SIZE <= self.heap_size, "write past region end");
    unsafe { self.heap_start.add(offset).cast::<usize>().write(value) }
  }

  fn header_at(
    &self,
    offset: usize,
  ) -> Header {
    Header::decode(self.word_at(offset))
  }

  fn write_header(
    &mut self,
    offset: usize,
    header: Header,
  ) {
    self.set_word_at(offset, header.encode());
  }

  /// Address of the payload belonging to the block header at `offset`.
  fn payload_ptr(
    &self,
    offset: usize,
  ) -> *mut u8 {
    unsafe { self.heap_start.add(offset + HEADER_SIZE) }
  }

  /// Region offset of the block header owning the payload at `ptr`.
  fn header_offset_of(
    &self,
    ptr: *mut u8,
  ) -> usize {
    ptr as usize - self.heap_start as usize - HEADER_SIZE
  }
}

impl Default for ImplicitAllocator {
  fn default() -> Self {
    Self::new()
  }
}
