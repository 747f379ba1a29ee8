//! # Explicit Allocator
//!
//! A heap allocator with an **explicit free list**: free blocks carry
//! `prev`/`next` links to one another, so `malloc` only ever visits free
//! blocks instead of walking the whole heap.
//!
//! ## Memory Layout
//!
//! Every block begins with a three-word, 24-byte header. The first word is
//! the payload size with the status bit in its low bit, exactly as in the
//! implicit variant; the second and third words are the free-list links.
//! The link words exist in every block but carry meaning only while the
//! block is free:
//!
//! ```text
//!            Block at offset X
//!   ┌──────────────────┬─────────────────────────┐
//!   │      Header      │        Payload          │
//!   ├──────────────────┼─────────────────────────┤
//!   │ +0  size|status  │                         │
//!   │ +8  prev link    │   X + 24 .. X + 24 + n  │
//!   │ +16 next link    │                         │
//!   └──────────────────┴─────────────────────────┘
//!
//!   Links are region byte offsets, not addresses; the word usize::MAX
//!   stands for "no block".
//! ```
//!
//! ## Free List
//!
//! The list is doubly linked and unordered; freed blocks are pushed at the
//! head (LIFO). A block chosen by `malloc` is split when the excess is
//! bigger than a whole header footprint, and the trailing remainder takes
//! over the victim's place in the list:
//!
//! ```text
//!   free_head ──► [C] ◄──► [A] ◄──► [F]          (C freed most recently)
//!
//!   malloc takes A whole:        unlink A, C ◄──► F
//!   malloc splits A:             A' (the remainder) replaces A in place
//! ```
//!
//! ## Coalescing
//!
//! `free` looks at the immediate right neighbor. If it is free, the two
//! merge into one block that inherits the neighbor's list position; only
//! then is no separate insertion needed. The left neighbor is never
//! examined, so a free block followed by an allocated one stays fragmented
//! until the allocated side is freed too:
//!
//! ```text
//!   free(b) with free right neighbor F:
//!
//!   ┌────────┬──────┬──────────────┐     ┌────────┬─────────────────────┐
//!   │ a:used │b:used│   F: free    │ ──► │ a:used │  b∪F: free          │
//!   └────────┴──────┴──────────────┘     └────────┴─────────────────────┘
//!                                          b's payload += 24 + F's payload
//! ```

use core::ptr;

use crate::header::Header;
use crate::{roundup, ALIGNMENT, MAX_REQUEST};

/// Size in bytes of the three-word block header.
const HEADER_SIZE: usize = 24;

/// Byte offsets of the link words inside a header.
const PREV_OFFSET: usize = 8;
const NEXT_OFFSET: usize = 16;

/// In-region encoding of a null link.
const NO_BLOCK: usize = usize::MAX;

/// A first-fit allocator over a fixed region, keeping its free blocks on a
/// doubly-linked list threaded through their headers.
///
/// The region is supplied to [`init`](Self::init) and never grows. All
/// state lives in the instance, so independent allocators over disjoint
/// regions can coexist.
///
/// # Thread Safety
///
/// This allocator is **NOT** thread-safe. For multi-threaded usage,
/// external synchronization (e.g., a `Mutex`) is required.
pub struct ExplicitAllocator {
  /// Start address of the caller-supplied region.
  heap_start: *mut u8,

  /// Total length of the region in bytes.
  heap_size: usize,

  /// Bytes consumed by allocated blocks, headers included.
  size_used: usize,

  /// Bytes held by free blocks, headers included.
  free_space: usize,

  /// Offset of the most recently freed block, or `None` when every byte
  /// is allocated.
  free_head: Option<usize>,
}

impl ExplicitAllocator {
  /// Creates an allocator with no region attached.
  ///
  /// Every operation other than [`init`](Self::init) is a no-op or a
  /// failure until a region has been supplied.
  pub const fn new() -> Self {
    Self {
      heap_start: ptr::null_mut(),
      heap_size: 0,
      size_used: 0,
      free_space: 0,
      free_head: None,
    }
  }

  /// Attaches the allocator to the region `[heap_start, heap_start +
  /// heap_size)` and formats it as a single free block spanning the whole
  /// region, which becomes the sole entry on the free list.
  ///
  /// Returns `false`, leaving the allocator unusable, if `heap_start` is
  /// null, if the region cannot hold even one header, or if its length is
  /// not a multiple of 8.
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
    self.free_space = heap_size;
    self.free_head = Some(0);

    // One free block covering everything after its own header, alone on
    // the list.
    self.write_header(0, Header::free(heap_size - HEADER_SIZE));
    self.set_prev(0, None);
    self.set_next(0, None);
    true
  }

  /// Allocates a block with a payload of at least `requested_size` bytes
  /// and returns a pointer to the payload, or null when the request cannot
  /// be satisfied.
  ///
  /// The request is rounded up to a multiple of 8 and served by the first
  /// free-list entry whose payload covers it. The chosen block is split
  /// when its excess is larger than one header footprint; the trailing
  /// remainder inherits the victim's place on the list. Otherwise the
  /// victim is unlinked and handed out whole.
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
        let used = self.place(offset, payload, size);
        self.size_used += used;
        self.free_space -= used;
        self.payload_ptr(offset)
      }
      None => ptr::null_mut(),
    }
  }

  /// Releases the block owning the payload at `ptr`.
  ///
  /// If the block's immediate right neighbor is free, the two merge into
  /// one free block that takes over the neighbor's place on the free list.
  /// Otherwise the block is marked free and pushed at the head of the list
  /// (LIFO). The left neighbor is never examined. A null `ptr` is a no-op.
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
    self.size_used -= HEADER_SIZE + payload;
    self.free_space += HEADER_SIZE + payload;

    // The block just past this one, unless we sit at the region end.
    let neighbor = offset + HEADER_SIZE + payload;
    if neighbor < self.heap_size {
      let neighbor_header = self.header_at(neighbor);
      if !neighbor_header.allocated {
        // Merge rightward: the freed block absorbs the neighbor and takes
        // over its place on the list, so no separate insertion happens.
        let merged = payload + HEADER_SIZE + neighbor_header.payload;
        self.write_header(offset, Header::free(merged));
        self.replace_in_list(neighbor, offset);
        return;
      }
    }

    self.write_header(offset, Header::free(payload));
    self.insert_head(offset);
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
  ///   otherwise                  -> search the free list as malloc does,
  ///                                 copy the payload, free the old block,
  ///                                 return the new pointer
  /// ```
  ///
  /// The whole old payload is preserved across a move. When no block
  /// fits, null is returned and the heap, including the old block, is
  /// unchanged.
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
      // The block already covers the request; it is not shrunk and no
      // trailing split happens.
      return old_ptr;
    }
    if size > MAX_REQUEST || size + self.size_used > self.heap_size {
      return ptr::null_mut();
    }

    let (offset, payload) = match self.find_fit(size) {
      Some(fit) => fit,
      None => return ptr::null_mut(),
    };
    let used = self.place(offset, payload, size);
    self.size_used += used;
    self.free_space -= used;

    let new_ptr = self.payload_ptr(offset);
    unsafe {
      // Copy before freeing: free may merge the old block rightward.
      ptr::copy(old_ptr, new_ptr, old_payload);
      self.free(old_ptr);
    }
    new_ptr
  }

  /// Checks the heap's internal consistency without repairing anything.
  ///
  /// Two passes. The sequential walk verifies bounds, payload alignment,
  /// that the blocks tile the region exactly, and that the usage counter
  /// matches the allocated total. The free-list walk then verifies that
  /// every reachable entry is free, that the back links mirror the forward
  /// links, and that the list's block count and byte total agree with the
  /// sequential walk's free blocks. Each failure prints a diagnostic to
  /// stderr and yields `false`.
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

    // Pass 1: sequential walk over every block.
    let mut used = 0;
    let mut freed = 0;
    let mut free_blocks = 0;
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
        free_blocks += 1;
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

    // Pass 2: free-list walk, capped so a corrupt cycle reports failure
    // instead of spinning.
    if let Some(head) = self.free_head {
      if self.prev_of(head).is_some() {
        eprintln!("validate: free list head at offset {head} has a prev link");
        return false;
      }
    }

    let cap = self.heap_size / HEADER_SIZE + 1;
    let mut list_total = 0;
    let mut list_blocks = 0;
    let mut cursor = self.free_head;

    while let Some(block) = cursor {
      if list_blocks >= cap {
        eprintln!("validate: free list does not terminate");
        return false;
      }
      if block + HEADER_SIZE > self.heap_size {
        eprintln!("validate: free list entry at offset {block} is out of bounds");
        return false;
      }

      let header = self.header_at(block);
      if header.allocated {
        eprintln!("validate: allocated block at offset {block} on the free list");
        return false;
      }

      let next = self.next_of(block);
      if let Some(next) = next {
        if next + HEADER_SIZE > self.heap_size {
          eprintln!("validate: next link at offset {block} points out of bounds");
          return false;
        }
        if self.prev_of(next) != Some(block) {
          eprintln!("validate: broken back link between offsets {block} and {next}");
          return false;
        }
      }

      list_total += HEADER_SIZE + header.payload;
      list_blocks += 1;
      cursor = next;
    }

    if list_blocks != free_blocks || list_total != freed {
      eprintln!(
        "validate: free list holds {list_blocks} blocks/{list_total} bytes \
         but the walk found {free_blocks} blocks/{freed} bytes",
      );
      return false;
    }
    if self.free_space + self.size_used != self.heap_size {
      eprintln!(
        "validate: free_space {} + size_used {} != heap size {}",
        self.free_space, self.size_used, self.heap_size
      );
      return false;
    }

    true
  }

  /// Prints the region bounds, usage, the free-list head, and every
  /// block's decoded header with its links. Diagnostic only; the heap is
  /// not touched.
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
    match self.free_head {
      Some(head) => println!("Free list head at offset {head:#x}."),
      None => println!("Free list is empty."),
    }

    let mut offset = 0;
    while offset < self.heap_size {
      let header = self.header_at(offset);
      if header.allocated {
        println!("  [{:#010x}] payload = {:<10} allocated", offset, header.payload);
      } else {
        println!(
          "  [{:#010x}] payload = {:<10} free  prev = {:?}, next = {:?}",
          offset,
          header.payload,
          self.prev_of(offset),
          self.next_of(offset)
        );
      }
      offset += HEADER_SIZE + header.payload;
    }
  }

  /// Bytes consumed by allocated blocks, headers included.
  pub fn size_used(&self) -> usize {
    self.size_used
  }

  /// Bytes held by free blocks, headers included.
  pub fn free_space(&self) -> usize {
    self.free_space
  }

  /// Total length of the attached region in bytes.
  pub fn heap_size(&self) -> usize {
    self.heap_size
  }

  /// Follows the free list from its head and returns the offset and
  /// payload size of the first entry that can hold `size` bytes.
  ///
  /// An allocated block reachable from the list means the heap is corrupt;
  /// it is reported and skipped so the traversal can still finish.
  fn find_fit(
    &self,
    size: usize,
  ) -> Option<(usize, usize)> {
    let mut cursor = self.free_head;

    while let Some(offset) = cursor {
      let header = self.header_at(offset);
      if header.allocated {
        eprintln!("allocated block at offset {offset} reachable from the free list");
      } else if header.payload >= size {
        return Some((offset, header.payload));
      }
      cursor = self.next_of(offset);
    }

    None
  }

  /// Carves `size` bytes out of the free block at `offset` and marks the
  /// result allocated. The leftover becomes a trailing free block taking
  /// over the victim's list position when it exceeds one header footprint;
  /// otherwise the victim is unlinked and handed out whole. Returns the
  /// footprint consumed (header plus final payload).
  fn place(
    &mut self,
    offset: usize,
    payload: usize,
    size: usize,
  ) -> usize {
    let final_payload = if payload - size > HEADER_SIZE {
      let split_offset = offset + HEADER_SIZE + size;
      self.write_header(split_offset, Header::free(payload - size - HEADER_SIZE));
      self.replace_in_list(offset, split_offset);
      size
    } else {
      self.unlink(offset);
      payload
    };

    self.write_header(offset, Header::allocated(final_payload));
    HEADER_SIZE + final_payload
  }

  /// Pushes the free block at `block` onto the head of the list.
  fn insert_head(
    &mut self,
    block: usize,
  ) {
    self.set_prev(block, None);
    self.set_next(block, self.free_head);
    if let Some(old_head) = self.free_head {
      self.set_prev(old_head, Some(block));
    }
    self.free_head = Some(block);
  }

  /// Removes the free block at `block` from the list, rewiring its
  /// neighbors (or the head) around it.
  fn unlink(
    &mut self,
    block: usize,
  ) {
    let prev = self.prev_of(block);
    let next = self.next_of(block);

    match prev {
      Some(prev) => self.set_next(prev, next),
      None => self.free_head = next,
    }
    if let Some(next) = next {
      self.set_prev(next, prev);
    }
  }

  /// Hands the list position of `old` over to `new`: `new` inherits the
  /// links, and the neighbors (or the head) are rewired to point at it.
  fn replace_in_list(
    &mut self,
    old: usize,
    new: usize,
  ) {
    let prev = self.prev_of(old);
    let next = self.next_of(old);

    self.set_prev(new, prev);
    self.set_next(new, next);
    match prev {
      Some(prev) => self.set_next(prev, Some(new)),
      None => self.free_head = Some(new),
    }
    if let Some(next) = next {
      self.set_prev(next, Some(new));
    }
  }

  fn prev_of(
    &self,
    block: usize,
  ) -> Option<usize> {
    self.read_link(block + PREV_OFFSET)
  }

  fn next_of(
    &self,
    block: usize,
  ) -> Option<usize> {
    self.read_link(block + NEXT_OFFSET)
  }

  fn set_prev(
    &mut self,
    block: usize,
    link: Option<usize>,
  ) {
    self.write_link(block + PREV_OFFSET, link)
  }

  fn set_next(
    &mut self,
    block: usize,
    link: Option<usize>,
  ) {
    self.write_link(block + NEXT_OFFSET, link)
  }

  /// Reads a link word, mapping the in-region null encoding to `None`.
  fn read_link(
    &self,
    offset: usize,
  ) -> Option<usize> {
    match self.word_at(offset) {
      NO_BLOCK => None,
      block => Some(block),
    }
  }

  fn write_link(
    &mut self,
    offset: usize,
    link: Option<usize>,
  ) {
    self.set_word_at(offset, link.unwrap_or(NO_BLOCK));
  }

  /// Reads the machine word at `offset` bytes into the region.
  fn word_at(
    &self,
    offset: usize,
  ) -> usize {
    debug_assert!(offset + ALIGNMENT <= self.heap_size, "read past region end");
    unsafe { self.heap_start.add(offset).cast::<usize>().read() }
  }

  /// Writes the machine word at `offset` bytes into the region.
  fn set_word_at(
    &mut self,
    offset: usize,
    value: usize,
  ) {
    debug_assert!(offset + ALIGNMENT <= self.heap_size, "write past region end");
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

impl Default for ExplicitAllocator {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::alloc::Layout;

  /// Runs `f` against a zeroed, 8-aligned heap region of `size` bytes.
  fn with_test_heap<F: FnOnce(*mut u8)>(
    size: usize,
    f: F,
  ) {
    let layout = Layout::from_size_align(size, ALIGNMENT).unwrap();
    let region = unsafe { std::alloc::alloc_zeroed(layout) };
    assert!(!region.is_null());
    f(region);
    unsafe { std::alloc::dealloc(region, layout) };
  }

  fn init_allocator(
    region: *mut u8,
    size: usize,
  ) -> ExplicitAllocator {
    let mut allocator = ExplicitAllocator::new();
    assert!(unsafe { allocator.init(region, size) });
    allocator
  }

  /// Collects the free list's block offsets from head to tail.
  fn free_list(allocator: &ExplicitAllocator) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut cursor = allocator.free_head;
    while let Some(offset) = cursor {
      offsets.push(offset);
      cursor = allocator.next_of(offset);
    }
    offsets
  }

  #[test]
  fn init_rejects_null_region() {
    let mut allocator = ExplicitAllocator::new();
    assert!(!unsafe { allocator.init(core::ptr::null_mut(), 1024) });
  }

  #[test]
  fn init_rejects_unusable_region() {
    with_test_heap(1024, |region| {
      let mut allocator = ExplicitAllocator::new();
      // Too small for even one header.
      assert!(!unsafe { allocator.init(region, 16) });
      // Length not a multiple of the alignment.
      assert!(!unsafe { allocator.init(region, 1020) });
    });
  }

  #[test]
  fn init_builds_single_spanning_free_block() {
    with_test_heap(1024, |region| {
      let allocator = init_allocator(region, 1024);

      assert_eq!(allocator.free_head, Some(0));
      assert_eq!(allocator.header_at(0), Header::free(1024 - HEADER_SIZE));
      assert_eq!(allocator.prev_of(0), None);
      assert_eq!(allocator.next_of(0), None);
      assert_eq!(allocator.size_used(), 0);
      assert_eq!(allocator.free_space(), 1024);
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn first_malloc_lands_after_the_header() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      let p = unsafe { allocator.malloc(8) };
      assert_eq!(p, unsafe { region.add(HEADER_SIZE) });

      assert_eq!(allocator.header_at(0), Header::allocated(8));
      // The remainder sits right behind the 8-byte payload and owns the
      // rest of the region.
      assert_eq!(allocator.header_at(32), Header::free(968));
      assert_eq!(allocator.free_head, Some(32));
      assert_eq!(allocator.size_used(), 32);
      assert_eq!(allocator.free_space(), 992);
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn excess_at_threshold_takes_whole_block() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      // The initial payload is 1000; an excess of exactly 24 is not
      // strictly greater than a header footprint, so no split happens.
      let p = unsafe { allocator.malloc(976) };
      assert!(!p.is_null());
      assert_eq!(allocator.header_at(0), Header::allocated(1000));
      assert_eq!(allocator.free_head, None);
      assert_eq!(allocator.size_used(), 1024);
      assert_eq!(allocator.free_space(), 0);

      assert!(unsafe { allocator.malloc(8) }.is_null());
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn excess_above_threshold_splits() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      // An excess of 32 is enough for a trailing free block of payload 8.
      let p = unsafe { allocator.malloc(968) };
      assert!(!p.is_null());
      assert_eq!(allocator.header_at(0), Header::allocated(968));
      assert_eq!(allocator.header_at(992), Header::free(8));
      assert_eq!(allocator.free_head, Some(992));
      assert_eq!(allocator.size_used(), 992);
      assert_eq!(allocator.free_space(), 32);
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn malloc_rejects_invalid_requests() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      assert!(unsafe { allocator.malloc(0) }.is_null());
      assert!(unsafe { allocator.malloc(crate::MAX_REQUEST + 1) }.is_null());
      assert!(unsafe { allocator.malloc(2048) }.is_null());

      assert_eq!(allocator.size_used(), 0);
      assert_eq!(allocator.free_space(), 1024);
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  // ═══════════════════════════════════════════════════════════════════════════
  // Free list behavior
  // ═══════════════════════════════════════════════════════════════════════════

  #[test]
  fn frees_insert_lifo_when_no_coalesce_applies() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      // Three 16-byte blocks at offsets 0, 40, 80; the trailing free
      // block at 120 keeps the list non-empty.
      let x = unsafe { allocator.malloc(16) };
      let y = unsafe { allocator.malloc(16) };
      let z = unsafe { allocator.malloc(16) };
      assert!(!x.is_null() && !y.is_null() && !z.is_null());
      assert_eq!(free_list(&allocator), vec![120]);

      // x's right neighbor (y) is allocated: plain LIFO insert.
      unsafe { allocator.free(x) };
      assert_eq!(free_list(&allocator), vec![0, 120]);

      // Same for y, which lands in front of x.
      unsafe { allocator.free(y) };
      assert_eq!(free_list(&allocator), vec![40, 0, 120]);

      // z's right neighbor is the trailing free block: the merged block
      // takes over that block's position instead of moving to the head.
      unsafe { allocator.free(z) };
      assert_eq!(free_list(&allocator), vec![40, 0, 80]);
      assert_eq!(allocator.header_at(80).payload, 16 + HEADER_SIZE + 880);

      assert_eq!(allocator.size_used(), 0);
      assert_eq!(allocator.free_space(), 1024);
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn right_coalesce_on_free() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      let a = unsafe { allocator.malloc(16) };
      let b = unsafe { allocator.malloc(16) };
      assert!(!a.is_null() && !b.is_null());

      // a's right neighbor is b (allocated): no coalesce, LIFO insert.
      unsafe { allocator.free(a) };
      assert_eq!(free_list(&allocator), vec![0, 80]);

      // b's right neighbor is the trailing free block: merge rightward.
      // The left neighbor (a) is never examined, so it stays separate.
      unsafe { allocator.free(b) };
      assert_eq!(free_list(&allocator), vec![0, 40]);
      assert_eq!(allocator.header_at(0), Header::free(16));
      assert_eq!(allocator.header_at(40), Header::free(960));

      assert_eq!(allocator.size_used(), 0);
      assert_eq!(allocator.free_space(), 1024);
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn free_at_region_end_reinserts() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      // Take the whole region, then free it: there is no right neighbor
      // to look at, so the block goes straight back onto the list.
      let p = unsafe { allocator.malloc(976) };
      assert_eq!(allocator.free_head, None);

      unsafe { allocator.free(p) };
      assert_eq!(free_list(&allocator), vec![0]);
      assert_eq!(allocator.header_at(0), Header::free(1000));
      assert_eq!(allocator.free_space(), 1024);
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn first_fit_skips_entries_too_small_and_unlinks_the_match() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      // Guards keep the freed blocks away from each other so no merge
      // rewrites the list behind the test's back.
      let small = unsafe { allocator.malloc(16) };
      let guard1 = unsafe { allocator.malloc(16) };
      let large = unsafe { allocator.malloc(64) };
      let guard2 = unsafe { allocator.malloc(16) };
      assert!(!small.is_null() && !guard1.is_null());
      assert!(!large.is_null() && !guard2.is_null());

      unsafe { allocator.free(large) };
      unsafe { allocator.free(small) };
      // Blocks sit at offsets 0, 40, 80, 168; list order is LIFO.
      assert_eq!(free_list(&allocator), vec![0, 80, 208]);

      // The head's 16-byte payload cannot hold 64 bytes, so the search
      // passes it and takes the middle entry whole, rewiring its
      // neighbors around the hole.
      let q = unsafe { allocator.malloc(64) };
      assert_eq!(q, large);
      assert_eq!(free_list(&allocator), vec![0, 208]);
      assert_eq!(allocator.next_of(0), Some(208));
      assert_eq!(allocator.prev_of(208), Some(0));
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  // ═══════════════════════════════════════════════════════════════════════════
  // Realloc
  // ═══════════════════════════════════════════════════════════════════════════

  #[test]
  fn realloc_null_acts_as_malloc() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      let p = unsafe { allocator.realloc(core::ptr::null_mut(), 16) };
      assert_eq!(p, unsafe { region.add(HEADER_SIZE) });
      assert_eq!(allocator.size_used(), 40);
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn realloc_zero_frees_and_returns_null() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      let p = unsafe { allocator.malloc(16) };
      assert!(!p.is_null());

      let q = unsafe { allocator.realloc(p, 0) };
      assert!(q.is_null());
      assert_eq!(allocator.size_used(), 0);
      assert_eq!(allocator.free_space(), 1024);
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn realloc_in_place_when_payload_covers() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      let p = unsafe { allocator.malloc(32) };
      let used_before = allocator.size_used();
      let free_before = allocator.free_space();

      assert_eq!(unsafe { allocator.realloc(p, 24) }, p);
      assert_eq!(unsafe { allocator.realloc(p, 32) }, p);
      assert_eq!(allocator.size_used(), used_before);
      assert_eq!(allocator.free_space(), free_before);
      assert_eq!(allocator.header_at(0).payload, 32);
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn realloc_moves_and_preserves_data() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      let p = unsafe { allocator.malloc(16) };
      for i in 0..16u8 {
        unsafe { p.add(i as usize).write(i) };
      }
      // Block the in-place neighborhood so growth must move.
      let blocker = unsafe { allocator.malloc(16) };
      assert!(!blocker.is_null());

      let q = unsafe { allocator.realloc(p, 64) };
      assert!(!q.is_null());
      assert_ne!(q, p);
      for i in 0..16u8 {
        assert_eq!(unsafe { q.add(i as usize).read() }, i);
      }

      // The old block is free again and back on the list.
      assert!(!allocator.header_at(0).allocated);
      assert!(free_list(&allocator).contains(&0));
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn realloc_without_fit_leaves_heap_unchanged() {
    with_test_heap(256, |region| {
      let mut allocator = init_allocator(region, 256);

      let a = unsafe { allocator.malloc(8) };
      let b = unsafe { allocator.malloc(136) };
      assert!(!a.is_null() && !b.is_null());
      let used_before = allocator.size_used();

      // Capacity admits the request but the remaining free block is too
      // small, so the list search comes up empty.
      let q = unsafe { allocator.realloc(a, 64) };
      assert!(q.is_null());
      assert!(allocator.header_at(0).allocated);
      assert_eq!(allocator.size_used(), used_before);
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  // ═══════════════════════════════════════════════════════════════════════════
  // Properties
  // ═══════════════════════════════════════════════════════════════════════════

  #[test]
  fn pointers_are_aligned_and_in_bounds() {
    with_test_heap(4096, |region| {
      let mut allocator = init_allocator(region, 4096);
      let end = region as usize + 4096;

      for size in [1, 7, 8, 13, 64, 200] {
        let p = unsafe { allocator.malloc(size) };
        assert!(!p.is_null());
        assert_eq!(p as usize % ALIGNMENT, 0);
        assert!(p as usize >= region as usize + HEADER_SIZE);
        assert!((p as usize) < end);
      }
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn payload_writes_do_not_perturb_neighbors() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      let a = unsafe { allocator.malloc(32) };
      let b = unsafe { allocator.malloc(32) };

      unsafe {
        ptr::write_bytes(a, 0xAA, 32);
        ptr::write_bytes(b, 0xBB, 32);
      }

      for i in 0..32 {
        assert_eq!(unsafe { a.add(i).read() }, 0xAA);
        assert_eq!(unsafe { b.add(i).read() }, 0xBB);
      }
      assert_eq!(allocator.header_at(0), Header::allocated(32));
      assert_eq!(allocator.header_at(56), Header::allocated(32));
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn exhaustion_keeps_heap_valid() {
    with_test_heap(4096, |region| {
      let mut allocator = init_allocator(region, 4096);
      let mut blocks = Vec::new();

      loop {
        let p = unsafe { allocator.malloc(128) };
        assert!(unsafe { allocator.validate_heap() });
        if p.is_null() {
          break;
        }
        blocks.push(p);
      }
      assert!(!blocks.is_empty());

      for p in blocks {
        unsafe { allocator.free(p) };
        assert!(unsafe { allocator.validate_heap() });
      }
      assert_eq!(allocator.size_used(), 0);
      assert_eq!(allocator.free_space(), 4096);
    });
  }

  #[test]
  fn free_then_malloc_reuses_the_lifo_head() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      let a = unsafe { allocator.malloc(32) };
      let b = unsafe { allocator.malloc(32) };
      let _c = unsafe { allocator.malloc(32) };
      assert!(!a.is_null() && !b.is_null());

      unsafe { allocator.free(a) };
      unsafe { allocator.free(b) };
      // b was freed last, so first fit hits it first.
      assert_eq!(unsafe { allocator.malloc(32) }, b);
      assert_eq!(unsafe { allocator.malloc(32) }, a);
      assert!(unsafe { allocator.validate_heap() });
    });
  }

  #[test]
  fn reinit_resets_all_state() {
    with_test_heap(1024, |region| {
      let mut allocator = init_allocator(region, 1024);

      assert!(!unsafe { allocator.malloc(64) }.is_null());
      assert!(allocator.size_used() > 0);

      assert!(unsafe { allocator.init(region, 1024) });
      assert_eq!(allocator.size_used(), 0);
      assert_eq!(allocator.free_space(), 1024);
      assert_eq!(allocator.free_head, Some(0));
      assert_eq!(allocator.header_at(0), Header::free(1000));
      assert!(unsafe { allocator.validate_heap() });
    });
  }
}
