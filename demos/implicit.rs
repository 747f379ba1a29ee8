use std::ptr;

use fitalloc::ImplicitAllocator;
use libc::{mmap, munmap, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE};

/// One page; plenty for the walkthrough and small enough to dump in full.
const HEAP_SIZE: usize = 4096;

/// Maps an anonymous, page-aligned region to serve as the heap.
/// The allocator never asks the OS for memory itself; the caller owns the
/// region for the allocator's whole lifetime.
unsafe fn map_region(size: usize) -> *mut u8 {
  let region = unsafe {
    mmap(
      ptr::null_mut(),
      size,
      PROT_READ | PROT_WRITE,
      MAP_ANONYMOUS | MAP_PRIVATE,
      -1,
      0,
    )
  };
  assert!(region != MAP_FAILED, "mmap failed");
  region as *mut u8
}

fn main() {
  let mut allocator = ImplicitAllocator::new();

  unsafe {
    let region = map_region(HEAP_SIZE);
    assert!(allocator.init(region, HEAP_SIZE));
    println!("Initialized a {HEAP_SIZE}-byte heap at {region:p}.\n");

    // --------------------------------------------------------------------
    // 1) A few allocations. Each one carves a block off the front of the
    //    big free block; the remainder becomes a new free block.
    // --------------------------------------------------------------------
    println!("[1] Allocate 24, 100, and 8 bytes");
    let a = allocator.malloc(24);
    let b = allocator.malloc(100); // rounded up to 104
    let c = allocator.malloc(8);
    assert!(!a.is_null() && !b.is_null() && !c.is_null());
    allocator.dump_heap();

    // --------------------------------------------------------------------
    // 2) Payloads are usable memory. Fill one and read it back.
    // --------------------------------------------------------------------
    println!("\n[2] Write a pattern into the 100-byte block");
    for i in 0..100u8 {
      b.add(i as usize).write(i);
    }
    println!("    b[0] = {}, b[99] = {}", b.read(), b.add(99).read());

    // --------------------------------------------------------------------
    // 3) Free the middle block. The implicit allocator only clears the
    //    status bit; the hole keeps its size and position.
    // --------------------------------------------------------------------
    println!("\n[3] Free the 100-byte block");
    allocator.free(b);
    allocator.dump_heap();

    // --------------------------------------------------------------------
    // 4) A first-fit malloc lands in the hole and splits it.
    // --------------------------------------------------------------------
    println!("\n[4] Allocate 32 bytes (reuses the hole)");
    let d = allocator.malloc(32);
    println!(
      "    d == old b? {}",
      if d == b { "yes, first fit reused the hole" } else { "no" }
    );
    allocator.dump_heap();

    // --------------------------------------------------------------------
    // 5) Grow an allocation. The block cannot grow in place (its right
    //    neighbor is live), so realloc finds a new home and copies.
    // --------------------------------------------------------------------
    println!("\n[5] Realloc the first block from 24 to 200 bytes");
    let a2 = allocator.realloc(a, 200);
    assert!(!a2.is_null());
    println!("    moved: {}", a2 != a);
    allocator.dump_heap();

    // --------------------------------------------------------------------
    // 6) The validator cross-checks the walk against the counters.
    // --------------------------------------------------------------------
    println!("\n[6] validate_heap() = {}", allocator.validate_heap());
    println!(
      "    size_used = {} of {} bytes",
      allocator.size_used(),
      allocator.heap_size()
    );

    munmap(region as *mut _, HEAP_SIZE);
  }
}
