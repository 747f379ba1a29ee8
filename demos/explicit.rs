use std::ptr;

use fitalloc::ExplicitAllocator;
use libc::{mmap, munmap, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE};

/// One page; plenty for the walkthrough and small enough to dump in full.
const HEAP_SIZE: usize = 4096;

/// Maps an anonymous, page-aligned region to serve as the heap.
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
  let mut allocator = ExplicitAllocator::new();

  unsafe {
    let region = map_region(HEAP_SIZE);
    assert!(allocator.init(region, HEAP_SIZE));
    println!("Initialized a {HEAP_SIZE}-byte heap at {region:p}.\n");

    // --------------------------------------------------------------------
    // 1) Three allocations. Each takes the head of the free list and
    //    pushes the shrinking remainder back in its place.
    // --------------------------------------------------------------------
    println!("[1] Allocate three 48-byte blocks");
    let a = allocator.malloc(48);
    let b = allocator.malloc(48);
    let c = allocator.malloc(48);
    assert!(!a.is_null() && !b.is_null() && !c.is_null());
    allocator.dump_heap();

    // --------------------------------------------------------------------
    // 2) Free the first two. Neither has a free right neighbor, so both
    //    go to the head of the list: most recently freed first.
    // --------------------------------------------------------------------
    println!("\n[2] Free the first two blocks (LIFO insert)");
    allocator.free(a);
    allocator.free(b);
    allocator.dump_heap();

    // --------------------------------------------------------------------
    // 3) The next malloc of that size reuses b's block: it was freed
    //    last, so it sits at the head and first fit sees it first.
    // --------------------------------------------------------------------
    println!("\n[3] Allocate 48 bytes again");
    let d = allocator.malloc(48);
    println!(
      "    d == old b? {}",
      if d == b { "yes, the LIFO head was reused" } else { "no" }
    );

    // --------------------------------------------------------------------
    // 4) Free the last allocated block. Its right neighbor is the big
    //    trailing free block, so the two merge into one.
    // --------------------------------------------------------------------
    println!("\n[4] Free the third block (coalesces with its right neighbor)");
    allocator.free(c);
    allocator.dump_heap();

    // --------------------------------------------------------------------
    // 5) Grow an allocation past its payload. The list search finds a new
    //    home, the payload is copied, and the old block is freed.
    // --------------------------------------------------------------------
    println!("\n[5] Realloc the reused block from 48 to 512 bytes");
    for i in 0..48u8 {
      d.add(i as usize).write(i);
    }
    let d2 = allocator.realloc(d, 512);
    assert!(!d2.is_null());
    println!(
      "    moved: {}, payload intact: {}",
      d2 != d,
      (0..48u8).all(|i| d2.add(i as usize).read() == i)
    );
    allocator.dump_heap();

    // --------------------------------------------------------------------
    // 6) The validator walks the heap and the free list and cross-checks
    //    them against each other and the counters.
    // --------------------------------------------------------------------
    println!("\n[6] validate_heap() = {}", allocator.validate_heap());
    println!(
      "    size_used = {}, free_space = {}, heap_size = {}",
      allocator.size_used(),
      allocator.free_space(),
      allocator.heap_size()
    );

    munmap(region as *mut _, HEAP_SIZE);
  }
}
