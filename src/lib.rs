//! # fitalloc - Fixed-Region Heap Allocators
//!
//! This crate provides two classic **first-fit** heap allocator designs
//! that manage a single contiguous byte region supplied by the caller at
//! initialization. The region never grows; every `malloc`, `free`, and
//! `realloc` is served from inside it.
//!
//! ## Overview
//!
//! Both allocators keep their bookkeeping *inside* the region, as a header
//! in front of every block:
//!
//! ```text
//!   Caller-supplied region (fixed size, 8-byte aligned):
//!
//!   ┌──────┬─────────┬──────┬──────────────┬──────┬───────────────────┐
//!   │ hdr  │ payload │ hdr  │   payload    │ hdr  │      payload      │
//!   └──────┴─────────┴──────┴──────────────┴──────┴───────────────────┘
//!      ▲                ▲
//!      │                └── low bit of the header word: 1 = allocated
//!      └── payload size lives in the remaining bits (multiple of 8)
//! ```
//!
//! The two variants differ in how they find free space:
//!
//! ```text
//!   ┌────────────────────┬──────────────────────┬─────────────────────────┐
//!   │                    │ ImplicitAllocator    │ ExplicitAllocator       │
//!   ├────────────────────┼──────────────────────┼─────────────────────────┤
//!   │ Header size        │ 8 bytes (one word)   │ 24 bytes (three words)  │
//!   │ Free block lookup  │ walk every block     │ walk the free list      │
//!   │ Free list          │ none (implicit)      │ doubly linked, LIFO     │
//!   │ Coalescing         │ none                 │ with the right neighbor │
//!   └────────────────────┴──────────────────────┴─────────────────────────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   fitalloc
//!   ├── align      - roundup! macro (8-byte alignment)
//!   ├── header     - header word codec (internal)
//!   ├── implicit   - ImplicitAllocator
//!   └── explicit   - ExplicitAllocator
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fitalloc::ExplicitAllocator;
//!
//! // An 8-byte-aligned backing region; any region works (a static
//! // buffer, an mmap'd range, ...) as long as the caller keeps it alive.
//! let mut region = vec![0u64; 128];
//! let heap_size = region.len() * 8;
//!
//! let mut allocator = ExplicitAllocator::new();
//!
//! unsafe {
//!     assert!(allocator.init(region.as_mut_ptr().cast(), heap_size));
//!
//!     let p = allocator.malloc(48);
//!     assert!(!p.is_null());
//!
//!     let p = allocator.realloc(p, 96);
//!     assert!(!p.is_null());
//!
//!     allocator.free(p);
//!     assert!(allocator.validate_heap());
//! }
//! ```
//!
//! ## Safety
//!
//! This crate is inherently unsafe: it hands out raw pointers into memory
//! the caller owns. The caller must:
//!
//! - keep the region alive and untouched (except through returned
//!   payloads) while the allocator uses it
//! - pass `free`/`realloc` only pointers this allocator returned, at most
//!   once
//! - serialize access externally when sharing an allocator across threads;
//!   the allocators hold no locks
//!
//! ## Limitations
//!
//! - **Fixed capacity**: the region never grows; exhaustion returns null
//! - **First fit only**: no best-fit or size-segregated searching
//! - **No left coalescing**: only the right neighbor is merged on free
//!   (explicit variant), so some fragmentation is permanent

pub mod align;
mod explicit;
mod header;
mod implicit;

pub use explicit::ExplicitAllocator;
pub use implicit::ImplicitAllocator;

/// Payload sizes and payload addresses are multiples of this many bytes.
pub const ALIGNMENT: usize = 8;

/// Upper bound on the payload size a single request may ask for.
pub const MAX_REQUEST: usize = 1 << 30;
