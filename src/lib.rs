//! # slabpool
//!
//! Pooled fixed-size memory allocator for small, short-to-medium-lived
//! objects whose sizes fall into a bounded set of size classes.
//!
//! Three layers, composed bottom-up:
//! - a **slab** owns one contiguous buffer of equally-sized slots and
//!   allocates/frees them in O(1) through an intrusive free list stored in
//!   the free slots themselves;
//! - a **pool** owns a growing sequence of slabs for one size class,
//!   doubling the capacity of each new slab, biasing both allocation and
//!   free toward the most recently touched slab, and reclaiming empty
//!   trailing slabs;
//! - the [`PoolAllocator`] registry rounds request sizes up to their class
//!   with [`PoolAllocator::adjust`] and routes them to the right pool,
//!   creating pools lazily.
//!
//! The allocator is strictly single-threaded (`!Sync`); wrap it in an
//! external mutex if calls must cross threads. A per-thread shared
//! instance is available through [`with_default`] for callers that opt in.
//!
//! # Examples
//!
//! Raw slots, sized at runtime:
//! ```
//! use slabpool::PoolAllocator;
//!
//! let alloc = PoolAllocator::with_slots(4);
//! let a = alloc.allocate(24)?;
//! let b = alloc.allocate(24)?;
//! assert_ne!(a, b);
//! alloc.deallocate(b, 24)?;
//! alloc.deallocate(a, 24)?;
//! assert!(alloc.is_empty());
//! # Ok::<(), slabpool::PoolError>(())
//! ```
//!
//! Typed values with RAII release:
//! ```
//! use slabpool::PoolAllocator;
//!
//! let alloc = PoolAllocator::new();
//! let point = alloc.boxed((4.0f64, 2.0f64))?;
//! assert_eq!(point.0, 4.0);
//! drop(point); // slot returns to the pool
//! # Ok::<(), slabpool::PoolError>(())
//! ```

pub mod allocator;
pub mod config;
pub mod error;
pub mod pool;
pub mod pool_box;
pub mod stats;
pub mod utils;

mod slab;

pub use allocator::{PoolAllocator, with_default};
pub use config::{DEFAULT_NUM_SLOTS, PoolConfig};
pub use error::{PoolError, PoolResult};
pub use pool::Pool;
pub use pool_box::PoolBox;
pub use stats::{AllocatorStats, PoolStats};
