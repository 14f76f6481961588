//! Size-class registry: routes requests to the pool for their class.

use core::cell::RefCell;
use core::fmt;
use core::ptr::NonNull;

use hashbrown::HashMap;
use tracing::debug;

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::pool::Pool;
use crate::pool_box::PoolBox;
use crate::slab::WORD;
use crate::stats::{AllocatorStats, PoolStats};
use crate::utils::align_up;

/// Pooled fixed-size allocator.
///
/// Maps every request to a size class with [`adjust`](Self::adjust) and
/// serves it from the pool for that class, creating pools lazily. Returned
/// pointers are word-aligned, borrowed until the matching
/// [`deallocate`](Self::deallocate), and must all be returned before the
/// allocator drops (outstanding slots are a leak for the client, never
/// corruption: the drop releases every slab buffer exactly once).
///
/// The allocator is single-threaded (`!Sync`); concurrent use requires an
/// external mutex around each call. It cannot be cloned, since a clone
/// would co-own the same slab memory, but it moves freely.
///
/// # Examples
/// ```
/// use slabpool::PoolAllocator;
///
/// let alloc = PoolAllocator::with_slots(4);
/// let ptr = alloc.allocate(24)?;
/// alloc.deallocate(ptr, 24)?;
/// # Ok::<(), slabpool::PoolError>(())
/// ```
pub struct PoolAllocator {
    inner: RefCell<Registry>,
}

struct Registry {
    pools: HashMap<usize, Pool>,
    config: PoolConfig,
}

impl PoolAllocator {
    /// Allocator whose pools seed their first slab with
    /// [`DEFAULT_NUM_SLOTS`](crate::DEFAULT_NUM_SLOTS) slots.
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Allocator whose pools seed their first slab with `initial_slots`
    /// slots.
    pub fn with_slots(initial_slots: usize) -> Self {
        Self::with_config(PoolConfig::new(initial_slots))
    }

    /// Allocator applying `config` to every pool it creates.
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            inner: RefCell::new(Registry {
                pools: HashMap::new(),
                config,
            }),
        }
    }

    /// Rounds `size` up to its size class: the next multiple of the machine
    /// word, floored at one word so every slot can hold a free-list index.
    ///
    /// Idempotent (`adjust(adjust(n)) == adjust(n)`) and pure; exposed so
    /// clients can query which class a size lands in.
    pub const fn adjust(size: usize) -> usize {
        if size > usize::MAX - (WORD - 1) {
            // Saturate to the largest class; slab sizing then rejects the
            // request instead of wrapping into a tiny class.
            return usize::MAX & !(WORD - 1);
        }
        let class = align_up(size, WORD);
        if class < WORD { WORD } else { class }
    }

    /// Returns a word-aligned pointer to at least `adjust(size)` bytes.
    ///
    /// The pool for the class is created on first use, seeded with the
    /// configured slot count. Fails with [`PoolError::OutOfMemory`] when a
    /// slab buffer is refused; the registry is left consistent.
    pub fn allocate(&self, size: usize) -> PoolResult<NonNull<u8>> {
        let class = Self::adjust(size);
        let mut inner = self.inner.borrow_mut();
        let config = inner.config;
        let pool = inner.pools.entry(class).or_insert_with(|| {
            debug!(slot_size = class, "pool created for new size class");
            Pool::with_config(class, config)
        });
        pool.allocate()
    }

    /// Releases a pointer previously returned by
    /// [`allocate`](Self::allocate) with a size adjusting to the same
    /// class.
    ///
    /// Fails with [`PoolError::UnknownSize`] when no pool serves the class
    /// and [`PoolError::InvalidFree`] when the class's pool does not own
    /// the pointer.
    pub fn deallocate(&self, ptr: NonNull<u8>, size: usize) -> PoolResult<()> {
        let class = Self::adjust(size);
        let mut inner = self.inner.borrow_mut();
        let pool = inner
            .pools
            .get_mut(&class)
            .ok_or(PoolError::UnknownSize { slot_size: class })?;
        pool.deallocate(ptr)
    }

    /// Moves `value` into a pooled slot, returning an RAII handle that
    /// frees the slot on drop.
    pub fn boxed<T>(&self, value: T) -> PoolResult<PoolBox<'_, T>> {
        PoolBox::new_in(value, self)
    }

    /// Live slots across every pool. O(total slab count).
    pub fn len(&self) -> usize {
        self.inner.borrow().pools.values().map(Pool::len).sum()
    }

    /// `true` when no slot is live in any pool.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().pools.values().all(Pool::is_empty)
    }

    /// Total slots across every pool. O(total slab count).
    pub fn capacity(&self) -> usize {
        self.inner.borrow().pools.values().map(Pool::capacity).sum()
    }

    /// Number of size classes with a live pool.
    pub fn pool_count(&self) -> usize {
        self.inner.borrow().pools.len()
    }

    /// Aggregate occupancy snapshot.
    pub fn stats(&self) -> AllocatorStats {
        let inner = self.inner.borrow();
        let mut stats = AllocatorStats {
            pool_count: inner.pools.len(),
            ..AllocatorStats::default()
        };
        for pool in inner.pools.values() {
            let used = pool.len();
            let total = pool.capacity();
            stats.used_slots += used;
            stats.total_slots += total;
            stats.used_bytes += used * pool.slot_size();
            stats.total_bytes += total * pool.slot_size();
        }
        stats
    }

    /// Snapshot of the pool serving `size`'s class, if one exists.
    pub fn pool_stats(&self, size: usize) -> Option<PoolStats> {
        self.inner
            .borrow()
            .pools
            .get(&Self::adjust(size))
            .map(Pool::stats)
    }
}

impl Default for PoolAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PoolAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("PoolAllocator")
                .field("pool_count", &inner.pools.len())
                .field("config", &inner.config)
                .finish_non_exhaustive(),
            Err(_) => f.write_str("PoolAllocator { <borrowed> }"),
        }
    }
}

thread_local! {
    static DEFAULT: PoolAllocator = PoolAllocator::new();
}

/// Runs `f` against this thread's shared default allocator.
///
/// The default is created on first use with
/// [`PoolConfig::default`](crate::PoolConfig::default) and lives until the
/// thread exits. There is no process-wide instance; prefer passing an
/// explicit [`PoolAllocator`] so unrelated subsystems stay decoupled.
pub fn with_default<R>(f: impl FnOnce(&PoolAllocator) -> R) -> R {
    DEFAULT.with(|alloc| f(alloc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_rounds_up_and_floors_at_the_word() {
        assert_eq!(PoolAllocator::adjust(0), WORD);
        assert_eq!(PoolAllocator::adjust(1), WORD);
        assert_eq!(PoolAllocator::adjust(WORD), WORD);
        assert_eq!(PoolAllocator::adjust(WORD + 1), 2 * WORD);
        for size in 0..256 {
            let class = PoolAllocator::adjust(size);
            assert!(class >= size);
            assert_eq!(class % WORD, 0);
            assert_eq!(PoolAllocator::adjust(class), class);
        }
    }

    #[test]
    fn pools_appear_lazily() {
        let alloc = PoolAllocator::with_slots(2);
        assert_eq!(alloc.pool_count(), 0);
        let a = alloc.allocate(8).unwrap();
        let b = alloc.allocate(32).unwrap();
        assert_eq!(alloc.pool_count(), 2);
        alloc.deallocate(a, 8).unwrap();
        alloc.deallocate(b, 32).unwrap();
        // Pools persist after their slots drain.
        assert_eq!(alloc.pool_count(), 2);
        assert!(alloc.is_empty());
    }

    #[test]
    fn absurd_sizes_error_instead_of_wrapping() {
        assert_eq!(PoolAllocator::adjust(usize::MAX), usize::MAX & !(WORD - 1));
        let alloc = PoolAllocator::new();
        let err = alloc.allocate(usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            PoolError::SizeOverflow { .. } | PoolError::OutOfMemory { .. }
        ));
    }

    #[test]
    fn unknown_size_class_is_detected() {
        let alloc = PoolAllocator::new();
        let mut word = 0u64;
        let err = alloc
            .deallocate(NonNull::from(&mut word).cast(), 64)
            .unwrap_err();
        assert_eq!(err, PoolError::UnknownSize { slot_size: 64 });
    }

    #[test]
    fn with_default_reuses_one_allocator_per_thread() {
        let first = with_default(|alloc| {
            let ptr = alloc.allocate(16).unwrap();
            alloc.deallocate(ptr, 16).unwrap();
            alloc as *const PoolAllocator as usize
        });
        let second = with_default(|alloc| alloc as *const PoolAllocator as usize);
        assert_eq!(first, second);
    }
}
