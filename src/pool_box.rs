//! RAII handle for pool-allocated values.

use core::mem;
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

use tracing::warn;

use crate::allocator::PoolAllocator;
use crate::error::{PoolError, PoolResult};
use crate::slab::WORD;

/// Owns one pooled slot holding a `T`; the slot returns to its pool when
/// the box drops.
///
/// The handle borrows its allocator, so the compiler keeps the allocator
/// alive for as long as any box is outstanding.
///
/// # Examples
/// ```
/// use slabpool::PoolAllocator;
///
/// let alloc = PoolAllocator::new();
/// let mut pair = alloc.boxed([1u64, 2])?;
/// pair[0] = 3;
/// assert_eq!(*pair, [3, 2]);
/// drop(pair);
/// assert!(alloc.is_empty());
/// # Ok::<(), slabpool::PoolError>(())
/// ```
pub struct PoolBox<'a, T> {
    ptr: NonNull<T>,
    allocator: &'a PoolAllocator,
}

impl<'a, T> PoolBox<'a, T> {
    /// Moves `value` into a slot of `allocator`'s pool for
    /// `size_of::<T>()`'s class.
    ///
    /// Fails with [`PoolError::UnsupportedAlignment`] when `T` needs more
    /// than word alignment; slots are only word-aligned.
    pub fn new_in(value: T, allocator: &'a PoolAllocator) -> PoolResult<Self> {
        if align_of::<T>() > WORD {
            return Err(PoolError::UnsupportedAlignment {
                align: align_of::<T>(),
            });
        }
        let ptr = allocator.allocate(size_of::<T>())?.cast::<T>();
        // SAFETY: the slot holds at least `adjust(size_of::<T>())` bytes
        // and is word-aligned, which covers `align_of::<T>()`.
        unsafe { ptr.as_ptr().write(value) };
        Ok(Self { ptr, allocator })
    }

    /// Takes the value out, returning the slot to the pool without running
    /// `T`'s destructor.
    pub fn into_inner(self) -> T {
        // SAFETY: the slot holds an initialized `T`; `forget` below keeps
        // `drop` from reading it a second time.
        let value = unsafe { ptr::read(self.ptr.as_ptr()) };
        let released = self.allocator.deallocate(self.ptr.cast(), size_of::<T>());
        mem::forget(self);
        if let Err(err) = released {
            warn!(%err, "pool box failed to return its slot");
        }
        value
    }
}

impl<T> Deref for PoolBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the box exclusively owns an initialized `T` until drop.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for PoolBox<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as `deref`, and `&mut self` gives exclusivity.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for PoolBox<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the slot holds an initialized `T` that nothing else owns.
        unsafe { ptr::drop_in_place(self.ptr.as_ptr()) };
        // Drop must not panic; a slot that cannot be returned stays leaked
        // inside its slab.
        if let Err(err) = self.allocator.deallocate(self.ptr.cast(), size_of::<T>()) {
            warn!(%err, "pool box failed to return its slot");
        }
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for PoolBox<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct DropCounter(Rc<Cell<u32>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn drop_runs_the_destructor_and_returns_the_slot() {
        let alloc = PoolAllocator::with_slots(2);
        let drops = Rc::new(Cell::new(0));

        let boxed = PoolBox::new_in(DropCounter(Rc::clone(&drops)), &alloc).unwrap();
        assert_eq!(alloc.len(), 1);
        drop(boxed);
        assert_eq!(drops.get(), 1);
        assert_eq!(alloc.len(), 0);
    }

    #[test]
    fn into_inner_skips_the_destructor_but_frees_the_slot() {
        let alloc = PoolAllocator::with_slots(2);
        let drops = Rc::new(Cell::new(0));

        let boxed = PoolBox::new_in(DropCounter(Rc::clone(&drops)), &alloc).unwrap();
        let value = boxed.into_inner();
        assert_eq!(drops.get(), 0);
        assert_eq!(alloc.len(), 0);

        drop(value);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn over_aligned_types_are_rejected() {
        #[repr(align(64))]
        #[derive(Debug)]
        struct Wide(#[allow(dead_code)] u8);

        let alloc = PoolAllocator::new();
        let err = PoolBox::new_in(Wide(1), &alloc).unwrap_err();
        assert_eq!(err, PoolError::UnsupportedAlignment { align: 64 });
        assert_eq!(alloc.pool_count(), 0);
    }

    #[test]
    fn nested_drops_through_the_same_allocator() {
        struct Holder<'a>(#[allow(dead_code)] PoolBox<'a, u64>);

        let alloc = PoolAllocator::with_slots(4);
        let inner = alloc.boxed(7u64).unwrap();
        let outer = alloc.boxed(Holder(inner)).unwrap();
        assert_eq!(alloc.len(), 2);
        // Dropping the outer box drops the held box from inside `T`'s
        // destructor.
        drop(outer);
        assert_eq!(alloc.len(), 0);
    }
}
