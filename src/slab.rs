//! Fixed-capacity slab of equally-sized slots.
//!
//! # Safety
//!
//! This module is the crate's unsafe core. A slab owns one word-aligned
//! heap buffer and hands out raw slot pointers into it:
//! - The buffer is held as a raw `NonNull<[usize]>` (never as a live
//!   reference), so client pointers into it stay valid for the slab's
//!   whole lifetime regardless of how the `Slab` value itself moves.
//! - A free slot stores the index of the next free slot in its first word;
//!   that word is read and written only while the slot is free.
//! - `used` and `next_free` are mutated only through `&mut self`; the
//!   crate's concurrency contract is single-threaded.
//! - The buffer is released exactly once, in `Drop`.

use core::ptr::NonNull;

use tracing::trace;

use crate::error::{PoolError, PoolResult};

/// Size (and alignment) of the free-list index type. Slot sizes are always
/// multiples of this, so every slot can hold an index and every index store
/// is an aligned word write.
pub(crate) const WORD: usize = size_of::<usize>();

/// One contiguous allocation of `capacity * slot_size` bytes, carved into
/// `capacity` equal slots chained through an intrusive free list.
#[derive(Debug)]
pub(crate) struct Slab {
    /// Owned word buffer; reboxed and released in `Drop`.
    buf: NonNull<[usize]>,
    /// First slot address. Slot `k` lives at `base + k * slot_size`.
    base: usize,
    /// One past the last slot byte.
    end: usize,
    slot_size: usize,
    capacity: usize,
    used: usize,
    /// Head of the free list; `capacity` is the "no free slot" sentinel.
    next_free: usize,
}

// SAFETY: the slab exclusively owns its buffer; nothing in it is tied to
// the creating thread. (`NonNull` suppresses the auto impl.)
unsafe impl Send for Slab {}

impl Slab {
    /// Acquires and seeds a slab of `capacity` slots of `slot_size` bytes.
    ///
    /// The buffer is zero-filled, then slot `k`'s first word is chained to
    /// `k + 1`, the final slot holding the `capacity` sentinel. Fails with
    /// [`PoolError::OutOfMemory`] when the buffer is refused; no slab
    /// exists on failure.
    pub(crate) fn new(capacity: usize, slot_size: usize) -> PoolResult<Self> {
        debug_assert!(capacity > 0);
        debug_assert!(slot_size >= WORD && slot_size % WORD == 0);

        let bytes = capacity
            .checked_mul(slot_size)
            .ok_or(PoolError::SizeOverflow {
                slots: capacity,
                slot_size,
            })?;

        // A word buffer rather than a byte buffer: slot 0 and every
        // free-list word land on `align_of::<usize>()` boundaries.
        let mut words: Vec<usize> = Vec::new();
        words
            .try_reserve_exact(bytes / WORD)
            .map_err(|_| PoolError::OutOfMemory { bytes })?;
        words.resize(bytes / WORD, 0);

        let raw = Box::into_raw(words.into_boxed_slice());
        // SAFETY: `Box::into_raw` never returns null.
        let buf = unsafe { NonNull::new_unchecked(raw) };
        let base = buf.as_ptr().cast::<usize>() as usize;

        let mut slab = Self {
            buf,
            base,
            end: base + bytes,
            slot_size,
            capacity,
            used: 0,
            next_free: 0,
        };
        slab.seed_free_list();
        trace!(capacity, slot_size, "slab initialized");
        Ok(slab)
    }

    /// Words between consecutive slot heads.
    #[inline]
    fn stride(&self) -> usize {
        self.slot_size / WORD
    }

    #[inline]
    fn words(&self) -> *mut usize {
        self.buf.as_ptr().cast::<usize>()
    }

    /// Slot `k`'s base address. Callers keep `k < capacity`.
    #[inline]
    fn slot_ptr(&self, k: usize) -> *mut u8 {
        debug_assert!(k < self.capacity);
        // SAFETY: `k * stride` indexes slot k's first word, in bounds for
        // the buffer.
        unsafe { self.words().add(k * self.stride()).cast::<u8>() }
    }

    fn seed_free_list(&mut self) {
        for k in 0..self.capacity {
            // SAFETY: slot k's first word, in bounds; no client pointer
            // exists yet.
            unsafe { self.words().add(k * self.stride()).write(k + 1) };
        }
    }

    /// Pops the free-list head. `None` means the slab is full, not an
    /// error; the pool decides what happens next.
    pub(crate) fn allocate(&mut self) -> Option<NonNull<u8>> {
        if self.used == self.capacity {
            return None;
        }
        let slot = self.next_free;
        debug_assert!(slot < self.capacity);
        let head = self.slot_ptr(slot);
        // SAFETY: `slot` is free, so its first word holds the next free
        // index and no client alias exists.
        self.next_free = unsafe { head.cast::<usize>().read() };
        self.used += 1;
        if self.used == self.capacity {
            self.next_free = self.capacity;
        }
        NonNull::new(head)
    }

    /// Pushes the slot holding `ptr` back onto the free-list head.
    ///
    /// Returns `false` when the pointer is not a live slot of this slab:
    /// outside the buffer, torn across a slot boundary, or the slab has no
    /// live slot at all. The pool uses the `false` answer to keep probing
    /// its other slabs.
    pub(crate) fn deallocate(&mut self, ptr: NonNull<u8>, dealloc_pattern: Option<u8>) -> bool {
        let addr = ptr.as_ptr() as usize;
        if addr < self.base || addr >= self.end {
            return false;
        }
        let offset = addr - self.base;
        if offset % self.slot_size != 0 {
            return false;
        }
        // An empty slab owns no live slot; claiming the pointer here would
        // underflow `used`.
        if self.used == 0 {
            return false;
        }
        let slot = offset / self.slot_size;

        if let Some(pattern) = dealloc_pattern {
            // SAFETY: the slot is in bounds and its payload is dead from
            // here on.
            unsafe { core::ptr::write_bytes(ptr.as_ptr(), pattern, self.slot_size) };
        }

        // SAFETY: the slot is in bounds; its first word becomes free-list
        // storage again.
        unsafe { ptr.as_ptr().cast::<usize>().write(self.next_free) };
        self.next_free = slot;
        self.used -= 1;
        true
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub(crate) fn is_full(&self) -> bool {
        self.next_free == self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.used
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for Slab {
    fn drop(&mut self) {
        trace!(
            capacity = self.capacity,
            slot_size = self.slot_size,
            "slab released"
        );
        // SAFETY: `buf` came from `Box::into_raw` in `new` and is released
        // exactly once, here.
        unsafe { drop(Box::from_raw(self.buf.as_ptr())) };
    }
}
