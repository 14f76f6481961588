//! Per-size-class pool: an ordered, growing sequence of slabs.

use core::ptr::NonNull;

use tracing::debug;

use crate::allocator::PoolAllocator;
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::slab::Slab;
use crate::stats::PoolStats;

/// All slabs for one size class.
///
/// The pool starts with no slabs and carves its first one on the first
/// allocation. When every slab is full it appends a new slab of double the
/// previous target capacity, so the cost of slab creation amortizes across
/// allocations. Frees locate the owning slab by expanding outward from the
/// slab that served the previous free; empty trailing slabs are reclaimed
/// opportunistically, never below one slab.
///
/// Single-threaded: wrap the owning allocator in an external mutex for
/// concurrent use.
pub struct Pool {
    slot_size: usize,
    /// Capacity of the next slab to be created.
    growth_count: usize,
    slabs: Vec<Slab>,
    /// Slab that served the last allocation.
    last_alloc: Option<usize>,
    /// Slab that claimed the last free.
    last_free: Option<usize>,
    dealloc_pattern: Option<u8>,
    total_allocs: u64,
    total_deallocs: u64,
}

impl Pool {
    /// A pool serving `slot_size`'s class with default configuration.
    ///
    /// `slot_size` is rounded up with [`PoolAllocator::adjust`].
    pub fn new(slot_size: usize) -> Self {
        Self::with_config(slot_size, PoolConfig::default())
    }

    /// A pool serving `slot_size`'s class, seeded and poisoned per
    /// `config`.
    pub fn with_config(slot_size: usize, config: PoolConfig) -> Self {
        Self {
            slot_size: PoolAllocator::adjust(slot_size),
            growth_count: config.initial_slots.max(1),
            slabs: Vec::new(),
            last_alloc: None,
            last_free: None,
            dealloc_pattern: config.dealloc_pattern,
            total_allocs: 0,
            total_deallocs: 0,
        }
    }

    /// Returns a word-aligned pointer to `slot_size` bytes.
    ///
    /// Slab selection, in order: the slab that served the last allocation,
    /// a linear scan for any non-full slab, and finally a freshly created
    /// slab of double the previous target capacity.
    pub fn allocate(&mut self) -> PoolResult<NonNull<u8>> {
        let slot = if self.slabs.is_empty() {
            let slab = Slab::new(self.growth_count, self.slot_size)?;
            debug!(
                slot_size = self.slot_size,
                capacity = self.growth_count,
                "pool carved its first slab"
            );
            self.slabs.push(slab);
            self.last_alloc = Some(0);
            self.slabs[0].allocate()
        } else if let Some(idx) = self.last_alloc.filter(|&i| !self.slabs[i].is_full()) {
            self.slabs[idx].allocate()
        } else if let Some(idx) = self.slabs.iter().position(|slab| !slab.is_full()) {
            self.last_alloc = Some(idx);
            self.slabs[idx].allocate()
        } else {
            self.grow()?.allocate()
        };

        // Every branch selected a slab with a free slot; `None` here means
        // the free list is corrupt.
        let ptr = slot.ok_or(PoolError::OutOfMemory {
            bytes: self.slot_size,
        })?;
        self.total_allocs += 1;
        Ok(ptr)
    }

    /// Appends a slab of double the previous target capacity.
    ///
    /// The slab is built before any pool state changes, so a failed build
    /// leaves the pool exactly as it was.
    fn grow(&mut self) -> PoolResult<&mut Slab> {
        let next = self
            .growth_count
            .checked_mul(2)
            .ok_or(PoolError::SizeOverflow {
                slots: self.growth_count,
                slot_size: self.slot_size,
            })?;
        let slab = Slab::new(next, self.slot_size)?;
        debug!(
            slot_size = self.slot_size,
            capacity = next,
            slabs = self.slabs.len() + 1,
            "pool grew"
        );
        self.growth_count = next;
        self.slabs.push(slab);
        let idx = self.slabs.len() - 1;
        self.last_alloc = Some(idx);
        Ok(&mut self.slabs[idx])
    }

    /// Returns a slot to the slab that owns `ptr`.
    ///
    /// The search starts at the slab that claimed the previous free and
    /// expands outward one slab at a time in both directions. A pointer no
    /// slab claims fails with [`PoolError::InvalidFree`] once both cursors
    /// leave the slab range.
    pub fn deallocate(&mut self, ptr: NonNull<u8>) -> PoolResult<()> {
        let slab_count = self.slabs.len();
        let (mut lo, mut hi) = match self.last_free.take() {
            Some(idx) => (idx as isize, idx + 1),
            None => (-1, 0),
        };

        let owner = loop {
            if lo < 0 && hi >= slab_count {
                return Err(PoolError::InvalidFree {
                    addr: ptr.as_ptr() as usize,
                    slot_size: self.slot_size,
                });
            }
            if lo >= 0 {
                if self.slabs[lo as usize].deallocate(ptr, self.dealloc_pattern) {
                    break lo as usize;
                }
                lo -= 1;
            }
            if hi < slab_count {
                if self.slabs[hi].deallocate(ptr, self.dealloc_pattern) {
                    break hi;
                }
                hi += 1;
            }
        };

        self.last_free = Some(owner);
        self.total_deallocs += 1;
        if self.slabs[owner].is_empty() {
            self.shrink(owner);
        }
        Ok(())
    }

    /// Opportunistic reclamation, run after slab `freed` became empty.
    ///
    /// Policy: a sole slab is always retained; a freed slab already at the
    /// tail is left in place for reuse; otherwise, when the tail slab is
    /// also empty, the tail is destroyed and the freed slab is swapped to
    /// the tail, where the next shrink can claim it. Live slots are never
    /// moved; only whole-slab headers swap positions.
    fn shrink(&mut self, freed: usize) {
        debug_assert!(self.slabs[freed].is_empty());
        // Slab geometry may change below; the hint would dangle.
        self.last_free = None;

        if self.slabs.len() == 1 {
            return;
        }
        let last = self.slabs.len() - 1;
        if freed == last {
            return;
        }
        if !self.slabs[last].is_empty() {
            return;
        }

        if let Some(removed) = self.slabs.pop() {
            // The next grow doubles from the reclaimed capacity, not from
            // the pre-reclaim target.
            self.growth_count = removed.capacity();
            debug!(
                slot_size = self.slot_size,
                capacity = removed.capacity(),
                slabs = self.slabs.len(),
                "pool reclaimed its tail slab"
            );
        }
        if self.last_alloc == Some(last) {
            self.last_alloc = None;
        }

        let tail = self.slabs.len() - 1;
        if freed != tail {
            self.slabs.swap(freed, tail);
            self.last_alloc = match self.last_alloc {
                Some(i) if i == freed => Some(tail),
                Some(i) if i == tail => Some(freed),
                other => other,
            };
        }
    }

    /// Live slots across every slab. O(slab count).
    pub fn len(&self) -> usize {
        self.slabs.iter().map(Slab::len).sum()
    }

    /// `true` when no slot is live.
    pub fn is_empty(&self) -> bool {
        self.slabs.iter().all(Slab::is_empty)
    }

    /// Total slots across every slab, used and free. O(slab count).
    pub fn capacity(&self) -> usize {
        self.slabs.iter().map(Slab::capacity).sum()
    }

    /// Size class served by this pool.
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Number of slabs currently held.
    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    /// Capacity of each slab in storage order.
    pub fn slab_capacities(&self) -> Vec<usize> {
        self.slabs.iter().map(Slab::capacity).collect()
    }

    /// Occupancy snapshot.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            slot_size: self.slot_size,
            slab_count: self.slabs.len(),
            used_slots: self.len(),
            total_slots: self.capacity(),
            total_allocs: self.total_allocs,
            total_deallocs: self.total_deallocs,
        }
    }
}
