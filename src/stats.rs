//! Point-in-time snapshots of pool and allocator occupancy.
//!
//! Snapshots are computed on demand by walking slab headers; nothing here
//! is sampled continuously. `used`/`total` pairs count slots, the lifetime
//! counters count operations.

/// Snapshot of one pool (one size class).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Size class served by the pool, in bytes.
    pub slot_size: usize,
    /// Number of slabs currently held.
    pub slab_count: usize,
    /// Live slots across all slabs.
    pub used_slots: usize,
    /// Total slots across all slabs, used and free.
    pub total_slots: usize,
    /// Allocations served over the pool's lifetime.
    pub total_allocs: u64,
    /// Deallocations served over the pool's lifetime.
    pub total_deallocs: u64,
}

/// Aggregate snapshot across every pool of an allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Number of size classes with a live pool.
    pub pool_count: usize,
    /// Live slots across every pool.
    pub used_slots: usize,
    /// Total slots across every pool.
    pub total_slots: usize,
    /// Live bytes across every pool (`used_slots` weighted by slot size).
    pub used_bytes: usize,
    /// Total bytes of slab capacity across every pool.
    pub total_bytes: usize,
}
