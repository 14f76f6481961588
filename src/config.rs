//! Pool construction configuration.

/// Number of slots in the first slab of a pool when nothing else is
/// configured.
pub const DEFAULT_NUM_SLOTS: usize = 1024;

/// Knobs applied to every pool an allocator creates.
///
/// The `initial_slots` seed trades memory footprint against growth
/// responsiveness: each pool's first slab holds that many slots, and every
/// later slab doubles the previous target. A seed of zero is treated as
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Capacity of the first slab created by each pool.
    pub initial_slots: usize,
    /// Byte written over a slot's payload when it is freed, before the slot
    /// rejoins the free list. `None` leaves freed payloads untouched.
    pub dealloc_pattern: Option<u8>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_slots: DEFAULT_NUM_SLOTS,
            dealloc_pattern: None,
        }
    }
}

impl PoolConfig {
    /// Configuration with a custom first-slab capacity.
    pub fn new(initial_slots: usize) -> Self {
        Self {
            initial_slots,
            ..Self::default()
        }
    }

    /// Debugging preset: freed slots are poisoned with `0xDE` so stale
    /// reads surface as garbage instead of plausible data.
    pub fn debug() -> Self {
        Self {
            dealloc_pattern: Some(0xDE),
            ..Self::default()
        }
    }

    /// Sets the poison byte written over freed slots.
    #[must_use]
    pub fn with_dealloc_pattern(mut self, pattern: u8) -> Self {
        self.dealloc_pattern = Some(pattern);
        self
    }
}
