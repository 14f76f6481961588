//! Error types for pooled allocation.

use thiserror::Error;

/// Result alias for pooled allocation operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by [`PoolAllocator`](crate::PoolAllocator) and
/// [`Pool`](crate::Pool).
///
/// Addresses are carried as plain `usize` so the error stays `Send + Sync`
/// and can cross thread boundaries in reports even though the allocator
/// itself cannot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The system refused the backing buffer for a new slab.
    #[error("out of memory: failed to acquire a {bytes}-byte slab buffer")]
    OutOfMemory {
        /// Size of the buffer that could not be acquired.
        bytes: usize,
    },

    /// `slots * slot_size` does not fit in `usize`.
    #[error("slab geometry overflow: {slots} slots of {slot_size} bytes")]
    SizeOverflow {
        /// Slot count that could not be sized.
        slots: usize,
        /// Size class being grown.
        slot_size: usize,
    },

    /// The pointer does not belong to any slab of the pool it was returned
    /// to. A client bug: either the pointer never came from this allocator
    /// or the passed size adjusts to a different class.
    #[error("invalid free: {addr:#x} was not allocated from the {slot_size}-byte pool")]
    InvalidFree {
        /// Address of the rejected pointer.
        addr: usize,
        /// Size class of the pool that was searched.
        slot_size: usize,
    },

    /// Deallocation named a size class no allocation has ever created.
    #[error("unknown size class: no pool serves {slot_size}-byte slots")]
    UnknownSize {
        /// The adjusted size class that has no pool.
        slot_size: usize,
    },

    /// The requested type needs stricter alignment than the word-aligned
    /// slots provide.
    #[error("unsupported alignment {align}: pooled slots are word-aligned")]
    UnsupportedAlignment {
        /// The alignment that could not be honored.
        align: usize,
    },
}

impl PoolError {
    /// `true` when the underlying system refused memory.
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    /// `true` for a free of a pointer no slab claims.
    pub const fn is_invalid_free(&self) -> bool {
        matches!(self, Self::InvalidFree { .. })
    }

    /// `true` for errors caused by the caller rather than the system.
    pub const fn is_client_bug(&self) -> bool {
        matches!(
            self,
            Self::InvalidFree { .. } | Self::UnknownSize { .. } | Self::UnsupportedAlignment { .. }
        )
    }
}
