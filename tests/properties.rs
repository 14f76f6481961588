//! Property tests for allocator invariants under random interleavings.
//!
//! After any sequence of N allocations and M frees (M <= N) the live count
//! is N - M, every live pointer is distinct and word-aligned, and draining
//! everything leaves every touched pool at one retained slab minimum.

use core::ptr::NonNull;

use proptest::prelude::*;
use slabpool::PoolAllocator;

// ---------------------------------------------------------------------------
// Operation vocabulary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Op {
    /// Allocate `size` bytes and keep the pointer.
    Alloc(usize),
    /// Free one held pointer, picked by this selector.
    Free(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1usize..96).prop_map(Op::Alloc),
        2 => (0usize..1024).prop_map(Op::Free),
    ]
}

fn distinct(live: &[(NonNull<u8>, usize)]) -> bool {
    let mut addrs: Vec<usize> = live.iter().map(|(p, _)| p.as_ptr() as usize).collect();
    addrs.sort_unstable();
    addrs.dedup();
    addrs.len() == live.len()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn live_count_matches_and_pointers_stay_distinct(
        seed in 1usize..8,
        ops in proptest::collection::vec(op_strategy(), 1..200),
    ) {
        let alloc = PoolAllocator::with_slots(seed);
        let mut live: Vec<(NonNull<u8>, usize)> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc(size) => {
                    let ptr = alloc.allocate(size).unwrap();
                    prop_assert_eq!(ptr.as_ptr() as usize % align_of::<usize>(), 0);
                    live.push((ptr, size));
                }
                Op::Free(selector) => {
                    if !live.is_empty() {
                        let (ptr, size) = live.swap_remove(selector % live.len());
                        alloc.deallocate(ptr, size).unwrap();
                    }
                }
            }
            prop_assert_eq!(alloc.len(), live.len());
        }

        prop_assert!(distinct(&live));

        let touched = alloc.pool_count();
        for (ptr, size) in live.drain(..) {
            alloc.deallocate(ptr, size).unwrap();
        }
        prop_assert!(alloc.is_empty());
        // Shrink never removes a pool or its last slab.
        prop_assert_eq!(alloc.pool_count(), touched);
        for stats in (1usize..=96).filter_map(|s| alloc.pool_stats(s)) {
            prop_assert!(stats.slab_count >= 1);
        }
    }

    #[test]
    fn adjust_is_idempotent_and_classifying(size in 0usize..4096) {
        let word = align_of::<usize>();
        let class = PoolAllocator::adjust(size);
        prop_assert!(class >= size);
        prop_assert!(class >= word);
        prop_assert_eq!(class % word, 0);
        prop_assert_eq!(PoolAllocator::adjust(class), class);
    }

    #[test]
    fn slot_contents_survive_until_freed(
        payload in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        let alloc = PoolAllocator::with_slots(4);
        let size = payload.len();
        let ptr = alloc.allocate(size).unwrap();

        // A second allocation in the same class must not alias the first.
        let other = alloc.allocate(size).unwrap();

        unsafe {
            core::ptr::copy_nonoverlapping(payload.as_ptr(), ptr.as_ptr(), size);
            core::ptr::write_bytes(other.as_ptr(), 0xA5, size);
            let read_back = core::slice::from_raw_parts(ptr.as_ptr(), size);
            prop_assert_eq!(read_back, payload.as_slice());
        }

        alloc.deallocate(other, size).unwrap();
        alloc.deallocate(ptr, size).unwrap();
    }
}
