//! Integration tests for tier-tagged block addresses.

use std::collections::HashSet;

use kv_block_index::cache::address::{encoded_words, BlockAddress, INDEX_MASK, TIER_MASK};
use kv_block_index::cache::tier::MemoryTier;

#[test]
fn test_round_trip_across_slot_range() {
    let slots = (0..30).map(|bit| 1i32 << bit).chain([0, 3, 999_999, BlockAddress::MAX_SLOT]);

    for slot in slots {
        for tier in MemoryTier::ALL {
            let addr = BlockAddress::new(slot, tier);
            assert_eq!(addr.slot(), slot, "slot for {tier}");
            assert_eq!(addr.tier(), tier, "tier for slot {slot}");
        }
    }
}

#[test]
fn test_migration_builds_new_address() {
    // GPU -> host -> disk, as an allocator would evict a block.
    let gpu = BlockAddress::primary(4242);
    let host = gpu.with_tier(gpu.tier().demote().unwrap());
    let disk = host.with_tier(host.tier().demote().unwrap());

    assert!(gpu.is_primary());
    assert!(host.is_secondary());
    assert!(disk.is_tertiary());
    assert_eq!(disk.slot(), 4242);
    assert!(disk.tier().demote().is_none());

    // Promoting back lands on the original address.
    let back = disk
        .with_tier(MemoryTier::Secondary)
        .with_tier(MemoryTier::Primary);
    assert_eq!(back, gpu);
}

#[test]
fn test_equal_iff_same_word() {
    let addrs: Vec<BlockAddress> = MemoryTier::ALL
        .iter()
        .flat_map(|&tier| (0..64).map(move |slot| BlockAddress::new(slot, tier)))
        .collect();

    let unique: HashSet<BlockAddress> = addrs.iter().copied().collect();
    assert_eq!(unique.len(), addrs.len());

    let words: HashSet<i32> = encoded_words(&addrs).iter().copied().collect();
    assert_eq!(words.len(), addrs.len());
}

#[test]
fn test_kernel_view_decodes_with_masks() {
    let table: Vec<BlockAddress> = (0..16)
        .map(|i| BlockAddress::new(i * 3, MemoryTier::ALL[i as usize % 3]))
        .collect();

    for (addr, word) in table.iter().zip(encoded_words(&table)) {
        assert_eq!(word & INDEX_MASK, addr.slot());
        let tag = ((*word as u32) & (TIER_MASK as u32)) >> 30;
        assert_eq!(tag as u8, addr.tier().tag());
    }
}

#[test]
fn test_checked_path_never_panics() {
    for raw in [i32::MIN, -1, 1 << 30, i32::MAX] {
        assert!(BlockAddress::try_new(raw, MemoryTier::Primary).is_err());
    }
    for raw in [0, 1, BlockAddress::MAX_SLOT] {
        assert!(BlockAddress::try_new(raw, MemoryTier::Secondary).is_ok());
    }
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "overlaps the tier tag bits")]
fn test_host_computed_overflow_is_caught_in_debug() {
    let pool_blocks: i32 = BlockAddress::MAX_SLOT;
    let _ = BlockAddress::new(pool_blocks + 1, MemoryTier::Secondary);
}
