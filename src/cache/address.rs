//! Tier-tagged block addresses.
//!
//! A [`BlockAddress`] packs the [`MemoryTier`] that holds a KV block and the
//! block's slot within that tier's pool into a single `i32`:
//!
//! ```text
//!  31 30 29                                   0
//! +-----+--------------------------------------+
//! | tag |                slot                  |
//! +-----+--------------------------------------+
//! ```
//!
//! The word is what kernels receive, so construction on the hot path is
//! unchecked in release builds. A slot that is negative or spills into the tag
//! bits trips a `debug_assert!` in debug builds and is silently masked in
//! release builds, producing an address that points at the wrong block.
//! Code that is not on a hot path should use [`BlockAddress::try_new`].

use std::fmt;

use bytemuck::NoUninit;
use thiserror::Error;

use crate::cache::layout::TagLayout;
use crate::cache::tier::MemoryTier;

/// Number of high bits reserved for the tier tag. Every mask below derives
/// from this; widening it shrinks the addressable slot range.
pub const TIER_TAG_BITS: u32 = 2;

const LAYOUT: TagLayout = TagLayout::new(i32::BITS, TIER_TAG_BITS);

/// Bit position of the lowest tag bit.
pub const TIER_SHIFT: u32 = LAYOUT.shift();

/// Mask of the tag region of an encoded word.
pub const TIER_MASK: i32 = LAYOUT.tag_mask() as u32 as i32;

/// Mask of the slot region of an encoded word.
pub const INDEX_MASK: i32 = LAYOUT.index_mask() as u32 as i32;

/// Encoded tag of the secondary tier, for call sites that OR it in directly.
pub const SECONDARY_FLAG: i32 = LAYOUT.pack(0, MemoryTier::Secondary.tag() as u64) as u32 as i32;

/// Rejected address or tier values on the checked construction paths.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Block slot must be non-negative, got {0}")]
    NegativeSlot(i64),

    #[error("Block slot {slot} exceeds maximum addressable slot {max}")]
    SlotOverflow { slot: i64, max: i32 },

    #[error("Tier tag {0} is reserved")]
    ReservedTier(u8),

    #[error("Unknown memory tier: {0:?}")]
    UnknownTier(String),
}

/// Location of a KV block: which tier holds it and at which slot.
///
/// Plain `Copy` data with no identity. Moving a block to another tier means
/// building a new address (see [`BlockAddress::with_tier`]).
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, NoUninit)]
pub struct BlockAddress(i32);

impl BlockAddress {
    /// Largest slot index representable alongside a tag.
    pub const MAX_SLOT: i32 = INDEX_MASK;

    /// Encode `raw_slot` in `tier`.
    ///
    /// `raw_slot` must be non-negative and must not reach into the tag bits.
    /// Only debug builds check this; release builds mask the slot, which
    /// silently corrupts the address.
    #[inline]
    pub const fn new(raw_slot: i32, tier: MemoryTier) -> Self {
        debug_assert!(raw_slot >= 0, "block slot must be non-negative");
        debug_assert!(
            (raw_slot & TIER_MASK) == 0,
            "block slot overlaps the tier tag bits"
        );
        Self(LAYOUT.pack(raw_slot as u32 as u64, tier.tag() as u64) as u32 as i32)
    }

    /// Encode `raw_slot` in GPU memory.
    #[inline]
    pub const fn primary(raw_slot: i32) -> Self {
        Self::new(raw_slot, MemoryTier::Primary)
    }

    /// Encode `raw_slot` in host memory if `is_secondary`, GPU memory otherwise.
    #[inline]
    pub const fn from_secondary_flag(raw_slot: i32, is_secondary: bool) -> Self {
        let tier = if is_secondary {
            MemoryTier::Secondary
        } else {
            MemoryTier::Primary
        };
        Self::new(raw_slot, tier)
    }

    /// Checked construction for values that did not come from the allocator's
    /// own arithmetic.
    pub fn try_new(raw_slot: i32, tier: MemoryTier) -> Result<Self, AddressError> {
        if raw_slot < 0 {
            return Err(AddressError::NegativeSlot(raw_slot as i64));
        }
        if raw_slot & TIER_MASK != 0 {
            return Err(AddressError::SlotOverflow {
                slot: raw_slot as i64,
                max: Self::MAX_SLOT,
            });
        }
        Ok(Self::new(raw_slot, tier))
    }

    /// Checked construction from a host-side pool index.
    pub fn try_from_index(index: usize, tier: MemoryTier) -> Result<Self, AddressError> {
        let slot = i32::try_from(index).map_err(|_| AddressError::SlotOverflow {
            slot: i64::try_from(index).unwrap_or(i64::MAX),
            max: Self::MAX_SLOT,
        })?;
        Self::try_new(slot, tier)
    }

    /// Rebuild an address from an encoded word received from elsewhere
    /// (device buffers, logs). Rejects the reserved tier tag.
    pub fn try_from_word(word: i32) -> Result<Self, AddressError> {
        let tag = LAYOUT.tag_of(word as u32 as u64) as u8;
        MemoryTier::try_from(tag)?;
        Ok(Self(word))
    }

    /// The same slot in another tier.
    #[inline]
    pub const fn with_tier(self, tier: MemoryTier) -> Self {
        Self::new(self.slot(), tier)
    }

    /// Slot index within the tier's pool.
    #[inline]
    pub const fn slot(self) -> i32 {
        self.0 & INDEX_MASK
    }

    /// Tier holding the block.
    #[inline]
    pub const fn tier(self) -> MemoryTier {
        // Zero-extend before shifting: the tertiary tag sets the sign bit.
        MemoryTier::decode_tag(LAYOUT.tag_of(self.0 as u32 as u64) as u8)
    }

    /// Whether the block lives in GPU memory.
    #[inline]
    pub const fn is_primary(self) -> bool {
        matches!(self.tier(), MemoryTier::Primary)
    }

    /// Whether the block lives in host memory.
    #[inline]
    pub const fn is_secondary(self) -> bool {
        matches!(self.tier(), MemoryTier::Secondary)
    }

    /// Whether the block lives on disk.
    #[inline]
    pub const fn is_tertiary(self) -> bool {
        matches!(self.tier(), MemoryTier::Tertiary)
    }
}

impl fmt::Debug for BlockAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockAddress")
            .field("tier", &self.tier())
            .field("slot", &self.slot())
            .finish()
    }
}

impl fmt::Display for BlockAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tier(), self.slot())
    }
}

/// View a block table as the encoded words a kernel launch consumes.
///
/// Zero-copy; device code decodes each word with the same layout.
pub fn encoded_words(addresses: &[BlockAddress]) -> &[i32] {
    bytemuck::cast_slice(addresses)
}
