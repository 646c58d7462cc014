//! Memory tiers a KV block can reside in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::address::AddressError;

/// Identifies which memory pool currently holds a block.
///
/// The discriminant is the tag written into the top bits of a
/// [`BlockAddress`](crate::cache::address::BlockAddress). Tag 3 is reserved.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTier {
    /// GPU device memory.
    Primary = 0,
    /// Host DRAM.
    Secondary = 1,
    /// Local disk.
    Tertiary = 2,
}

impl MemoryTier {
    /// All tiers in encoding order.
    pub const ALL: [MemoryTier; 3] = [
        MemoryTier::Primary,
        MemoryTier::Secondary,
        MemoryTier::Tertiary,
    ];

    /// The tag value stored in an encoded address.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Decode a tag read back out of a validly constructed address.
    ///
    /// Constructors only ever write tags 0..=2, so the reserved tag cannot
    /// show up here; it falls through to `Tertiary` to keep decoding total.
    pub(crate) const fn decode_tag(tag: u8) -> MemoryTier {
        match tag {
            0 => MemoryTier::Primary,
            1 => MemoryTier::Secondary,
            _ => MemoryTier::Tertiary,
        }
    }

    /// The next slower tier, or None if already on disk.
    ///
    /// Migrations are expected along Primary ↔ Secondary ↔ Tertiary only.
    /// Nothing here enforces that; the allocator owns transition rules.
    pub fn demote(self) -> Option<MemoryTier> {
        match self {
            MemoryTier::Primary => Some(MemoryTier::Secondary),
            MemoryTier::Secondary => Some(MemoryTier::Tertiary),
            MemoryTier::Tertiary => None,
        }
    }

    /// The next faster tier, or None if already on the GPU.
    pub fn promote(self) -> Option<MemoryTier> {
        match self {
            MemoryTier::Primary => None,
            MemoryTier::Secondary => Some(MemoryTier::Primary),
            MemoryTier::Tertiary => Some(MemoryTier::Secondary),
        }
    }
}

impl TryFrom<u8> for MemoryTier {
    type Error = AddressError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(MemoryTier::Primary),
            1 => Ok(MemoryTier::Secondary),
            2 => Ok(MemoryTier::Tertiary),
            other => Err(AddressError::ReservedTier(other)),
        }
    }
}

impl FromStr for MemoryTier {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" | "gpu" => Ok(MemoryTier::Primary),
            "secondary" | "host" | "ram" => Ok(MemoryTier::Secondary),
            "tertiary" | "disk" => Ok(MemoryTier::Tertiary),
            _ => Err(AddressError::UnknownTier(s.to_string())),
        }
    }
}

impl fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryTier::Primary => write!(f, "GPU"),
            MemoryTier::Secondary => write!(f, "HOST"),
            MemoryTier::Tertiary => write!(f, "DISK"),
        }
    }
}
