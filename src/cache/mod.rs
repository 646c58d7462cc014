//! KV cache block addressing.
//!
//! - [`tier`]: MemoryTier definitions
//! - [`address`]: BlockAddress, the tier-tagged slot word kernels consume
//! - [`layout`]: width-independent tag/index bit packing

pub mod address;
pub mod layout;
pub mod tier;
