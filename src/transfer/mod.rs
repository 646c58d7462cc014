//! Cross-instance KV block transfer.
//!
//! - [`policy`]: TransferPolicy, transport backend and handoff limits

pub mod policy;
