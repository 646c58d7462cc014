//! kv-block-index: KV cache block addressing for disaggregated LLM serving.
//!
//! Two pieces shared by the allocator, the GPU kernels and the transfer
//! subsystem:
//!   - [`cache::address::BlockAddress`]: tier tag + slot packed into one `i32`
//!   - [`transfer::policy::TransferPolicy`]: how blocks are handed off from a
//!     context instance to a generation instance

pub mod cache;
pub mod config;
pub mod transfer;
