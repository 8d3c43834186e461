//! IP address allocation module.
//!
//! This module hands out non-overlapping subnets to clusters: one pool per
//! hierarchy level plus a dedicated uplink pool for head-to-parent links.

pub mod allocator;
pub mod block;
pub mod registry;

// Re-export commonly used types
pub use allocator::AddressAllocator;
pub use block::AddressBlock;
pub use registry::{AddressPool, PoolId, PoolKind, PoolSpec};
