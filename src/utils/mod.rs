//! Shared utilities: IPv4 prefix arithmetic and plan validation.

pub mod ip_utils;
pub mod validation;

pub use ip_utils::{block_size, parse_cidr, usable_hosts};
pub use validation::{find_overlapping_blocks, validate_address_plan, validate_resource_plan};
