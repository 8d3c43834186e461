//! Issued address blocks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use super::registry::PoolId;
use crate::hierarchy::types::ClusterId;
use crate::utils::ip_utils::{block_size, netmask, prefix_mask, usable_hosts};

/// A subnet drawn from a pool for one cluster (or one uplink pairing).
///
/// Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBlock {
    pub pool: PoolId,
    /// Cluster the block was issued to; for uplink blocks the child cluster
    pub owner: ClusterId,
    pub network: Ipv4Addr,
    pub prefix_len: u8,
}

impl AddressBlock {
    pub fn netmask(&self) -> Ipv4Addr {
        netmask(self.prefix_len)
    }

    /// Last address covered by the block
    pub fn last_address(&self) -> Ipv4Addr {
        let start = u32::from(self.network) as u64;
        Ipv4Addr::from((start + block_size(self.prefix_len) - 1) as u32)
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & prefix_mask(self.prefix_len) == u32::from(self.network)
    }

    pub fn overlaps(&self, other: &AddressBlock) -> bool {
        self.contains(other.network) || other.contains(self.network)
    }

    pub fn capacity(&self) -> u64 {
        usable_hosts(self.prefix_len)
    }

    /// Host address of the `index`-th member (0-based)
    ///
    /// Members are numbered from the first usable address, so the head that
    /// leads the member list receives `.1`.
    pub fn host(&self, index: usize) -> Option<Ipv4Addr> {
        if index as u64 >= self.capacity() {
            return None;
        }
        let offset = if self.prefix_len >= 31 { 0 } else { 1 };
        Some(Ipv4Addr::from(
            u32::from(self.network) + offset + index as u32,
        ))
    }

    /// Prefix notation, e.g. `10.0.1.0/24`
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.network, self.prefix_len)
    }
}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.cidr(), self.pool, self.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(network: [u8; 4], prefix_len: u8) -> AddressBlock {
        AddressBlock {
            pool: PoolId(0),
            owner: ClusterId(0),
            network: Ipv4Addr::from(network),
            prefix_len,
        }
    }

    #[test]
    fn test_block_bounds() {
        let b = block([10, 0, 1, 0], 24);
        assert_eq!(b.netmask(), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(b.last_address(), Ipv4Addr::new(10, 0, 1, 255));
        assert!(b.contains(Ipv4Addr::new(10, 0, 1, 77)));
        assert!(!b.contains(Ipv4Addr::new(10, 0, 2, 0)));
        assert_eq!(b.cidr(), "10.0.1.0/24");
    }

    #[test]
    fn test_overlap() {
        let wide = block([10, 0, 0, 0], 16);
        let inner = block([10, 0, 5, 0], 24);
        let outside = block([10, 1, 0, 0], 24);
        assert!(wide.overlaps(&inner));
        assert!(inner.overlaps(&wide));
        assert!(!inner.overlaps(&outside));
        assert!(!wide.overlaps(&outside));
    }

    #[test]
    fn test_hosts() {
        let b = block([172, 16, 0, 4], 30);
        assert_eq!(b.host(0), Some(Ipv4Addr::new(172, 16, 0, 5)));
        assert_eq!(b.host(1), Some(Ipv4Addr::new(172, 16, 0, 6)));
        assert_eq!(b.host(2), None);
    }
}
