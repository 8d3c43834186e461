//! Address pool registry.
//!
//! A pool is a contiguous IPv4 range carved into equally sized blocks. Each
//! level of the hierarchy owns one pool and a separate pool is reserved for
//! uplink pairings, so intra-level and inter-level addressing never share a
//! numbering space.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use super::block::AddressBlock;
use crate::hierarchy::types::{ClusterId, LevelId};
use crate::utils::ip_utils::{block_size, network_address};

/// Identifier of a pool inside an [`super::AddressAllocator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub u32);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool{}", self.0)
    }
}

/// What a pool numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// Intra-cluster addressing for one level
    Level(LevelId),
    /// Head-to-parent connectivity
    Uplink,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Level(level) => write!(f, "level {}", level),
            PoolKind::Uplink => write!(f, "uplink"),
        }
    }
}

/// Range and block size of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    pub base: Ipv4Addr,
    /// Prefix length of the whole pool
    pub pool_prefix: u8,
    /// Prefix length of every block issued from the pool
    pub block_prefix: u8,
}

impl PoolSpec {
    pub fn new(base: Ipv4Addr, pool_prefix: u8, block_prefix: u8) -> Self {
        Self {
            base: network_address(base, pool_prefix),
            pool_prefix,
            block_prefix,
        }
    }

    /// Default pool for a level: `10.<level-1>.0.0/16` in /24 blocks
    pub fn default_for_level(level: LevelId) -> Self {
        Self::new(Ipv4Addr::new(10, (level.0.saturating_sub(1) % 256) as u8, 0, 0), 16, 24)
    }

    /// Default uplink pool: `172.16.0.0/16` in /30 blocks
    pub fn default_uplink() -> Self {
        Self::new(Ipv4Addr::new(172, 16, 0, 0), 16, 30)
    }

    /// Number of blocks the pool can issue
    pub fn block_count(&self) -> u64 {
        if self.block_prefix < self.pool_prefix {
            return 0;
        }
        1u64 << (self.block_prefix - self.pool_prefix)
    }

    pub fn last_address(&self) -> Ipv4Addr {
        let start = u32::from(self.base) as u64;
        Ipv4Addr::from((start + block_size(self.pool_prefix) - 1) as u32)
    }

    pub fn overlaps(&self, other: &PoolSpec) -> bool {
        u32::from(self.base) <= u32::from(other.last_address())
            && u32::from(other.base) <= u32::from(self.last_address())
    }

    pub fn cidr(&self) -> String {
        format!("{}/{}", self.base, self.pool_prefix)
    }
}

/// A pool and the blocks it has issued so far
#[derive(Debug, Clone)]
pub struct AddressPool {
    pub id: PoolId,
    pub kind: PoolKind,
    pub spec: PoolSpec,
    /// Next subnet index; only ever increases
    pub(super) next_subnet: u64,
    pub(super) issued: BTreeMap<ClusterId, AddressBlock>,
    /// Owners in issue order
    pub(super) order: Vec<ClusterId>,
}

impl AddressPool {
    pub(super) fn new(id: PoolId, kind: PoolKind, spec: PoolSpec) -> Self {
        Self {
            id,
            kind,
            spec,
            next_subnet: 0,
            issued: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    /// Block previously issued to `owner`
    pub fn issued_to(&self, owner: ClusterId) -> Option<&AddressBlock> {
        self.issued.get(&owner)
    }

    /// Issued blocks in issue order
    pub fn blocks(&self) -> impl Iterator<Item = &AddressBlock> + '_ {
        self.order.iter().filter_map(move |owner| self.issued.get(owner))
    }

    pub fn issued_count(&self) -> usize {
        self.order.len()
    }

    pub fn remaining(&self) -> u64 {
        self.spec.block_count().saturating_sub(self.next_subnet)
    }
}
