//! Hierarchical address allocation.
//!
//! The allocator owns every pool of a planning run. Blocks are issued in
//! strict request order, a pool's subnet counter never goes backwards, and a
//! repeated request for the same `(pool, owner)` returns the block issued the
//! first time. Taking `&mut self` makes the allocator the single
//! serialization point for per-pool counters.

use log::{debug, info};
use std::net::Ipv4Addr;

use super::block::AddressBlock;
use super::registry::{AddressPool, PoolId, PoolKind, PoolSpec};
use crate::error::PlanError;
use crate::hierarchy::types::ClusterId;
use crate::utils::ip_utils::{block_size, usable_hosts};

/// Hands out disjoint address blocks from a set of non-overlapping pools
#[derive(Debug, Default)]
pub struct AddressAllocator {
    pools: Vec<AddressPool>,
}

impl AddressAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pool sized for at least `expected_blocks` blocks.
    ///
    /// Fails if the pool overlaps a registered pool or cannot hold the
    /// expected number of blocks.
    pub fn new_pool(
        &mut self,
        kind: PoolKind,
        spec: PoolSpec,
        expected_blocks: usize,
    ) -> Result<PoolId, PlanError> {
        let id = PoolId(self.pools.len() as u32);

        if spec.block_prefix < spec.pool_prefix || spec.block_prefix > 32 {
            return Err(PlanError::AddressSpaceExhausted {
                pool: id,
                reason: format!(
                    "block prefix /{} does not fit inside pool {}",
                    spec.block_prefix,
                    spec.cidr()
                ),
            });
        }

        if let Some(other) = self.pools.iter().find(|p| p.spec.overlaps(&spec)) {
            return Err(PlanError::OverlappingPools {
                pool: id,
                other: other.id,
                range: spec.cidr(),
            });
        }

        if expected_blocks as u64 > spec.block_count() {
            return Err(PlanError::AddressSpaceExhausted {
                pool: id,
                reason: format!(
                    "{} ({}) holds {} /{} blocks, {} expected",
                    spec.cidr(),
                    kind,
                    spec.block_count(),
                    spec.block_prefix,
                    expected_blocks
                ),
            });
        }

        info!(
            "Created {} address pool {} at {} (/{} blocks, {} expected)",
            kind,
            id,
            spec.cidr(),
            spec.block_prefix,
            expected_blocks
        );
        self.pools.push(AddressPool::new(id, kind, spec));
        Ok(id)
    }

    /// Issue the next block of `pool` to `owner`, sized for `member_count`
    /// addresses. Idempotent per `(pool, owner)`.
    pub fn allocate_block(
        &mut self,
        pool: PoolId,
        owner: ClusterId,
        member_count: usize,
    ) -> Result<AddressBlock, PlanError> {
        let entry = self
            .pools
            .get_mut(pool.0 as usize)
            .ok_or(PlanError::UnknownPool(pool))?;

        if let Some(existing) = entry.issued_to(owner) {
            debug!("Reusing block {} for {}", existing.cidr(), owner);
            return Ok(existing.clone());
        }

        let capacity = usable_hosts(entry.spec.block_prefix);
        if member_count as u64 > capacity {
            return Err(PlanError::AddressSpaceExhausted {
                pool,
                reason: format!(
                    "{} needs {} addresses but /{} blocks hold {}",
                    owner, member_count, entry.spec.block_prefix, capacity
                ),
            });
        }

        if entry.remaining() == 0 {
            return Err(PlanError::AddressSpaceExhausted {
                pool,
                reason: format!(
                    "all {} blocks of {} already issued",
                    entry.spec.block_count(),
                    entry.spec.cidr()
                ),
            });
        }

        let offset = entry.next_subnet * block_size(entry.spec.block_prefix);
        let network = Ipv4Addr::from((u32::from(entry.spec.base) as u64 + offset) as u32);
        entry.next_subnet += 1;

        let block = AddressBlock {
            pool,
            owner,
            network,
            prefix_len: entry.spec.block_prefix,
        };
        entry.issued.insert(owner, block.clone());
        entry.order.push(owner);

        debug!("Issued {} to {} from {}", block.cidr(), owner, pool);
        Ok(block)
    }

    pub fn pool(&self, id: PoolId) -> Option<&AddressPool> {
        self.pools.get(id.0 as usize)
    }

    pub fn pools(&self) -> &[AddressPool] {
        &self.pools
    }

    /// Every issued block across all pools, pool by pool in issue order
    pub fn all_blocks(&self) -> Vec<AddressBlock> {
        self.pools
            .iter()
            .flat_map(|p| p.blocks().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::types::LevelId;

    fn level_pool(alloc: &mut AddressAllocator, level: u32) -> PoolId {
        alloc
            .new_pool(
                PoolKind::Level(LevelId(level)),
                PoolSpec::default_for_level(LevelId(level)),
                4,
            )
            .unwrap()
    }

    #[test]
    fn test_blocks_follow_request_order() {
        let mut alloc = AddressAllocator::new();
        let pool = level_pool(&mut alloc, 1);

        let a = alloc.allocate_block(pool, ClusterId(0), 6).unwrap();
        let b = alloc.allocate_block(pool, ClusterId(1), 6).unwrap();
        let c = alloc.allocate_block(pool, ClusterId(2), 6).unwrap();

        assert_eq!(a.cidr(), "10.0.0.0/24");
        assert_eq!(b.cidr(), "10.0.1.0/24");
        assert_eq!(c.cidr(), "10.0.2.0/24");
        assert!(!a.overlaps(&b) && !b.overlaps(&c) && !a.overlaps(&c));
    }

    #[test]
    fn test_same_owner_gets_same_block() {
        let mut alloc = AddressAllocator::new();
        let pool = level_pool(&mut alloc, 1);

        let first = alloc.allocate_block(pool, ClusterId(7), 6).unwrap();
        let second = alloc.allocate_block(pool, ClusterId(7), 6).unwrap();
        assert_eq!(first, second);

        // The counter did not move for the repeated request
        let next = alloc.allocate_block(pool, ClusterId(8), 6).unwrap();
        assert_eq!(next.cidr(), "10.0.1.0/24");
        let issued = alloc.pool(pool).unwrap();
        assert_eq!(issued.issued_count(), 2);
        assert_eq!(issued.issued_to(ClusterId(7)), Some(&first));
    }

    #[test]
    fn test_member_count_exceeding_block() {
        let mut alloc = AddressAllocator::new();
        let pool = level_pool(&mut alloc, 1);

        match alloc.allocate_block(pool, ClusterId(0), 300) {
            Err(PlanError::AddressSpaceExhausted { pool: p, .. }) => assert_eq!(p, pool),
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert!(alloc.allocate_block(pool, ClusterId(0), 254).is_ok());
    }

    #[test]
    fn test_pool_runs_out_of_blocks() {
        let mut alloc = AddressAllocator::new();
        let spec = PoolSpec::new(Ipv4Addr::new(10, 9, 0, 0), 23, 24);
        let pool = alloc.new_pool(PoolKind::Uplink, spec, 2).unwrap();

        alloc.allocate_block(pool, ClusterId(0), 2).unwrap();
        assert_eq!(alloc.pool(pool).unwrap().remaining(), 1);
        alloc.allocate_block(pool, ClusterId(1), 2).unwrap();
        assert_eq!(alloc.pool(pool).unwrap().remaining(), 0);
        assert!(matches!(
            alloc.allocate_block(pool, ClusterId(2), 2),
            Err(PlanError::AddressSpaceExhausted { .. })
        ));
    }

    #[test]
    fn test_pool_sized_for_expected_clusters() {
        let mut alloc = AddressAllocator::new();
        let spec = PoolSpec::new(Ipv4Addr::new(10, 0, 0, 0), 23, 24);
        assert!(matches!(
            alloc.new_pool(PoolKind::Level(LevelId(1)), spec, 3),
            Err(PlanError::AddressSpaceExhausted { .. })
        ));
    }

    #[test]
    fn test_overlapping_pools_rejected() {
        let mut alloc = AddressAllocator::new();
        level_pool(&mut alloc, 1);
        let clash = PoolSpec::new(Ipv4Addr::new(10, 0, 128, 0), 17, 30);
        assert!(matches!(
            alloc.new_pool(PoolKind::Uplink, clash, 1),
            Err(PlanError::OverlappingPools { .. })
        ));
    }

    #[test]
    fn test_unknown_pool() {
        let mut alloc = AddressAllocator::new();
        assert_eq!(
            alloc.allocate_block(PoolId(3), ClusterId(0), 1),
            Err(PlanError::UnknownPool(PoolId(3)))
        );
    }

    #[test]
    fn test_uplink_blocks_disjoint_from_level_blocks() {
        let mut alloc = AddressAllocator::new();
        let level = level_pool(&mut alloc, 1);
        let uplink = alloc
            .new_pool(PoolKind::Uplink, PoolSpec::default_uplink(), 4)
            .unwrap();

        for i in 0..4 {
            alloc.allocate_block(level, ClusterId(i), 5).unwrap();
            alloc.allocate_block(uplink, ClusterId(i), 2).unwrap();
        }

        let blocks = alloc.all_blocks();
        assert_eq!(blocks.len(), 8);
        for (i, a) in blocks.iter().enumerate() {
            for b in &blocks[i + 1..] {
                assert!(!a.overlaps(b), "{} overlaps {}", a, b);
            }
        }
    }
}
