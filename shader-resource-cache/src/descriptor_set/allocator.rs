//! Memory management of the resource slots of shader resource caches.
//!
//! A [`ShaderResourceCache`] asks its allocator for exactly one block of slots during its
//! lifetime, when its sets are initialized, and gives the same block back when it is dropped.
//! [`StandardResourceCacheAllocator`] allocates the blocks on the heap. Applications that want
//! to pool blocks, or to account for them, can implement [`ResourceCacheAllocator`] themselves.
//!
//! [`ShaderResourceCache`]: super::ShaderResourceCache

use super::ResourceSlot;
use std::{
    fmt::Debug,
    sync::atomic::{AtomicUsize, Ordering},
};
use thiserror::Error;

/// Types that provide the storage of shader resource caches.
///
/// The allocator is shared by every cache that was initialized with it, so it may be called
/// from several threads at once.
pub trait ResourceCacheAllocator: Debug + Send + Sync {
    /// Allocates a block of `resource_count` slots.
    ///
    /// Every slot of the returned block must be `ResourceSlot::default()`, and the block must
    /// hold exactly `resource_count` slots.
    fn allocate(&self, resource_count: usize) -> Result<Box<[ResourceSlot]>, AllocationError>;

    /// Takes back a block that was returned by `allocate`.
    ///
    /// No object is bound to any slot of the block anymore.
    fn free(&self, resources: Box<[ResourceSlot]>);
}

/// Error that can happen when allocating the slots of a shader resource cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// There is not enough host memory for the block.
    #[error("not enough host memory to allocate the shader resource cache")]
    OutOfHostMemory,

    /// The allocation would exceed the number of slots the allocator may hand out at once.
    #[error(
        "allocating {requested} resource slots would exceed the limit of {limit} slots of the \
        allocator"
    )]
    SlotLimitExceeded { requested: usize, limit: usize },
}

/// Standard implementation of a shader resource cache allocator.
///
/// Blocks are allocated on the heap, and the allocator keeps count of the blocks and slots
/// that are currently handed out.
#[derive(Debug)]
pub struct StandardResourceCacheAllocator {
    max_resources: Option<usize>,
    live_allocations: AtomicUsize,
    live_resources: AtomicUsize,
}

impl StandardResourceCacheAllocator {
    /// Creates a new `StandardResourceCacheAllocator`.
    #[inline]
    pub fn new(create_info: StandardResourceCacheAllocatorCreateInfo) -> Self {
        let StandardResourceCacheAllocatorCreateInfo {
            max_resources,
            _ne: _,
        } = create_info;

        StandardResourceCacheAllocator {
            max_resources,
            live_allocations: AtomicUsize::new(0),
            live_resources: AtomicUsize::new(0),
        }
    }

    /// Returns the number of blocks that have been allocated and not freed yet.
    #[inline]
    pub fn live_allocations(&self) -> usize {
        self.live_allocations.load(Ordering::Acquire)
    }

    /// Returns the total number of slots in the blocks that have been allocated and not freed
    /// yet.
    #[inline]
    pub fn live_resources(&self) -> usize {
        self.live_resources.load(Ordering::Acquire)
    }

    fn reserve(&self, resource_count: usize) -> Result<(), AllocationError> {
        let Some(limit) = self.max_resources else {
            self.live_resources.fetch_add(resource_count, Ordering::AcqRel);

            return Ok(());
        };

        self.live_resources
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                live.checked_add(resource_count)
                    .filter(|&total| total <= limit)
            })
            .map(|_| ())
            .map_err(|_| AllocationError::SlotLimitExceeded {
                requested: resource_count,
                limit,
            })
    }
}

impl Default for StandardResourceCacheAllocator {
    #[inline]
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl ResourceCacheAllocator for StandardResourceCacheAllocator {
    fn allocate(&self, resource_count: usize) -> Result<Box<[ResourceSlot]>, AllocationError> {
        self.reserve(resource_count)?;

        let mut resources: Vec<ResourceSlot> = Vec::new();

        if resources.try_reserve_exact(resource_count).is_err() {
            self.live_resources.fetch_sub(resource_count, Ordering::AcqRel);

            return Err(AllocationError::OutOfHostMemory);
        }

        resources.resize_with(resource_count, ResourceSlot::default);
        self.live_allocations.fetch_add(1, Ordering::AcqRel);

        log::trace!("allocated a block of {} resource slots", resource_count);

        Ok(resources.into_boxed_slice())
    }

    fn free(&self, resources: Box<[ResourceSlot]>) {
        self.live_resources.fetch_sub(resources.len(), Ordering::AcqRel);
        self.live_allocations.fetch_sub(1, Ordering::AcqRel);

        log::trace!("freed a block of {} resource slots", resources.len());
    }
}

/// Parameters to create a new `StandardResourceCacheAllocator`.
#[derive(Clone, Debug)]
pub struct StandardResourceCacheAllocatorCreateInfo {
    /// The maximum number of slots that may be handed out at once, over all blocks. `None`
    /// means that only the available host memory limits allocations.
    ///
    /// The default value is `None`.
    pub max_resources: Option<usize>,

    pub _ne: crate::NonExhaustive,
}

impl Default for StandardResourceCacheAllocatorCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            max_resources: None,
            _ne: crate::NonExhaustive(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AllocationError, ResourceCacheAllocator, StandardResourceCacheAllocator,
        StandardResourceCacheAllocatorCreateInfo,
    };

    #[test]
    fn allocates_uninitialized_slots() {
        let allocator = StandardResourceCacheAllocator::default();
        let resources = allocator.allocate(5).unwrap();

        assert_eq!(resources.len(), 5);
        assert!(resources.iter().all(|slot| !slot.is_initialized()));
        assert_eq!(allocator.live_allocations(), 1);
        assert_eq!(allocator.live_resources(), 5);

        allocator.free(resources);
        assert_eq!(allocator.live_allocations(), 0);
        assert_eq!(allocator.live_resources(), 0);
    }

    #[test]
    fn slot_limit() {
        let allocator =
            StandardResourceCacheAllocator::new(StandardResourceCacheAllocatorCreateInfo {
                max_resources: Some(8),
                ..Default::default()
            });

        let first = allocator.allocate(6).unwrap();
        assert_eq!(
            allocator.allocate(3).unwrap_err(),
            AllocationError::SlotLimitExceeded {
                requested: 3,
                limit: 8,
            },
        );
        assert_eq!(allocator.live_resources(), 6);

        let second = allocator.allocate(2).unwrap();
        allocator.free(first);
        allocator.free(second);
        assert_eq!(allocator.live_resources(), 0);
    }
}
