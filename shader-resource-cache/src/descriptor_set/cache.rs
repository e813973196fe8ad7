use super::{AllocationError, ResourceCacheAllocator, ResourceSlot, ResourceType};
use ash::vk;
use smallvec::SmallVec;
use std::sync::Arc;

/// The resources bound to every descriptor set of a pipeline resource signature.
///
/// The cache is created empty, and is shaped exactly once with
/// [`initialize_sets`](Self::initialize_sets). From then on, the number of sets and the number
/// of slots in each set are fixed for the lifetime of the cache.
///
/// The cache is not internally synchronized. Binding into the cache and running the transition
/// pass over it must happen from one thread at a time, which the borrow checker enforces for
/// the cache itself. The recorded state of the bound objects is shared with everything else
/// that holds them.
#[derive(Debug, Default)]
pub struct ShaderResourceCache {
    allocator: Option<Arc<dyn ResourceCacheAllocator>>,
    sets: SmallVec<[SetHeader; 4]>,
    resources: Option<Box<[ResourceSlot]>>,
}

#[derive(Clone, Copy, Debug)]
struct SetHeader {
    first: usize,
    len: usize,
    handle: vk::DescriptorSet,
}

impl SetHeader {
    #[inline]
    fn range(&self) -> std::ops::Range<usize> {
        self.first..self.first + self.len
    }
}

impl ShaderResourceCache {
    /// Creates an empty cache. It has no sets until `initialize_sets` is called.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the slots of every descriptor set of the cache.
    ///
    /// `set_sizes` holds the number of slots of each set, in set-index order. All slots are
    /// allocated from `allocator` in a single block; if there are no slots at all, nothing is
    /// allocated. The slots are uninitialized until
    /// [`initialize_resources`](Self::initialize_resources) gives them a type.
    ///
    /// If the allocation fails, the cache is left uninitialized.
    ///
    /// # Panics
    ///
    /// - Panics if the cache has already been initialized.
    /// - Panics if `allocator` returns a block of the wrong size.
    pub fn initialize_sets(
        &mut self,
        allocator: Arc<dyn ResourceCacheAllocator>,
        set_sizes: &[u32],
    ) -> Result<(), AllocationError> {
        assert!(
            self.allocator.is_none() && self.resources.is_none(),
            "the shader resource cache has already been initialized",
        );

        let total_resource_count: usize = set_sizes.iter().map(|&size| size as usize).sum();

        let resources = if total_resource_count != 0 {
            let resources = allocator.allocate(total_resource_count)?;
            assert_eq!(
                resources.len(),
                total_resource_count,
                "the allocator returned a block of the wrong size",
            );
            debug_assert!(resources.iter().all(|slot| !slot.is_initialized()));

            Some(resources)
        } else {
            None
        };

        let mut first = 0;
        self.sets = set_sizes
            .iter()
            .map(|&size| {
                let header = SetHeader {
                    first,
                    len: size as usize,
                    handle: vk::DescriptorSet::null(),
                };
                first += header.len;

                header
            })
            .collect();
        self.resources = resources;
        self.allocator = Some(allocator);

        log::trace!(
            "initialized a shader resource cache with {} sets and {} resources",
            self.sets.len(),
            total_resource_count,
        );

        Ok(())
    }

    /// Gives the slots `offset..offset + count` of the set `set` the type `ty`.
    ///
    /// # Panics
    ///
    /// - Panics if `set` is not less than the number of sets.
    /// - Panics if `offset + count` is greater than the number of slots in the set.
    /// - Panics if any of the slots has already been initialized.
    pub fn initialize_resources(&mut self, set: u32, offset: u32, count: u32, ty: ResourceType) {
        let set_len = self.descriptor_set(set).len();
        let end = offset as usize + count as usize;

        assert!(
            end <= set_len as usize,
            "resources {}..{} are out of range for set {} of size {}",
            offset,
            end,
            set,
            set_len,
        );

        let descriptor_set = self.descriptor_set_mut(set);
        let resources = &mut descriptor_set.resources[offset as usize..end];

        for (offset, slot) in (offset..).zip(resources.iter()) {
            if let Some(existing) = slot.resource_type() {
                panic!(
                    "resource {} of set {} has already been initialized as {:?}",
                    offset, set, existing,
                );
            }
        }

        for slot in resources {
            *slot = ResourceSlot::new(ty);
        }
    }

    /// Returns whether the sets of the cache have been initialized.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.allocator.is_some()
    }

    /// Returns the number of descriptor sets in the cache.
    #[inline]
    pub fn set_count(&self) -> u32 {
        self.sets.len() as u32
    }

    /// Returns the number of slots over all descriptor sets of the cache.
    #[inline]
    pub fn total_resource_count(&self) -> usize {
        self.resources.as_deref().map_or(0, <[_]>::len)
    }

    /// Returns the descriptor set with index `set`.
    ///
    /// # Panics
    ///
    /// - Panics if `set` is not less than the number of sets.
    pub fn descriptor_set(&self, set: u32) -> DescriptorSet<'_> {
        let header = self.header(set);
        let resources: &[ResourceSlot] = match &self.resources {
            Some(resources) => &resources[header.range()],
            None => &[],
        };

        DescriptorSet {
            index: set,
            handle: header.handle,
            resources,
        }
    }

    /// Returns the descriptor set with index `set` for binding.
    ///
    /// # Panics
    ///
    /// - Panics if `set` is not less than the number of sets.
    pub fn descriptor_set_mut(&mut self, set: u32) -> DescriptorSetMut<'_> {
        let set_count = self.set_count();
        let header = self.sets.get_mut(set as usize).unwrap_or_else(|| {
            panic!(
                "set {} is out of range for a cache with {} sets",
                set, set_count,
            )
        });
        let resources: &mut [ResourceSlot] = match &mut self.resources {
            Some(resources) => &mut resources[header.range()],
            None => &mut [],
        };

        DescriptorSetMut {
            index: set,
            handle: &mut header.handle,
            resources,
        }
    }

    /// Returns an iterator over the descriptor sets of the cache, in set-index order.
    pub fn descriptor_sets(&self) -> impl ExactSizeIterator<Item = DescriptorSet<'_>> {
        (0..self.set_count()).map(move |set| self.descriptor_set(set))
    }

    /// Returns the slot at `offset` in the set `set`.
    ///
    /// # Panics
    ///
    /// - Panics if `set` or `offset` are out of range.
    #[inline]
    pub fn resource(&self, set: u32, offset: u32) -> &ResourceSlot {
        self.descriptor_set(set).resource(offset)
    }

    /// Returns the slot at `offset` in the set `set` for binding.
    ///
    /// # Panics
    ///
    /// - Panics if `set` or `offset` are out of range.
    #[inline]
    pub fn resource_mut(&mut self, set: u32, offset: u32) -> &mut ResourceSlot {
        self.descriptor_set_mut(set).into_resource_mut(offset)
    }

    /// Returns every slot of the cache together with its set index and offset, sets in
    /// set-index order and slots in offset order within each set.
    pub fn resources(&self) -> impl Iterator<Item = (u32, u32, &ResourceSlot)> {
        self.descriptor_sets().flat_map(|descriptor_set| {
            let set = descriptor_set.index();

            descriptor_set
                .resources
                .iter()
                .enumerate()
                .map(move |(offset, slot)| (set, offset as u32, slot))
        })
    }

    /// Checks that every slot of the cache has been given a type.
    ///
    /// # Panics
    ///
    /// - Panics if any slot is uninitialized.
    pub fn verify_initialization(&self) {
        for (set, offset, slot) in self.resources() {
            assert!(
                slot.is_initialized(),
                "resource {} of set {} has not been initialized",
                offset,
                set,
            );
        }
    }

    #[track_caller]
    fn header(&self, set: u32) -> &SetHeader {
        self.sets.get(set as usize).unwrap_or_else(|| {
            panic!(
                "set {} is out of range for a cache with {} sets",
                set,
                self.sets.len(),
            )
        })
    }
}

impl Drop for ShaderResourceCache {
    fn drop(&mut self) {
        let Some(mut resources) = self.resources.take() else {
            return;
        };

        for slot in resources.iter_mut() {
            slot.unbind();
        }

        self.sets.clear();

        if let Some(allocator) = self.allocator.take() {
            log::trace!(
                "releasing a shader resource cache with {} resources",
                resources.len(),
            );

            allocator.free(resources);
        }
    }
}

/// A descriptor set of a [`ShaderResourceCache`].
#[derive(Clone, Copy, Debug)]
pub struct DescriptorSet<'a> {
    index: u32,
    handle: vk::DescriptorSet,
    resources: &'a [ResourceSlot],
}

impl<'a> DescriptorSet<'a> {
    /// Returns the index of the set.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the Vulkan descriptor set that the resources are written to, or a null handle if
    /// none has been assigned.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSet {
        self.handle
    }

    /// Returns the number of slots in the set.
    #[inline]
    pub fn len(&self) -> u32 {
        self.resources.len() as u32
    }

    /// Returns whether the set has no slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Returns the slot at `offset`.
    ///
    /// # Panics
    ///
    /// - Panics if `offset` is not less than the number of slots in the set.
    #[inline]
    #[track_caller]
    pub fn resource(&self, offset: u32) -> &'a ResourceSlot {
        check_offset(self.index, offset, self.resources.len());

        &self.resources[offset as usize]
    }

    /// Returns the slots of the set.
    #[inline]
    pub fn resources(&self) -> &'a [ResourceSlot] {
        self.resources
    }
}

/// A descriptor set of a [`ShaderResourceCache`], borrowed for binding.
#[derive(Debug)]
pub struct DescriptorSetMut<'a> {
    index: u32,
    handle: &'a mut vk::DescriptorSet,
    resources: &'a mut [ResourceSlot],
}

impl<'a> DescriptorSetMut<'a> {
    /// Returns the index of the set.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the Vulkan descriptor set that the resources are written to, or a null handle if
    /// none has been assigned.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSet {
        *self.handle
    }

    /// Assigns the Vulkan descriptor set that the resources are written to.
    #[inline]
    pub fn set_handle(&mut self, handle: vk::DescriptorSet) {
        *self.handle = handle;
    }

    /// Returns the number of slots in the set.
    #[inline]
    pub fn len(&self) -> u32 {
        self.resources.len() as u32
    }

    /// Returns whether the set has no slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Returns the slot at `offset`.
    ///
    /// # Panics
    ///
    /// - Panics if `offset` is not less than the number of slots in the set.
    #[inline]
    #[track_caller]
    pub fn resource_mut(&mut self, offset: u32) -> &mut ResourceSlot {
        check_offset(self.index, offset, self.resources.len());

        &mut self.resources[offset as usize]
    }

    #[track_caller]
    fn into_resource_mut(self, offset: u32) -> &'a mut ResourceSlot {
        check_offset(self.index, offset, self.resources.len());

        &mut self.resources[offset as usize]
    }
}

#[inline]
#[track_caller]
fn check_offset(set: u32, offset: u32, len: usize) {
    assert!(
        (offset as usize) < len,
        "resource {} is out of range for set {} of size {}",
        offset,
        set,
        len,
    );
}

#[cfg(test)]
mod tests {
    use super::ShaderResourceCache;
    use crate::{
        descriptor_set::{
            AllocationError, ResourceType, StandardResourceCacheAllocator,
            StandardResourceCacheAllocatorCreateInfo,
        },
        sync::AccessFlags,
        tests::{named_buffer, named_image, view_of, CountingAllocator},
    };
    use ash::vk::{self, Handle};
    use std::sync::Arc;

    #[test]
    fn initialize() {
        let allocator = Arc::new(CountingAllocator::default());
        let mut cache = ShaderResourceCache::new();
        assert!(!cache.is_initialized());

        cache.initialize_sets(allocator.clone(), &[2, 0, 3]).unwrap();
        assert!(cache.is_initialized());
        assert_eq!(allocator.allocations(), 1);
        assert_eq!(cache.set_count(), 3);
        assert_eq!(cache.total_resource_count(), 5);

        let sizes: Vec<_> = cache.descriptor_sets().map(|set| set.len()).collect();
        assert_eq!(sizes, [2, 0, 3]);
        assert!(cache.descriptor_set(1).is_empty());

        cache.initialize_resources(0, 0, 2, ResourceType::UniformBuffer);
        cache.initialize_resources(2, 0, 1, ResourceType::SampledImage);
        cache.initialize_resources(2, 1, 2, ResourceType::StorageImage);
        cache.verify_initialization();

        let types: Vec<_> = cache
            .resources()
            .map(|(set, offset, slot)| (set, offset, slot.resource_type().unwrap()))
            .collect();
        assert_eq!(
            types,
            [
                (0, 0, ResourceType::UniformBuffer),
                (0, 1, ResourceType::UniformBuffer),
                (2, 0, ResourceType::SampledImage),
                (2, 1, ResourceType::StorageImage),
                (2, 2, ResourceType::StorageImage),
            ],
        );
        assert!(cache.resources().all(|(_, _, slot)| !slot.is_bound()));
    }

    #[test]
    fn zero_size() {
        let allocator = Arc::new(CountingAllocator::default());

        {
            let mut cache = ShaderResourceCache::new();
            cache.initialize_sets(allocator.clone(), &[0, 0]).unwrap();
            assert_eq!(cache.set_count(), 2);
            assert_eq!(cache.total_resource_count(), 0);
            cache.verify_initialization();
        }

        {
            let mut cache = ShaderResourceCache::new();
            cache.initialize_sets(allocator.clone(), &[]).unwrap();
            assert_eq!(cache.set_count(), 0);
        }

        drop(ShaderResourceCache::new());

        assert_eq!(allocator.allocations(), 0);
        assert_eq!(allocator.frees(), 0);
    }

    #[test]
    fn double_initialization() {
        assert_should_panic!("already been initialized", {
            let mut cache = ShaderResourceCache::new();
            cache
                .initialize_sets(Arc::new(CountingAllocator::default()), &[1])
                .unwrap();
            let _ = cache.initialize_sets(Arc::new(CountingAllocator::default()), &[1]);
        });

        // A cache without any slots still holds on to its shape.
        assert_should_panic!("already been initialized", {
            let mut cache = ShaderResourceCache::new();
            cache
                .initialize_sets(Arc::new(CountingAllocator::default()), &[0])
                .unwrap();
            let _ = cache.initialize_sets(Arc::new(CountingAllocator::default()), &[1]);
        });
    }

    #[test]
    fn allocation_failure() {
        let allocator = CountingAllocator::failing();
        let mut cache = ShaderResourceCache::new();

        assert_eq!(
            cache.initialize_sets(allocator.clone(), &[4]),
            Err(AllocationError::OutOfHostMemory),
        );
        assert!(!cache.is_initialized());
        assert_eq!(cache.set_count(), 0);
        assert_eq!(cache.total_resource_count(), 0);

        // The cache can be initialized again after a failure.
        let allocator = Arc::new(StandardResourceCacheAllocator::new(
            StandardResourceCacheAllocatorCreateInfo {
                max_resources: Some(2),
                ..Default::default()
            },
        ));
        assert_eq!(
            cache.initialize_sets(allocator.clone(), &[4]),
            Err(AllocationError::SlotLimitExceeded {
                requested: 4,
                limit: 2,
            }),
        );
        cache.initialize_sets(allocator.clone(), &[1, 1]).unwrap();
        assert_eq!(allocator.live_resources(), 2);

        drop(cache);
        assert_eq!(allocator.live_allocations(), 0);
    }

    #[test]
    fn out_of_range() {
        let mut cache = ShaderResourceCache::new();
        cache
            .initialize_sets(Arc::new(CountingAllocator::default()), &[2, 3])
            .unwrap();

        assert_should_panic!("set 2 is out of range", {
            cache.initialize_resources(2, 0, 1, ResourceType::UniformBuffer);
        });
        assert_should_panic!("resources 1..3 are out of range for set 0 of size 2", {
            cache.initialize_resources(0, 1, 2, ResourceType::UniformBuffer);
        });
        assert_should_panic!("resource 3 is out of range for set 1 of size 3", {
            let _ = cache.resource(1, 3);
        });
        assert_should_panic!("set 5 is out of range", {
            let _ = cache.resource_mut(5, 0);
        });
    }

    #[test]
    fn type_is_fixed() {
        let mut cache = ShaderResourceCache::new();
        cache
            .initialize_sets(Arc::new(CountingAllocator::default()), &[2])
            .unwrap();
        cache.initialize_resources(0, 1, 1, ResourceType::StorageBuffer);

        assert_should_panic!("resource 1 of set 0 has already been initialized as StorageBuffer", {
            cache.initialize_resources(0, 0, 2, ResourceType::UniformBuffer);
        });
        assert_should_panic!("resource 0 of set 0 has not been initialized", {
            cache.verify_initialization();
        });
    }

    #[test]
    fn descriptor_set_handle() {
        let mut cache = ShaderResourceCache::new();
        cache
            .initialize_sets(Arc::new(CountingAllocator::default()), &[1, 1])
            .unwrap();
        assert_eq!(cache.descriptor_set(1).handle(), vk::DescriptorSet::null());

        cache
            .descriptor_set_mut(1)
            .set_handle(vk::DescriptorSet::from_raw(42));

        assert_eq!(cache.descriptor_set(0).handle(), vk::DescriptorSet::null());
        assert_eq!(
            cache.descriptor_set(1).handle(),
            vk::DescriptorSet::from_raw(42),
        );
    }

    #[test]
    fn rebinding() {
        let mut cache = ShaderResourceCache::new();
        cache
            .initialize_sets(Arc::new(CountingAllocator::default()), &[1])
            .unwrap();
        cache.initialize_resources(0, 0, 1, ResourceType::StorageBuffer);

        let first = named_buffer("first", AccessFlags::empty());
        let second = named_buffer("second", AccessFlags::empty());

        cache.resource_mut(0, 0).bind_buffer(first.clone());
        assert_eq!(Arc::strong_count(&first), 2);

        let mut set = cache.descriptor_set_mut(0);
        set.resource_mut(0).bind_buffer(second.clone());
        assert_eq!(Arc::strong_count(&first), 1);
        assert_eq!(Arc::strong_count(&second), 2);
        assert_eq!(cache.resource(0, 0).buffer().unwrap().name(), "second");
    }

    #[test]
    fn drop_releases_everything_once() {
        let allocator = Arc::new(CountingAllocator::default());
        let buffer = named_buffer("constants", AccessFlags::UNIFORM_READ);
        let image = named_image("albedo", Default::default());

        let mut cache = ShaderResourceCache::new();
        cache.initialize_sets(allocator.clone(), &[2, 2]).unwrap();
        cache.initialize_resources(0, 0, 2, ResourceType::UniformBuffer);
        cache.initialize_resources(1, 0, 1, ResourceType::SeparateImage);

        cache.resource_mut(0, 0).bind_buffer(buffer.clone());
        cache.resource_mut(0, 1).bind_buffer(buffer.clone());
        cache
            .resource_mut(1, 0)
            .bind_image_view(view_of(image.clone()));
        assert_eq!(Arc::strong_count(&buffer), 3);
        assert_eq!(Arc::strong_count(&image), 2);

        drop(cache);

        assert_eq!(Arc::strong_count(&buffer), 1);
        assert_eq!(Arc::strong_count(&image), 1);
        assert_eq!(allocator.frees(), 1);
        assert_eq!(allocator.freed_slots(), 4);
    }
}
