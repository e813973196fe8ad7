//! Caching of the resources bound to the descriptor sets of a pipeline resource signature.
//!
//! A [`ShaderResourceCache`] holds one [`ResourceSlot`] for every descriptor of every descriptor
//! set in a resource signature. All slots live in a single block obtained once from a
//! [`ResourceCacheAllocator`]; each descriptor set is a fixed, contiguous run of that block.
//!
//! The cache is shaped in two steps, normally while the resource signature is being built:
//!
//! - [`ShaderResourceCache::initialize_sets`] reserves the slots of every set.
//! - [`ShaderResourceCache::initialize_resources`] gives each run of slots belonging to one
//!   binding its [`ResourceType`]. The type of a slot never changes afterwards.
//!
//! Objects are then bound into the slots, and before each draw or dispatch that uses the
//! descriptors, [`ShaderResourceCache::transition_resources`] makes sure that every bound
//! object is in the access scope or layout its descriptor requires. The pass can either record
//! the missing barriers, or only verify that a previous step already did so.

pub use self::{
    allocator::{
        AllocationError, ResourceCacheAllocator, StandardResourceCacheAllocator,
        StandardResourceCacheAllocatorCreateInfo,
    },
    cache::{DescriptorSet, DescriptorSetMut, ShaderResourceCache},
    slot::ResourceSlot,
    transition::{MismatchKind, ResourceStateError, StateMismatch, TransitionMode},
};
use crate::{image::ImageLayout, sync::AccessFlags};
use ash::vk;

pub mod allocator;
mod cache;
mod slot;
mod transition;

/// The type of a shader resource, as determined by shader reflection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// A read-only buffer of uniform data.
    UniformBuffer,

    /// A buffer that shaders can read and write.
    StorageBuffer,

    /// A read-only texel buffer accessed through a buffer view.
    UniformTexelBuffer,

    /// A texel buffer accessed through a buffer view, that shaders can read and write.
    StorageTexelBuffer,

    /// An image that is sampled with a separately bound sampler.
    SeparateImage,

    /// An image combined with the sampler of its view.
    SampledImage,

    /// An image that shaders can read and write.
    StorageImage,

    /// A buffer holding atomic counters.
    AtomicCounter,

    /// A sampler bound on its own.
    SeparateSampler,
}

impl ResourceType {
    /// Every resource type, in declaration order.
    pub const ALL: [ResourceType; 9] = [
        ResourceType::UniformBuffer,
        ResourceType::StorageBuffer,
        ResourceType::UniformTexelBuffer,
        ResourceType::StorageTexelBuffer,
        ResourceType::SeparateImage,
        ResourceType::SampledImage,
        ResourceType::StorageImage,
        ResourceType::AtomicCounter,
        ResourceType::SeparateSampler,
    ];

    /// Returns the Vulkan descriptor type that resources of this type are written as.
    #[inline]
    pub const fn descriptor_type(self) -> vk::DescriptorType {
        match self {
            ResourceType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            ResourceType::StorageBuffer | ResourceType::AtomicCounter => {
                vk::DescriptorType::STORAGE_BUFFER
            }
            ResourceType::UniformTexelBuffer => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
            ResourceType::StorageTexelBuffer => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
            ResourceType::SeparateImage => vk::DescriptorType::SAMPLED_IMAGE,
            ResourceType::SampledImage => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            ResourceType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
            ResourceType::SeparateSampler => vk::DescriptorType::SAMPLER,
        }
    }

    /// Returns the state that a bound object must be in before a shader accesses it through a
    /// descriptor of this type.
    #[inline]
    pub const fn required_state(self) -> RequiredState {
        match self {
            ResourceType::UniformBuffer => RequiredState::Access(AccessFlags::UNIFORM_READ),
            ResourceType::StorageBuffer | ResourceType::StorageTexelBuffer => {
                RequiredState::Access(AccessFlags::SHADER_READ_WRITE)
            }
            ResourceType::UniformTexelBuffer => RequiredState::Access(AccessFlags::SHADER_READ),
            ResourceType::SeparateImage | ResourceType::SampledImage => {
                RequiredState::Layout(ImageLayout::ShaderReadOnlyOptimal)
            }
            ResourceType::StorageImage => RequiredState::Layout(ImageLayout::General),
            ResourceType::AtomicCounter | ResourceType::SeparateSampler => {
                RequiredState::Untracked
            }
        }
    }
}

/// The state that a resource type requires of the objects bound to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequiredState {
    /// Nothing is tracked for this resource type.
    Untracked,

    /// The underlying buffer must be visible for exactly this access scope.
    Access(AccessFlags),

    /// The underlying image must be in this layout.
    Layout(ImageLayout),
}
