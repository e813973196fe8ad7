//! Cache of the shader resources bound through Vulkan descriptor sets, with tracking of the
//! state that bound resources must be in before shaders access them.
//!
//! # Brief summary
//!
//! - A [`ShaderResourceCache`](crate::descriptor_set::ShaderResourceCache) holds, for every
//!   descriptor of every descriptor set of a pipeline resource signature, the object that is
//!   currently bound to it. Its storage is obtained once from a
//!   [`ResourceCacheAllocator`](crate::descriptor_set::ResourceCacheAllocator) and its shape
//!   never changes afterwards.
//!
//! - [*Buffers*](crate::buffer), [*images*](crate::image) and [*samplers*](crate::sampler) wrap
//!   raw object handles. Buffers remember the [access scope](crate::sync::AccessFlags) they were
//!   last made visible for, and images remember their
//!   [layout](crate::image::ImageLayout). Other object models can be used by implementing the
//!   traits in [`resource`](crate::resource).
//!
//! - Before a draw or dispatch,
//!   [`transition_resources`](crate::descriptor_set::ShaderResourceCache::transition_resources)
//!   compares the state of every bound object with the state its descriptor type requires. The
//!   missing barriers are recorded through a
//!   [`CommandRecorder`](crate::command_buffer::CommandRecorder), or the mismatches are reported
//!   when the caller only wants the state to be verified.

pub use crate::descriptor_set::{ResourceType, ShaderResourceCache};

mod macros;
pub mod buffer;
pub mod command_buffer;
pub mod descriptor_set;
pub mod image;
pub mod resource;
pub mod sampler;
pub mod sync;

/// Represents memory size and offset values on a Vulkan device.
/// Analogous to the Rust `usize` type on the host.
pub use ash::vk::DeviceSize;

/// A helper type for non-exhaustive structs.
///
/// This type cannot be constructed outside this crate. Structures with a field of this type can
/// only be constructed by calling a constructor function or `Default::default()`. The effect is
/// similar to the standard Rust `#[non_exhaustive]` attribute, except that it does not prevent
/// update syntax from being used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)] // add traits as needed
pub struct NonExhaustive(pub(crate) ());
