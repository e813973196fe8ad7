//! Samplers bound to separate-sampler descriptors or combined with image views.

use crate::resource::SamplerResource;
use ash::vk;
use std::sync::Arc;

/// Describes how to retrieve data from a sampled image within a shader.
///
/// Samplers have no tracked state; binding one never requires a barrier.
#[derive(Debug)]
pub struct Sampler {
    handle: vk::Sampler,
}

impl Sampler {
    /// Creates a new `Sampler` from a raw object handle.
    ///
    /// # Safety
    ///
    /// - `handle` must be a valid Vulkan sampler handle.
    pub unsafe fn from_handle(handle: vk::Sampler, create_info: SamplerCreateInfo) -> Arc<Sampler> {
        let SamplerCreateInfo { _ne: _ } = create_info;

        Arc::new(Sampler { handle })
    }
}

impl SamplerResource for Sampler {
    #[inline]
    fn handle(&self) -> vk::Sampler {
        self.handle
    }
}

/// Parameters to create a new `Sampler`.
#[derive(Clone, Debug)]
pub struct SamplerCreateInfo {
    pub _ne: crate::NonExhaustive,
}

impl Default for SamplerCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            _ne: crate::NonExhaustive(()),
        }
    }
}
