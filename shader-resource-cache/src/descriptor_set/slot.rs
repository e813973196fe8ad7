use super::ResourceType;
use crate::{
    image::ImageLayout,
    resource::{BufferResource, BufferViewResource, ImageViewResource, SamplerResource},
};
use ash::vk;
use std::sync::Arc;

/// The cached binding of a single descriptor.
///
/// A slot starts out uninitialized, receives its [`ResourceType`] once when the cache is
/// shaped, and from then on holds at most one object of the kind its type accepts. The object
/// is kept alive for as long as it is bound.
///
/// Custom [`ResourceCacheAllocator`]s fill the blocks they hand out with
/// `ResourceSlot::default()`.
///
/// [`ResourceCacheAllocator`]: super::ResourceCacheAllocator
#[derive(Debug, Default)]
pub struct ResourceSlot {
    pub(super) binding: SlotBinding,
}

#[derive(Debug, Default)]
pub(super) enum SlotBinding {
    #[default]
    Uninitialized,
    UniformBuffer(Option<Arc<dyn BufferResource>>),
    StorageBuffer(Option<Arc<dyn BufferResource>>),
    UniformTexelBuffer(Option<Arc<dyn BufferViewResource>>),
    StorageTexelBuffer(Option<Arc<dyn BufferViewResource>>),
    SeparateImage(Option<Arc<dyn ImageViewResource>>),
    SampledImage(Option<Arc<dyn ImageViewResource>>),
    StorageImage(Option<Arc<dyn ImageViewResource>>),
    AtomicCounter(Option<Arc<dyn BufferResource>>),
    SeparateSampler(Option<Arc<dyn SamplerResource>>),
}

impl ResourceSlot {
    pub(super) fn new(ty: ResourceType) -> Self {
        let binding = match ty {
            ResourceType::UniformBuffer => SlotBinding::UniformBuffer(None),
            ResourceType::StorageBuffer => SlotBinding::StorageBuffer(None),
            ResourceType::UniformTexelBuffer => SlotBinding::UniformTexelBuffer(None),
            ResourceType::StorageTexelBuffer => SlotBinding::StorageTexelBuffer(None),
            ResourceType::SeparateImage => SlotBinding::SeparateImage(None),
            ResourceType::SampledImage => SlotBinding::SampledImage(None),
            ResourceType::StorageImage => SlotBinding::StorageImage(None),
            ResourceType::AtomicCounter => SlotBinding::AtomicCounter(None),
            ResourceType::SeparateSampler => SlotBinding::SeparateSampler(None),
        };

        ResourceSlot { binding }
    }

    /// Returns the type of the slot, or `None` if the slot has not been initialized yet.
    #[inline]
    pub fn resource_type(&self) -> Option<ResourceType> {
        self.binding.resource_type()
    }

    /// Returns whether the slot has been given a type.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        !matches!(self.binding, SlotBinding::Uninitialized)
    }

    /// Returns whether an object is bound to the slot.
    pub fn is_bound(&self) -> bool {
        match &self.binding {
            SlotBinding::Uninitialized => false,
            SlotBinding::UniformBuffer(buffer)
            | SlotBinding::StorageBuffer(buffer)
            | SlotBinding::AtomicCounter(buffer) => buffer.is_some(),
            SlotBinding::UniformTexelBuffer(view) | SlotBinding::StorageTexelBuffer(view) => {
                view.is_some()
            }
            SlotBinding::SeparateImage(view)
            | SlotBinding::SampledImage(view)
            | SlotBinding::StorageImage(view) => view.is_some(),
            SlotBinding::SeparateSampler(sampler) => sampler.is_some(),
        }
    }

    /// Binds `buffer` to the slot, releasing the object that was bound before.
    ///
    /// # Panics
    ///
    /// - Panics if the slot is not a uniform buffer, storage buffer or atomic counter slot.
    pub fn bind_buffer(&mut self, buffer: Arc<dyn BufferResource>) {
        match &mut self.binding {
            SlotBinding::UniformBuffer(slot)
            | SlotBinding::StorageBuffer(slot)
            | SlotBinding::AtomicCounter(slot) => *slot = Some(buffer),
            other => kind_mismatch("a buffer", other),
        }
    }

    /// Binds the texel buffer `view` to the slot, releasing the object that was bound before.
    ///
    /// # Panics
    ///
    /// - Panics if the slot is not a uniform or storage texel buffer slot.
    pub fn bind_buffer_view(&mut self, view: Arc<dyn BufferViewResource>) {
        match &mut self.binding {
            SlotBinding::UniformTexelBuffer(slot) | SlotBinding::StorageTexelBuffer(slot) => {
                *slot = Some(view)
            }
            other => kind_mismatch("a buffer view", other),
        }
    }

    /// Binds the image `view` to the slot, releasing the object that was bound before.
    ///
    /// # Panics
    ///
    /// - Panics if the slot is not a separate, sampled or storage image slot.
    pub fn bind_image_view(&mut self, view: Arc<dyn ImageViewResource>) {
        match &mut self.binding {
            SlotBinding::SeparateImage(slot)
            | SlotBinding::SampledImage(slot)
            | SlotBinding::StorageImage(slot) => *slot = Some(view),
            other => kind_mismatch("an image view", other),
        }
    }

    /// Binds `sampler` to the slot, releasing the object that was bound before.
    ///
    /// # Panics
    ///
    /// - Panics if the slot is not a separate sampler slot.
    pub fn bind_sampler(&mut self, sampler: Arc<dyn SamplerResource>) {
        match &mut self.binding {
            SlotBinding::SeparateSampler(slot) => *slot = Some(sampler),
            other => kind_mismatch("a sampler", other),
        }
    }

    /// Releases the object bound to the slot, if any. The type of the slot is kept.
    pub fn unbind(&mut self) {
        match &mut self.binding {
            SlotBinding::Uninitialized => {}
            SlotBinding::UniformBuffer(buffer)
            | SlotBinding::StorageBuffer(buffer)
            | SlotBinding::AtomicCounter(buffer) => *buffer = None,
            SlotBinding::UniformTexelBuffer(view) | SlotBinding::StorageTexelBuffer(view) => {
                *view = None
            }
            SlotBinding::SeparateImage(view)
            | SlotBinding::SampledImage(view)
            | SlotBinding::StorageImage(view) => *view = None,
            SlotBinding::SeparateSampler(sampler) => *sampler = None,
        }
    }

    /// Returns the bound buffer, if this is a buffer slot with a buffer bound.
    #[inline]
    pub fn buffer(&self) -> Option<&Arc<dyn BufferResource>> {
        match &self.binding {
            SlotBinding::UniformBuffer(buffer)
            | SlotBinding::StorageBuffer(buffer)
            | SlotBinding::AtomicCounter(buffer) => buffer.as_ref(),
            _ => None,
        }
    }

    /// Returns the bound texel buffer view, if this is a texel buffer slot with a view bound.
    #[inline]
    pub fn buffer_view(&self) -> Option<&Arc<dyn BufferViewResource>> {
        match &self.binding {
            SlotBinding::UniformTexelBuffer(view) | SlotBinding::StorageTexelBuffer(view) => {
                view.as_ref()
            }
            _ => None,
        }
    }

    /// Returns the bound image view, if this is an image slot with a view bound.
    #[inline]
    pub fn image_view(&self) -> Option<&Arc<dyn ImageViewResource>> {
        match &self.binding {
            SlotBinding::SeparateImage(view)
            | SlotBinding::SampledImage(view)
            | SlotBinding::StorageImage(view) => view.as_ref(),
            _ => None,
        }
    }

    /// Returns the bound sampler, if this is a separate sampler slot with a sampler bound.
    #[inline]
    pub fn sampler(&self) -> Option<&Arc<dyn SamplerResource>> {
        match &self.binding {
            SlotBinding::SeparateSampler(sampler) => sampler.as_ref(),
            _ => None,
        }
    }

    /// Returns the buffer info to write into the descriptor, or `None` if no buffer is bound.
    ///
    /// # Panics
    ///
    /// - Panics if the slot is not a uniform buffer, storage buffer or atomic counter slot.
    pub fn descriptor_buffer_info(&self) -> Option<vk::DescriptorBufferInfo> {
        match &self.binding {
            SlotBinding::UniformBuffer(buffer)
            | SlotBinding::StorageBuffer(buffer)
            | SlotBinding::AtomicCounter(buffer) => {
                buffer.as_ref().map(|buffer| vk::DescriptorBufferInfo {
                    buffer: buffer.handle(),
                    offset: 0,
                    range: vk::WHOLE_SIZE,
                })
            }
            other => kind_mismatch("buffer info", other),
        }
    }

    /// Returns the texel buffer view to write into the descriptor, or `None` if no view is
    /// bound.
    ///
    /// # Panics
    ///
    /// - Panics if the slot is not a uniform or storage texel buffer slot.
    pub fn texel_buffer_view(&self) -> Option<vk::BufferView> {
        match &self.binding {
            SlotBinding::UniformTexelBuffer(view) | SlotBinding::StorageTexelBuffer(view) => {
                view.as_ref().map(|view| view.handle())
            }
            other => kind_mismatch("a texel buffer view", other),
        }
    }

    /// Returns the image info to write into the descriptor, or `None` if no view is bound.
    ///
    /// The layout is the one the slot's type requires. For sampled image slots, the sampler of
    /// the view is included unless the binding uses an immutable sampler.
    ///
    /// # Panics
    ///
    /// - Panics if the slot is not a separate, sampled or storage image slot.
    pub fn descriptor_image_info(
        &self,
        immutable_sampler: bool,
    ) -> Option<vk::DescriptorImageInfo> {
        let (view, image_layout, combined) = match &self.binding {
            SlotBinding::SeparateImage(view) => (view, ImageLayout::ShaderReadOnlyOptimal, false),
            SlotBinding::SampledImage(view) => (view, ImageLayout::ShaderReadOnlyOptimal, true),
            SlotBinding::StorageImage(view) => (view, ImageLayout::General, false),
            other => kind_mismatch("image info", other),
        };
        let view = view.as_ref()?;

        let sampler = if combined && !immutable_sampler {
            match view.sampler() {
                Some(sampler) => sampler.handle(),
                None => {
                    log::error!(
                        "no sampler is assigned to the view of image \"{}\" bound as a sampled \
                        image",
                        view.image().name(),
                    );

                    vk::Sampler::null()
                }
            }
        } else {
            vk::Sampler::null()
        };

        Some(vk::DescriptorImageInfo {
            sampler,
            image_view: view.handle(),
            image_layout: image_layout.into(),
        })
    }

    /// Returns the sampler info to write into the descriptor, or `None` if no sampler is bound.
    ///
    /// # Panics
    ///
    /// - Panics if the slot is not a separate sampler slot.
    pub fn descriptor_sampler_info(&self) -> Option<vk::DescriptorImageInfo> {
        match &self.binding {
            SlotBinding::SeparateSampler(sampler) => {
                sampler.as_ref().map(|sampler| vk::DescriptorImageInfo {
                    sampler: sampler.handle(),
                    image_view: vk::ImageView::null(),
                    image_layout: vk::ImageLayout::UNDEFINED,
                })
            }
            other => kind_mismatch("sampler info", other),
        }
    }
}

impl SlotBinding {
    pub(super) fn resource_type(&self) -> Option<ResourceType> {
        Some(match self {
            SlotBinding::Uninitialized => return None,
            SlotBinding::UniformBuffer(_) => ResourceType::UniformBuffer,
            SlotBinding::StorageBuffer(_) => ResourceType::StorageBuffer,
            SlotBinding::UniformTexelBuffer(_) => ResourceType::UniformTexelBuffer,
            SlotBinding::StorageTexelBuffer(_) => ResourceType::StorageTexelBuffer,
            SlotBinding::SeparateImage(_) => ResourceType::SeparateImage,
            SlotBinding::SampledImage(_) => ResourceType::SampledImage,
            SlotBinding::StorageImage(_) => ResourceType::StorageImage,
            SlotBinding::AtomicCounter(_) => ResourceType::AtomicCounter,
            SlotBinding::SeparateSampler(_) => ResourceType::SeparateSampler,
        })
    }
}

#[cold]
#[track_caller]
fn kind_mismatch(what: &str, binding: &SlotBinding) -> ! {
    match binding.resource_type() {
        Some(ty) => panic!("{} cannot be used with a {:?} slot", what, ty),
        None => panic!("{} cannot be used with an uninitialized slot", what),
    }
}
