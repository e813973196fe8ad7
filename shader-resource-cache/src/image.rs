//! Images and image views with tracked layouts.
//!
//! [`Image`] wraps a raw image handle that was created elsewhere and remembers the
//! [`ImageLayout`] it is currently in. [`ImageView`] wraps an image view, optionally combined
//! with the sampler that is used when the view is bound as a sampled image.

use crate::{
    macros::{vulkan_bitflags, vulkan_enum},
    resource::{ImageResource, ImageViewResource, SamplerResource},
    sync::AccessFlags,
};
use ash::vk;
use parking_lot::Mutex;
use std::sync::Arc;

vulkan_enum! {
    /// In-memory layout of the pixel data of an image.
    ///
    /// Every operation that can be performed on an image is only possible with specific layouts.
    /// Before the operation is performed, a *layout transition* rearranges the pixel data from
    /// one layout into another. Layout transitions are recorded as part of pipeline barriers.
    ///
    /// Vulkan does not keep track of layouts itself, so every [`Image`] remembers its current
    /// layout, and the shader resource cache compares it against the layout that each
    /// descriptor requires.
    ImageLayout = ImageLayout(i32);

    /// The layout of the data is unknown, and the image is treated as containing no valid data.
    /// Transitioning from `Undefined` will discard any existing pixel data.
    Undefined = UNDEFINED,

    /// A general-purpose layout that can be used for any operation. Storage images must be in
    /// this layout.
    General = GENERAL,

    /// For a color image used as a color or resolve attachment in a framebuffer.
    ColorAttachmentOptimal = COLOR_ATTACHMENT_OPTIMAL,

    /// For a depth/stencil image used as a depth/stencil attachment in a framebuffer.
    DepthStencilAttachmentOptimal = DEPTH_STENCIL_ATTACHMENT_OPTIMAL,

    /// For a depth/stencil image used as a read-only depth/stencil attachment, or as a sampled
    /// image in a shader.
    DepthStencilReadOnlyOptimal = DEPTH_STENCIL_READ_ONLY_OPTIMAL,

    /// For a color image used as a sampled image or input attachment in a shader.
    ShaderReadOnlyOptimal = SHADER_READ_ONLY_OPTIMAL,

    /// For operations that transfer data from an image (copy, blit).
    TransferSrcOptimal = TRANSFER_SRC_OPTIMAL,

    /// For operations that transfer data to an image (copy, blit, clear).
    TransferDstOptimal = TRANSFER_DST_OPTIMAL,

    /// When creating an image, this specifies that the initial data is going to be directly
    /// written to from the CPU.
    Preinitialized = PREINITIALIZED,

    /// The layout of swapchain images that are about to be presented.
    PresentSrc = PRESENT_SRC_KHR,
}

impl ImageLayout {
    /// Returns the memory accesses that an image in this layout is expected to have been used
    /// with. These form the source scope of a layout transition out of the layout, and the
    /// destination scope of a transition into it.
    #[inline]
    pub const fn implied_access(self) -> AccessFlags {
        match self {
            ImageLayout::Undefined | ImageLayout::PresentSrc => AccessFlags::empty(),
            ImageLayout::General => AccessFlags::SHADER_READ_WRITE,
            ImageLayout::ColorAttachmentOptimal => {
                AccessFlags::COLOR_ATTACHMENT_READ.union(AccessFlags::COLOR_ATTACHMENT_WRITE)
            }
            ImageLayout::DepthStencilAttachmentOptimal => AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                .union(AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
            ImageLayout::DepthStencilReadOnlyOptimal => {
                AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ.union(AccessFlags::SHADER_READ)
            }
            ImageLayout::ShaderReadOnlyOptimal => AccessFlags::SHADER_READ,
            ImageLayout::TransferSrcOptimal => AccessFlags::TRANSFER_READ,
            ImageLayout::TransferDstOptimal => AccessFlags::TRANSFER_WRITE,
            ImageLayout::Preinitialized => AccessFlags::HOST_WRITE,
        }
    }
}

impl Default for ImageLayout {
    #[inline]
    fn default() -> Self {
        ImageLayout::Undefined
    }
}

vulkan_bitflags! {
    /// An individual data type within an image.
    ImageAspects = ImageAspectFlags(u32);

    /// The single aspect of images with a color format.
    COLOR = COLOR,

    /// The depth component of images with a depth or depth/stencil format.
    DEPTH = DEPTH,

    /// The stencil component of images with a stencil or depth/stencil format.
    STENCIL = STENCIL,
}

/// An image whose layout is tracked across command recording.
#[derive(Debug)]
pub struct Image {
    handle: vk::Image,
    name: String,
    aspects: ImageAspects,
    layout: Mutex<ImageLayout>,
}

impl Image {
    /// Creates a new `Image` from a raw object handle.
    ///
    /// # Safety
    ///
    /// - `handle` must be a valid Vulkan image handle.
    /// - `create_info` must match the info used to create the object, and
    ///   `create_info.initial_layout` must be the layout that the image is currently in.
    pub unsafe fn from_handle(handle: vk::Image, create_info: ImageCreateInfo) -> Arc<Image> {
        let ImageCreateInfo {
            name,
            aspects,
            initial_layout,
            _ne: _,
        } = create_info;

        assert!(!aspects.is_empty(), "an image must have at least one aspect");

        Arc::new(Image {
            handle,
            name,
            aspects,
            layout: Mutex::new(initial_layout),
        })
    }
}

impl ImageResource for Image {
    #[inline]
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    fn aspects(&self) -> ImageAspects {
        self.aspects
    }

    #[inline]
    fn layout(&self) -> ImageLayout {
        *self.layout.lock()
    }

    #[inline]
    unsafe fn set_layout(&self, layout: ImageLayout) {
        *self.layout.lock() = layout;
    }
}

/// Parameters to create a new `Image`.
#[derive(Clone, Debug)]
pub struct ImageCreateInfo {
    /// The name reported in diagnostics.
    ///
    /// The default value is empty.
    pub name: String,

    /// The aspects of the image that layout transitions apply to.
    ///
    /// The default value is [`ImageAspects::COLOR`].
    pub aspects: ImageAspects,

    /// The layout that the image is in when it is wrapped.
    ///
    /// The default value is [`ImageLayout::Undefined`].
    pub initial_layout: ImageLayout,

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            name: String::new(),
            aspects: ImageAspects::COLOR,
            initial_layout: ImageLayout::Undefined,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// A view of an image that can be bound to image descriptors.
#[derive(Debug)]
pub struct ImageView {
    handle: vk::ImageView,
    image: Arc<dyn ImageResource>,
    sampler: Option<Arc<dyn SamplerResource>>,
}

impl ImageView {
    /// Creates a new `ImageView` from a raw object handle.
    ///
    /// # Safety
    ///
    /// - `handle` must be a valid Vulkan image view handle created from `image`.
    pub unsafe fn from_handle(
        handle: vk::ImageView,
        image: Arc<dyn ImageResource>,
        create_info: ImageViewCreateInfo,
    ) -> Arc<ImageView> {
        let ImageViewCreateInfo { sampler, _ne: _ } = create_info;

        Arc::new(ImageView {
            handle,
            image,
            sampler,
        })
    }
}

impl ImageViewResource for ImageView {
    #[inline]
    fn handle(&self) -> vk::ImageView {
        self.handle
    }

    #[inline]
    fn image(&self) -> &Arc<dyn ImageResource> {
        &self.image
    }

    #[inline]
    fn sampler(&self) -> Option<&Arc<dyn SamplerResource>> {
        self.sampler.as_ref()
    }
}

/// Parameters to create a new `ImageView`.
#[derive(Clone, Debug)]
pub struct ImageViewCreateInfo {
    /// The sampler combined with the view when it is bound as a sampled image.
    ///
    /// The default value is `None`.
    pub sampler: Option<Arc<dyn SamplerResource>>,

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageViewCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            sampler: None,
            _ne: crate::NonExhaustive(()),
        }
    }
}
