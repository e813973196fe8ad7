//! The interfaces through which the cache reaches the objects bound to it.
//!
//! The cache never creates, destroys or inspects the internals of buffers, images and their
//! views. It only needs to know which raw handle to hand to a descriptor write, what name to
//! report in diagnostics, and in which access scope or layout the underlying object currently
//! is. Any object model can be plugged in by implementing these traits; the [`buffer`],
//! [`image`] and [`sampler`] modules provide standard implementations that wrap raw handles.
//!
//! The recorded state of an object is shared by every cache the object is bound to. It is only
//! ever changed by a [`CommandRecorder`] when it records a barrier for the object.
//!
//! [`buffer`]: crate::buffer
//! [`image`]: crate::image
//! [`sampler`]: crate::sampler
//! [`CommandRecorder`]: crate::command_buffer::CommandRecorder

use crate::{
    image::{ImageAspects, ImageLayout},
    sync::AccessFlags,
    DeviceSize,
};
use ash::vk;
use std::{fmt::Debug, sync::Arc};

/// A buffer whose access scope is tracked.
pub trait BufferResource: Debug + Send + Sync {
    /// Returns the name used to identify the buffer in diagnostics.
    fn name(&self) -> &str;

    /// Returns the raw buffer handle.
    fn handle(&self) -> vk::Buffer;

    /// Returns the size of the buffer in bytes.
    fn size(&self) -> DeviceSize;

    /// Returns the access scope that the buffer was last made visible for.
    fn access(&self) -> AccessFlags;

    /// Records that the buffer is now visible for `access`.
    ///
    /// # Safety
    ///
    /// - A memory barrier that makes the buffer visible for `access` must have been recorded
    ///   before any command that relies on the new state executes.
    unsafe fn set_access(&self, access: AccessFlags);
}

/// A view that exposes a buffer to shaders as formatted texels.
pub trait BufferViewResource: Debug + Send + Sync {
    /// Returns the raw buffer view handle.
    fn handle(&self) -> vk::BufferView;

    /// Returns the buffer that the view was created from.
    fn buffer(&self) -> &Arc<dyn BufferResource>;

    /// Returns the offset in bytes of the view within the buffer.
    fn offset(&self) -> DeviceSize;

    /// Returns the size in bytes of the view.
    fn range(&self) -> DeviceSize;
}

/// An image whose layout is tracked.
pub trait ImageResource: Debug + Send + Sync {
    /// Returns the name used to identify the image in diagnostics.
    fn name(&self) -> &str;

    /// Returns the raw image handle.
    fn handle(&self) -> vk::Image;

    /// Returns the aspects of the image that layout transitions apply to.
    fn aspects(&self) -> ImageAspects;

    /// Returns the layout that the image is currently in.
    fn layout(&self) -> ImageLayout;

    /// Records that the image is now in `layout`.
    ///
    /// # Safety
    ///
    /// - A layout transition to `layout` must have been recorded before any command that relies
    ///   on the new layout executes.
    unsafe fn set_layout(&self, layout: ImageLayout);
}

/// A view that exposes an image to shaders.
pub trait ImageViewResource: Debug + Send + Sync {
    /// Returns the raw image view handle.
    fn handle(&self) -> vk::ImageView;

    /// Returns the image that the view was created from.
    fn image(&self) -> &Arc<dyn ImageResource>;

    /// Returns the sampler that is combined with the view when it is bound as a sampled image.
    #[inline]
    fn sampler(&self) -> Option<&Arc<dyn SamplerResource>> {
        None
    }
}

/// A sampler that can be bound on its own or combined with an image view.
pub trait SamplerResource: Debug + Send + Sync {
    /// Returns the raw sampler handle.
    fn handle(&self) -> vk::Sampler;
}
