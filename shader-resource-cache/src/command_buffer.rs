//! Recording of the barriers that bring shader resources into their required state.
//!
//! The shader resource cache does not record commands itself. When a bound resource is not in
//! the state its descriptor requires, the cache asks a [`CommandRecorder`] to insert the
//! appropriate memory barrier or layout transition. The recorder is responsible for updating
//! the resource's recorded state, so that a later check of the same object sees it as already
//! correct.
//!
//! [`PipelineBarrierRecorder`] is the standard implementation: it batches the requested
//! barriers, updates the resources, and hands out a [`PipelineBarrier`] with the stage masks
//! and ash structures to pass to `vkCmdPipelineBarrier` when the batch is flushed into a
//! command buffer.

use crate::{
    image::ImageLayout,
    resource::{BufferResource, ImageResource},
    sync::{AccessFlags, PipelineStages},
};
use ash::vk;
use smallvec::SmallVec;
use std::sync::Arc;

/// Records barriers on behalf of the shader resource cache.
pub trait CommandRecorder {
    /// Inserts a memory barrier that makes `buffer` visible for `required_access`, and records
    /// the new access scope on the buffer.
    fn buffer_memory_barrier(
        &mut self,
        buffer: &Arc<dyn BufferResource>,
        required_access: AccessFlags,
    );

    /// Inserts a layout transition of `image` to `required_layout`, and records the new layout
    /// on the image.
    fn transition_image_layout(
        &mut self,
        image: &Arc<dyn ImageResource>,
        required_layout: ImageLayout,
    );
}

/// A buffer memory barrier that was recorded by a [`PipelineBarrierRecorder`].
#[derive(Clone, Debug)]
pub struct BufferMemoryBarrier {
    pub buffer: Arc<dyn BufferResource>,
    pub src_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_stages: PipelineStages,
    pub dst_access: AccessFlags,
}

impl BufferMemoryBarrier {
    /// Returns the barrier as an ash structure covering the whole buffer.
    #[inline]
    pub fn to_vk(&self) -> vk::BufferMemoryBarrier<'static> {
        vk::BufferMemoryBarrier::default()
            .src_access_mask(self.src_access.into())
            .dst_access_mask(self.dst_access.into())
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(self.buffer.handle())
            .offset(0)
            .size(vk::WHOLE_SIZE)
    }
}

/// An image layout transition that was recorded by a [`PipelineBarrierRecorder`].
#[derive(Clone, Debug)]
pub struct ImageMemoryBarrier {
    pub image: Arc<dyn ImageResource>,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
}

impl ImageMemoryBarrier {
    /// Returns the barrier as an ash structure covering every mip level and array layer of the
    /// image.
    #[inline]
    pub fn to_vk(&self) -> vk::ImageMemoryBarrier<'static> {
        vk::ImageMemoryBarrier::default()
            .src_access_mask(self.old_layout.implied_access().into())
            .dst_access_mask(self.new_layout.implied_access().into())
            .old_layout(self.old_layout.into())
            .new_layout(self.new_layout.into())
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image.handle())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.image.aspects().into(),
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            })
    }
}

/// Batches the barriers requested by the shader resource cache until they are flushed into a
/// command buffer.
///
/// The source stages of a barrier are the stages that perform the object's previous access,
/// or `TOP_OF_PIPE` if there was none. The destination stages are the stages that perform the
/// required access. Shader accesses are attributed to the shader stages the recorder was
/// created with.
#[derive(Debug)]
pub struct PipelineBarrierRecorder {
    shader_stages: PipelineStages,
    buffer_memory_barriers: SmallVec<[BufferMemoryBarrier; 4]>,
    image_memory_barriers: SmallVec<[ImageMemoryBarrier; 4]>,
}

impl PipelineBarrierRecorder {
    /// Creates an empty `PipelineBarrierRecorder` that attributes shader accesses to
    /// [`PipelineStages::CORE_SHADERS`].
    #[inline]
    pub fn new() -> Self {
        Self::with_shader_stages(PipelineStages::CORE_SHADERS)
    }

    /// Creates an empty `PipelineBarrierRecorder` that attributes shader accesses to
    /// `shader_stages`.
    ///
    /// # Panics
    ///
    /// - Panics if `shader_stages` is empty, or contains a stage that does not execute shaders.
    #[track_caller]
    pub fn with_shader_stages(shader_stages: PipelineStages) -> Self {
        assert!(
            !shader_stages.is_empty() && SHADER_STAGES.contains(shader_stages),
            "{:?} are not shader stages",
            shader_stages,
        );

        PipelineBarrierRecorder {
            shader_stages,
            buffer_memory_barriers: SmallVec::new(),
            image_memory_barriers: SmallVec::new(),
        }
    }

    /// Returns the stages that shader accesses are attributed to.
    #[inline]
    pub fn shader_stages(&self) -> PipelineStages {
        self.shader_stages
    }

    /// Returns the buffer memory barriers recorded since the last flush.
    #[inline]
    pub fn buffer_memory_barriers(&self) -> &[BufferMemoryBarrier] {
        &self.buffer_memory_barriers
    }

    /// Returns the image layout transitions recorded since the last flush.
    #[inline]
    pub fn image_memory_barriers(&self) -> &[ImageMemoryBarrier] {
        &self.image_memory_barriers
    }

    /// Returns whether no barriers are pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer_memory_barriers.is_empty() && self.image_memory_barriers.is_empty()
    }

    /// Takes the pending barriers, leaving the recorder empty.
    ///
    /// The stage masks of the returned barrier are the union of the stages of every pending
    /// barrier. They are empty if no barriers were pending, in which case nothing needs to be
    /// recorded.
    pub fn flush(&mut self) -> PipelineBarrier {
        let mut src_stages = PipelineStages::empty();
        let mut dst_stages = PipelineStages::empty();

        let buffer_memory_barriers = self
            .buffer_memory_barriers
            .drain(..)
            .map(|barrier| {
                src_stages |= barrier.src_stages;
                dst_stages |= barrier.dst_stages;

                barrier.to_vk()
            })
            .collect();
        let image_memory_barriers = self
            .image_memory_barriers
            .drain(..)
            .map(|barrier| {
                src_stages |= barrier.src_stages;
                dst_stages |= barrier.dst_stages;

                barrier.to_vk()
            })
            .collect();

        PipelineBarrier {
            src_stages,
            dst_stages,
            buffer_memory_barriers,
            image_memory_barriers,
        }
    }

    fn stages(&self, access: AccessFlags, if_none: PipelineStages) -> PipelineStages {
        let stages = PipelineStages::from_access(access, self.shader_stages);

        if stages.is_empty() {
            if_none
        } else {
            stages
        }
    }
}

impl Default for PipelineBarrierRecorder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

const SHADER_STAGES: PipelineStages = PipelineStages::CORE_SHADERS
    .union(PipelineStages::TESSELLATION_CONTROL_SHADER)
    .union(PipelineStages::TESSELLATION_EVALUATION_SHADER)
    .union(PipelineStages::GEOMETRY_SHADER);

/// The barriers taken out of a [`PipelineBarrierRecorder`], ready to be passed to
/// `vkCmdPipelineBarrier`.
#[derive(Debug)]
pub struct PipelineBarrier {
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub buffer_memory_barriers: SmallVec<[vk::BufferMemoryBarrier<'static>; 4]>,
    pub image_memory_barriers: SmallVec<[vk::ImageMemoryBarrier<'static>; 4]>,
}

impl PipelineBarrier {
    /// Returns whether the barrier contains no memory barriers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer_memory_barriers.is_empty() && self.image_memory_barriers.is_empty()
    }
}

impl CommandRecorder for PipelineBarrierRecorder {
    fn buffer_memory_barrier(
        &mut self,
        buffer: &Arc<dyn BufferResource>,
        required_access: AccessFlags,
    ) {
        let src_access = buffer.access();
        let src_stages = self.stages(src_access, PipelineStages::TOP_OF_PIPE);
        let dst_stages = self.stages(required_access, PipelineStages::BOTTOM_OF_PIPE);

        log::debug!(
            "buffer memory barrier for \"{}\": {:?} -> {:?}",
            buffer.name(),
            src_access,
            required_access,
        );

        self.buffer_memory_barriers.push(BufferMemoryBarrier {
            buffer: buffer.clone(),
            src_stages,
            src_access,
            dst_stages,
            dst_access: required_access,
        });

        // SAFETY: The barrier is part of this batch, which is flushed before the commands that
        // use the buffer.
        unsafe { buffer.set_access(required_access) };
    }

    fn transition_image_layout(
        &mut self,
        image: &Arc<dyn ImageResource>,
        required_layout: ImageLayout,
    ) {
        let old_layout = image.layout();
        let src_stages = self.stages(old_layout.implied_access(), PipelineStages::TOP_OF_PIPE);
        let dst_stages = self.stages(
            required_layout.implied_access(),
            PipelineStages::BOTTOM_OF_PIPE,
        );

        log::debug!(
            "layout transition for \"{}\": {:?} -> {:?}",
            image.name(),
            old_layout,
            required_layout,
        );

        self.image_memory_barriers.push(ImageMemoryBarrier {
            image: image.clone(),
            src_stages,
            dst_stages,
            old_layout,
            new_layout: required_layout,
        });

        // SAFETY: The transition is part of this batch, which is flushed before the commands
        // that use the image.
        unsafe { image.set_layout(required_layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandRecorder, PipelineBarrierRecorder};
    use crate::{
        buffer::{Buffer, BufferCreateInfo},
        image::{Image, ImageAspects, ImageCreateInfo, ImageLayout},
        resource::{BufferResource, ImageResource},
        sync::{AccessFlags, PipelineStages},
    };
    use ash::vk::{self, Handle};
    use std::sync::Arc;

    #[test]
    fn buffer_barrier_updates_state() {
        let buffer: Arc<dyn BufferResource> = unsafe {
            Buffer::from_handle(
                vk::Buffer::from_raw(7),
                BufferCreateInfo {
                    name: "constants".to_owned(),
                    size: 64,
                    initial_access: AccessFlags::TRANSFER_WRITE,
                    ..Default::default()
                },
            )
        };
        let mut recorder = PipelineBarrierRecorder::new();

        recorder.buffer_memory_barrier(&buffer, AccessFlags::UNIFORM_READ);

        assert_eq!(buffer.access(), AccessFlags::UNIFORM_READ);
        assert_eq!(recorder.buffer_memory_barriers().len(), 1);

        let barrier = &recorder.buffer_memory_barriers()[0];
        assert_eq!(barrier.src_stages, PipelineStages::TRANSFER);
        assert_eq!(barrier.src_access, AccessFlags::TRANSFER_WRITE);
        assert_eq!(barrier.dst_stages, PipelineStages::CORE_SHADERS);
        assert_eq!(barrier.dst_access, AccessFlags::UNIFORM_READ);
    }

    #[test]
    fn image_transition_updates_layout() {
        let image: Arc<dyn ImageResource> = unsafe {
            Image::from_handle(
                vk::Image::from_raw(3),
                ImageCreateInfo {
                    initial_layout: ImageLayout::TransferDstOptimal,
                    ..Default::default()
                },
            )
        };
        let mut recorder = PipelineBarrierRecorder::new();

        recorder.transition_image_layout(&image, ImageLayout::ShaderReadOnlyOptimal);

        assert_eq!(image.layout(), ImageLayout::ShaderReadOnlyOptimal);

        let barrier = &recorder.image_memory_barriers()[0];
        assert_eq!(barrier.src_stages, PipelineStages::TRANSFER);
        assert_eq!(barrier.dst_stages, PipelineStages::CORE_SHADERS);
        assert_eq!(barrier.old_layout, ImageLayout::TransferDstOptimal);
        assert_eq!(barrier.new_layout, ImageLayout::ShaderReadOnlyOptimal);
    }

    #[test]
    fn flush_produces_ash_barriers() {
        let buffer: Arc<dyn BufferResource> = unsafe {
            Buffer::from_handle(vk::Buffer::from_raw(11), Default::default())
        };
        let image: Arc<dyn ImageResource> = unsafe {
            Image::from_handle(
                vk::Image::from_raw(12),
                ImageCreateInfo {
                    aspects: ImageAspects::DEPTH | ImageAspects::STENCIL,
                    ..Default::default()
                },
            )
        };
        let mut recorder = PipelineBarrierRecorder::new();

        recorder.buffer_memory_barrier(&buffer, AccessFlags::SHADER_READ_WRITE);
        recorder.transition_image_layout(&image, ImageLayout::General);

        let barrier = recorder.flush();
        assert!(recorder.is_empty());

        // Neither object had a previous access.
        assert_eq!(barrier.src_stages, PipelineStages::TOP_OF_PIPE);
        assert_eq!(barrier.dst_stages, PipelineStages::CORE_SHADERS);
        assert_eq!(
            vk::PipelineStageFlags::from(barrier.dst_stages),
            vk::PipelineStageFlags::VERTEX_SHADER
                | vk::PipelineStageFlags::FRAGMENT_SHADER
                | vk::PipelineStageFlags::COMPUTE_SHADER,
        );

        let buffer_barriers = &barrier.buffer_memory_barriers;
        let image_barriers = &barrier.image_memory_barriers;

        assert_eq!(buffer_barriers.len(), 1);
        assert_eq!(buffer_barriers[0].buffer, vk::Buffer::from_raw(11));
        assert_eq!(
            buffer_barriers[0].dst_access_mask,
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
        );
        assert_eq!(buffer_barriers[0].size, vk::WHOLE_SIZE);

        assert_eq!(image_barriers.len(), 1);
        assert_eq!(image_barriers[0].image, vk::Image::from_raw(12));
        assert_eq!(image_barriers[0].old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(image_barriers[0].new_layout, vk::ImageLayout::GENERAL);
        assert_eq!(image_barriers[0].src_access_mask, vk::AccessFlags::empty());
        assert_eq!(
            image_barriers[0].subresource_range.aspect_mask,
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        );
    }

    #[test]
    fn stage_masks_are_combined() {
        let buffer: Arc<dyn BufferResource> = unsafe {
            Buffer::from_handle(
                vk::Buffer::from_raw(1),
                BufferCreateInfo {
                    initial_access: AccessFlags::HOST_WRITE,
                    ..Default::default()
                },
            )
        };
        let image: Arc<dyn ImageResource> = unsafe {
            Image::from_handle(
                vk::Image::from_raw(2),
                ImageCreateInfo {
                    initial_layout: ImageLayout::ColorAttachmentOptimal,
                    ..Default::default()
                },
            )
        };
        let mut recorder = PipelineBarrierRecorder::with_shader_stages(
            PipelineStages::COMPUTE_SHADER,
        );

        recorder.buffer_memory_barrier(&buffer, AccessFlags::UNIFORM_READ);
        recorder.transition_image_layout(&image, ImageLayout::General);

        let barrier = recorder.flush();
        assert_eq!(
            barrier.src_stages,
            PipelineStages::HOST | PipelineStages::COLOR_ATTACHMENT_OUTPUT,
        );
        assert_eq!(barrier.dst_stages, PipelineStages::COMPUTE_SHADER);

        let barrier = recorder.flush();
        assert!(barrier.is_empty());
        assert!(barrier.src_stages.is_empty());
    }

    #[test]
    fn shader_stages_only() {
        assert_should_panic!("are not shader stages", {
            PipelineBarrierRecorder::with_shader_stages(PipelineStages::TRANSFER);
        });
        assert_should_panic!({
            PipelineBarrierRecorder::with_shader_stages(PipelineStages::empty());
        });
    }
}
