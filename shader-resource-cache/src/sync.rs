//! Memory access scopes that shader resources are tracked in.
//!
//! Every buffer remembers the [`AccessFlags`] it was last made visible for. Before a shader reads
//! or writes a buffer through a descriptor, the buffer must have been made visible for exactly
//! the access that the descriptor type implies; otherwise a memory barrier has to be recorded
//! first. The [`PipelineStages`] of such a barrier are derived from the accesses on either side
//! of it.

use crate::macros::vulkan_bitflags;

vulkan_bitflags! {
    /// A set of memory access types that are included in a memory dependency.
    AccessFlags = AccessFlags(u32);

    /// Read access to an indirect buffer.
    INDIRECT_COMMAND_READ = INDIRECT_COMMAND_READ,

    /// Read access to an index buffer.
    INDEX_READ = INDEX_READ,

    /// Read access to a vertex buffer.
    VERTEX_ATTRIBUTE_READ = VERTEX_ATTRIBUTE_READ,

    /// Read access to a uniform buffer in a shader.
    UNIFORM_READ = UNIFORM_READ,

    /// Read access to an input attachment in a fragment shader, within a render pass.
    INPUT_ATTACHMENT_READ = INPUT_ATTACHMENT_READ,

    /// Read access to a buffer or image in a shader.
    SHADER_READ = SHADER_READ,

    /// Write access to a buffer or image in a shader.
    SHADER_WRITE = SHADER_WRITE,

    /// Read access to a color attachment during blending, logic operations or
    /// subpass load operations.
    COLOR_ATTACHMENT_READ = COLOR_ATTACHMENT_READ,

    /// Write access to a color, resolve or depth/stencil resolve attachment during a render pass
    /// or subpass store operations.
    COLOR_ATTACHMENT_WRITE = COLOR_ATTACHMENT_WRITE,

    /// Read access to a depth/stencil attachment during depth/stencil operations or
    /// subpass load operations.
    DEPTH_STENCIL_ATTACHMENT_READ = DEPTH_STENCIL_ATTACHMENT_READ,

    /// Write access to a depth/stencil attachment during depth/stencil operations or
    /// subpass store operations.
    DEPTH_STENCIL_ATTACHMENT_WRITE = DEPTH_STENCIL_ATTACHMENT_WRITE,

    /// Read access to a buffer or image during a copy, blit or resolve command.
    TRANSFER_READ = TRANSFER_READ,

    /// Write access to a buffer or image during a copy, blit, resolve or clear command.
    TRANSFER_WRITE = TRANSFER_WRITE,

    /// Read access performed by the host.
    HOST_READ = HOST_READ,

    /// Write access performed by the host.
    HOST_WRITE = HOST_WRITE,

    /// Any type of read access.
    MEMORY_READ = MEMORY_READ,

    /// Any type of write access.
    MEMORY_WRITE = MEMORY_WRITE,
}

impl AccessFlags {
    /// Read and write access to a buffer or image in a shader.
    pub const SHADER_READ_WRITE: Self = Self::SHADER_READ.union(Self::SHADER_WRITE);
}

vulkan_bitflags! {
    /// A set of stages in a device's processing pipeline.
    PipelineStages = PipelineStageFlags(u32);

    /// A pseudo-stage representing the start of the pipeline.
    TOP_OF_PIPE = TOP_OF_PIPE,

    /// Indirect buffers are read.
    DRAW_INDIRECT = DRAW_INDIRECT,

    /// Vertex and index buffers are read.
    VERTEX_INPUT = VERTEX_INPUT,

    /// Vertex shaders are executed.
    VERTEX_SHADER = VERTEX_SHADER,

    /// Tessellation control shaders are executed.
    TESSELLATION_CONTROL_SHADER = TESSELLATION_CONTROL_SHADER,

    /// Tessellation evaluation shaders are executed.
    TESSELLATION_EVALUATION_SHADER = TESSELLATION_EVALUATION_SHADER,

    /// Geometry shaders are executed.
    GEOMETRY_SHADER = GEOMETRY_SHADER,

    /// Fragment shaders are executed.
    FRAGMENT_SHADER = FRAGMENT_SHADER,

    /// Early fragment tests (depth and stencil tests before fragment shading) are performed.
    EARLY_FRAGMENT_TESTS = EARLY_FRAGMENT_TESTS,

    /// Late fragment tests (depth and stencil tests after fragment shading) are performed.
    LATE_FRAGMENT_TESTS = LATE_FRAGMENT_TESTS,

    /// The final color values are output from the pipeline after blending.
    COLOR_ATTACHMENT_OUTPUT = COLOR_ATTACHMENT_OUTPUT,

    /// Compute shaders are executed.
    COMPUTE_SHADER = COMPUTE_SHADER,

    /// Copy, blit, resolve and clear commands are executed.
    TRANSFER = TRANSFER,

    /// A pseudo-stage representing the end of the pipeline.
    BOTTOM_OF_PIPE = BOTTOM_OF_PIPE,

    /// A pseudo-stage representing reads and writes to device memory on the host.
    HOST = HOST,

    /// The union of all graphics stages.
    ALL_GRAPHICS = ALL_GRAPHICS,

    /// The union of all stages of all commands.
    ALL_COMMANDS = ALL_COMMANDS,
}

impl PipelineStages {
    /// The shader stages that every device supports without enabling a feature.
    pub const CORE_SHADERS: Self = Self::VERTEX_SHADER
        .union(Self::FRAGMENT_SHADER)
        .union(Self::COMPUTE_SHADER);

    /// Returns the stages that perform the memory accesses in `access`. Shader accesses are
    /// attributed to `shader_stages`.
    ///
    /// The result is empty if `access` is empty.
    pub const fn from_access(access: AccessFlags, shader_stages: PipelineStages) -> Self {
        let mut stages = Self::empty();

        if access.intersects(AccessFlags::INDIRECT_COMMAND_READ) {
            stages = stages.union(Self::DRAW_INDIRECT);
        }

        if access.intersects(AccessFlags::INDEX_READ.union(AccessFlags::VERTEX_ATTRIBUTE_READ)) {
            stages = stages.union(Self::VERTEX_INPUT);
        }

        if access.intersects(
            AccessFlags::UNIFORM_READ
                .union(AccessFlags::SHADER_READ)
                .union(AccessFlags::SHADER_WRITE),
        ) {
            stages = stages.union(shader_stages);
        }

        if access.intersects(AccessFlags::INPUT_ATTACHMENT_READ) {
            stages = stages.union(Self::FRAGMENT_SHADER);
        }

        if access.intersects(
            AccessFlags::COLOR_ATTACHMENT_READ.union(AccessFlags::COLOR_ATTACHMENT_WRITE),
        ) {
            stages = stages.union(Self::COLOR_ATTACHMENT_OUTPUT);
        }

        if access.intersects(
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                .union(AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
        ) {
            stages = stages
                .union(Self::EARLY_FRAGMENT_TESTS)
                .union(Self::LATE_FRAGMENT_TESTS);
        }

        if access.intersects(AccessFlags::TRANSFER_READ.union(AccessFlags::TRANSFER_WRITE)) {
            stages = stages.union(Self::TRANSFER);
        }

        if access.intersects(AccessFlags::HOST_READ.union(AccessFlags::HOST_WRITE)) {
            stages = stages.union(Self::HOST);
        }

        if access.intersects(AccessFlags::MEMORY_READ.union(AccessFlags::MEMORY_WRITE)) {
            stages = stages.union(Self::ALL_COMMANDS);
        }

        stages
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessFlags, PipelineStages};
    use ash::vk;

    #[test]
    fn round_trips_through_ash() {
        let flags = AccessFlags::UNIFORM_READ | AccessFlags::SHADER_WRITE;
        let raw: vk::AccessFlags = flags.into();

        assert_eq!(raw, vk::AccessFlags::UNIFORM_READ | vk::AccessFlags::SHADER_WRITE);
        assert_eq!(AccessFlags::from(raw), flags);
    }

    #[test]
    fn unknown_bits_are_dropped() {
        let raw = vk::AccessFlags::SHADER_READ | vk::AccessFlags::from_raw(1 << 31);

        assert_eq!(AccessFlags::from(raw), AccessFlags::SHADER_READ);
    }

    #[test]
    fn debug_lists_flag_names() {
        assert_eq!(
            format!("{:?}", AccessFlags::SHADER_READ_WRITE),
            "SHADER_READ | SHADER_WRITE",
        );
        assert_eq!(format!("{:?}", AccessFlags::empty()), "empty()");
    }

    #[test]
    fn stages_of_accesses() {
        assert_eq!(
            PipelineStages::from_access(AccessFlags::UNIFORM_READ, PipelineStages::CORE_SHADERS),
            PipelineStages::VERTEX_SHADER
                | PipelineStages::FRAGMENT_SHADER
                | PipelineStages::COMPUTE_SHADER,
        );
        assert_eq!(
            PipelineStages::from_access(
                AccessFlags::SHADER_READ_WRITE,
                PipelineStages::COMPUTE_SHADER,
            ),
            PipelineStages::COMPUTE_SHADER,
        );
        assert_eq!(
            PipelineStages::from_access(
                AccessFlags::TRANSFER_WRITE | AccessFlags::HOST_READ,
                PipelineStages::CORE_SHADERS,
            ),
            PipelineStages::TRANSFER | PipelineStages::HOST,
        );
        assert!(
            PipelineStages::from_access(AccessFlags::empty(), PipelineStages::CORE_SHADERS)
                .is_empty()
        );
    }
}
