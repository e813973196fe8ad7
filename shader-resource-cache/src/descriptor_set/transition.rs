use super::{
    slot::{ResourceSlot, SlotBinding},
    RequiredState, ResourceType, ShaderResourceCache,
};
use crate::{
    command_buffer::CommandRecorder,
    image::ImageLayout,
    resource::{BufferResource, ImageResource},
    sync::AccessFlags,
};
use std::{fmt, sync::Arc};
use thiserror::Error;

/// What the transition pass does when a bound object is not in the state its slot requires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransitionMode {
    /// Only check the state of the bound objects, and report every mismatch. Neither the
    /// objects nor the recorder are touched.
    VerifyOnly,

    /// Record a barrier or layout transition for every mismatch.
    #[default]
    Transition,
}

impl ShaderResourceCache {
    /// Brings every object bound to the cache into the state its slot's type requires.
    ///
    /// Slots are visited in set-index order, and in offset order within each set. Empty slots,
    /// uninitialized slots and slots whose type has no required state are skipped.
    ///
    /// With [`TransitionMode::Transition`], `recorder` is asked to record a barrier for every
    /// object whose recorded state differs from the required one, and the pass always
    /// succeeds. With [`TransitionMode::VerifyOnly`], every mismatch is logged and returned in
    /// the error; `recorder` is not called.
    ///
    /// An object bound to several slots that require different states ends up in the state of
    /// the last such slot, and a following verification reports the others.
    pub fn transition_resources(
        &self,
        recorder: &mut dyn CommandRecorder,
        mode: TransitionMode,
    ) -> Result<(), ResourceStateError> {
        let mut handler = match mode {
            TransitionMode::VerifyOnly => MismatchHandler::Report(Vec::new()),
            TransitionMode::Transition => MismatchHandler::Record(recorder),
        };

        for (set, offset, slot) in self.resources() {
            let Some(requirement) = Requirement::of(slot) else {
                continue;
            };

            if !requirement.is_satisfied() {
                handler.on_mismatch(set, offset, &requirement);
            }
        }

        match handler {
            MismatchHandler::Report(mismatches) if !mismatches.is_empty() => {
                Err(ResourceStateError { mismatches })
            }
            _ => Ok(()),
        }
    }
}

/// The object bound to a slot, and the state the slot requires of it.
enum Requirement<'a> {
    Access {
        resource_type: ResourceType,
        buffer: &'a Arc<dyn BufferResource>,
        required: AccessFlags,
    },
    Layout {
        resource_type: ResourceType,
        image: &'a Arc<dyn ImageResource>,
        required: ImageLayout,
    },
}

impl<'a> Requirement<'a> {
    fn of(slot: &'a ResourceSlot) -> Option<Self> {
        let requirement = match &slot.binding {
            SlotBinding::Uninitialized
            | SlotBinding::AtomicCounter(_)
            | SlotBinding::SeparateSampler(_) => return None,
            SlotBinding::UniformBuffer(buffer) => Requirement::Access {
                resource_type: ResourceType::UniformBuffer,
                buffer: buffer.as_ref()?,
                required: AccessFlags::UNIFORM_READ,
            },
            SlotBinding::StorageBuffer(buffer) => Requirement::Access {
                resource_type: ResourceType::StorageBuffer,
                buffer: buffer.as_ref()?,
                required: AccessFlags::SHADER_READ_WRITE,
            },
            SlotBinding::UniformTexelBuffer(view) => Requirement::Access {
                resource_type: ResourceType::UniformTexelBuffer,
                buffer: view.as_ref()?.buffer(),
                required: AccessFlags::SHADER_READ,
            },
            SlotBinding::StorageTexelBuffer(view) => Requirement::Access {
                resource_type: ResourceType::StorageTexelBuffer,
                buffer: view.as_ref()?.buffer(),
                required: AccessFlags::SHADER_READ_WRITE,
            },
            SlotBinding::SeparateImage(view) => Requirement::Layout {
                resource_type: ResourceType::SeparateImage,
                image: view.as_ref()?.image(),
                required: ImageLayout::ShaderReadOnlyOptimal,
            },
            SlotBinding::SampledImage(view) => Requirement::Layout {
                resource_type: ResourceType::SampledImage,
                image: view.as_ref()?.image(),
                required: ImageLayout::ShaderReadOnlyOptimal,
            },
            SlotBinding::StorageImage(view) => Requirement::Layout {
                resource_type: ResourceType::StorageImage,
                image: view.as_ref()?.image(),
                required: ImageLayout::General,
            },
        };

        debug_assert_eq!(
            requirement.resource_type().required_state(),
            requirement.required_state(),
        );

        Some(requirement)
    }

    fn resource_type(&self) -> ResourceType {
        match *self {
            Requirement::Access { resource_type, .. }
            | Requirement::Layout { resource_type, .. } => resource_type,
        }
    }

    fn required_state(&self) -> RequiredState {
        match *self {
            Requirement::Access { required, .. } => RequiredState::Access(required),
            Requirement::Layout { required, .. } => RequiredState::Layout(required),
        }
    }

    fn is_satisfied(&self) -> bool {
        match *self {
            Requirement::Access {
                buffer, required, ..
            } => buffer.access() == required,
            Requirement::Layout {
                image, required, ..
            } => image.layout() == required,
        }
    }

    fn mismatch(&self, set: u32, offset: u32) -> StateMismatch {
        match *self {
            Requirement::Access {
                resource_type,
                buffer,
                required,
            } => StateMismatch {
                set,
                offset,
                resource_type,
                resource_name: buffer.name().to_owned(),
                kind: MismatchKind::Access {
                    current: buffer.access(),
                    required,
                },
            },
            Requirement::Layout {
                resource_type,
                image,
                required,
            } => StateMismatch {
                set,
                offset,
                resource_type,
                resource_name: image.name().to_owned(),
                kind: MismatchKind::Layout {
                    current: image.layout(),
                    required,
                },
            },
        }
    }
}

enum MismatchHandler<'r> {
    Report(Vec<StateMismatch>),
    Record(&'r mut dyn CommandRecorder),
}

impl MismatchHandler<'_> {
    fn on_mismatch(&mut self, set: u32, offset: u32, requirement: &Requirement<'_>) {
        match self {
            MismatchHandler::Report(mismatches) => {
                let mismatch = requirement.mismatch(set, offset);
                log::error!("{}", mismatch);
                mismatches.push(mismatch);
            }
            MismatchHandler::Record(recorder) => match *requirement {
                Requirement::Access {
                    buffer, required, ..
                } => recorder.buffer_memory_barrier(buffer, required),
                Requirement::Layout {
                    image, required, ..
                } => recorder.transition_image_layout(image, required),
            },
        }
    }
}

/// A bound object that was found in a different state than its slot requires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateMismatch {
    /// The index of the set of the slot.
    pub set: u32,

    /// The offset of the slot within its set.
    pub offset: u32,

    /// The type of the slot.
    pub resource_type: ResourceType,

    /// The name of the buffer or image whose state is wrong.
    pub resource_name: String,

    /// The state that was found, and the state that was required.
    pub kind: MismatchKind,
}

/// The recorded and required state of a [`StateMismatch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MismatchKind {
    /// A buffer was visible for the wrong access scope.
    Access {
        current: AccessFlags,
        required: AccessFlags,
    },

    /// An image was in the wrong layout.
    Layout {
        current: ImageLayout,
        required: ImageLayout,
    },
}

impl fmt::Display for StateMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MismatchKind::Access { current, required } => write!(
                f,
                "buffer \"{}\" bound to resource {} of set {} ({:?}) is visible for {:?}, but \
                {:?} is required",
                self.resource_name, self.offset, self.set, self.resource_type, current, required,
            )?,
            MismatchKind::Layout { current, required } => write!(
                f,
                "image \"{}\" bound to resource {} of set {} ({:?}) is in layout {:?}, but {:?} \
                is required",
                self.resource_name, self.offset, self.set, self.resource_type, current, required,
            )?,
        }

        f.write_str(
            "; the resources must be transitioned before they are verified, did you skip the \
            transition?",
        )
    }
}

/// Error returned by a verifying transition pass that found objects in the wrong state.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{} shader resources are not in the state required by their slots", .mismatches.len())]
pub struct ResourceStateError {
    mismatches: Vec<StateMismatch>,
}

impl ResourceStateError {
    /// Returns every mismatch that was found, in the order the slots were visited.
    #[inline]
    pub fn mismatches(&self) -> &[StateMismatch] {
        &self.mismatches
    }
}
