//! Buffers and buffer views with tracked access scopes.
//!
//! [`Buffer`] wraps a raw buffer handle that was created elsewhere and remembers the access
//! scope that the buffer was last made visible for. [`BufferView`] wraps a texel buffer view
//! and keeps the buffer it was created from alive.

use crate::{
    resource::{BufferResource, BufferViewResource},
    sync::AccessFlags,
    DeviceSize,
};
use ash::vk;
use parking_lot::Mutex;
use std::sync::Arc;

/// A buffer whose access scope is tracked across command recording.
#[derive(Debug)]
pub struct Buffer {
    handle: vk::Buffer,
    name: String,
    size: DeviceSize,
    access: Mutex<AccessFlags>,
}

impl Buffer {
    /// Creates a new `Buffer` from a raw object handle.
    ///
    /// # Safety
    ///
    /// - `handle` must be a valid Vulkan buffer handle.
    /// - `create_info` must match the info used to create the object, and
    ///   `create_info.initial_access` must be the access scope the buffer is currently visible
    ///   for.
    pub unsafe fn from_handle(handle: vk::Buffer, create_info: BufferCreateInfo) -> Arc<Buffer> {
        let BufferCreateInfo {
            name,
            size,
            initial_access,
            _ne: _,
        } = create_info;

        Arc::new(Buffer {
            handle,
            name,
            size,
            access: Mutex::new(initial_access),
        })
    }
}

impl BufferResource for Buffer {
    #[inline]
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn handle(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    fn size(&self) -> DeviceSize {
        self.size
    }

    #[inline]
    fn access(&self) -> AccessFlags {
        *self.access.lock()
    }

    #[inline]
    unsafe fn set_access(&self, access: AccessFlags) {
        *self.access.lock() = access;
    }
}

/// Parameters to create a new `Buffer`.
#[derive(Clone, Debug)]
pub struct BufferCreateInfo {
    /// The name reported in diagnostics.
    ///
    /// The default value is empty.
    pub name: String,

    /// The size in bytes of the buffer.
    ///
    /// The default value is `0`.
    pub size: DeviceSize,

    /// The access scope that the buffer is visible for when it is wrapped.
    ///
    /// The default value is empty, which no descriptor type accepts.
    pub initial_access: AccessFlags,

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            name: String::new(),
            size: 0,
            initial_access: AccessFlags::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// A view of a buffer as an array of formatted texels.
#[derive(Debug)]
pub struct BufferView {
    handle: vk::BufferView,
    buffer: Arc<dyn BufferResource>,
    offset: DeviceSize,
    range: DeviceSize,
}

impl BufferView {
    /// Creates a new `BufferView` from a raw object handle.
    ///
    /// # Safety
    ///
    /// - `handle` must be a valid Vulkan buffer view handle created from `buffer`.
    /// - `create_info` must match the info used to create the object.
    pub unsafe fn from_handle(
        handle: vk::BufferView,
        buffer: Arc<dyn BufferResource>,
        create_info: BufferViewCreateInfo,
    ) -> Arc<BufferView> {
        let BufferViewCreateInfo {
            offset,
            range,
            _ne: _,
        } = create_info;

        let range = range.unwrap_or_else(|| buffer.size().saturating_sub(offset));

        assert!(
            offset.checked_add(range).is_some_and(|end| end <= buffer.size()),
            "the range of the view ({}..{}) exceeds the size of buffer \"{}\" ({})",
            offset,
            offset.saturating_add(range),
            buffer.name(),
            buffer.size(),
        );

        Arc::new(BufferView {
            handle,
            buffer,
            offset,
            range,
        })
    }
}

impl BufferViewResource for BufferView {
    #[inline]
    fn handle(&self) -> vk::BufferView {
        self.handle
    }

    #[inline]
    fn buffer(&self) -> &Arc<dyn BufferResource> {
        &self.buffer
    }

    #[inline]
    fn offset(&self) -> DeviceSize {
        self.offset
    }

    #[inline]
    fn range(&self) -> DeviceSize {
        self.range
    }
}

/// Parameters to create a new `BufferView`.
#[derive(Clone, Debug)]
pub struct BufferViewCreateInfo {
    /// The offset in bytes of the view within the buffer.
    ///
    /// The default value is `0`.
    pub offset: DeviceSize,

    /// The size in bytes of the view. `None` covers the rest of the buffer after `offset`.
    ///
    /// The default value is `None`.
    pub range: Option<DeviceSize>,

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferViewCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            offset: 0,
            range: None,
            _ne: crate::NonExhaustive(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Buffer, BufferCreateInfo, BufferView, BufferViewCreateInfo};
    use crate::{
        resource::{BufferResource, BufferViewResource},
        sync::AccessFlags,
    };
    use ash::vk;
    use std::sync::Arc;

    fn buffer(size: u64) -> Arc<Buffer> {
        unsafe {
            Buffer::from_handle(
                vk::Buffer::null(),
                BufferCreateInfo {
                    name: "vertices".to_owned(),
                    size,
                    initial_access: AccessFlags::TRANSFER_WRITE,
                    ..Default::default()
                },
            )
        }
    }

    #[test]
    fn tracks_access() {
        let buffer = buffer(256);
        assert_eq!(buffer.access(), AccessFlags::TRANSFER_WRITE);

        unsafe { buffer.set_access(AccessFlags::UNIFORM_READ) };
        assert_eq!(buffer.access(), AccessFlags::UNIFORM_READ);
    }

    #[test]
    fn view_defaults_to_remaining_range() {
        let view = unsafe {
            BufferView::from_handle(
                vk::BufferView::null(),
                buffer(256),
                BufferViewCreateInfo {
                    offset: 64,
                    ..Default::default()
                },
            )
        };

        assert_eq!(view.offset(), 64);
        assert_eq!(view.range(), 192);
        assert_eq!(view.buffer().name(), "vertices");
    }

    #[test]
    fn view_keeps_buffer_alive() {
        let buffer = buffer(16);
        let view = unsafe {
            BufferView::from_handle(vk::BufferView::null(), buffer.clone(), Default::default())
        };

        assert_eq!(Arc::strong_count(&buffer), 2);
        drop(view);
        assert_eq!(Arc::strong_count(&buffer), 1);
    }

    #[test]
    fn view_out_of_range() {
        assert_should_panic!("exceeds the size of buffer", {
            let _ = unsafe {
                BufferView::from_handle(
                    vk::BufferView::null(),
                    buffer(16),
                    BufferViewCreateInfo {
                        offset: 8,
                        range: Some(16),
                        ..Default::default()
                    },
                )
            };
        });
    }

    #[test]
    fn view_range_overflow() {
        assert_should_panic!("exceeds the size of buffer", {
            let _ = unsafe {
                BufferView::from_handle(
                    vk::BufferView::null(),
                    buffer(16),
                    BufferViewCreateInfo {
                        offset: 8,
                        range: Some(u64::MAX - 4),
                        ..Default::default()
                    },
                )
            };
        });
    }
}
