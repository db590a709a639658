//! Test double for [`GpuContext`].

use std::collections::HashSet;

use crate::device::{BufferHandle, GpuContext, UboLimits};

/// A GPU call as observed by [`RecordingContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GpuCall {
    Create(BufferHandle),
    Delete(BufferHandle),
    Data { handle: BufferHandle, bytes: Vec<u8> },
    SubData { handle: BufferHandle, offset: usize, bytes: Vec<u8> },
    Bind { slot: u32, handle: BufferHandle },
}

/// Records every call instead of talking to a GPU.
#[derive(Debug, Default)]
pub(crate) struct RecordingContext {
    pub calls: Vec<GpuCall>,
    pub limits: UboLimits,
    /// Makes `create_buffer` return `None`.
    pub fail_create: bool,
    live: HashSet<BufferHandle>,
    next: u32,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_ubo_size: usize, max_ubo_binds: u32) -> Self {
        Self {
            limits: UboLimits { max_ubo_size, max_ubo_binds },
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self { fail_create: true, ..Self::default() }
    }

    /// Handles created and not yet deleted.
    pub fn live_handles(&self) -> usize {
        self.live.len()
    }

    /// Number of full and partial uploads.
    pub fn uploads(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, GpuCall::Data { .. } | GpuCall::SubData { .. }))
            .count()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl GpuContext for RecordingContext {
    fn create_buffer(&mut self) -> Option<BufferHandle> {
        if self.fail_create {
            return None;
        }
        self.next += 1;
        let handle = BufferHandle::new(self.next)?;
        self.live.insert(handle);
        self.calls.push(GpuCall::Create(handle));
        Some(handle)
    }

    fn delete_buffer(&mut self, handle: BufferHandle) {
        assert!(self.live.remove(&handle), "double delete of {handle:?}");
        self.calls.push(GpuCall::Delete(handle));
    }

    fn buffer_data(&mut self, handle: BufferHandle, data: &[u8]) {
        self.calls.push(GpuCall::Data { handle, bytes: data.to_vec() });
    }

    fn buffer_sub_data(&mut self, handle: BufferHandle, offset: usize, data: &[u8]) {
        self.calls.push(GpuCall::SubData { handle, offset, bytes: data.to_vec() });
    }

    fn bind_buffer_base(&mut self, slot: u32, handle: BufferHandle) {
        self.calls.push(GpuCall::Bind { slot, handle });
    }

    fn limits(&self) -> UboLimits {
        self.limits
    }
}
