use crate::device::{BufferHandle, GpuContext};

use super::UboError;
use super::dynamic::DynamicBlock;

/// Whether a buffer's content is fixed or tracked per input.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferKind {
    /// Content supplied as raw bytes by the owner.
    Static,
    /// Content laid out from material inputs and synced from their live values.
    Dynamic,
}

/// Where the GPU copy stands relative to the CPU staging block.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UploadState {
    /// Handle exists, nothing uploaded yet.
    Uninitialized,
    /// GPU copy matches the staging block.
    Clean,
    /// Staging block changed since the last upload.
    Dirty,
}

pub(super) enum Storage {
    Static,
    Dynamic(DynamicBlock),
}

/// A uniform buffer object.
///
/// The record is owned by whoever created it and must be released with
/// [`free`](Self::free); dropping it leaks the GPU handle. It holds no GPU
/// state of its own beyond the handle, so it can move between threads freely.
/// Only calls taking a [`GpuContext`] touch the GPU.
pub struct UniformBuffer {
    /// Size in bytes.
    pub(super) size: usize,
    pub(super) handle: BufferHandle,
    /// Last binding point, `None` when unbound.
    pub(super) bindpoint: Option<u32>,
    pub(super) storage: Storage,
}

impl UniformBuffer {
    /// Creates a static buffer of `size` bytes and uploads `data` (zeros when `None`).
    ///
    /// The handle is released again if the platform cannot hold `size` bytes.
    ///
    /// # Panics
    /// Panics if `data` is provided and its length is not `size`.
    pub fn create_static(
        ctx: &mut impl GpuContext,
        size: usize,
        data: Option<&[u8]>,
    ) -> Result<Self, UboError> {
        if let Some(data) = data {
            assert_eq!(data.len(), size, "static UBO data does not match its size");
        }

        let handle = ctx.create_buffer().ok_or(UboError::CreateFailed)?;

        let max = ctx.limits().max_ubo_size;
        if size > max {
            ctx.delete_buffer(handle);
            return Err(UboError::TooLarge { size, max });
        }

        match data {
            Some(data) => ctx.buffer_data(handle, data),
            None => ctx.buffer_data(handle, &vec![0; size]),
        }

        log::debug!("static UBO #{} created ({size} bytes)", handle.get());

        Ok(Self {
            size,
            handle,
            bindpoint: None,
            storage: Storage::Static,
        })
    }

    /// Size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    #[inline]
    pub fn kind(&self) -> BufferKind {
        match self.storage {
            Storage::Static => BufferKind::Static,
            Storage::Dynamic(_) => BufferKind::Dynamic,
        }
    }

    /// Binding point from the last successful [`bind`](Self::bind).
    #[inline]
    pub fn bindpoint(&self) -> Option<u32> {
        self.bindpoint
    }

    /// Static buffers upload on every write and are always clean.
    pub fn upload_state(&self) -> UploadState {
        match &self.storage {
            Storage::Static => UploadState::Clean,
            Storage::Dynamic(block) if !block.initialized => UploadState::Uninitialized,
            Storage::Dynamic(block) if block.dirty => UploadState::Dirty,
            Storage::Dynamic(_) => UploadState::Clean,
        }
    }

    /// Overwrites the whole content of a static buffer.
    ///
    /// # Panics
    /// Panics on a dynamic buffer, or if `data` is not exactly `size` bytes.
    pub fn update(&mut self, ctx: &mut impl GpuContext, data: &[u8]) {
        assert!(
            self.kind() == BufferKind::Static,
            "update() is for static UBOs; dynamic ones sync from their inputs"
        );
        assert_eq!(data.len(), self.size, "static UBO data does not match its size");
        ctx.buffer_sub_data(self.handle, 0, data);
    }

    /// Attaches the buffer to binding point `slot`.
    ///
    /// A dirty dynamic buffer is uploaded first. A slot past the platform
    /// limit is reported and ignored; the buffer keeps its previous binding.
    pub fn bind(&mut self, ctx: &mut impl GpuContext, slot: u32) {
        let max = ctx.limits().max_ubo_binds;
        if slot >= max {
            log::warn!("{}", UboError::BindSlotExhausted { slot, max });
            return;
        }

        if matches!(&self.storage, Storage::Dynamic(block) if block.dirty) {
            self.upload(ctx);
        }

        ctx.bind_buffer_base(slot, self.handle);
        self.bindpoint = Some(slot);
    }

    /// Forgets the binding point. No GPU call is made.
    #[inline]
    pub fn unbind(&mut self) {
        self.bindpoint = None;
    }

    /// Releases CPU tables, then the GPU handle.
    ///
    /// Happens regardless of binding state; the caller must not draw with the
    /// slot afterwards.
    pub fn free(self, ctx: &mut impl GpuContext) {
        let Self { handle, storage, size, .. } = self;
        drop(storage);
        ctx.delete_buffer(handle);
        log::debug!("UBO #{} freed ({size} bytes)", handle.get());
    }
}
