use std::num::NonZeroU32;

/// Opaque name of a GPU buffer object.
///
/// Zero is never a valid handle; creation that yields no handle is reported as
/// `None` by [`GpuContext::create_buffer`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BufferHandle(NonZeroU32);

impl BufferHandle {
    #[inline]
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

/// Platform limits relevant to uniform buffers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UboLimits {
    /// Largest uniform block, in bytes.
    pub max_ubo_size: usize,
    /// Number of uniform buffer binding points.
    pub max_ubo_binds: u32,
}

impl Default for UboLimits {
    /// Minimums guaranteed by every backend wgpu supports.
    fn default() -> Self {
        Self {
            max_ubo_size: 16 << 10,
            max_ubo_binds: 12,
        }
    }
}

/// GPU API used by uniform buffers.
///
/// Holding a `&mut` to an implementation is the capability to touch GPU state:
/// every call that creates, uploads, binds or deletes goes through it, so all
/// of those happen on whichever thread owns the context. CPU-side work
/// (building layouts, syncing values) needs no context.
pub trait GpuContext {
    /// Allocates a new buffer name. No storage is reserved yet.
    fn create_buffer(&mut self) -> Option<BufferHandle>;

    /// Releases the buffer and any storage behind it.
    fn delete_buffer(&mut self, handle: BufferHandle);

    /// (Re)allocates storage sized to `data` and uploads it.
    fn buffer_data(&mut self, handle: BufferHandle, data: &[u8]);

    /// Overwrites a byte range of already allocated storage.
    fn buffer_sub_data(&mut self, handle: BufferHandle, offset: usize, data: &[u8]);

    /// Attaches the buffer to a uniform binding point.
    fn bind_buffer_base(&mut self, slot: u32, handle: BufferHandle);

    fn limits(&self) -> UboLimits;
}
