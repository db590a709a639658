use std::borrow::Cow;
use std::collections::HashMap;

use anyhow::{Context, Result};

use super::{BufferHandle, GpuContext, UboLimits, WgpuInit};

/// Uniform buffers must be bound with a size that is a multiple of this.
const UBO_SIZE_ALIGNMENT: u64 = 16;

/// [`GpuContext`] backed by a wgpu device/queue.
///
/// wgpu fixes a buffer's size at creation, so a handle only names a slot in
/// `buffers`; the `wgpu::Buffer` itself appears on the first
/// [`buffer_data`](GpuContext::buffer_data) call. wgpu has no global binding
/// points either: the bind table is kept here and read by whoever builds bind
/// groups, via [`bound_buffer`](Self::bound_buffer) or
/// [`bind_group_entries`](Self::bind_group_entries).
pub struct WgpuContext {
    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Effective limits (device limits, optionally capped).
    limits: UboLimits,

    /// Handle → storage. `None` until the first full upload.
    buffers: HashMap<BufferHandle, Option<wgpu::Buffer>>,

    /// Binding point → handle.
    bindings: Vec<Option<BufferHandle>>,

    next_handle: u32,
}

impl WgpuContext {
    /// Wraps an existing device/queue pair.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let limits = device_ubo_limits(&device.limits());
        Self {
            device,
            queue,
            limits,
            buffers: HashMap::new(),
            bindings: Vec::new(),
            next_handle: 1,
        }
    }

    /// Creates a context without any window or surface.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu; use
    /// `pollster::block_on` from synchronous code.
    pub async fn headless(init: WgpuInit) -> Result<Self> {
        let WgpuInit {
            power_preference,
            force_fallback_adapter,
            required_features,
            required_limits,
            label,
            max_ubo_size,
            max_ubo_binds,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(label),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let mut ctx = Self::from_device(device, queue);
        ctx.cap_limits(max_ubo_size, max_ubo_binds);

        log::debug!(
            "headless wgpu context ready: max ubo size {} bytes, {} binding points",
            ctx.limits.max_ubo_size,
            ctx.limits.max_ubo_binds
        );

        Ok(ctx)
    }

    /// Lowers the effective limits. Values above the device limit are ignored.
    pub fn cap_limits(&mut self, max_ubo_size: Option<usize>, max_ubo_binds: Option<u32>) {
        if let Some(size) = max_ubo_size {
            self.limits.max_ubo_size = self.limits.max_ubo_size.min(size);
        }
        if let Some(binds) = max_ubo_binds {
            self.limits.max_ubo_binds = self.limits.max_ubo_binds.min(binds);
        }
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Buffer currently attached to `slot`, if it has storage.
    pub fn bound_buffer(&self, slot: u32) -> Option<&wgpu::Buffer> {
        let handle = (*self.bindings.get(slot as usize)?)?;
        self.buffers.get(&handle)?.as_ref()
    }

    /// One entry per occupied binding point, using the slot as binding index.
    pub fn bind_group_entries(&self) -> Vec<wgpu::BindGroupEntry<'_>> {
        (0..self.bindings.len() as u32)
            .filter_map(|slot| {
                self.bound_buffer(slot).map(|buffer| wgpu::BindGroupEntry {
                    binding: slot,
                    resource: buffer.as_entire_binding(),
                })
            })
            .collect()
    }
}

impl GpuContext for WgpuContext {
    fn create_buffer(&mut self) -> Option<BufferHandle> {
        let handle = BufferHandle::new(self.next_handle)?;
        self.next_handle = self.next_handle.checked_add(1)?;
        self.buffers.insert(handle, None);
        Some(handle)
    }

    fn delete_buffer(&mut self, handle: BufferHandle) {
        if let Some(Some(buffer)) = self.buffers.remove(&handle) {
            buffer.destroy();
        }
        for slot in self.bindings.iter_mut() {
            if *slot == Some(handle) {
                *slot = None;
            }
        }
    }

    fn buffer_data(&mut self, handle: BufferHandle, data: &[u8]) {
        let Some(entry) = self.buffers.get_mut(&handle) else {
            log::warn!("buffer_data on unknown handle {}", handle.get());
            return;
        };

        let size = (data.len() as u64).max(1).div_ceil(UBO_SIZE_ALIGNMENT) * UBO_SIZE_ALIGNMENT;
        let label = format!("kiln ubo #{}", handle.get());
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label.as_str()),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if !data.is_empty() {
            self.queue.write_buffer(&buffer, 0, &copy_aligned(data));
        }

        if let Some(old) = entry.replace(buffer) {
            old.destroy();
        }
    }

    fn buffer_sub_data(&mut self, handle: BufferHandle, offset: usize, data: &[u8]) {
        let Some(Some(buffer)) = self.buffers.get(&handle) else {
            log::warn!("buffer_sub_data on unallocated handle {}", handle.get());
            return;
        };

        if offset as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            log::warn!(
                "buffer_sub_data at unaligned offset {offset} on handle {}",
                handle.get()
            );
            return;
        }

        let data = copy_aligned(data);
        let end = (offset + data.len()) as u64;
        if end > buffer.size() {
            log::warn!(
                "buffer_sub_data out of range on handle {}: {end} > {}",
                handle.get(),
                buffer.size()
            );
            return;
        }
        if !data.is_empty() {
            self.queue.write_buffer(buffer, offset as u64, &data);
        }
    }

    fn bind_buffer_base(&mut self, slot: u32, handle: BufferHandle) {
        let slot = slot as usize;
        if self.bindings.len() <= slot {
            self.bindings.resize(slot + 1, None);
        }
        self.bindings[slot] = Some(handle);
    }

    fn limits(&self) -> UboLimits {
        self.limits
    }
}

/// Zero-pads `data` to a multiple of `COPY_BUFFER_ALIGNMENT`.
///
/// Storage is a multiple of 16 bytes, so the padded tail always fits. It
/// overwrites at most 3 bytes past `data`, which only ever hold padding.
fn copy_aligned(data: &[u8]) -> Cow<'_, [u8]> {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    if data.len() % align == 0 {
        return Cow::Borrowed(data);
    }
    let mut padded = data.to_vec();
    padded.resize(data.len().next_multiple_of(align), 0);
    Cow::Owned(padded)
}

/// Reads uniform buffer limits off a device.
pub(crate) fn device_ubo_limits(limits: &wgpu::Limits) -> UboLimits {
    let max_size = u64::from(limits.max_uniform_buffer_binding_size);
    UboLimits {
        max_ubo_size: usize::try_from(max_size).unwrap_or(usize::MAX),
        max_ubo_binds: limits.max_uniform_buffers_per_shader_stage,
    }
}
