//! GPU API access for uniform buffers.
//!
//! This module is responsible for:
//! - the [`GpuContext`] seam every uniform buffer GPU call goes through
//! - platform limits (maximum block size, number of binding points)
//! - a wgpu-backed implementation, optionally creating its own headless device

mod context;
mod gpu;
mod init;

pub use context::{BufferHandle, GpuContext, UboLimits};
pub use gpu::WgpuContext;
pub use init::WgpuInit;
