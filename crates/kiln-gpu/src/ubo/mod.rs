//! Uniform buffer objects.
//!
//! Two kinds of buffers share one record type:
//! - static: raw bytes supplied by the owner, uploaded on every `update`
//! - dynamic: laid out from material inputs, filled from their live values by
//!   `sync`, uploaded lazily by `bind` when dirty
//!
//! Typical dynamic flow:
//!
//! ```ignore
//! let mut order = Vec::new();
//! let Some(mut ubo) = UniformBuffer::build_dynamic(&mut ctx, &inputs, &mut order)? else {
//!     return Ok(()); // material has no uniforms
//! };
//!
//! // any thread, once values changed:
//! ubo.sync(&inputs);
//!
//! // GPU thread, per draw:
//! ubo.bind(&mut ctx, 0);
//!
//! ubo.free(&mut ctx);
//! ```

mod buffer;
mod dynamic;
mod error;
mod item;
pub mod sort;

pub use buffer::{BufferKind, UniformBuffer, UploadState};
pub use error::UboError;
pub use item::{Item, ItemTable};
