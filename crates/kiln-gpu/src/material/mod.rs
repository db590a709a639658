//! Material input descriptors.
//!
//! These are the values a shader-generation layer hands to the uniform buffer
//! core: a typed list of inputs, some of which carry a live value that can be
//! rewritten every frame. Only their *values* change between frames; the
//! structure (count, order, types) is expected to stay fixed for the lifetime
//! of any buffer built from them.

mod input;
mod types;

pub use input::{Input, LinkId, LiveValue};
pub use types::{GpuType, InputSource};
