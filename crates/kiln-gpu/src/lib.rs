//! Kiln GPU crate.
//!
//! Uniform buffer objects for material parameters: static blocks, and dynamic
//! blocks laid out from material inputs with dirty-tracked, bind-time upload.

pub mod device;
pub mod logging;
pub mod material;
pub mod ubo;

#[cfg(test)]
mod testing;
