use std::sync::{Arc, PoisonError, RwLock};

use super::{GpuType, InputSource};

/// Opaque identifier of the upstream node feeding an input.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct LinkId(pub u32);

/// Shared storage for the current value of a uniform input.
///
/// Cloning produces another handle to the same storage, so a worker thread can
/// keep writing values while the buffer owner copies them during sync.
/// Storage is always four components wide; narrower types use the leading ones.
#[derive(Debug, Clone, Default)]
pub struct LiveValue(Arc<RwLock<[f32; 4]>>);

impl LiveValue {
    pub fn new(components: &[f32]) -> Self {
        let v = Self::default();
        v.set(components);
        v
    }

    /// Overwrites the leading components. Extra components are ignored.
    pub fn set(&self, components: &[f32]) {
        let mut slot = self.0.write().unwrap_or_else(PoisonError::into_inner);
        let n = components.len().min(slot.len());
        slot[..n].copy_from_slice(&components[..n]);
    }

    /// Returns a copy of all four components.
    pub fn get(&self) -> [f32; 4] {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A single material input as seen by the uniform buffer core.
///
/// Position in the caller's list is the input's identity: dynamic buffers
/// record it at build time and rely on it during sync.
#[derive(Debug, Clone)]
pub struct Input {
    pub ty: GpuType,
    pub source: InputSource,
    /// Upstream node producing this value, if any.
    pub link: Option<LinkId>,
    /// Live value, present for unlinked uniforms.
    pub value: Option<LiveValue>,
}

impl Input {
    pub fn new(ty: GpuType, source: InputSource) -> Self {
        Self { ty, source, link: None, value: None }
    }

    /// Unlinked uniform backed by `value`.
    pub fn uniform(ty: GpuType, value: LiveValue) -> Self {
        Self { ty, source: InputSource::Uniform, link: None, value: Some(value) }
    }

    /// Uniform whose value is produced by another node.
    pub fn linked(ty: GpuType, link: LinkId) -> Self {
        Self { ty, source: InputSource::Uniform, link: Some(link), value: None }
    }

    /// Whether the input is stored inside a dynamic uniform buffer.
    #[inline]
    pub fn is_dynamic_uniform(&self) -> bool {
        self.source == InputSource::Uniform && self.link.is_none()
    }
}
