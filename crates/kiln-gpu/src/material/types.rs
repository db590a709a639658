/// GPU data type of a material input.
///
/// The discriminant is the number of 4-byte components the type occupies.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum GpuType {
    Float = 1,
    Vec2 = 2,
    Vec3 = 3,
    Vec4 = 4,
    Mat3 = 9,
    Mat4 = 16,
}

impl GpuType {
    /// Widest type the uniform layout code knows how to pad.
    pub const MAX_UBO_TYPE: GpuType = GpuType::Vec4;

    /// Number of `f32` components.
    #[inline]
    pub const fn components(self) -> usize {
        self as usize
    }

    /// Size in bytes when stored unpadded.
    #[inline]
    pub const fn byte_size(self) -> usize {
        self.components() * core::mem::size_of::<f32>()
    }

    /// Whether the type can live inside a dynamic uniform buffer.
    #[inline]
    pub const fn fits_ubo(self) -> bool {
        self.components() <= Self::MAX_UBO_TYPE.components()
    }
}

/// Where the value of an input comes from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum InputSource {
    /// Per-material uniform value.
    Uniform,
    /// Constant folded into the generated shader.
    Constant,
    /// Engine-provided value (matrices, time, ...).
    Builtin,
    /// Per-vertex attribute.
    Attribute,
    /// Texture sampler.
    Texture,
}
