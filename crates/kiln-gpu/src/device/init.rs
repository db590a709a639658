/// Initialization parameters for [`WgpuContext::headless`](super::WgpuContext::headless).
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct WgpuInit {
    /// Adapter preference.
    pub power_preference: wgpu::PowerPreference,

    /// Restrict adapter selection to a software fallback.
    ///
    /// Useful on CI machines without a GPU.
    pub force_fallback_adapter: bool,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability unless a feature is strictly necessary.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Debug label attached to the device.
    pub label: &'static str,

    /// Caps the uniform block size below the device limit.
    pub max_ubo_size: Option<usize>,

    /// Caps the number of binding points below the device limit.
    pub max_ubo_binds: Option<u32>,
}

impl Default for WgpuInit {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            label: "kiln-gpu device",
            max_ubo_size: None,
            max_ubo_binds: None,
        }
    }
}
