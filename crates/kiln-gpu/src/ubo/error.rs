use std::fmt;

/// Why a uniform buffer operation did not happen.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UboError {
    /// The GPU API returned no buffer handle.
    CreateFailed,
    /// The block is larger than the platform allows.
    TooLarge { size: usize, max: usize },
    /// The binding point is past the platform's last one.
    BindSlotExhausted { slot: u32, max: u32 },
}

impl fmt::Display for UboError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateFailed => write!(f, "UniformBuffer: UBO create failed"),
            Self::TooLarge { size, max } => {
                write!(f, "UniformBuffer: UBO too big ({size} bytes, limit {max})")
            }
            Self::BindSlotExhausted { slot, max } => {
                write!(f, "UniformBuffer: not enough UBO slots (requested {slot}, limit {max})")
            }
        }
    }
}

impl std::error::Error for UboError {}
