use candle_core::{DType, Device};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cpu,
    Cuda,
    Metal,
}

#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub device: Device,
    pub kind: DeviceKind,
}

impl DeviceProfile {
    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
            kind: DeviceKind::Cpu,
        }
    }

    /// Opens the requested device, falling back to CPU when the backend
    /// isn't compiled in or no accelerator is present.
    pub fn select(requested: &str) -> Self {
        let opened = match requested.trim().to_lowercase().as_str() {
            "cuda" | "gpu" => Device::new_cuda(0).map(|d| (d, DeviceKind::Cuda)),
            "metal" => Device::new_metal(0).map(|d| (d, DeviceKind::Metal)),
            "cpu" | "" => return Self::cpu(),
            other => {
                warn!("Unknown device '{}', using CPU", other);
                return Self::cpu();
            }
        };

        match opened {
            Ok((device, kind)) => {
                info!("Using {:?} device", kind);
                Self { device, kind }
            }
            Err(e) => {
                warn!("Failed to open {} device: {}. Falling back to CPU", requested, e);
                Self::cpu()
            }
        }
    }

    /// Encoders always run in F32. Decoders use BF16 on CUDA only; Metal
    /// and CPU stay in F32.
    pub fn decoder_dtype(&self) -> DType {
        match self.kind {
            DeviceKind::Cuda => DType::BF16,
            DeviceKind::Cpu | DeviceKind::Metal => DType::F32,
        }
    }

    pub fn encoder_dtype(&self) -> DType {
        DType::F32
    }
}
