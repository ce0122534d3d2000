pub mod backend;
pub mod cpu;
pub mod gpu_utils;
pub mod memory;

#[cfg(feature = "gpu")]
pub mod gpu;
#[cfg(feature = "gpu")]
pub mod gpu_kernels;

pub use backend::{BackendType, TrajectoryBackend, TransformBuffer};
pub use cpu::{CpuBackend, HostBuffer};
pub use gpu_utils::{parse_bytes_with_suffix, read_max_bytes_from_env};
pub use memory::MemoryBudget;

#[cfg(feature = "gpu")]
pub use gpu::{GpuBackend, GpuBuffer, GpuContext};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Device error: {0}")]
    DeviceError(String),

    #[error("Memory error: {0}")]
    MemoryError(String),

    #[error("Kernel error: {0}")]
    KernelError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn backend_not_available(backend: impl Into<String>) -> Self {
        Self::BackendNotAvailable(backend.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
