use crate::{Error, Result};
use cv_core::RigidTransform;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    Cpu,
    Vulkan,
    Metal,
    DirectX,
    OpenGl,
    WebGpu,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendType::Cpu => write!(f, "CPU"),
            BackendType::Vulkan => write!(f, "Vulkan"),
            BackendType::Metal => write!(f, "Metal"),
            BackendType::DirectX => write!(f, "DirectX"),
            BackendType::OpenGl => write!(f, "OpenGL"),
            BackendType::WebGpu => write!(f, "WebGPU"),
        }
    }
}

/// A fixed-capacity array of transforms owned by one backend.
///
/// Dropping the buffer releases its memory.
pub trait TransformBuffer: Send + Sync {
    fn len(&self) -> usize;

    fn label(&self) -> &str;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn size_bytes(&self) -> usize {
        self.len() * std::mem::size_of::<RigidTransform>()
    }
}

/// Trajectory math capability.
///
/// All operations are issued in program order on a single queue; `read`
/// blocks until every previously issued operation has completed.
pub trait TrajectoryBackend: Send + Sync {
    type Buffer: TransformBuffer;

    fn backend_type(&self) -> BackendType;

    fn name(&self) -> &str;

    /// Allocate a zero-filled buffer holding `len` transforms.
    fn allocate(&self, label: &str, len: usize) -> Result<Self::Buffer>;

    fn write(&self, buffer: &mut Self::Buffer, offset: usize, data: &[RigidTransform])
        -> Result<()>;

    fn read(&self, buffer: &Self::Buffer, offset: usize, len: usize)
        -> Result<Vec<RigidTransform>>;

    /// Device-side copy of the transform at `src` into `dst`.
    fn copy_within(&self, buffer: &mut Self::Buffer, src: usize, dst: usize) -> Result<()>;

    /// Recompute `complete[0..num_complete]`.
    ///
    /// With `S = local_block - 1`, frame `i` belongs to submap `g = i / S` at
    /// slot `l = i % S` and receives `global[g] * local[g * local_block + l]`.
    /// Frames whose submap index is not below `min(num_global, num_local)` are
    /// left untouched.
    #[allow(clippy::too_many_arguments)]
    fn update_trajectory(
        &self,
        global: &Self::Buffer,
        num_global: usize,
        complete: &mut Self::Buffer,
        num_complete: usize,
        local: &Self::Buffer,
        local_block: usize,
        num_local: usize,
    ) -> Result<()>;

    /// Write `global[num_global] = global[num_global - 1] * local[num_global * local_block - 1]`.
    fn init_next_global_transform(
        &self,
        global: &mut Self::Buffer,
        num_global: usize,
        local: &Self::Buffer,
        local_block: usize,
    ) -> Result<()>;

    fn fill(&self, buffer: &mut Self::Buffer, value: RigidTransform) -> Result<()> {
        let data = vec![value; buffer.len()];
        self.write(buffer, 0, &data)
    }
}

pub(crate) fn check_range(buffer: &dyn TransformBuffer, offset: usize, len: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= buffer.len() => Ok(()),
        _ => Err(Error::InvalidInput(format!(
            "range {}..{} out of bounds for '{}' (len {})",
            offset,
            offset.saturating_add(len),
            buffer.label(),
            buffer.len()
        ))),
    }
}

pub(crate) fn check_update_args(
    global: &dyn TransformBuffer,
    num_global: usize,
    complete: &dyn TransformBuffer,
    num_complete: usize,
    local: &dyn TransformBuffer,
    local_block: usize,
    num_local: usize,
) -> Result<usize> {
    if local_block < 2 {
        return Err(Error::invalid_input(format!(
            "local block must hold at least two transforms, got {local_block}"
        )));
    }
    check_range(complete, 0, num_complete)?;
    let active = num_global.min(num_local);
    check_range(global, 0, active)?;
    check_range(local, 0, active * local_block)?;
    Ok(active)
}

pub(crate) fn check_init_next_args(
    global: &dyn TransformBuffer,
    num_global: usize,
    local: &dyn TransformBuffer,
    local_block: usize,
) -> Result<()> {
    if num_global == 0 {
        return Err(Error::invalid_input(
            "cannot extrapolate a global transform without a previous one",
        ));
    }
    if num_global >= global.len() {
        return Err(Error::MemoryError(format!(
            "global trajectory '{}' is full ({} transforms)",
            global.label(),
            global.len()
        )));
    }
    check_range(local, 0, num_global * local_block)
}
