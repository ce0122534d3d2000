//! Host reference backend.
//!
//! Buffers live in system memory; the trajectory kernels run on the global
//! rayon pool. Used in tests and wherever no GPU adapter is present.

use crate::backend::{check_init_next_args, check_range, check_update_args};
use crate::memory::MemoryBudget;
use crate::{BackendType, Result, TrajectoryBackend, TransformBuffer};
use bytemuck::Zeroable;
use cv_core::RigidTransform;
use rayon::prelude::*;
use std::sync::Arc;

const BUDGET_ENV: &str = "RUSTCV_TRAJECTORY_MAX_BYTES";

/// Clones share one memory budget.
#[derive(Clone)]
pub struct CpuBackend {
    budget: Arc<MemoryBudget>,
    num_threads: usize,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::with_budget(MemoryBudget::unlimited())
    }

    /// Backend that refuses allocations beyond `max_bytes` live bytes.
    pub fn with_memory_budget(max_bytes: usize) -> Self {
        Self::with_budget(MemoryBudget::new(Some(max_bytes)))
    }

    /// Backend whose budget comes from `RUSTCV_TRAJECTORY_MAX_BYTES`, if set.
    pub fn from_env() -> Result<Self> {
        let max = crate::gpu_utils::read_max_bytes_from_env(BUDGET_ENV)?;
        Ok(Self::with_budget(MemoryBudget::new(max)))
    }

    fn with_budget(budget: MemoryBudget) -> Self {
        Self {
            budget: Arc::new(budget),
            num_threads: rayon::current_num_threads(),
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn allocated_bytes(&self) -> usize {
        self.budget.allocated()
    }

    pub fn budget(&self) -> &MemoryBudget {
        &self.budget
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HostBuffer {
    label: String,
    data: Vec<RigidTransform>,
    budget: Arc<MemoryBudget>,
}

impl HostBuffer {
    pub fn as_slice(&self) -> &[RigidTransform] {
        &self.data
    }
}

impl TransformBuffer for HostBuffer {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for HostBuffer {
    fn drop(&mut self) {
        self.budget.release(self.size_bytes());
        tracing::trace!(label = %self.label, bytes = self.size_bytes(), "released host buffer");
    }
}

impl TrajectoryBackend for CpuBackend {
    type Buffer = HostBuffer;

    fn backend_type(&self) -> BackendType {
        BackendType::Cpu
    }

    fn name(&self) -> &str {
        "CPU"
    }

    fn allocate(&self, label: &str, len: usize) -> Result<HostBuffer> {
        let bytes = len
            .checked_mul(std::mem::size_of::<RigidTransform>())
            .ok_or_else(|| crate::Error::MemoryError(format!("'{label}' size overflows")))?;
        self.budget.reserve(label, bytes)?;
        tracing::debug!(label, len, bytes, "allocated host buffer");
        Ok(HostBuffer {
            label: label.to_string(),
            data: vec![RigidTransform::zeroed(); len],
            budget: self.budget.clone(),
        })
    }

    fn write(&self, buffer: &mut HostBuffer, offset: usize, data: &[RigidTransform]) -> Result<()> {
        check_range(&*buffer, offset, data.len())?;
        buffer.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, buffer: &HostBuffer, offset: usize, len: usize) -> Result<Vec<RigidTransform>> {
        check_range(buffer, offset, len)?;
        Ok(buffer.data[offset..offset + len].to_vec())
    }

    fn copy_within(&self, buffer: &mut HostBuffer, src: usize, dst: usize) -> Result<()> {
        check_range(&*buffer, src, 1)?;
        check_range(&*buffer, dst, 1)?;
        buffer.data[dst] = buffer.data[src];
        Ok(())
    }

    fn update_trajectory(
        &self,
        global: &HostBuffer,
        num_global: usize,
        complete: &mut HostBuffer,
        num_complete: usize,
        local: &HostBuffer,
        local_block: usize,
        num_local: usize,
    ) -> Result<()> {
        let active = check_update_args(
            global,
            num_global,
            &*complete,
            num_complete,
            local,
            local_block,
            num_local,
        )?;
        let submap_size = local_block - 1;
        let global = &global.data;
        let local = &local.data;

        complete.data[..num_complete]
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, out)| {
                let g = i / submap_size;
                if g < active {
                    let l = i % submap_size;
                    *out = global[g].compose(&local[g * local_block + l]);
                }
            });
        Ok(())
    }

    fn init_next_global_transform(
        &self,
        global: &mut HostBuffer,
        num_global: usize,
        local: &HostBuffer,
        local_block: usize,
    ) -> Result<()> {
        check_init_next_args(&*global, num_global, local, local_block)?;
        let last_local = local.data[num_global * local_block - 1];
        global.data[num_global] = global.data[num_global - 1].compose(&last_local);
        Ok(())
    }
}
