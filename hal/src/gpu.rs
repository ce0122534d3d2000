//! wgpu backend.
//!
//! Trajectory arrays live in storage buffers on one device; all writes,
//! copies and kernel dispatches go through a single queue in issue order.

use crate::backend::{check_init_next_args, check_range, check_update_args};
use crate::gpu_kernels::trajectory::TrajectoryKernels;
use crate::memory::MemoryBudget;
use crate::{BackendType, Error, Result, TrajectoryBackend, TransformBuffer};
use cv_core::RigidTransform;
use futures::executor::block_on;
use std::sync::Arc;
use wgpu::{BufferUsages, Instance, PowerPreference, RequestAdapterOptions};

const TRANSFORM_BYTES: u64 = std::mem::size_of::<RigidTransform>() as u64;
const BUDGET_ENV: &str = "RUSTCV_GPU_MAX_BYTES";

/// Shared GPU context containing device and queue.
#[derive(Debug)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub backend: BackendType,
    pub adapter_name: String,
}

impl GpuContext {
    /// Select the best available adapter (high performance).
    pub fn new() -> Result<Self> {
        let instance = Instance::default();

        let adapter = block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| Error::backend_not_available(format!("no GPU adapter: {e}")))?;

        let info = adapter.get_info();
        let (device, queue) = block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Submap Trajectory Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::default(),
        }))
        .map_err(|e| Error::DeviceError(format!("failed to create GPU device: {e}")))?;

        let backend = match info.backend {
            wgpu::Backend::Vulkan => BackendType::Vulkan,
            wgpu::Backend::Metal => BackendType::Metal,
            wgpu::Backend::Dx12 => BackendType::DirectX,
            wgpu::Backend::Gl => BackendType::OpenGl,
            _ => BackendType::WebGpu,
        };

        Ok(Self {
            device,
            queue,
            backend,
            adapter_name: info.name,
        })
    }

    /// Block until all submitted work has finished.
    pub fn wait_idle(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map(|_| ())
            .map_err(|e| Error::DeviceError(format!("poll failed: {e}")))
    }
}

pub struct GpuBuffer {
    label: String,
    buffer: wgpu::Buffer,
    len: usize,
    budget: Arc<MemoryBudget>,
}

impl GpuBuffer {
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

impl TransformBuffer for GpuBuffer {
    fn len(&self) -> usize {
        self.len
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
        self.budget.release(self.size_bytes());
    }
}

pub struct GpuBackend {
    ctx: Arc<GpuContext>,
    kernels: TrajectoryKernels,
    budget: Arc<MemoryBudget>,
}

impl GpuBackend {
    pub fn new() -> Result<Self> {
        Self::with_context(Arc::new(GpuContext::new()?))
    }

    /// Budget is read from `RUSTCV_GPU_MAX_BYTES` when set.
    pub fn with_context(ctx: Arc<GpuContext>) -> Result<Self> {
        let max = crate::gpu_utils::read_max_bytes_from_env(BUDGET_ENV)?;
        let kernels = TrajectoryKernels::new(&ctx);
        tracing::info!(adapter = %ctx.adapter_name, backend = %ctx.backend, "GPU trajectory backend ready");
        Ok(Self {
            ctx,
            kernels,
            budget: Arc::new(MemoryBudget::new(max)),
        })
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    pub fn allocated_bytes(&self) -> usize {
        self.budget.allocated()
    }
}

impl TrajectoryBackend for GpuBackend {
    type Buffer = GpuBuffer;

    fn backend_type(&self) -> BackendType {
        self.ctx.backend
    }

    fn name(&self) -> &str {
        &self.ctx.adapter_name
    }

    fn allocate(&self, label: &str, len: usize) -> Result<GpuBuffer> {
        let size = (len.max(1) as u64)
            .checked_mul(TRANSFORM_BYTES)
            .ok_or_else(|| Error::MemoryError(format!("'{label}' size overflows")))?;
        let limit = self.ctx.device.limits().max_buffer_size;
        if size > limit {
            return Err(Error::MemoryError(format!(
                "'{label}' needs {size} bytes, device limit is {limit}"
            )));
        }
        self.budget.reserve(label, size as usize)?;

        let buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        tracing::debug!(label, len, bytes = size, "allocated device buffer");
        Ok(GpuBuffer {
            label: label.to_string(),
            buffer,
            len,
            budget: self.budget.clone(),
        })
    }

    fn write(&self, buffer: &mut GpuBuffer, offset: usize, data: &[RigidTransform]) -> Result<()> {
        check_range(&*buffer, offset, data.len())?;
        if !data.is_empty() {
            self.ctx.queue.write_buffer(
                &buffer.buffer,
                offset as u64 * TRANSFORM_BYTES,
                bytemuck::cast_slice(data),
            );
        }
        Ok(())
    }

    fn read(&self, buffer: &GpuBuffer, offset: usize, len: usize) -> Result<Vec<RigidTransform>> {
        check_range(buffer, offset, len)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let size = len as u64 * TRANSFORM_BYTES;
        let staging = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Trajectory Readback"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Trajectory Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(&buffer.buffer, offset as u64 * TRANSFORM_BYTES, &staging, 0, size);
        let index = self.ctx.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = std::sync::mpsc::channel();
        let slice = staging.slice(..);
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.ctx
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(index),
                timeout: None,
            })
            .map_err(|e| Error::DeviceError(format!("poll failed: {e}")))?;
        rx.recv()
            .map_err(|_| Error::DeviceError("readback callback dropped".into()))?
            .map_err(|e| Error::DeviceError(format!("buffer map failed: {e}")))?;

        let data = {
            let view = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, RigidTransform>(&view).to_vec()
        };
        staging.unmap();
        staging.destroy();
        Ok(data)
    }

    fn copy_within(&self, buffer: &mut GpuBuffer, src: usize, dst: usize) -> Result<()> {
        check_range(&*buffer, src, 1)?;
        check_range(&*buffer, dst, 1)?;
        // Source and destination of a buffer copy must differ, so bounce through a scratch slot.
        let scratch = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Trajectory Copy Scratch"),
            size: TRANSFORM_BYTES,
            usage: BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_buffer_to_buffer(&buffer.buffer, src as u64 * TRANSFORM_BYTES, &scratch, 0, TRANSFORM_BYTES);
        encoder.copy_buffer_to_buffer(&scratch, 0, &buffer.buffer, dst as u64 * TRANSFORM_BYTES, TRANSFORM_BYTES);
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn update_trajectory(
        &self,
        global: &GpuBuffer,
        num_global: usize,
        complete: &mut GpuBuffer,
        num_complete: usize,
        local: &GpuBuffer,
        local_block: usize,
        num_local: usize,
    ) -> Result<()> {
        check_update_args(global, num_global, &*complete, num_complete, local, local_block, num_local)?;
        self.kernels.update_trajectory(
            &self.ctx,
            &global.buffer,
            num_global,
            &complete.buffer,
            num_complete,
            &local.buffer,
            local_block,
            num_local,
        )
    }

    fn init_next_global_transform(
        &self,
        global: &mut GpuBuffer,
        num_global: usize,
        local: &GpuBuffer,
        local_block: usize,
    ) -> Result<()> {
        check_init_next_args(&*global, num_global, local, local_block)?;
        self.kernels
            .init_next_global_transform(&self.ctx, &global.buffer, num_global, &local.buffer, local_block)
    }
}
