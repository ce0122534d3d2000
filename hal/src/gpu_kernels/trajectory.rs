use super::dispatch_size_1d;
use crate::gpu::GpuContext;
use crate::{Error, Result};
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct TrajectoryParams {
    num_global: u32,
    num_complete: u32,
    local_block: u32,
    num_local: u32,
}

impl TrajectoryParams {
    fn new(num_global: usize, num_complete: usize, local_block: usize, num_local: usize) -> Result<Self> {
        let narrow = |v: usize, what: &str| {
            u32::try_from(v).map_err(|_| Error::KernelError(format!("{what} {v} exceeds u32")))
        };
        Ok(Self {
            num_global: narrow(num_global, "global count")?,
            num_complete: narrow(num_complete, "frame count")?,
            local_block: narrow(local_block, "local block")?,
            num_local: narrow(num_local, "local count")?,
        })
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

struct Kernel {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl Kernel {
    fn new(
        device: &wgpu::Device,
        label: &str,
        source: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });
        Self { layout, pipeline }
    }
}

/// Compiled trajectory pipelines, built once per context.
pub struct TrajectoryKernels {
    update: Kernel,
    init_next: Kernel,
}

impl TrajectoryKernels {
    pub fn new(ctx: &GpuContext) -> Self {
        let update = Kernel::new(
            &ctx.device,
            "Trajectory Update",
            include_str!("trajectory_update.wgsl"),
            &[
                storage_entry(0, true),
                storage_entry(1, false),
                storage_entry(2, true),
                uniform_entry(3),
            ],
        );
        let init_next = Kernel::new(
            &ctx.device,
            "Trajectory Init Next",
            include_str!("trajectory_init_next.wgsl"),
            &[storage_entry(0, false), storage_entry(1, true), uniform_entry(2)],
        );
        Self { update, init_next }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_trajectory(
        &self,
        ctx: &GpuContext,
        global: &wgpu::Buffer,
        num_global: usize,
        complete: &wgpu::Buffer,
        num_complete: usize,
        local: &wgpu::Buffer,
        local_block: usize,
        num_local: usize,
    ) -> Result<()> {
        if num_complete == 0 {
            return Ok(());
        }
        let params = TrajectoryParams::new(num_global, num_complete, local_block, num_local)?;
        let params_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Trajectory Update Params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Trajectory Update Bind Group"),
            layout: &self.update.layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: global.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: complete.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: local.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: params_buffer.as_entire_binding() },
            ],
        });

        self.submit(ctx, &self.update, &bind_group, dispatch_size_1d(params.num_complete));
        Ok(())
    }

    pub fn init_next_global_transform(
        &self,
        ctx: &GpuContext,
        global: &wgpu::Buffer,
        num_global: usize,
        local: &wgpu::Buffer,
        local_block: usize,
    ) -> Result<()> {
        let params = TrajectoryParams::new(num_global, 0, local_block, 0)?;
        let params_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Trajectory Init Next Params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Trajectory Init Next Bind Group"),
            layout: &self.init_next.layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: global.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: local.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: params_buffer.as_entire_binding() },
            ],
        });

        self.submit(ctx, &self.init_next, &bind_group, 1);
        Ok(())
    }

    fn submit(&self, ctx: &GpuContext, kernel: &Kernel, bind_group: &wgpu::BindGroup, workgroups: u32) {
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }
        ctx.queue.submit(std::iter::once(encoder.finish()));
    }
}
