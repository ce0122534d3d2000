//! GPU compute kernels
//!
//! WGSL shaders for trajectory composition, dispatched through wgpu.

pub mod trajectory;

pub const WORKGROUP_SIZE_1D: u32 = 256;

pub fn dispatch_size_1d(count: u32) -> u32 {
    count.div_ceil(WORKGROUP_SIZE_1D)
}
