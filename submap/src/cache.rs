//! Default dense cache: preallocated depth and intensity planes at the
//! downsampled resolution.

use crate::working_set::DenseCache;
use crate::{Error, Result};
use cv_core::CameraIntrinsics;

pub struct FrameCache {
    width: u32,
    height: u32,
    capacity: usize,
    intrinsics: CameraIntrinsics,
    depth: Vec<f32>,
    intensity: Vec<f32>,
    len: usize,
}

impl FrameCache {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Store a frame already at cache resolution.
    pub fn insert(&mut self, depth: &[f32], intensity: &[f32]) -> Result<usize> {
        let n = self.pixels();
        if depth.len() != n || intensity.len() != n {
            return Err(Error::InvalidInput(format!(
                "frame of {}/{} pixels, cache expects {}x{}",
                depth.len(),
                intensity.len(),
                self.width,
                self.height
            )));
        }
        let slot = self.next_slot()?;
        self.depth[slot * n..(slot + 1) * n].copy_from_slice(depth);
        self.intensity[slot * n..(slot + 1) * n].copy_from_slice(intensity);
        self.len += 1;
        Ok(slot)
    }

    /// Nearest-neighbour resample a `src_width` x `src_height` frame into
    /// the next slot.
    pub fn insert_resampled(
        &mut self,
        depth: &[f32],
        intensity: &[f32],
        src_width: u32,
        src_height: u32,
    ) -> Result<usize> {
        let src_n = src_width as usize * src_height as usize;
        if src_n == 0 || depth.len() != src_n || intensity.len() != src_n {
            return Err(Error::InvalidInput(format!(
                "source frame does not match {src_width}x{src_height}"
            )));
        }
        let n = self.pixels();
        let slot = self.next_slot()?;
        let (w, h) = (self.width as usize, self.height as usize);
        let (sw, sh) = (src_width as usize, src_height as usize);
        for y in 0..h {
            let sy = (y * sh / h).min(sh - 1);
            for x in 0..w {
                let sx = (x * sw / w).min(sw - 1);
                let dst = slot * n + y * w + x;
                self.depth[dst] = depth[sy * sw + sx];
                self.intensity[dst] = intensity[sy * sw + sx];
            }
        }
        self.len += 1;
        Ok(slot)
    }

    fn next_slot(&self) -> Result<usize> {
        if self.len >= self.capacity {
            return Err(Error::CapacityExceeded(format!(
                "dense cache holds at most {} frames",
                self.capacity
            )));
        }
        Ok(self.len)
    }

    pub fn depth(&self, index: usize) -> Option<&[f32]> {
        let n = self.pixels();
        (index < self.len).then(|| &self.depth[index * n..(index + 1) * n])
    }

    pub fn intensity(&self, index: usize) -> Option<&[f32]> {
        let n = self.pixels();
        (index < self.len).then(|| &self.intensity[index * n..(index + 1) * n])
    }
}

impl DenseCache for FrameCache {
    fn with_resolution(
        width: u32,
        height: u32,
        capacity: usize,
        intrinsics: CameraIntrinsics,
    ) -> Self {
        let n = width as usize * height as usize * capacity;
        Self {
            width,
            height,
            capacity,
            intrinsics,
            depth: vec![0.0; n],
            intensity: vec![0.0; n],
            len: 0,
        }
    }

    fn reset(&mut self) {
        self.len = 0;
    }

    fn len(&self) -> usize {
        self.len
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }
}
