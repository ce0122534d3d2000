//! Backend-resident trajectory arrays.
//!
//! Three buffers are owned here:
//! - global: one anchor transform per submap, slot 0 seeded to identity;
//! - local: per-submap blocks of `submap_size + 1` relative transforms, the
//!   extra slot holding the anchor frame shared with the following submap;
//! - complete: one absolute transform per frame, derived from the other two.
//!
//! Only the registration engine writes into the local buffer, and only
//! through a [`LocalSlice`] obtained from [`TrajectoryStore::local_trajectory_slice`].

use crate::{Error, Result};
use cv_core::RigidTransform;
use cv_hal::{TrajectoryBackend, TransformBuffer};
use tracing::{debug, info};

/// Handle to one submap's block in the local trajectory buffer.
///
/// Only [`TrajectoryStore::local_trajectory_slice`] creates these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSlice {
    index: usize,
    offset: usize,
    len: usize,
}

impl LocalSlice {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

pub struct TrajectoryStore<B: TrajectoryBackend> {
    backend: B,
    global: B::Buffer,
    complete: B::Buffer,
    local: B::Buffer,
    submap_size: u32,
    max_global_submaps: usize,
}

impl<B: TrajectoryBackend> TrajectoryStore<B> {
    /// Allocate all three arrays. Buffers already allocated are released if
    /// a later allocation or upload fails.
    pub fn new(
        backend: B,
        max_global_submaps: usize,
        max_local_frames_per_submap: usize,
        submap_size: u32,
    ) -> Result<Self> {
        let block = submap_size as usize + 1;
        if submap_size == 0 || max_global_submaps == 0 {
            return Err(Error::InvalidConfig(
                "trajectory store needs a non-zero submap size and global capacity".into(),
            ));
        }
        if max_local_frames_per_submap < block {
            return Err(Error::InvalidConfig(format!(
                "local capacity {max_local_frames_per_submap} cannot hold a block of {block}"
            )));
        }

        let mut global = backend.allocate("global_trajectory", max_global_submaps)?;
        let complete = backend.allocate(
            "complete_trajectory",
            max_global_submaps * submap_size as usize,
        )?;
        let mut local = backend.allocate(
            "local_trajectories",
            max_local_frames_per_submap * max_global_submaps,
        )?;

        backend.write(&mut global, 0, &[RigidTransform::identity()])?;
        backend.fill(&mut local, RigidTransform::identity())?;

        info!(
            backend = backend.name(),
            max_global_submaps,
            submap_size,
            bytes = global.size_bytes() + complete.size_bytes() + local.size_bytes(),
            "Trajectory store initialized"
        );

        Ok(Self {
            backend,
            global,
            complete,
            local,
            submap_size,
            max_global_submaps,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn submap_size(&self) -> u32 {
        self.submap_size
    }

    pub fn local_block_len(&self) -> usize {
        self.submap_size as usize + 1
    }

    pub fn max_global_submaps(&self) -> usize {
        self.max_global_submaps
    }

    pub fn global_capacity(&self) -> usize {
        self.global.len()
    }

    pub fn complete_capacity(&self) -> usize {
        self.complete.len()
    }

    pub fn local_capacity(&self) -> usize {
        self.local.len()
    }

    /// Recompute the complete trajectory for frames `[0, cur_frame)` from the
    /// first `num_global` submaps.
    pub fn update_trajectory(&mut self, num_global: usize, cur_frame: u32) -> Result<()> {
        debug!(num_global, cur_frame, "Updating complete trajectory");
        self.backend.update_trajectory(
            &self.global,
            num_global,
            &mut self.complete,
            cur_frame as usize,
            &self.local,
            self.submap_size as usize + 1,
            num_global,
        )?;
        Ok(())
    }

    /// Seed `global[num_global]` either as a copy of the previous anchor or
    /// extrapolated through the last relative pose of the finished submap.
    ///
    /// # Panics
    ///
    /// Panics if `num_global` is zero.
    pub fn initialize_next_global_transform(
        &mut self,
        num_global: usize,
        use_identity: bool,
    ) -> Result<()> {
        assert!(
            num_global >= 1,
            "cannot seed a global transform before the first one exists"
        );
        if num_global >= self.global.len() {
            return Err(Error::CapacityExceeded(format!(
                "global trajectory holds at most {} submaps",
                self.global.len()
            )));
        }

        debug!(slot = num_global, use_identity, "Seeding next global transform");
        if use_identity {
            self.backend
                .copy_within(&mut self.global, num_global - 1, num_global)?;
        } else {
            self.backend.init_next_global_transform(
                &mut self.global,
                num_global,
                &self.local,
                self.submap_size as usize + 1,
            )?;
        }
        Ok(())
    }

    pub fn local_trajectory_slice(&self, index: usize) -> Result<LocalSlice> {
        if index >= self.max_global_submaps {
            return Err(Error::InvalidInput(format!(
                "local trajectory {index} out of range (max {})",
                self.max_global_submaps
            )));
        }
        let len = self.local_block_len();
        Ok(LocalSlice {
            index,
            offset: index * len,
            len,
        })
    }

    /// A slice handed out by a store with a different layout does not
    /// address a block of this one.
    fn check_slice(&self, slice: LocalSlice) -> Result<()> {
        if self.local_trajectory_slice(slice.index)? != slice {
            return Err(Error::InvalidInput(format!(
                "local slice {slice:?} does not belong to this trajectory store"
            )));
        }
        Ok(())
    }

    /// Write relative poses into the start of a local block.
    pub fn write_local_trajectory(
        &mut self,
        slice: LocalSlice,
        poses: &[RigidTransform],
    ) -> Result<()> {
        self.check_slice(slice)?;
        if poses.len() > slice.len {
            return Err(Error::InvalidInput(format!(
                "{} poses do not fit in local block {} of {}",
                poses.len(),
                slice.index,
                slice.len
            )));
        }
        self.backend.write(&mut self.local, slice.offset, poses)?;
        Ok(())
    }

    pub fn read_local_trajectory(&self, slice: LocalSlice) -> Result<Vec<RigidTransform>> {
        self.check_slice(slice)?;
        Ok(self.backend.read(&self.local, slice.offset, slice.len)?)
    }

    pub fn read_global_trajectory(&self, count: usize) -> Result<Vec<RigidTransform>> {
        Ok(self.backend.read(&self.global, 0, count)?)
    }

    pub fn read_complete_trajectory(&self, count: usize) -> Result<Vec<RigidTransform>> {
        Ok(self.backend.read(&self.complete, 0, count)?)
    }

    /// Overwrite one global anchor, e.g. after the global optimizer moved it.
    pub fn write_global_transform(&mut self, index: usize, transform: RigidTransform) -> Result<()> {
        self.backend.write(&mut self.global, index, &[transform])?;
        Ok(())
    }
}
