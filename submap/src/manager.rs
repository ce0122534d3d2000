//! Submap lifecycle: trajectory bookkeeping plus the current/next local
//! working sets and the global working set.

use crate::cache::FrameCache;
use crate::config::SubmapConfig;
use crate::features::KeypointStore;
use crate::indexer::FrameIndexer;
use crate::source::{downsampled_intrinsics, FrameSource};
use crate::timing::{timed, StageTimer, TimerHandle, TimingReport};
use crate::trajectory::{LocalSlice, TrajectoryStore};
use crate::working_set::{DenseCache, DoubleBuffer, FeatureManager, WorkingSet};
use crate::Result;
use cv_core::{CameraIntrinsics, RigidTransform};
use cv_hal::{CpuBackend, TrajectoryBackend};
use tracing::{debug, info};

pub type DefaultSubmapManager = SubmapManager<CpuBackend, KeypointStore, FrameCache>;

#[cfg(feature = "gpu")]
pub type GpuSubmapManager = SubmapManager<cv_hal::GpuBackend, KeypointStore, FrameCache>;

pub struct SubmapManager<B: TrajectoryBackend, F = KeypointStore, C = FrameCache> {
    config: SubmapConfig,
    indexer: FrameIndexer,
    intrinsics: CameraIntrinsics,
    store: TrajectoryStore<B>,
    local: DoubleBuffer<WorkingSet<F, C>>,
    global: WorkingSet<F, C>,
    local_timer: Option<TimerHandle>,
    global_timer: Option<TimerHandle>,
}

impl<B, F, C> SubmapManager<B, F, C>
where
    B: TrajectoryBackend,
    F: FeatureManager,
    C: DenseCache,
{
    /// Allocate the trajectory store and all three working sets.
    ///
    /// Fails if the configuration is invalid or the backend cannot allocate
    /// the trajectory buffers; nothing stays allocated in that case.
    pub fn new<S: FrameSource + ?Sized>(
        config: SubmapConfig,
        source: &S,
        backend: B,
    ) -> Result<Self> {
        config.validate()?;

        let store = TrajectoryStore::new(
            backend,
            config.max_global_submaps,
            config.max_frames_per_submap,
            config.submap_size,
        )?;

        let (width, height) = (config.downsampled_width, config.downsampled_height);
        let intrinsics = downsampled_intrinsics(source, width, height);
        let local_set = || {
            WorkingSet::new(
                F::with_capacity(config.max_frames_per_submap, config.max_features_per_frame),
                C::with_resolution(width, height, config.max_frames_per_submap, intrinsics),
            )
        };
        let mut local = DoubleBuffer::new(local_set(), local_set());
        let mut global = WorkingSet::new(
            F::with_capacity(config.max_global_submaps, config.max_features_per_frame),
            C::with_resolution(width, height, config.max_global_submaps, intrinsics),
        );

        let (local_timer, global_timer) = if config.detailed_timings {
            (
                Some(StageTimer::handle("LOCAL")),
                Some(StageTimer::handle("GLOBAL")),
            )
        } else {
            (None, None)
        };
        local.current_mut().features_mut().set_timer(local_timer.clone());
        global.features_mut().set_timer(global_timer.clone());

        info!(
            submap_size = config.submap_size,
            max_global_submaps = config.max_global_submaps,
            max_frames_per_submap = config.max_frames_per_submap,
            cache = %format!("{width}x{height}"),
            backend = %store.backend().backend_type(),
            timings = config.detailed_timings,
            "Submap manager initialized"
        );

        Ok(Self {
            indexer: FrameIndexer::new(config.submap_size, config.total_frames),
            config,
            intrinsics,
            store,
            local,
            global,
            local_timer,
            global_timer,
        })
    }

    pub fn config(&self) -> &SubmapConfig {
        &self.config
    }

    pub fn indexer(&self) -> &FrameIndexer {
        &self.indexer
    }

    /// Intrinsics at dense-cache resolution.
    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    pub fn store(&self) -> &TrajectoryStore<B> {
        &self.store
    }

    pub fn set_total_frames(&mut self, total: Option<u32>) {
        self.config.total_frames = total;
        self.indexer.set_total_frames(total);
    }

    /// Global transforms that exist, one per image in the global feature
    /// manager.
    pub fn num_global_transforms(&self) -> usize {
        self.global.features().num_images()
    }

    /// Recompute absolute poses for frames `[0, cur_frame)`.
    pub fn update_trajectory(&mut self, cur_frame: u32) -> Result<()> {
        let num_global = self.num_global_transforms();
        let store = &mut self.store;
        timed(self.global_timer.as_ref(), "update_trajectory", || {
            store.update_trajectory(num_global, cur_frame)
        })
    }

    /// Seed the global transform of the next submap.
    ///
    /// # Panics
    ///
    /// Panics if no global transform exists yet.
    pub fn initialize_next_global_transform(&mut self, use_identity: bool) -> Result<()> {
        let num_global = self.num_global_transforms();
        let store = &mut self.store;
        timed(self.global_timer.as_ref(), "init_next_global", || {
            store.initialize_next_global_transform(num_global, use_identity)
        })
    }

    /// Retire the current local working set and promote the next one.
    ///
    /// The retiring set is reset in place and becomes "next"; only the role
    /// index moves.
    pub fn swap_local(&mut self) {
        self.local.current_mut().reset();
        self.local.swap();
        self.local
            .current_mut()
            .features_mut()
            .set_timer(self.local_timer.clone());
        debug!(current_slot = self.local.current_slot(), "Swapped local working sets");
    }

    pub fn is_last_frame(&self, frame: u32) -> bool {
        self.indexer.is_last_frame(frame)
    }

    pub fn is_last_submap_frame(&self, frame: u32) -> bool {
        self.indexer.is_last_submap_frame(frame)
    }

    pub fn current_submap_index(&self, frame: u32) -> Option<u32> {
        self.indexer.current_submap_index(frame)
    }

    pub fn local_trajectory_slice(&self, index: usize) -> Result<LocalSlice> {
        self.store.local_trajectory_slice(index)
    }

    /// Registration-engine entry point for relative poses of one submap.
    pub fn write_local_trajectory(
        &mut self,
        slice: LocalSlice,
        poses: &[RigidTransform],
    ) -> Result<()> {
        self.store.write_local_trajectory(slice, poses)
    }

    pub fn local(&self) -> &DoubleBuffer<WorkingSet<F, C>> {
        &self.local
    }

    pub fn current_local_mut(&mut self) -> &mut WorkingSet<F, C> {
        self.local.current_mut()
    }

    pub fn next_local_mut(&mut self) -> &mut WorkingSet<F, C> {
        self.local.next_mut()
    }

    pub fn global(&self) -> &WorkingSet<F, C> {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut WorkingSet<F, C> {
        &mut self.global
    }

    pub fn local_timer(&self) -> Option<&TimerHandle> {
        self.local_timer.as_ref()
    }

    pub fn global_timer(&self) -> Option<&TimerHandle> {
        self.global_timer.as_ref()
    }

    /// Log and return the LOCAL then GLOBAL reports. Empty when detailed
    /// timings are disabled.
    pub fn evaluate_timings(&self) -> Vec<TimingReport> {
        let reports: Vec<TimingReport> = [&self.local_timer, &self.global_timer]
            .into_iter()
            .flatten()
            .map(|timer| timer.lock().report())
            .collect();
        for report in &reports {
            info!("{} TIMINGS\n{}", report.label, report);
        }
        reports
    }
}
