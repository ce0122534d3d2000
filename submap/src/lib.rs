//! Submap-based trajectory management for visual odometry.
//!
//! Frames are grouped into submaps of `submap_size` frames. Each submap
//! owns a local trajectory (frame poses relative to the submap anchor) and
//! the global trajectory chains submap anchors. The complete trajectory is
//! the composition of both, computed on a [`TrajectoryBackend`].
//!
//! Two local working sets are double-buffered so the next submap can be
//! populated while the current one is processed.

pub mod cache;
pub mod config;
pub mod features;
pub mod indexer;
pub mod manager;
pub mod source;
pub mod timing;
pub mod trajectory;
pub mod working_set;

pub use cache::FrameCache;
pub use config::SubmapConfig;
pub use features::KeypointStore;
pub use indexer::FrameIndexer;
pub use manager::{DefaultSubmapManager, SubmapManager};
#[cfg(feature = "gpu")]
pub use manager::GpuSubmapManager;
pub use source::{downsampled_intrinsics, FrameSource, StaticFrameSource};
pub use timing::{StageTimer, TimerHandle, TimingReport};
pub use trajectory::{LocalSlice, TrajectoryStore};
pub use working_set::{DenseCache, DoubleBuffer, FeatureManager, WorkingSet};

pub use cv_hal::{CpuBackend, TrajectoryBackend};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Hal(#[from] cv_hal::Error),
}
