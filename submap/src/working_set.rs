//! Per-submap working state and the current/next double buffer.

use crate::timing::TimerHandle;
use cv_core::CameraIntrinsics;

/// Feature extraction and registration state for a window of frames.
pub trait FeatureManager: Send {
    fn with_capacity(max_images: usize, max_features_per_image: usize) -> Self
    where
        Self: Sized;

    /// Drop all per-image content, keeping allocations.
    fn reset(&mut self);

    fn num_images(&self) -> usize;

    fn capacity(&self) -> usize;

    fn set_timer(&mut self, timer: Option<TimerHandle>);

    fn timer(&self) -> Option<&TimerHandle>;
}

/// Downsampled depth/color frames used for dense alignment.
pub trait DenseCache: Send {
    fn with_resolution(
        width: u32,
        height: u32,
        capacity: usize,
        intrinsics: CameraIntrinsics,
    ) -> Self
    where
        Self: Sized;

    /// Drop all cached frames, keeping allocations.
    fn reset(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;

    fn intrinsics(&self) -> &CameraIntrinsics;
}

/// One feature manager and one dense cache bound to the same window.
pub struct WorkingSet<F, C> {
    features: F,
    cache: C,
}

impl<F: FeatureManager, C: DenseCache> WorkingSet<F, C> {
    pub fn new(features: F, cache: C) -> Self {
        Self { features, cache }
    }

    pub fn reset(&mut self) {
        self.features.reset();
        self.cache.reset();
    }

    pub fn features(&self) -> &F {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut F {
        &mut self.features
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut C {
        &mut self.cache
    }
}

/// Two slots and a role index. Swapping flips the index; slot contents
/// never move.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    current: usize,
}

impl<T> DoubleBuffer<T> {
    pub fn new(current: T, next: T) -> Self {
        Self {
            slots: [current, next],
            current: 0,
        }
    }

    pub fn current(&self) -> &T {
        &self.slots[self.current]
    }

    pub fn current_mut(&mut self) -> &mut T {
        &mut self.slots[self.current]
    }

    pub fn next(&self) -> &T {
        &self.slots[self.current ^ 1]
    }

    pub fn next_mut(&mut self) -> &mut T {
        &mut self.slots[self.current ^ 1]
    }

    /// Physical slot currently bound to the "current" role.
    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn swap(&mut self) {
        self.current ^= 1;
    }

    /// Both roles at once, for callers that ingest into one while reading
    /// the other.
    pub fn split_mut(&mut self) -> (&mut T, &mut T) {
        let [a, b] = &mut self.slots;
        if self.current == 0 {
            (a, b)
        } else {
            (b, a)
        }
    }
}
