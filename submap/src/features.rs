//! Default feature manager: keypoints, descriptors and pairwise matches for
//! a bounded number of images.

use crate::timing::{timed, TimerHandle};
use crate::working_set::FeatureManager;
use crate::{Error, Result};
use std::ops::Range;
use tracing::trace;

/// Binary descriptor length (ORB/BRIEF sized).
pub const DESCRIPTOR_BYTES: usize = 32;

/// A feature match between two registered images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Correspondence {
    pub image_a: u32,
    pub feature_a: u32,
    pub image_b: u32,
    pub feature_b: u32,
}

pub struct KeypointStore {
    max_images: usize,
    max_features: usize,
    keypoints: Vec<[f32; 2]>,
    descriptors: Vec<u8>,
    images: Vec<Range<usize>>,
    correspondences: Vec<Correspondence>,
    timer: Option<TimerHandle>,
}

impl KeypointStore {
    /// Register one image. Keypoints beyond the per-image limit are dropped;
    /// `descriptors` holds `DESCRIPTOR_BYTES` per keypoint.
    pub fn add_image(&mut self, keypoints: &[[f32; 2]], descriptors: &[u8]) -> Result<usize> {
        if self.images.len() >= self.max_images {
            return Err(Error::CapacityExceeded(format!(
                "feature manager holds at most {} images",
                self.max_images
            )));
        }
        if descriptors.len() != keypoints.len() * DESCRIPTOR_BYTES {
            return Err(Error::InvalidInput(format!(
                "{} descriptor bytes for {} keypoints",
                descriptors.len(),
                keypoints.len()
            )));
        }

        let timer = self.timer.clone();
        let index = timed(timer.as_ref(), "add_image", || {
            let n = keypoints.len().min(self.max_features);
            let start = self.keypoints.len();
            self.keypoints.extend_from_slice(&keypoints[..n]);
            self.descriptors
                .extend_from_slice(&descriptors[..n * DESCRIPTOR_BYTES]);
            self.images.push(start..start + n);
            self.images.len() - 1
        });
        trace!(image = index, "Registered image");
        Ok(index)
    }

    pub fn keypoints(&self, image: usize) -> Option<&[[f32; 2]]> {
        self.images.get(image).map(|r| &self.keypoints[r.clone()])
    }

    pub fn descriptors(&self, image: usize) -> Option<&[u8]> {
        self.images
            .get(image)
            .map(|r| &self.descriptors[r.start * DESCRIPTOR_BYTES..r.end * DESCRIPTOR_BYTES])
    }

    pub fn num_features(&self, image: usize) -> usize {
        self.images.get(image).map_or(0, |r| r.len())
    }

    pub fn max_features_per_image(&self) -> usize {
        self.max_features
    }

    pub fn add_correspondences(&mut self, matches: &[Correspondence]) -> Result<()> {
        for m in matches {
            let valid = (m.feature_a as usize) < self.num_features(m.image_a as usize)
                && (m.feature_b as usize) < self.num_features(m.image_b as usize);
            if !valid || m.image_a == m.image_b {
                return Err(Error::InvalidInput(format!("invalid correspondence {m:?}")));
            }
        }
        self.correspondences.extend_from_slice(matches);
        Ok(())
    }

    pub fn correspondences(&self) -> &[Correspondence] {
        &self.correspondences
    }

    /// Matches between two images in either order.
    pub fn correspondences_between(
        &self,
        a: u32,
        b: u32,
    ) -> impl Iterator<Item = &Correspondence> + '_ {
        self.correspondences.iter().filter(move |m| {
            (m.image_a == a && m.image_b == b) || (m.image_a == b && m.image_b == a)
        })
    }
}

impl FeatureManager for KeypointStore {
    fn with_capacity(max_images: usize, max_features_per_image: usize) -> Self {
        Self {
            max_images,
            max_features: max_features_per_image,
            keypoints: Vec::new(),
            descriptors: Vec::new(),
            images: Vec::with_capacity(max_images),
            correspondences: Vec::new(),
            timer: None,
        }
    }

    fn reset(&mut self) {
        self.keypoints.clear();
        self.descriptors.clear();
        self.images.clear();
        self.correspondences.clear();
    }

    fn num_images(&self) -> usize {
        self.images.len()
    }

    fn capacity(&self) -> usize {
        self.max_images
    }

    fn set_timer(&mut self, timer: Option<TimerHandle>) {
        self.timer = timer;
    }

    fn timer(&self) -> Option<&TimerHandle> {
        self.timer.as_ref()
    }
}
