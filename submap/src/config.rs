//! Submap pipeline configuration.
//!
//! Passed explicitly into [`SubmapManager::new`](crate::SubmapManager::new);
//! there is no process-wide configuration state.

use crate::{Error, Result};
use std::env;

pub const SUBMAP_SIZE_ENV: &str = "RUSTCV_SUBMAP_SIZE";
pub const MAX_GLOBAL_SUBMAPS_ENV: &str = "RUSTCV_MAX_GLOBAL_SUBMAPS";
pub const DETAILED_TIMINGS_ENV: &str = "RUSTCV_DETAILED_TIMINGS";

#[derive(Debug, Clone, PartialEq)]
pub struct SubmapConfig {
    /// Capacity of the global trajectory (one transform per submap).
    pub max_global_submaps: usize,
    /// Frames a local working set can hold; at least `submap_size + 1`
    /// because consecutive submaps share an anchor frame.
    pub max_frames_per_submap: usize,
    pub max_features_per_frame: usize,
    pub submap_size: u32,
    /// Dense cache resolution.
    pub downsampled_width: u32,
    pub downsampled_height: u32,
    pub detailed_timings: bool,
    /// Total stream length, `None` when unknown.
    pub total_frames: Option<u32>,
}

impl Default for SubmapConfig {
    fn default() -> Self {
        Self {
            max_global_submaps: 1200,
            max_frames_per_submap: 11,
            max_features_per_frame: 1024,
            submap_size: 10,
            downsampled_width: 80,
            downsampled_height: 60,
            detailed_timings: false,
            total_frames: None,
        }
    }
}

impl SubmapConfig {
    pub fn new(submap_size: u32, max_global_submaps: usize) -> Self {
        Self {
            submap_size,
            max_global_submaps,
            max_frames_per_submap: submap_size as usize + 1,
            ..Self::default()
        }
    }

    pub fn with_max_frames_per_submap(mut self, frames: usize) -> Self {
        self.max_frames_per_submap = frames;
        self
    }

    pub fn with_max_features_per_frame(mut self, features: usize) -> Self {
        self.max_features_per_frame = features;
        self
    }

    pub fn with_downsampled_resolution(mut self, width: u32, height: u32) -> Self {
        self.downsampled_width = width;
        self.downsampled_height = height;
        self
    }

    pub fn with_detailed_timings(mut self, enabled: bool) -> Self {
        self.detailed_timings = enabled;
        self
    }

    pub fn with_total_frames(mut self, total: Option<u32>) -> Self {
        self.total_frames = total;
        self
    }

    /// Default configuration with overrides from `RUSTCV_SUBMAP_SIZE`,
    /// `RUSTCV_MAX_GLOBAL_SUBMAPS` and `RUSTCV_DETAILED_TIMINGS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(size) = read_env::<u32>(SUBMAP_SIZE_ENV)? {
            config.submap_size = size;
            config.max_frames_per_submap = config.max_frames_per_submap.max(size as usize + 1);
        }
        if let Some(max) = read_env::<usize>(MAX_GLOBAL_SUBMAPS_ENV)? {
            config.max_global_submaps = max;
        }
        if let Some(flag) = read_env_flag(DETAILED_TIMINGS_ENV)? {
            config.detailed_timings = flag;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.submap_size == 0 {
            return Err(Error::InvalidConfig("submap_size must be >= 1".into()));
        }
        if self.max_global_submaps == 0 {
            return Err(Error::InvalidConfig("max_global_submaps must be >= 1".into()));
        }
        if self.max_frames_per_submap < self.submap_size as usize + 1 {
            return Err(Error::InvalidConfig(format!(
                "max_frames_per_submap ({}) must be at least submap_size + 1 ({})",
                self.max_frames_per_submap,
                self.submap_size + 1
            )));
        }
        if self.downsampled_width == 0 || self.downsampled_height == 0 {
            return Err(Error::InvalidConfig("downsampled resolution must be non-zero".into()));
        }
        if self.total_frames == Some(0) {
            return Err(Error::InvalidConfig("total_frames must be >= 1 when set".into()));
        }
        Ok(())
    }

    /// Transforms per local-trajectory block (`submap_size + 1`).
    pub fn local_block_len(&self) -> usize {
        self.submap_size as usize + 1
    }

    pub fn complete_trajectory_len(&self) -> usize {
        self.max_global_submaps * self.submap_size as usize
    }

    pub fn local_trajectories_len(&self) -> usize {
        self.max_frames_per_submap * self.max_global_submaps
    }
}

fn read_env<T: std::str::FromStr>(var: &str) -> Result<Option<T>> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidConfig(format!("{var} must be a positive integer, got '{raw}'"))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::InvalidConfig(format!("failed to read {var}: {e}"))),
    }
}

fn read_env_flag(var: &str) -> Result<Option<bool>> {
    match env::var(var) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Ok(Some(true)),
            "0" | "false" | "off" | "no" => Ok(Some(false)),
            _ => Err(Error::InvalidConfig(format!("{var} must be a boolean, got '{raw}'"))),
        },
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::InvalidConfig(format!("failed to read {var}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = SubmapConfig::default();
        config.validate().unwrap();
        assert_eq!(config.local_block_len(), 11);
        assert_eq!(config.complete_trajectory_len(), 12000);
        assert_eq!(config.local_trajectories_len(), 13200);
    }

    #[test]
    fn local_capacity_must_cover_anchor_frame() {
        let config = SubmapConfig::new(10, 4).with_max_frames_per_submap(10);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn zero_submap_size_rejected() {
        let config = SubmapConfig::new(0, 4);
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_sets_fields() {
        let config = SubmapConfig::new(5, 8)
            .with_total_frames(Some(16))
            .with_detailed_timings(true)
            .with_downsampled_resolution(40, 30);
        assert_eq!(config.max_frames_per_submap, 6);
        assert_eq!(config.total_frames, Some(16));
        assert!(config.detailed_timings);
        assert_eq!((config.downsampled_width, config.downsampled_height), (40, 30));
        config.validate().unwrap();
    }

    #[test]
    fn unset_flag_reads_as_none() {
        assert_eq!(read_env_flag("RUSTCV_TEST_UNSET_FLAG").unwrap(), None);
    }
}
