//! Mapping absolute frame numbers onto submap boundaries.

/// Stateless frame classification for a fixed submap size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameIndexer {
    submap_size: u32,
    total_frames: Option<u32>,
}

impl FrameIndexer {
    /// `submap_size` must be non-zero; [`SubmapConfig::validate`](crate::SubmapConfig::validate)
    /// guarantees this for indexers built by the manager.
    pub fn new(submap_size: u32, total_frames: Option<u32>) -> Self {
        assert!(submap_size > 0, "submap size must be non-zero");
        Self {
            submap_size,
            total_frames,
        }
    }

    pub fn submap_size(&self) -> u32 {
        self.submap_size
    }

    pub fn total_frames(&self) -> Option<u32> {
        self.total_frames
    }

    pub fn set_total_frames(&mut self, total: Option<u32>) {
        self.total_frames = total;
    }

    /// True for the final frame of the stream; always false while the
    /// stream length is unknown.
    pub fn is_last_frame(&self, frame: u32) -> bool {
        match self.total_frames {
            Some(total) => frame.checked_add(1) == Some(total),
            None => false,
        }
    }

    /// True when `frame` closes a submap. Frame 0 never does.
    pub fn is_last_submap_frame(&self, frame: u32) -> bool {
        frame >= self.submap_size && frame % self.submap_size == 0
    }

    /// Index of the submap being finalized at `frame`.
    ///
    /// Intermediate boundaries have already advanced past the submap that
    /// closes, so they report `frame / S - 1`; the terminal frame has not
    /// swapped and reports `frame / S`. Returns `None` for non-terminal
    /// frames inside the first submap, where no submap has closed yet.
    pub fn current_submap_index(&self, frame: u32) -> Option<u32> {
        let index = frame / self.submap_size;
        if self.is_last_frame(frame) {
            Some(index)
        } else {
            index.checked_sub(1)
        }
    }

    /// Slot of `frame` inside its submap's local trajectory block.
    pub fn local_frame_index(&self, frame: u32) -> u32 {
        frame % self.submap_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submap_boundaries() {
        let indexer = FrameIndexer::new(10, None);
        for frame in [0, 5, 9, 11, 19] {
            assert!(!indexer.is_last_submap_frame(frame), "frame {frame}");
        }
        for frame in [10, 20, 1000] {
            assert!(indexer.is_last_submap_frame(frame), "frame {frame}");
        }
    }

    #[test]
    fn unknown_length_never_ends() {
        let indexer = FrameIndexer::new(10, None);
        assert!(!indexer.is_last_frame(0));
        assert!(!indexer.is_last_frame(u32::MAX));
    }

    #[test]
    fn last_frame_with_known_length() {
        let indexer = FrameIndexer::new(10, Some(31));
        assert!(indexer.is_last_frame(30));
        assert!(!indexer.is_last_frame(29));
        assert!(!indexer.is_last_frame(31));
    }

    #[test]
    fn terminal_frame_reports_open_submap() {
        let indexer = FrameIndexer::new(10, Some(31));
        assert_eq!(indexer.current_submap_index(30), Some(3));
        assert_eq!(indexer.current_submap_index(20), Some(1));
        assert_eq!(indexer.current_submap_index(10), Some(0));
    }

    #[test]
    fn first_submap_has_no_closed_index() {
        let indexer = FrameIndexer::new(10, None);
        assert_eq!(indexer.current_submap_index(0), None);
        assert_eq!(indexer.current_submap_index(9), None);
    }

    #[test]
    fn single_frame_stream() {
        let indexer = FrameIndexer::new(4, Some(1));
        assert!(indexer.is_last_frame(0));
        assert!(!indexer.is_last_submap_frame(0));
        assert_eq!(indexer.current_submap_index(0), Some(0));
    }

    #[test]
    fn submap_size_one_closes_every_frame() {
        let indexer = FrameIndexer::new(1, None);
        assert!(!indexer.is_last_submap_frame(0));
        assert!(indexer.is_last_submap_frame(1));
        assert!(indexer.is_last_submap_frame(2));
        assert_eq!(indexer.current_submap_index(3), Some(2));
    }
}
