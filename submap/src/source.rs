//! Frame source interface and intrinsics downsampling.

use cv_core::CameraIntrinsics;

/// The camera stream as seen by the submap manager: integration resolution
/// and the intrinsics valid at that resolution.
pub trait FrameSource {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn intrinsics(&self) -> CameraIntrinsics;
}

/// Scale the source intrinsics to `width` x `height`; horizontal and vertical
/// terms scale independently.
pub fn downsampled_intrinsics<S: FrameSource + ?Sized>(
    source: &S,
    width: u32,
    height: u32,
) -> CameraIntrinsics {
    let mut k = source.intrinsics();
    k.width = source.width();
    k.height = source.height();
    k.scaled_to(width, height)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticFrameSource {
    intrinsics: CameraIntrinsics,
}

impl StaticFrameSource {
    pub fn new(intrinsics: CameraIntrinsics) -> Self {
        Self { intrinsics }
    }
}

impl FrameSource for StaticFrameSource {
    fn width(&self) -> u32 {
        self.intrinsics.width
    }

    fn height(&self) -> u32 {
        self.intrinsics.height
    }

    fn intrinsics(&self) -> CameraIntrinsics {
        self.intrinsics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsampling_scales_axes_independently() {
        let source = StaticFrameSource::new(CameraIntrinsics::new(
            525.0, 500.0, 319.5, 239.5, 640, 480,
        ));
        let k = downsampled_intrinsics(&source, 80, 40);
        assert!((k.fx - 525.0 / 8.0).abs() < 1e-9);
        assert!((k.cx - 319.5 / 8.0).abs() < 1e-9);
        assert!((k.fy - 500.0 / 12.0).abs() < 1e-9);
        assert!((k.cy - 239.5 / 12.0).abs() < 1e-9);
        assert_eq!((k.width, k.height), (80, 40));
    }
}
