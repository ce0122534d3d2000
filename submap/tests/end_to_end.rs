use cv_core::{CameraIntrinsics, RigidTransform};
use cv_submap::{
    CpuBackend, DefaultSubmapManager, FeatureManager, StaticFrameSource, SubmapConfig,
};
use nalgebra::Vector3;

const S: u32 = 5;
const TOTAL: u32 = 16;

fn relative_pose(submap: u32, slot: u32) -> RigidTransform {
    RigidTransform::from_yaw_translation(
        0.02 * slot as f32,
        Vector3::new(0.1 * slot as f32, 0.01 * (submap * slot) as f32, 0.0),
    )
}

fn manager() -> DefaultSubmapManager {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let config = SubmapConfig::new(S, 8).with_total_frames(Some(TOTAL));
    let source = StaticFrameSource::new(CameraIntrinsics::new_ideal(640, 480));
    DefaultSubmapManager::new(config, &source, CpuBackend::new()).unwrap()
}

/// What a registration/optimization loop does when a submap closes.
fn finalize(m: &mut DefaultSubmapManager, submap: u32, frame: u32) {
    let slice = m.local_trajectory_slice(submap as usize).unwrap();
    let poses: Vec<_> = (0..=S).map(|l| relative_pose(submap, l)).collect();
    m.write_local_trajectory(slice, &poses).unwrap();

    m.global_mut().features_mut().add_image(&[], &[]).unwrap();
    assert_eq!(m.num_global_transforms(), submap as usize + 1);

    m.initialize_next_global_transform(false).unwrap();
    m.update_trajectory(frame).unwrap();
    m.swap_local();
}

#[test]
fn frame_classification_matches_stream_layout() {
    let m = manager();
    let boundaries: Vec<u32> = (0..TOTAL).filter(|&f| m.is_last_submap_frame(f)).collect();
    assert_eq!(boundaries, [5, 10, 15]);

    assert!(!m.is_last_submap_frame(0));
    assert_eq!(m.current_submap_index(5), Some(0));
    assert_eq!(m.current_submap_index(10), Some(1));
    // Non-terminal frames report f / S - 1; only the terminal frame skips
    // the adjustment.
    assert_eq!(m.current_submap_index(14), Some(1));
    assert!(!m.is_last_frame(14));
    assert!(m.is_last_frame(15));
    assert_eq!(m.current_submap_index(15), Some(3));
}

#[test]
fn stream_of_sixteen_frames() {
    let mut m = manager();
    let mut finalized = Vec::new();

    for frame in 0..TOTAL {
        m.current_local_mut()
            .features_mut()
            .add_image(&[], &[])
            .unwrap();

        if m.is_last_frame(frame) {
            // The closing boundary of submap 2 coincides with the end of
            // the stream; the indexer already points at the open submap.
            assert_eq!(m.current_submap_index(frame), Some(3));
            finalize(&mut m, 2, frame);
            finalized.push((frame, 2));
        } else if m.is_last_submap_frame(frame) {
            let submap = m.current_submap_index(frame).unwrap();
            finalize(&mut m, submap, frame);
            finalized.push((frame, submap));
            assert_eq!(m.local().current().features().num_images(), 0);
        }
    }
    assert_eq!(finalized, [(5, 0), (10, 1), (15, 2)]);
    assert_eq!(m.num_global_transforms(), 3);

    // Anchors chain through the last relative pose of each submap.
    let global = m.store().read_global_trajectory(4).unwrap();
    assert!(global[0].is_identity(1e-6));
    for g in 1..4u32 {
        let expected = global[g as usize - 1].compose(&relative_pose(g - 1, S));
        assert!(global[g as usize].approx_eq(&expected, 1e-5), "anchor {g}");
    }

    let complete = m.store().read_complete_trajectory(15).unwrap();
    for (i, pose) in complete.iter().enumerate() {
        let (g, l) = (i as u32 / S, i as u32 % S);
        let expected = global[g as usize].compose(&relative_pose(g, l));
        assert!(pose.approx_eq(&expected, 1e-5), "frame {i}");
    }
}

#[test]
fn complete_trajectory_only_covers_anchored_submaps() {
    let mut m = manager();
    finalize(&mut m, 0, 5);

    // Frames beyond the first submap have no anchor yet and stay untouched.
    m.update_trajectory(8).unwrap();
    let complete = m.store().read_complete_trajectory(8).unwrap();
    assert!(complete[4].approx_eq(&relative_pose(0, 4), 1e-6));
    assert_eq!(complete[5], zero_transform());
}

fn zero_transform() -> RigidTransform {
    RigidTransform::from_rows([[0.0; 4]; 4])
}
