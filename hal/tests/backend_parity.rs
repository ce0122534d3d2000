use cv_core::RigidTransform;
use cv_hal::{CpuBackend, TrajectoryBackend, TransformBuffer};
use nalgebra::Vector3;

const SUBMAP: usize = 4;
const BLOCK: usize = SUBMAP + 1;

fn motion(i: usize) -> RigidTransform {
    RigidTransform::from_yaw_translation(0.05 * i as f32, Vector3::new(0.1 * i as f32, 0.02, 0.0))
}

/// Fill three submaps worth of local poses and chain their anchors.
fn run_pipeline<B: TrajectoryBackend>(backend: &B) -> (Vec<RigidTransform>, Vec<RigidTransform>) {
    let num_submaps = 3;
    let mut global = backend.allocate("global", 8).unwrap();
    let mut local = backend.allocate("local", 8 * BLOCK).unwrap();
    let mut complete = backend.allocate("complete", 8 * SUBMAP).unwrap();
    backend.fill(&mut local, RigidTransform::IDENTITY).unwrap();
    backend.write(&mut global, 0, &[RigidTransform::IDENTITY]).unwrap();

    for s in 0..num_submaps {
        let poses: Vec<_> = (0..BLOCK).map(|i| motion(s * BLOCK + i)).collect();
        backend.write(&mut local, s * BLOCK, &poses).unwrap();
        backend
            .init_next_global_transform(&mut global, s + 1, &local, BLOCK)
            .unwrap();
    }
    backend
        .update_trajectory(&global, num_submaps, &mut complete, num_submaps * SUBMAP, &local, BLOCK, num_submaps)
        .unwrap();

    (
        backend.read(&global, 0, num_submaps + 1).unwrap(),
        backend.read(&complete, 0, num_submaps * SUBMAP).unwrap(),
    )
}

#[test]
fn cpu_pipeline_matches_hand_composition() {
    let backend = CpuBackend::new();
    let (global, complete) = run_pipeline(&backend);

    let mut expected_global = vec![RigidTransform::IDENTITY];
    for s in 0..3 {
        let last = motion(s * BLOCK + SUBMAP);
        let next = expected_global[s] * last;
        expected_global.push(next);
    }
    for (a, b) in global.iter().zip(&expected_global) {
        assert!(a.approx_eq(b, 1e-5));
    }
    for (i, pose) in complete.iter().enumerate() {
        let g = i / SUBMAP;
        let l = i % SUBMAP;
        let expected = expected_global[g] * motion(g * BLOCK + l);
        assert!(pose.approx_eq(&expected, 1e-5), "frame {i}");
    }
}

#[test]
fn buffers_release_budget_on_drop() {
    let backend = CpuBackend::with_memory_budget(1 << 20);
    {
        let _ = run_pipeline(&backend);
    }
    assert_eq!(backend.allocated_bytes(), 0);
    assert!(backend.budget().peak() > 0);
}

#[test]
fn copy_within_duplicates_a_slot() {
    let backend = CpuBackend::new();
    let mut buf = backend.allocate("global", 3).unwrap();
    backend.write(&mut buf, 0, &[motion(3)]).unwrap();
    backend.copy_within(&mut buf, 0, 1).unwrap();
    let out = backend.read(&buf, 0, 2).unwrap();
    assert_eq!(out[0], out[1]);
    assert_eq!(buf.len(), 3);
    assert!(backend.copy_within(&mut buf, 0, 3).is_err());
}

#[cfg(feature = "gpu")]
#[test]
fn gpu_matches_cpu() {
    let gpu = match cv_hal::GpuBackend::new() {
        Ok(g) => g,
        Err(e) => {
            println!("No suitable GPU adapter found, skipping test: {e}");
            return;
        }
    };
    let cpu = CpuBackend::new();
    let (cpu_global, cpu_complete) = run_pipeline(&cpu);
    let (gpu_global, gpu_complete) = run_pipeline(&gpu);

    for (a, b) in cpu_global.iter().zip(&gpu_global) {
        assert!(a.approx_eq(b, 1e-4));
    }
    for (a, b) in cpu_complete.iter().zip(&gpu_complete) {
        assert!(a.approx_eq(b, 1e-4));
    }
}
