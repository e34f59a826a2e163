// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]
//! Concurrent aggregation must produce exactly the serial per-bin maxima.

use echo_velocity_bins::{max_vel_sq, BinsConfig, BinsError, VelocityBins};

fn scene(n: usize) -> Vec<f64> {
    // Spread over several decades so every bin gets members.
    (0..n)
        .map(|i| {
            let x = (i * 7919 % 1000) as f64 / 1000.0;
            1e-3 * 1e6_f64.powf(x)
        })
        .collect()
}

fn rebuilt(speeds: &[f64]) -> VelocityBins {
    let mut vb = VelocityBins::new(BinsConfig {
        n_bins: 6,
        bin_coeff: 3.0,
        ..BinsConfig::default()
    });
    vb.set_bins(speeds, max_vel_sq(speeds), 1.0).expect("set_bins");
    vb
}

fn maxima(vb: &VelocityBins) -> Vec<f64> {
    vb.bins().iter().map(|b| b.curr_max_vel_sq()).collect()
}

fn serial_maxima(speeds: &[f64]) -> Vec<f64> {
    let mut vb = rebuilt(speeds);
    vb.bin_vel_sq_initialize();
    for (body, &v) in speeds.iter().enumerate() {
        vb.bin_vel_sq_use(body, v).expect("use");
    }
    vb.bin_vel_sq_finalize();
    maxima(&vb)
}

#[test]
fn threads_sharing_atomic_use_match_serial() {
    let speeds = scene(10_000);
    let expected = serial_maxima(&speeds);
    assert!(expected.iter().filter(|m| **m > 0.0).count() > 3);

    let mut vb = rebuilt(&speeds);
    vb.bin_vel_sq_initialize();
    let shared = &vb;
    std::thread::scope(|s| {
        for worker in 0..8 {
            let speeds = &speeds;
            s.spawn(move || {
                // Strided partition: every bin is hit by every worker.
                for body in (worker..speeds.len()).step_by(8) {
                    shared.bin_vel_sq_use(body, speeds[body]).expect("use");
                }
            });
        }
    });
    vb.bin_vel_sq_finalize();
    assert_eq!(maxima(&vb), expected);
}

#[test]
fn partial_maxima_merge_matches_serial() {
    let speeds = scene(4_321);
    let expected = serial_maxima(&speeds);

    let mut vb = rebuilt(&speeds);
    vb.bin_vel_sq_initialize();
    for workers in [1, 2, 3, 7, 64] {
        vb.aggregate_parallel(&speeds, workers).expect("aggregate");
        assert_eq!(maxima(&vb), expected, "workers={workers}");
    }
    vb.bin_vel_sq_finalize();
}

#[test]
fn more_workers_than_bodies_is_fine() {
    let speeds = scene(3);
    let expected = serial_maxima(&speeds);
    let mut vb = rebuilt(&speeds);
    vb.bin_vel_sq_initialize();
    vb.aggregate_parallel(&speeds, 16).expect("aggregate");
    vb.bin_vel_sq_finalize();
    assert_eq!(maxima(&vb), expected);
}

#[test]
fn manual_partials_fold_into_shared_maxima() {
    let speeds = scene(1_000);
    let expected = serial_maxima(&speeds);
    let mut vb = rebuilt(&speeds);
    vb.bin_vel_sq_initialize();
    let (left, right) = speeds.split_at(500);
    let mut a = vb.partial();
    let mut b = vb.partial();
    for (body, &v) in left.iter().enumerate() {
        a.use_body(body, v).expect("use");
    }
    for (body, &v) in right.iter().enumerate() {
        b.use_body(500 + body, v).expect("use");
    }
    vb.merge_partial(b);
    vb.merge_partial(a);
    vb.bin_vel_sq_finalize();
    assert_eq!(maxima(&vb), expected);
}

#[test]
fn parallel_errors_surface_and_keep_other_maxima() {
    let speeds = scene(100);
    let mut vb = rebuilt(&speeds);
    let mut poisoned = speeds.clone();
    poisoned[99] = f64::NAN;
    vb.bin_vel_sq_initialize();
    let err = vb.aggregate_parallel(&poisoned, 4).unwrap_err();
    assert_eq!(err, BinsError::NonFiniteVelocity { body: 99 });
    assert!(vb.bins().iter().any(|b| b.curr_max_vel_sq() > 0.0));
}
