use approx::assert_relative_eq;
use std::f64::consts::{PI, TAU};
use clustershape::helix::distance_helix;
use clustershape::{
    ClusterShape, HelixFitConfig, HelixFitStatus, HelixTrajectory, HitArrays, WeightedPointSample,
};

fn wrap_to_pi(a: f64) -> f64 {
    (a + PI).rem_euclid(TAU) - PI
}

fn track_hits(traj: &HelixTrajectory, n: usize, z_max: f64) -> WeightedPointSample {
    let mut w = Vec::with_capacity(n);
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    let mut z = Vec::with_capacity(n);
    for i in 0..n {
        let zi = z_max * (i + 1) as f64 / n as f64;
        let p = traj.point_in_z(zi, traj.reference());
        assert!(p.is_reachable());
        w.push(1.0);
        x.push(p.point[0]);
        y.push(p.point[1]);
        z.push(p.point[2]);
    }
    WeightedPointSample::new(&w, &x, &y, &z).unwrap()
}

#[test]
fn helix_fit_recovers_trajectory_circle() {
    let traj = HelixTrajectory::from_momentum([0.5, -0.2, 0.0], [1.0, 0.5, 0.8], 1.0, 40.0)
        .expect("valid trajectory");
    let shape = ClusterShape::new(track_hits(&traj, 50, 200.0));

    let fit = shape.fit_helix(&HelixFitConfig::default());
    assert!(fit.status.is_success());
    assert!(fit.chi2 < 1e-3, "chi2 = {}", fit.chi2);
    assert_relative_eq!(fit.params.r, traj.radius(), max_relative = 1e-3);
    assert_relative_eq!(fit.params.x0, traj.centre()[0], max_relative = 1e-3);
    assert_relative_eq!(fit.params.y0, traj.centre()[1], max_relative = 1e-3);

    let expected = traj.fitted_params().expect("inclined track");
    assert_relative_eq!(fit.params.b, expected.b, max_relative = 1e-3);
    assert_relative_eq!(
        wrap_to_pi(fit.params.phi0 - expected.phi0),
        0.0,
        epsilon = 1e-3 * expected.phi0.abs().max(1.0)
    );

    // Every hit is on both descriptions of the track.
    for h in shape.sample().hits() {
        assert!(traj.distance_to_point(h.position()) < 1e-6);
        assert!(distance_helix(h.position(), &fit.params) < 1e-2);
    }
}

#[test]
fn negative_track_fits_with_decreasing_phase() {
    let traj = HelixTrajectory::from_momentum([0.0; 3], [-0.4, 0.9, -0.6], -1.0, 30.0).unwrap();
    let shape = ClusterShape::new(track_hits(&traj, 40, -150.0));
    let fit = shape.fit_helix(&HelixFitConfig::default());
    assert!(fit.chi2 < 1e-3);
    let expected = traj.fitted_params().unwrap();
    assert_relative_eq!(fit.params.b, expected.b, max_relative = 1e-3);
    assert_relative_eq!(fit.params.r, traj.radius(), max_relative = 1e-3);
}

#[test]
fn json_hits_through_shape_and_profile() {
    let json = r#"{
        "weights": [1.0, 2.0, 4.0, 3.0, 1.5, 0.8, 0.4],
        "x": [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0],
        "y": [0.1, -0.2, 0.3, 0.0, -0.1, 0.2, -0.3],
        "z": [0.0, 0.2, -0.1, 0.3, -0.2, 0.1, 0.0]
    }"#;
    let arrays: HitArrays = serde_json::from_str(json).unwrap();
    let sample = WeightedPointSample::try_from(arrays).unwrap();
    let shape = ClusterShape::from(sample);

    let axis = shape.principal_axis();
    assert!(axis[0] > 0.95, "axis {:?}", axis);
    let e = shape.ellipsoid();
    assert!(e.r1 >= e.r2 && e.r2 >= e.r3);

    let profile = shape.fit_profile().expect("profile fit");
    assert!(profile.chi2.is_finite());
    assert!(profile.start[0] < 10.5);
    assert_relative_eq!(
        shape.profile_chi2(&profile.params),
        profile.chi2,
        epsilon = 1e-12
    );

    let summary = serde_json::to_value(shape.summary()).unwrap();
    assert_eq!(summary["n_hits"], 7);
}

#[test]
fn too_few_hits_for_helix() {
    let sample = WeightedPointSample::new(&[1.0, 1.0], &[1.0, 2.0], &[0.0, 1.0], &[0.0, 1.0])
        .unwrap();
    let shape = ClusterShape::new(sample);
    let fit = shape.fit_helix(&HelixFitConfig::default());
    assert_eq!(fit.status, HelixFitStatus::InsufficientHits);
    assert_eq!(fit.status.code(), 1);
    assert!(shape.try_fit_helix(&HelixFitConfig::default()).is_err());
    assert!(shape.helix_seed().is_none());
}
