//! Synthetic hit samples shared by unit tests.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::helix::HelixParams;
use crate::sample::{Hit, WeightedPointSample};

fn jitter(rng: &mut StdRng, amplitude: f64) -> f64 {
    if amplitude > 0.0 {
        rng.gen_range(-amplitude..amplitude)
    } else {
        0.0
    }
}

/// Anisotropic cloud placed away from the origin, with positive weights.
pub(crate) fn random_cloud(seed: u64, n: usize) -> WeightedPointSample {
    let mut rng = StdRng::seed_from_u64(seed);
    let offset = [
        rng.gen_range(5.0..15.0),
        rng.gen_range(-15.0..-5.0),
        rng.gen_range(5.0..15.0),
    ];
    let spread = [3.0, 1.5, 0.5];
    let hits = (0..n)
        .map(|_| Hit {
            w: rng.gen_range(0.5..3.0),
            x: offset[0] + jitter(&mut rng, spread[0]),
            y: offset[1] + jitter(&mut rng, spread[1]),
            z: offset[2] + jitter(&mut rng, spread[2]),
        })
        .collect();
    WeightedPointSample::from_hits(hits).unwrap()
}

/// Hits strung along `dir` from `start` over ten length units, with small
/// transverse scatter.
pub(crate) fn shower_cluster(
    start: [f64; 3],
    dir: [f64; 3],
    n: usize,
    seed: u64,
) -> WeightedPointSample {
    let mut rng = StdRng::seed_from_u64(seed);
    let hits = (0..n)
        .map(|_| {
            let s = rng.gen_range(0.0..10.0);
            Hit {
                w: rng.gen_range(0.5..2.0),
                x: start[0] + s * dir[0] + jitter(&mut rng, 0.3),
                y: start[1] + s * dir[1] + jitter(&mut rng, 0.3),
                z: start[2] + s * dir[2] + jitter(&mut rng, 0.3),
            }
        })
        .collect();
    WeightedPointSample::from_hits(hits).unwrap()
}

/// `n` unit-weight hits on `params` at evenly spaced z, each coordinate
/// perturbed uniformly by up to `noise`.
pub(crate) fn helix_hits(
    params: &HelixParams,
    n: usize,
    z_range: (f64, f64),
    noise: f64,
    seed: u64,
) -> WeightedPointSample {
    let mut rng = StdRng::seed_from_u64(seed);
    let step = (z_range.1 - z_range.0) / (n.max(2) - 1) as f64;
    let hits = (0..n)
        .map(|i| {
            let p = params.point_at(z_range.0 + step * i as f64);
            Hit {
                w: 1.0,
                x: p[0] + jitter(&mut rng, noise),
                y: p[1] + jitter(&mut rng, noise),
                z: p[2] + jitter(&mut rng, noise),
            }
        })
        .collect();
    WeightedPointSample::from_hits(hits).unwrap()
}
