use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use super::HelixParams;
use crate::sample::Hit;

/// Integer winding number nearest to `x`.
///
/// Brackets `x` by `n1 = trunc(x)` (`trunc(x) − 1` when `x <= 0`) and
/// `n2 = n1 + 1`, keeping `n1` only when it is strictly closer. Exact
/// half-way values therefore resolve to `n2`.
pub fn nearest_winding(x: f64) -> i64 {
    let n1 = if x > 0.0 {
        x.trunc() as i64
    } else {
        x.trunc() as i64 - 1
    };
    let n2 = n1 + 1;
    if (n1 as f64 - x).abs() < (n2 as f64 - x).abs() {
        n1
    } else {
        n2
    }
}

/// Distance from `p` to the helix: radial residual to the circle combined
/// with the longitudinal residual at the nearest winding.
pub fn distance_helix(p: [f64; 3], h: &HelixParams) -> f64 {
    let [x, y, z] = p;
    let phi = (y - h.y0).atan2(x - h.x0);
    let r = (x - h.x0).hypot(y - h.y0);
    let d_xy2 = (r - h.r) * (r - h.r);

    let x_n = (h.b * z + h.phi0 - phi) / TAU;
    let n = nearest_winding(x_n);
    let dz = (phi + TAU * n as f64 - h.phi0) / h.b - z;

    (d_xy2 + dz * dz).sqrt()
}

/// Mean and maximum [`distance_helix`] over a set of hits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceStats {
    pub mean: f64,
    pub max: f64,
}

pub fn distance_stats(hits: &[Hit], h: &HelixParams) -> DistanceStats {
    let mut sum = 0.0;
    let mut max = f64::NEG_INFINITY;
    for hit in hits {
        let d = distance_helix(hit.position(), h);
        sum += d;
        // NaN distances must not be skipped by `max`.
        if d > max || d.is_nan() {
            max = d;
        }
    }
    DistanceStats {
        mean: sum / hits.len() as f64,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn helix() -> HelixParams {
        HelixParams {
            x0: 1.5,
            y0: -2.0,
            r: 12.0,
            b: 0.05,
            phi0: 0.7,
        }
    }

    #[test]
    fn nearest_winding_brackets() {
        assert_eq!(nearest_winding(0.2), 0);
        assert_eq!(nearest_winding(0.7), 1);
        assert_eq!(nearest_winding(-0.2), 0);
        assert_eq!(nearest_winding(-0.7), -1);
        assert_eq!(nearest_winding(2.0), 2);
        assert_eq!(nearest_winding(-3.0), -3);
        assert_eq!(nearest_winding(0.0), 0);
        // Ties go to the upper neighbour.
        assert_eq!(nearest_winding(0.5), 1);
        assert_eq!(nearest_winding(-0.5), 0);
    }

    #[test]
    fn points_on_helix_have_zero_distance() {
        let h = helix();
        for i in -40..40 {
            let z = i as f64 * 7.3;
            let d = distance_helix(h.point_at(z), &h);
            assert!(d < 1e-9, "z = {}: distance {}", z, d);
        }
    }

    #[test]
    fn radial_offset_is_measured() {
        let h = helix();
        let z = 13.0;
        let phase = h.phase_at(z);
        let p = [
            h.x0 + (h.r + 0.25) * phase.cos(),
            h.y0 + (h.r + 0.25) * phase.sin(),
            z,
        ];
        assert_relative_eq!(distance_helix(p, &h), 0.25, epsilon = 1e-9);
    }

    #[test]
    fn longitudinal_offset_is_measured() {
        let h = helix();
        let mut p = h.point_at(40.0);
        p[2] += 0.3;
        assert_relative_eq!(distance_helix(p, &h), 0.3, epsilon = 1e-9);
    }

    #[test]
    fn invariant_under_full_turn_of_phi0() {
        let h = helix();
        let shifted = HelixParams {
            phi0: h.phi0 + TAU,
            ..h
        };
        let p = [5.0, 3.0, 21.0];
        assert_relative_eq!(
            distance_helix(p, &h),
            distance_helix(p, &shifted),
            epsilon = 1e-9
        );

        // Moving the point one pitch along z lands on the same winding offset.
        let pitch = TAU / h.b;
        let q = [p[0], p[1], p[2] + pitch];
        assert_relative_eq!(distance_helix(p, &h), distance_helix(q, &h), epsilon = 1e-9);
    }

    #[test]
    fn stats_report_mean_and_max() {
        let h = helix();
        let on = h.point_at(1.0);
        let mut off = h.point_at(2.0);
        off[2] += 0.4;
        let hits = [on, off].map(|p| Hit {
            w: 1.0,
            x: p[0],
            y: p[1],
            z: p[2],
        });
        let s = distance_stats(&hits, &h);
        assert_relative_eq!(s.mean, 0.2, epsilon = 1e-9);
        assert_relative_eq!(s.max, 0.4, epsilon = 1e-9);
    }
}
