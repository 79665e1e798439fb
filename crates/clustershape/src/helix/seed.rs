use std::f64::consts::TAU;

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use super::{distance_stats, HelixParams, MIN_HELIX_HITS};
use crate::numeric::solve_2x2;
use crate::sample::Hit;

/// Bisector parameter used when the three seed hits are collinear in xy.
pub const DEGENERATE_BISECTOR_TIME: f64 = 500.0;

/// Closed-form helix estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HelixSeed {
    pub params: HelixParams,
    /// Hits the circle passes through, in seed order.
    pub indices: [usize; 3],
    /// The perpendicular bisectors did not intersect and
    /// [`DEGENERATE_BISECTOR_TIME`] was used.
    pub degenerate: bool,
    /// Mean per-hit distance of `params` over the whole sample.
    pub chi2: f64,
}

/// Pick three hits spanning the sample: the innermost in radius, an outer
/// one closest in z to it, and one between them in z whose radius is closest
/// to the middle of the sample's radial range.
fn select_triple(hits: &[Hit]) -> [usize; 3] {
    let r: Vec<f64> = hits.iter().map(Hit::r_xy).collect();

    let mut i1 = 0;
    let mut r_min = f64::INFINITY;
    let mut r_max = f64::NEG_INFINITY;
    for (i, &ri) in r.iter().enumerate() {
        if ri < r_min {
            r_min = ri;
            i1 = i;
        }
        if ri > r_max {
            r_max = ri;
        }
    }

    let span = r_max - r_min;
    let lower = r_min + 0.9 * span;
    let upper = r_min + 1.1 * span;
    let z1 = hits[i1].z;
    let i3 = r
        .iter()
        .enumerate()
        .filter(|&(i, &ri)| i != i1 && ri > lower && ri < upper)
        .min_by(|a, b| (hits[a.0].z - z1).abs().total_cmp(&(hits[b.0].z - z1).abs()))
        .map(|(i, _)| i)
        .unwrap_or_else(|| {
            // All hits share one radius: take the hit farthest from i1 in z.
            (0..hits.len())
                .filter(|&i| i != i1)
                .max_by(|&a, &b| (hits[a].z - z1).abs().total_cmp(&(hits[b].z - z1).abs()))
                .unwrap_or(0)
        });

    let (z_lo, z_hi) = {
        let z3 = hits[i3].z;
        (z1.min(z3), z1.max(z3))
    };
    let r_mid = 0.5 * (r_min + r_max);
    let i2 = (0..hits.len())
        .filter(|&i| i != i1 && i != i3 && hits[i].z >= z_lo && hits[i].z <= z_hi)
        .min_by(|&a, &b| (r[a] - r_mid).abs().total_cmp(&(r[b] - r_mid).abs()));

    match i2 {
        Some(i2) => [i1, i2, i3],
        None => {
            let i2 = (0..hits.len())
                .find(|&i| i != i1 && i != i3)
                .unwrap_or(0);
            let mut triple = [i1, i2, i3];
            triple.sort_by(|&a, &b| hits[a].z.total_cmp(&hits[b].z));
            tracing::debug!(?triple, "no hit between the outer seed hits in z");
            triple
        }
    }
}

/// Phase slope and offset through three phases unwrapped in one direction,
/// scored by the residual at the middle hit.
fn unwrap_hypothesis(phases: [f64; 3], z: [f64; 3], increasing: bool) -> (f64, f64, f64) {
    let [f1, mut f2, mut f3] = phases;
    if increasing {
        if f1 > f2 {
            f2 += TAU;
        }
        if f1 > f3 {
            f3 += TAU;
        }
        if f2 > f3 {
            f3 += TAU;
        }
    } else {
        if f1 < f2 {
            f2 -= TAU;
        }
        if f1 < f3 {
            f3 -= TAU;
        }
        if f2 < f3 {
            f3 -= TAU;
        }
    }
    let b = (f3 - f1) / (z[2] - z[0]);
    let phi0 = f1 - b * z[0];
    let residual = (b * z[1] + phi0 - f2).abs();
    (b, phi0, residual)
}

/// Closed-form helix seed, or `None` with fewer than three hits.
pub fn estimate_seed(hits: &[Hit]) -> Option<HelixSeed> {
    if hits.len() < MIN_HELIX_HITS {
        return None;
    }
    let indices = select_triple(hits);
    let [p1, p2, p3] = indices.map(|i| hits[i]);

    // Circle centre: intersection of the perpendicular bisectors of 1–2 and 2–3.
    let mid12 = Vector2::new(0.5 * (p1.x + p2.x), 0.5 * (p1.y + p2.y));
    let mid23 = Vector2::new(0.5 * (p2.x + p3.x), 0.5 * (p2.y + p3.y));
    let a12 = Vector2::new(p2.y - p1.y, p1.x - p2.x);
    let a23 = Vector2::new(p3.y - p2.y, p2.x - p3.x);

    let m = Matrix2::new(a12.x, -a23.x, a12.y, -a23.y);
    let solved = if m.determinant() == 0.0 {
        None
    } else {
        solve_2x2(&m, &(mid23 - mid12)).map(|t| t[0])
    };
    let degenerate = solved.is_none();
    let t = solved.unwrap_or_else(|| {
        tracing::warn!(
            ?indices,
            t = DEGENERATE_BISECTOR_TIME,
            "seed hits are collinear in xy, using fallback bisector parameter"
        );
        DEGENERATE_BISECTOR_TIME
    });
    let centre = mid12 + a12 * t;
    let r = (p1.x - centre.x).hypot(p1.y - centre.y);

    let phase = |h: &Hit| (h.y - centre.y).atan2(h.x - centre.x);
    let phases = [phase(&p1), phase(&p2), phase(&p3)];
    let z = [p1.z, p2.z, p3.z];
    let (b_inc, phi0_inc, res_inc) = unwrap_hypothesis(phases, z, true);
    let (b_dec, phi0_dec, res_dec) = unwrap_hypothesis(phases, z, false);
    let (b, phi0) = if res_inc < res_dec {
        (b_inc, phi0_inc)
    } else {
        (b_dec, phi0_dec)
    };

    let params = HelixParams {
        x0: centre.x,
        y0: centre.y,
        r,
        b,
        phi0,
    };
    let chi2 = distance_stats(hits, &params).mean;
    tracing::debug!(?params, ?indices, chi2, "helix seed");

    Some(HelixSeed {
        params,
        indices,
        degenerate,
        chi2,
    })
}
