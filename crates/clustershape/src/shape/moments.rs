//! Weighted moments of a hit sample: centroid, inertia tensor, width and the
//! equivalent ellipsoid.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::numeric::symmetric_eigen_abs_ascending;
use crate::sample::Hit;

/// Zeroth and first weighted moments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gravity {
    /// Σw.
    pub total_weight: f64,
    /// Σw·p / Σw.
    pub centroid: [f64; 3],
}

/// Inertia tensor about the centroid and its sorted eigen-decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Inertia {
    /// Symmetric tensor, row-major.
    pub tensor: [[f64; 3]; 3],
    /// Eigenvalues sorted ascending by absolute value.
    pub eigenvalues: [f64; 3],
    /// Unit eigenvectors, column-major: `eigenvectors[i + 3 * j]` is
    /// component `i` of eigenvector `j`. Column 0 is the principal axis,
    /// sign-adjusted to point away from the origin.
    pub eigenvectors: [f64; 9],
    /// Distance of the centroid from the coordinate origin.
    pub radius: f64,
}

impl Inertia {
    /// Eigenvector `j` (0 = principal axis).
    #[inline]
    pub fn axis(&self, j: usize) -> [f64; 3] {
        [
            self.eigenvectors[3 * j],
            self.eigenvectors[3 * j + 1],
            self.eigenvectors[3 * j + 2],
        ]
    }

    #[inline]
    pub fn principal_axis(&self) -> [f64; 3] {
        self.axis(0)
    }
}

/// Ellipsoid with the same second moments as the sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    /// Semi-axes, largest first.
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub volume: f64,
    /// Cube root of the volume.
    pub r_ave: f64,
    /// Total weight per unit volume.
    pub density: f64,
    /// Width divided by `r1`.
    pub eccentricity: f64,
    /// Largest forward projection onto the principal axis (absolute value).
    pub r1_forward: f64,
    /// Most negative projection onto the principal axis (absolute value).
    pub r1_backward: f64,
}

#[inline]
fn v3(p: [f64; 3]) -> Vector3<f64> {
    Vector3::new(p[0], p[1], p[2])
}

pub(crate) fn compute_gravity(hits: &[Hit]) -> Gravity {
    let mut total = 0.0;
    let mut acc = Vector3::<f64>::zeros();
    for h in hits {
        total += h.w;
        acc += v3(h.position()) * h.w;
    }
    let c = acc / total;
    Gravity {
        total_weight: total,
        centroid: [c.x, c.y, c.z],
    }
}

pub(crate) fn inertia_tensor(hits: &[Hit], centroid: [f64; 3]) -> Matrix3<f64> {
    let mut t = Matrix3::<f64>::zeros();
    for h in hits {
        let dx = h.x - centroid[0];
        let dy = h.y - centroid[1];
        let dz = h.z - centroid[2];
        t[(0, 0)] += h.w * (dy * dy + dz * dz);
        t[(1, 1)] += h.w * (dx * dx + dz * dz);
        t[(2, 2)] += h.w * (dx * dx + dy * dy);
        t[(0, 1)] -= h.w * dx * dy;
        t[(0, 2)] -= h.w * dx * dz;
        t[(1, 2)] -= h.w * dy * dz;
    }
    t[(1, 0)] = t[(0, 1)];
    t[(2, 0)] = t[(0, 2)];
    t[(2, 1)] = t[(1, 2)];
    t
}

pub(crate) fn compute_inertia(hits: &[Hit], gravity: &Gravity) -> Inertia {
    let t = inertia_tensor(hits, gravity.centroid);
    let eig = symmetric_eigen_abs_ascending(&t);

    let mut eigenvectors = [0.0; 9];
    for j in 0..3 {
        for i in 0..3 {
            eigenvectors[i + 3 * j] = eig.vectors[(i, j)];
        }
    }

    // Principal axis points away from the origin.
    let c = v3(gravity.centroid);
    let r2 = c.norm_squared();
    let r2_shifted = (c + v3([eigenvectors[0], eigenvectors[1], eigenvectors[2]])).norm_squared();
    if r2_shifted < r2 {
        for v in &mut eigenvectors[..3] {
            *v = -*v;
        }
    }

    let mut tensor = [[0.0; 3]; 3];
    for (i, row) in tensor.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = t[(i, j)];
        }
    }

    Inertia {
        tensor,
        eigenvalues: eig.values,
        eigenvectors,
        radius: r2.sqrt(),
    }
}

/// Perpendicular distance from `p` to the line through `centroid` along `axis`.
pub(crate) fn distance_to_axis(p: [f64; 3], centroid: [f64; 3], axis: [f64; 3]) -> f64 {
    let a = v3(axis);
    let d = v3(centroid) - v3(p);
    a.cross(&d).norm() / a.norm()
}

pub(crate) fn compute_width(hits: &[Hit], gravity: &Gravity, inertia: &Inertia) -> f64 {
    let axis = inertia.principal_axis();
    let sum: f64 = hits
        .iter()
        .map(|h| {
            let d = distance_to_axis(h.position(), gravity.centroid, axis);
            h.w * d * d
        })
        .sum();
    (sum / gravity.total_weight).sqrt()
}

pub(crate) fn compute_ellipsoid(
    hits: &[Hit],
    gravity: &Gravity,
    inertia: &Inertia,
    width: f64,
) -> Ellipsoid {
    let w = gravity.total_weight;
    // A collinear cluster has a zero eigenvalue that can round below zero.
    let [wr1, wr2, wr3] = inertia.eigenvalues.map(|ev| (ev / w).max(0.0).sqrt());
    let r1 = (wr2 * wr3).sqrt();
    let r2 = (wr1 * wr3).sqrt();
    let r3 = (wr1 * wr2).sqrt();
    let volume = 4.0 * std::f64::consts::PI * r1 * r2 * r3 / 3.0;

    let axis = v3(inertia.principal_axis());
    let c = v3(gravity.centroid);
    let mut d_begin = f64::INFINITY;
    let mut d_last = f64::NEG_INFINITY;
    for h in hits {
        let proj = (v3(h.position()) - c).dot(&axis);
        d_begin = d_begin.min(proj);
        d_last = d_last.max(proj);
    }

    Ellipsoid {
        r1,
        r2,
        r3,
        volume,
        r_ave: volume.cbrt(),
        density: w / volume,
        eccentricity: width / r1,
        r1_forward: d_last.abs(),
        r1_backward: d_begin.abs(),
    }
}
