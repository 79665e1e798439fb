//! Lazily evaluated shape analysis of one immutable hit sample.
//!
//! Every derived quantity lives in its own `OnceCell` and moves from
//! uncomputed to computed exactly once. Accessors fill only the chain they
//! need: gravity → inertia → width → ellipsoid.

mod moments;

use std::cell::OnceCell;

use serde::{Deserialize, Serialize};

use crate::sample::WeightedPointSample;

pub use moments::{Ellipsoid, Gravity, Inertia};

/// Derived quantities cached by [`ClusterShape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Gravity,
    Inertia,
    Width,
    Ellipsoid,
}

/// Snapshot of every shape quantity, for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeSummary {
    pub n_hits: usize,
    pub gravity: Gravity,
    pub inertia: Inertia,
    pub width: f64,
    pub ellipsoid: Ellipsoid,
}

/// Shape-analysis session over a [`WeightedPointSample`].
///
/// Not `Sync`: the caches are filled on first access through `&self`.
#[derive(Debug, Clone)]
pub struct ClusterShape {
    sample: WeightedPointSample,
    gravity: OnceCell<Gravity>,
    inertia: OnceCell<Inertia>,
    width: OnceCell<f64>,
    ellipsoid: OnceCell<Ellipsoid>,
}

impl ClusterShape {
    pub fn new(sample: WeightedPointSample) -> Self {
        Self {
            sample,
            gravity: OnceCell::new(),
            inertia: OnceCell::new(),
            width: OnceCell::new(),
            ellipsoid: OnceCell::new(),
        }
    }

    #[inline]
    pub fn sample(&self) -> &WeightedPointSample {
        &self.sample
    }

    #[inline]
    pub fn n_hits(&self) -> usize {
        self.sample.len()
    }

    /// Whether `q` has already been evaluated.
    pub fn is_computed(&self, q: Quantity) -> bool {
        match q {
            Quantity::Gravity => self.gravity.get().is_some(),
            Quantity::Inertia => self.inertia.get().is_some(),
            Quantity::Width => self.width.get().is_some(),
            Quantity::Ellipsoid => self.ellipsoid.get().is_some(),
        }
    }

    pub fn gravity(&self) -> &Gravity {
        self.gravity
            .get_or_init(|| moments::compute_gravity(self.sample.hits()))
    }

    pub fn inertia(&self) -> &Inertia {
        self.inertia.get_or_init(|| {
            let gravity = self.gravity();
            let inertia = moments::compute_inertia(self.sample.hits(), gravity);
            tracing::trace!(eigenvalues = ?inertia.eigenvalues, "inertia diagonalized");
            inertia
        })
    }

    pub fn width(&self) -> f64 {
        *self.width.get_or_init(|| {
            moments::compute_width(self.sample.hits(), self.gravity(), self.inertia())
        })
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        self.ellipsoid.get_or_init(|| {
            let width = self.width();
            moments::compute_ellipsoid(self.sample.hits(), self.gravity(), self.inertia(), width)
        })
    }

    pub fn total_weight(&self) -> f64 {
        self.gravity().total_weight
    }

    pub fn centroid(&self) -> &[f64; 3] {
        &self.gravity().centroid
    }

    /// Eigenvalues ascending by `|λ|`.
    pub fn eigenvalues(&self) -> &[f64; 3] {
        &self.inertia().eigenvalues
    }

    /// Column-major eigenvectors, see [`Inertia::eigenvectors`].
    pub fn eigenvectors(&self) -> &[f64; 9] {
        &self.inertia().eigenvectors
    }

    pub fn principal_axis(&self) -> [f64; 3] {
        self.inertia().principal_axis()
    }

    /// Distance of the centroid from the origin.
    pub fn radius(&self) -> f64 {
        self.inertia().radius
    }

    pub fn summary(&self) -> ShapeSummary {
        ShapeSummary {
            n_hits: self.n_hits(),
            gravity: *self.gravity(),
            inertia: *self.inertia(),
            width: self.width(),
            ellipsoid: *self.ellipsoid(),
        }
    }
}

impl From<WeightedPointSample> for ClusterShape {
    fn from(sample: WeightedPointSample) -> Self {
        Self::new(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{random_cloud, shower_cluster};
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::{Matrix3, Vector3};

    fn unit_circle() -> ClusterShape {
        let s = WeightedPointSample::new(
            &[1.0; 4],
            &[1.0, 0.0, -1.0, 0.0],
            &[0.0, 1.0, 0.0, -1.0],
            &[0.0; 4],
        )
        .unwrap();
        ClusterShape::new(s)
    }

    #[test]
    fn unit_circle_baseline() {
        let shape = unit_circle();
        assert_eq!(shape.n_hits(), 4);
        assert_relative_eq!(shape.total_weight(), 4.0);
        let c = shape.centroid();
        for v in c {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-12);
        }

        let ev = shape.eigenvalues();
        assert_relative_eq!(ev[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(ev[1], 2.0, epsilon = 1e-9);
        assert_relative_eq!(ev[2], 4.0, epsilon = 1e-9);

        // The principal axis lies somewhere in the circle plane; the width
        // is the same for every in-plane direction.
        let axis = shape.principal_axis();
        assert_abs_diff_eq!(axis[2], 0.0, epsilon = 1e-9);
        assert_relative_eq!(shape.width(), 0.5f64.sqrt(), epsilon = 1e-9);

        let e = shape.ellipsoid();
        let r1 = 0.5f64.sqrt().sqrt();
        assert_relative_eq!(e.r1, r1, epsilon = 1e-9);
        assert_relative_eq!(e.r2, r1, epsilon = 1e-9);
        assert_relative_eq!(e.r3, 0.5f64.sqrt(), epsilon = 1e-9);
        assert_relative_eq!(e.eccentricity, 0.5f64.sqrt() / r1, epsilon = 1e-9);
        assert_relative_eq!(
            e.volume,
            4.0 / 3.0 * std::f64::consts::PI * r1 * r1 * 0.5f64.sqrt(),
            epsilon = 1e-9
        );
        assert_relative_eq!(e.density, 4.0 / e.volume, epsilon = 1e-9);
        assert_relative_eq!(e.r_ave.powi(3), e.volume, epsilon = 1e-9);
    }

    #[test]
    fn weighted_residuals_sum_to_zero() {
        for seed in 0..8 {
            let sample = random_cloud(seed, 40);
            let shape = ClusterShape::new(sample.clone());
            let c = shape.centroid();
            let mut acc = [0.0f64; 3];
            for h in sample.hits() {
                let p = h.position();
                for k in 0..3 {
                    acc[k] += h.w * (p[k] - c[k]);
                }
            }
            for v in acc {
                assert_abs_diff_eq!(v, 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn principal_axis_points_away_from_origin() {
        for seed in 0..16 {
            let shape = ClusterShape::new(random_cloud(seed, 25));
            let c = Vector3::from(*shape.centroid());
            let v = Vector3::from(shape.principal_axis());
            assert!((c + v).norm_squared() >= c.norm_squared());
        }
    }

    #[test]
    fn eigen_pairs_diagonalize_the_tensor() {
        let shape = ClusterShape::new(random_cloud(3, 30));
        let inertia = shape.inertia();
        let t = Matrix3::from_fn(|i, j| inertia.tensor[i][j]);
        let ev = inertia.eigenvalues;
        assert!(ev[0].abs() <= ev[1].abs() && ev[1].abs() <= ev[2].abs());
        for j in 0..3 {
            let v = Vector3::from(inertia.axis(j));
            assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-9);
            assert_relative_eq!(t * v, v * ev[j], epsilon = 1e-6);
        }
    }

    #[test]
    fn elongated_shower_follows_its_direction() {
        let dir = Vector3::new(1.0, 1.0, 0.5).normalize();
        let sample = shower_cluster([10.0, 10.0, 5.0], dir.into(), 40, 7);
        let shape = ClusterShape::new(sample);
        let axis = Vector3::from(shape.principal_axis());
        assert!(axis.dot(&dir) > 0.99, "axis {:?} not along {:?}", axis, dir);

        let e = shape.ellipsoid();
        assert!(e.r1 >= e.r2 && e.r2 >= e.r3);
        assert!(e.r1_forward > 0.0 && e.r1_backward > 0.0);
        assert!(shape.width() < e.r1);
    }

    #[test]
    fn collinear_cluster_has_finite_ellipsoid() {
        let s: Vec<f64> = (0..9).map(|i| 0.37 * i as f64 + 0.1).collect();
        let x: Vec<f64> = s.iter().map(|t| 3.0 + 0.3 * t).collect();
        let y: Vec<f64> = s.iter().map(|t| -1.0 + 0.7 * t).collect();
        let z: Vec<f64> = s.iter().map(|t| 2.0 + 1.1 * t).collect();
        let w = [1.0, 2.5, 0.5, 3.0, 1.0, 0.7, 2.0, 1.3, 0.9];
        let shape = ClusterShape::new(WeightedPointSample::new(&w, &x, &y, &z).unwrap());

        assert_abs_diff_eq!(shape.eigenvalues()[0], 0.0, epsilon = 1e-9);
        let e = shape.ellipsoid();
        for v in [e.r1, e.r2, e.r3, e.volume, e.r_ave, e.density, e.eccentricity] {
            assert!(!v.is_nan(), "{:?}", e);
        }
        assert!(e.r1 > 0.0);
        assert!(e.r3 < 1e-2 * e.r1);
    }

    #[test]
    fn caches_fill_only_the_needed_chain() {
        let shape = ClusterShape::new(random_cloud(1, 10));
        assert!(!shape.is_computed(Quantity::Gravity));

        let _ = shape.total_weight();
        assert!(shape.is_computed(Quantity::Gravity));
        assert!(!shape.is_computed(Quantity::Inertia));

        let w1 = shape.width();
        assert!(shape.is_computed(Quantity::Inertia));
        assert!(shape.is_computed(Quantity::Width));
        assert!(!shape.is_computed(Quantity::Ellipsoid));

        let _ = shape.ellipsoid();
        assert!(shape.is_computed(Quantity::Ellipsoid));
        assert_eq!(shape.width(), w1);
    }

    #[test]
    fn summary_serializes() {
        let shape = unit_circle();
        let json = serde_json::to_string(&shape.summary()).unwrap();
        assert!(json.contains("\"n_hits\":4"));
        assert!(json.contains("eccentricity"));
    }
}
