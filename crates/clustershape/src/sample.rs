//! Immutable weighted hit sample.

use serde::{Deserialize, Serialize};

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised while building a [`WeightedPointSample`].
#[derive(Debug, Clone, PartialEq)]
pub enum SampleError {
    /// The sample has no hits.
    Empty,
    /// The parallel input arrays differ in length.
    LengthMismatch {
        /// Number of weights.
        weights: usize,
        /// Lengths of the x, y and z arrays.
        coords: [usize; 3],
    },
    /// A weight or coordinate is NaN or infinite.
    NonFinite {
        /// Index of the offending hit.
        index: usize,
    },
    /// A weight is zero or negative.
    NonPositiveWeight {
        /// Index of the offending hit.
        index: usize,
        /// The rejected weight.
        weight: f64,
    },
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "sample has no hits"),
            Self::LengthMismatch { weights, coords } => write!(
                f,
                "array length mismatch: {} weights, x/y/z lengths {}/{}/{}",
                weights, coords[0], coords[1], coords[2]
            ),
            Self::NonFinite { index } => write!(f, "hit {} has a non-finite value", index),
            Self::NonPositiveWeight { index, weight } => {
                write!(f, "hit {} has non-positive weight {}", index, weight)
            }
        }
    }
}

impl std::error::Error for SampleError {}

// ── Types ──────────────────────────────────────────────────────────────────

/// One weighted hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Energy-like weight, strictly positive.
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Hit {
    #[inline]
    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Cylindrical radius in the transverse (x, y) plane.
    #[inline]
    pub fn r_xy(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// Parallel-array form of a sample, as produced by reconstruction code and
/// accepted by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HitArrays {
    pub weights: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

/// Ordered, immutable set of weighted hits.
///
/// Every weight is strictly positive and every value finite, so the total
/// weight used as a divisor by the shape and profile code is never zero.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPointSample {
    hits: Vec<Hit>,
}

impl WeightedPointSample {
    /// Build a sample from parallel arrays of equal length.
    pub fn new(weights: &[f64], x: &[f64], y: &[f64], z: &[f64]) -> Result<Self, SampleError> {
        let n = weights.len();
        if x.len() != n || y.len() != n || z.len() != n {
            return Err(SampleError::LengthMismatch {
                weights: n,
                coords: [x.len(), y.len(), z.len()],
            });
        }
        let hits = (0..n)
            .map(|i| Hit {
                w: weights[i],
                x: x[i],
                y: y[i],
                z: z[i],
            })
            .collect();
        Self::from_hits(hits)
    }

    /// Build a sample from single-precision detector arrays.
    pub fn from_f32(weights: &[f32], x: &[f32], y: &[f32], z: &[f32]) -> Result<Self, SampleError> {
        let widen = |v: &[f32]| v.iter().map(|&a| a as f64).collect::<Vec<_>>();
        Self::new(&widen(weights), &widen(x), &widen(y), &widen(z))
    }

    pub fn from_hits(hits: Vec<Hit>) -> Result<Self, SampleError> {
        if hits.is_empty() {
            return Err(SampleError::Empty);
        }
        for (index, h) in hits.iter().enumerate() {
            if !(h.w.is_finite() && h.x.is_finite() && h.y.is_finite() && h.z.is_finite()) {
                return Err(SampleError::NonFinite { index });
            }
            if h.w <= 0.0 {
                return Err(SampleError::NonPositiveWeight { index, weight: h.w });
            }
        }
        Ok(Self { hits })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Always false: construction rejects empty samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    #[inline]
    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn to_arrays(&self) -> HitArrays {
        HitArrays {
            weights: self.hits.iter().map(|h| h.w).collect(),
            x: self.hits.iter().map(|h| h.x).collect(),
            y: self.hits.iter().map(|h| h.y).collect(),
            z: self.hits.iter().map(|h| h.z).collect(),
        }
    }
}

impl TryFrom<HitArrays> for WeightedPointSample {
    type Error = SampleError;

    fn try_from(a: HitArrays) -> Result<Self, Self::Error> {
        Self::new(&a.weights, &a.x, &a.y, &a.z)
    }
}

impl TryFrom<&HitArrays> for WeightedPointSample {
    type Error = SampleError;

    fn try_from(a: &HitArrays) -> Result<Self, Self::Error> {
        Self::new(&a.weights, &a.x, &a.y, &a.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_parallel_arrays() {
        let s = WeightedPointSample::new(&[1.0, 2.0], &[0.0, 1.0], &[0.5, 0.5], &[3.0, 4.0])
            .expect("valid sample");
        assert_eq!(s.len(), 2);
        assert_eq!(s.hits()[1].position(), [1.0, 0.5, 4.0]);
        assert_eq!(s.hits()[1].w, 2.0);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let err = WeightedPointSample::new(&[1.0, 2.0], &[0.0], &[0.0, 0.0], &[0.0, 0.0])
            .unwrap_err();
        assert_eq!(
            err,
            SampleError::LengthMismatch {
                weights: 2,
                coords: [1, 2, 2]
            }
        );
    }

    #[test]
    fn rejects_empty_and_bad_weights() {
        assert_eq!(
            WeightedPointSample::new(&[], &[], &[], &[]).unwrap_err(),
            SampleError::Empty
        );
        let err = WeightedPointSample::new(&[1.0, 0.0], &[0.0; 2], &[0.0; 2], &[0.0; 2])
            .unwrap_err();
        assert!(matches!(err, SampleError::NonPositiveWeight { index: 1, .. }));
        let err = WeightedPointSample::new(&[1.0], &[f64::NAN], &[0.0], &[0.0]).unwrap_err();
        assert_eq!(err, SampleError::NonFinite { index: 0 });
    }

    #[test]
    fn f32_input_and_array_roundtrip() {
        let s = WeightedPointSample::from_f32(&[1.5], &[1.0], &[-2.0], &[0.25]).unwrap();
        let a = s.to_arrays();
        assert_eq!(a.weights, vec![1.5]);
        let back = WeightedPointSample::try_from(&a).unwrap();
        assert_eq!(back, s);
    }
}
