//! Helix fit of a hit sample in the fitted form
//! `x(z) = x0 + r·cos(b·z + phi0)`, `y(z) = y0 + r·sin(b·z + phi0)`.
//!
//! Stages:
//! 1. **Seed** – circle through three selected hits, phase slope from the
//!    better of two unwrap hypotheses ([`estimate_seed`]).
//! 2. **Refine** – damped least squares over all hits with an analytic
//!    Jacobian ([`fit_helix`]). A refinement that does not lower the mean
//!    hit distance is discarded in favour of the seed.

mod distance;
mod refine;
mod seed;
mod solver;

use serde::{Deserialize, Serialize};

use crate::sample::Hit;
use crate::shape::ClusterShape;

pub use distance::{distance_helix, distance_stats, nearest_winding, DistanceStats};
pub use refine::{fit_helix, HelixResiduals};
pub use seed::{estimate_seed, HelixSeed, DEGENERATE_BISECTOR_TIME};

/// Minimum number of hits for a helix fit.
pub const MIN_HELIX_HITS: usize = 3;

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors from [`try_fit_helix`].
#[derive(Debug, Clone, PartialEq)]
pub enum HelixFitError {
    /// Too few hits to construct a seed circle.
    TooFewHits {
        /// Required minimum number of hits.
        needed: usize,
        /// Provided number of hits.
        got: usize,
    },
}

impl std::fmt::Display for HelixFitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewHits { needed, got } => {
                write!(f, "helix fit impossible: need {} hits, got {}", needed, got)
            }
        }
    }
}

impl std::error::Error for HelixFitError {}

// ── Types ──────────────────────────────────────────────────────────────────

/// Fitted-form helix parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HelixParams {
    /// Circle centre x.
    pub x0: f64,
    /// Circle centre y.
    pub y0: f64,
    /// Circle radius.
    pub r: f64,
    /// Phase advance per unit z.
    pub b: f64,
    /// Phase at z = 0.
    pub phi0: f64,
}

impl HelixParams {
    #[inline]
    pub fn to_array(&self) -> [f64; 5] {
        [self.x0, self.y0, self.r, self.b, self.phi0]
    }

    #[inline]
    pub fn from_array(p: [f64; 5]) -> Self {
        Self {
            x0: p[0],
            y0: p[1],
            r: p[2],
            b: p[3],
            phi0: p[4],
        }
    }

    /// `b·z + phi0`.
    #[inline]
    pub fn phase_at(&self, z: f64) -> f64 {
        self.b * z + self.phi0
    }

    /// Point on the helix at longitudinal coordinate `z`.
    pub fn point_at(&self, z: f64) -> [f64; 3] {
        let phase = self.phase_at(z);
        [
            self.x0 + self.r * phase.cos(),
            self.y0 + self.r * phase.sin(),
            z,
        ]
    }
}

/// Whether to run the nonlinear stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelixFitMode {
    /// Seed followed by nonlinear refinement.
    #[default]
    Refine,
    /// Closed-form seed only.
    SeedOnly,
}

/// Backend for the nonlinear stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelixSolver {
    /// In-crate Levenberg–Marquardt with the analytic Jacobian.
    #[default]
    Lm,
    /// Levenberg–Marquardt backend (`tiny-solver`) with automatic
    /// differentiation of the same residuals.
    TinySolver,
}

/// Configuration for [`fit_helix`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelixFitConfig {
    pub mode: HelixFitMode,
    /// Maximum solver iterations.
    pub max_iters: usize,
    /// Absolute step tolerance of the convergence test.
    pub abs_tolerance: f64,
    /// Relative step tolerance of the convergence test.
    pub rel_tolerance: f64,
    pub solver: HelixSolver,
}

impl Default for HelixFitConfig {
    fn default() -> Self {
        Self {
            mode: HelixFitMode::Refine,
            max_iters: 100,
            abs_tolerance: 1e-4,
            rel_tolerance: 1e-4,
            solver: HelixSolver::Lm,
        }
    }
}

/// How a [`HelixFit`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelixFitStatus {
    /// Refined parameters lowered the mean hit distance and were kept.
    Refined,
    /// Refinement did not improve on the seed; the seed is reported.
    SeedRetained,
    /// Only the seed was requested.
    SeedOnly,
    /// Fewer than [`MIN_HELIX_HITS`] hits; all outputs are zero.
    InsufficientHits,
}

impl HelixFitStatus {
    /// Status code: 0 on success, 1 for insufficient hits.
    pub fn code(&self) -> i32 {
        match self {
            Self::InsufficientHits => 1,
            _ => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code() == 0
    }
}

/// Helix fit result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelixFit {
    pub status: HelixFitStatus,
    pub params: HelixParams,
    /// One-sigma uncertainties in `[x0, y0, r, b, phi0]` order. Zero unless
    /// the refined parameters were kept; NaN if the covariance could not be
    /// formed.
    pub uncertainties: [f64; 5],
    /// Mean per-hit [`distance_helix`] of `params`.
    pub chi2: f64,
    /// Largest per-hit distance of `params`.
    pub dist_max: f64,
    /// Seed the fit started from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<HelixSeed>,
    /// Solver iterations spent (not reported by the tiny-solver backend).
    pub iterations: usize,
    /// Whether the step-size delta test passed at `params`. For the
    /// tiny-solver backend this is checked with one Gauss-Newton step after
    /// the optimizer returns.
    pub converged: bool,
}

impl HelixFit {
    pub(crate) fn insufficient() -> Self {
        Self {
            status: HelixFitStatus::InsufficientHits,
            params: HelixParams::default(),
            uncertainties: [0.0; 5],
            chi2: 0.0,
            dist_max: 0.0,
            seed: None,
            iterations: 0,
            converged: false,
        }
    }
}

/// [`fit_helix`] with insufficient data reported as an error.
pub fn try_fit_helix(hits: &[Hit], cfg: &HelixFitConfig) -> Result<HelixFit, HelixFitError> {
    if hits.len() < MIN_HELIX_HITS {
        return Err(HelixFitError::TooFewHits {
            needed: MIN_HELIX_HITS,
            got: hits.len(),
        });
    }
    Ok(fit_helix(hits, cfg))
}

impl ClusterShape {
    /// Closed-form helix seed through three selected hits.
    pub fn helix_seed(&self) -> Option<HelixSeed> {
        estimate_seed(self.sample().hits())
    }

    /// Fit a helix through all hits of this cluster.
    pub fn fit_helix(&self, cfg: &HelixFitConfig) -> HelixFit {
        fit_helix(self.sample().hits(), cfg)
    }

    pub fn try_fit_helix(&self, cfg: &HelixFitConfig) -> Result<HelixFit, HelixFitError> {
        try_fit_helix(self.sample().hits(), cfg)
    }
}
