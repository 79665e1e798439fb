use nalgebra::{DMatrix, DVector};

use super::solver::{solve, SolverOutcome};
use super::{
    distance_stats, estimate_seed, HelixFit, HelixFitConfig, HelixFitMode, HelixFitStatus,
    HelixParams,
};
use crate::numeric::lm::LeastSquaresProblem;
use crate::sample::Hit;

/// Stacked helix residuals: the x residual of every hit, then the y residual
/// of every hit.
#[derive(Debug, Clone, Copy)]
pub struct HelixResiduals<'a> {
    hits: &'a [Hit],
}

impl<'a> HelixResiduals<'a> {
    pub fn new(hits: &'a [Hit]) -> Self {
        Self { hits }
    }

    pub fn hits(&self) -> &'a [Hit] {
        self.hits
    }
}

impl LeastSquaresProblem for HelixResiduals<'_> {
    fn n_params(&self) -> usize {
        5
    }

    fn residuals(&self, p: &DVector<f64>) -> DVector<f64> {
        let n = self.hits.len();
        let mut r = DVector::zeros(2 * n);
        for (i, h) in self.hits.iter().enumerate() {
            let phase = p[3] * h.z + p[4];
            r[i] = p[0] + p[2] * phase.cos() - h.x;
            r[n + i] = p[1] + p[2] * phase.sin() - h.y;
        }
        r
    }

    fn jacobian(&self, p: &DVector<f64>) -> DMatrix<f64> {
        let n = self.hits.len();
        let mut j = DMatrix::zeros(2 * n, 5);
        for (i, h) in self.hits.iter().enumerate() {
            let (s, c) = (p[3] * h.z + p[4]).sin_cos();
            let r = p[2];

            j[(i, 0)] = 1.0;
            j[(i, 2)] = c;
            j[(i, 3)] = -h.z * r * s;
            j[(i, 4)] = -r * s;

            j[(n + i, 1)] = 1.0;
            j[(n + i, 2)] = s;
            j[(n + i, 3)] = h.z * r * c;
            j[(n + i, 4)] = r * c;
        }
        j
    }
}

fn uncertainties(outcome: &SolverOutcome) -> [f64; 5] {
    match &outcome.covariance {
        // A negative variance from the pseudo-inverse is reported as NaN.
        Some(cov) => std::array::from_fn(|k| cov[(k, k)].sqrt()),
        None => {
            tracing::warn!("helix covariance unavailable");
            [f64::NAN; 5]
        }
    }
}

/// Fit a helix through `hits`.
///
/// With fewer than three hits the result carries
/// [`HelixFitStatus::InsufficientHits`] and zeroed outputs.
pub fn fit_helix(hits: &[Hit], cfg: &HelixFitConfig) -> HelixFit {
    let Some(seed) = estimate_seed(hits) else {
        tracing::warn!(n_hits = hits.len(), "helix fit needs at least 3 hits");
        return HelixFit::insufficient();
    };
    let seed_stats = distance_stats(hits, &seed.params);

    if cfg.mode == HelixFitMode::SeedOnly {
        return HelixFit {
            status: HelixFitStatus::SeedOnly,
            params: seed.params,
            uncertainties: [0.0; 5],
            chi2: seed_stats.mean,
            dist_max: seed_stats.max,
            seed: Some(seed),
            iterations: 0,
            converged: false,
        };
    }

    let outcome = solve(hits, &seed.params, cfg);
    let refined = HelixParams::from_array(outcome.params);
    let refined_stats = distance_stats(hits, &refined);

    if refined_stats.mean < seed_stats.mean {
        tracing::debug!(
            chi2_seed = seed_stats.mean,
            chi2 = refined_stats.mean,
            iterations = outcome.iterations,
            "helix refined"
        );
        HelixFit {
            status: HelixFitStatus::Refined,
            params: refined,
            uncertainties: uncertainties(&outcome),
            chi2: refined_stats.mean,
            dist_max: refined_stats.max,
            seed: Some(seed),
            iterations: outcome.iterations,
            converged: outcome.converged,
        }
    } else {
        tracing::debug!(
            chi2_seed = seed_stats.mean,
            chi2_refined = refined_stats.mean,
            "refinement did not improve the seed"
        );
        HelixFit {
            status: HelixFitStatus::SeedRetained,
            params: seed.params,
            uncertainties: [0.0; 5],
            chi2: seed_stats.mean,
            dist_max: seed_stats.max,
            seed: Some(seed),
            iterations: outcome.iterations,
            converged: outcome.converged,
        }
    }
}
