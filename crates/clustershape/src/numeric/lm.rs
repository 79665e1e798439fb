//! Damped nonlinear least squares (Levenberg–Marquardt) with caller-supplied
//! residuals and Jacobian.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// A residual vector `f(p)` and its Jacobian `∂f/∂p`.
pub trait LeastSquaresProblem {
    /// Number of free parameters.
    fn n_params(&self) -> usize;
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64>;
    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64>;
}

/// Iteration controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LmConfig {
    /// Maximum number of accepted-or-rejected outer iterations.
    pub max_iters: usize,
    /// Absolute step tolerance of the delta test.
    pub abs_tolerance: f64,
    /// Relative step tolerance of the delta test.
    pub rel_tolerance: f64,
    /// Starting damping factor.
    pub initial_damping: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iters: 100,
            abs_tolerance: 1e-4,
            rel_tolerance: 1e-4,
            initial_damping: 1e-3,
        }
    }
}

/// Outcome of one solve.
#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: DVector<f64>,
    /// `(JᵀJ)⁻¹` at the returned parameters; pseudo-inverse when rank
    /// deficient, `None` when even that fails.
    pub covariance: Option<DMatrix<f64>>,
    /// Half the squared residual norm at the returned parameters.
    pub cost: f64,
    pub iterations: usize,
    /// True when the delta test (or a vanishing gradient) stopped the loop.
    pub converged: bool,
}

const MAX_DAMPING: f64 = 1e12;
const MIN_DAMPING: f64 = 1e-12;

#[inline]
fn half_norm2(r: &DVector<f64>) -> f64 {
    0.5 * r.norm_squared()
}

/// `|dx_i| < abs + rel·|x_i|` for every component.
pub fn delta_converged(dx: &DVector<f64>, x: &DVector<f64>, abs: f64, rel: f64) -> bool {
    dx.iter()
        .zip(x.iter())
        .all(|(d, v)| d.abs() < abs + rel * v.abs())
}

/// Covariance estimate `(JᵀJ)⁻¹`.
pub fn covariance_from_jacobian(j: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let jtj = j.transpose() * j;
    if let Some(inv) = jtj.clone().try_inverse() {
        if inv.iter().all(|v| v.is_finite()) {
            return Some(inv);
        }
    }
    jtj.pseudo_inverse(1e-12)
        .ok()
        .filter(|m| m.iter().all(|v| v.is_finite()))
}

/// Minimize `½‖f(p)‖²` starting from `init`.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    init: DVector<f64>,
    cfg: &LmConfig,
) -> LmReport {
    let n = problem.n_params();
    let mut x = init;
    let mut r = problem.residuals(&x);
    let mut cost = half_norm2(&r);
    let mut lambda = cfg.initial_damping.max(MIN_DAMPING);
    let mut converged = false;
    let mut iterations = 0;

    while iterations < cfg.max_iters {
        iterations += 1;
        let j = problem.jacobian(&x);
        let g = j.transpose() * &r;
        if g.amax() <= 1e-15 {
            converged = true;
            break;
        }
        let h = j.transpose() * &j;

        let mut accepted = None;
        while lambda <= MAX_DAMPING {
            let mut a = h.clone();
            for k in 0..n {
                a[(k, k)] += lambda * h[(k, k)].max(1e-12);
            }
            let Some(dx) = a.lu().solve(&(-&g)) else {
                lambda *= 10.0;
                continue;
            };
            let x_new = &x + &dx;
            let r_new = problem.residuals(&x_new);
            let cost_new = half_norm2(&r_new);
            if cost_new.is_finite() && cost_new < cost {
                lambda = (lambda * 0.1).max(MIN_DAMPING);
                accepted = Some((dx, x_new, r_new, cost_new));
                break;
            }
            lambda *= 10.0;
        }

        let Some((dx, x_new, r_new, cost_new)) = accepted else {
            tracing::trace!(iterations, cost, "LM stalled: no decreasing step");
            break;
        };
        tracing::trace!(iterations, cost = cost_new, lambda, "LM step accepted");

        x = x_new;
        r = r_new;
        cost = cost_new;

        if delta_converged(&dx, &x, cfg.abs_tolerance, cfg.rel_tolerance) {
            converged = true;
            break;
        }
    }

    let covariance = covariance_from_jacobian(&problem.jacobian(&x));
    LmReport {
        params: x,
        covariance,
        cost,
        iterations,
        converged,
    }
}
