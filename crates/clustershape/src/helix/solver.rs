use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};

use super::refine::HelixResiduals;
use super::{HelixFitConfig, HelixParams, HelixSolver};
use crate::numeric::lm::{
    covariance_from_jacobian, delta_converged, levenberg_marquardt, LeastSquaresProblem,
    LmConfig,
};
use crate::sample::Hit;

/// Parameters and diagnostics from one nonlinear solve.
#[derive(Debug, Clone)]
pub(super) struct SolverOutcome {
    pub params: [f64; 5],
    pub covariance: Option<DMatrix<f64>>,
    pub iterations: usize,
    pub converged: bool,
}

pub(super) fn solve(hits: &[Hit], init: &HelixParams, cfg: &HelixFitConfig) -> SolverOutcome {
    match cfg.solver {
        HelixSolver::Lm => solve_lm(hits, init, cfg),
        HelixSolver::TinySolver => solve_tiny(hits, init, cfg).unwrap_or_else(|| {
            tracing::warn!("tiny-solver backend failed, keeping the seed");
            SolverOutcome {
                params: init.to_array(),
                covariance: None,
                iterations: 0,
                converged: false,
            }
        }),
    }
}

fn solve_lm(hits: &[Hit], init: &HelixParams, cfg: &HelixFitConfig) -> SolverOutcome {
    let problem = HelixResiduals::new(hits);
    let lm_cfg = LmConfig {
        max_iters: cfg.max_iters,
        abs_tolerance: cfg.abs_tolerance,
        rel_tolerance: cfg.rel_tolerance,
        ..LmConfig::default()
    };
    let report = levenberg_marquardt(
        &problem,
        DVector::from_row_slice(&init.to_array()),
        &lm_cfg,
    );
    SolverOutcome {
        params: std::array::from_fn(|k| report.params[k]),
        covariance: report.covariance,
        iterations: report.iterations,
        converged: report.converged,
    }
}

fn solve_tiny(hits: &[Hit], init: &HelixParams, cfg: &HelixFitConfig) -> Option<SolverOutcome> {
    use tiny_solver::factors::na as ts_na;
    use tiny_solver::Optimizer;

    #[derive(Debug, Clone)]
    struct HelixHitFactor {
        x: f64,
        y: f64,
        z: f64,
    }

    impl<T: ts_na::RealField> tiny_solver::factors::Factor<T> for HelixHitFactor {
        fn residual_func(&self, params: &[ts_na::DVector<T>]) -> ts_na::DVector<T> {
            let p = &params[0];
            let phase = p[3].clone() * T::from_f64(self.z).unwrap() + p[4].clone();
            let rx = p[0].clone() + p[2].clone() * phase.clone().cos()
                - T::from_f64(self.x).unwrap();
            let ry = p[1].clone() + p[2].clone() * phase.sin() - T::from_f64(self.y).unwrap();
            ts_na::DVector::<T>::from_vec(vec![rx, ry])
        }
    }

    let mut problem = tiny_solver::Problem::new();
    for h in hits {
        problem.add_residual_block(
            2,
            &["helix"],
            Box::new(HelixHitFactor {
                x: h.x,
                y: h.y,
                z: h.z,
            }),
            None,
        );
    }

    let mut initial_values = HashMap::<String, ts_na::DVector<f64>>::new();
    initial_values.insert(
        "helix".to_string(),
        ts_na::DVector::<f64>::from_vec(init.to_array().to_vec()),
    );

    let defaults = HelixFitConfig::default();
    if cfg.abs_tolerance != defaults.abs_tolerance || cfg.rel_tolerance != defaults.rel_tolerance {
        tracing::debug!(
            abs_tolerance = cfg.abs_tolerance,
            rel_tolerance = cfg.rel_tolerance,
            "tiny-solver iterates on its own stopping rules; tolerances only judge convergence"
        );
    }

    let optimizer = tiny_solver::LevenbergMarquardtOptimizer::default();
    let options = tiny_solver::OptimizerOptions {
        max_iteration: cfg.max_iters.clamp(1, 500),
        verbosity_level: 0,
        ..Default::default()
    };
    let result = optimizer.optimize(&problem, &initial_values, Some(options))?;
    let p = result.get("helix")?;
    if p.len() != 5 || p.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let params: [f64; 5] = std::array::from_fn(|k| p[k]);

    // tiny-solver reports neither its stopping reason nor its iteration
    // count; covariance and the convergence verdict come from the analytic
    // Jacobian at its solution.
    let problem = HelixResiduals::new(hits);
    let x = DVector::from_row_slice(&params);
    let j = problem.jacobian(&x);
    let converged = gauss_newton_step(&j, &problem.residuals(&x))
        .is_some_and(|dx| delta_converged(&dx, &x, cfg.abs_tolerance, cfg.rel_tolerance));
    if !converged {
        tracing::debug!(?params, "tiny-solver stopped short of the delta test");
    }
    Some(SolverOutcome {
        params,
        covariance: covariance_from_jacobian(&j),
        iterations: 0,
        converged,
    })
}

/// Undamped step `-(JᵀJ)⁻¹Jᵀr`, `None` when `JᵀJ` is singular.
fn gauss_newton_step(j: &DMatrix<f64>, r: &DVector<f64>) -> Option<DVector<f64>> {
    let jt = j.transpose();
    (&jt * j).lu().solve(&(-(jt * r)))
}
