//! Analytic charged-particle helix in a uniform solenoidal field along z.
//!
//! Built either from a reference point with momentum and charge, or from the
//! canonical track parameters `(phi0, d0, z0, omega, tan_lambda)` defined at
//! the point of closest approach to the z axis (PCA).

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::{Deserialize, Serialize};

use crate::helix::{distance_helix, nearest_winding, HelixParams};

/// Transverse momentum per unit field and radius, `p_xy = k·B·R`.
pub const FIELD_CONVERSION: f64 = 2.99792458e-4;
/// Path time reported when the trajectory never reaches the target.
pub const UNREACHABLE_TIME: f64 = 1.0e10;

/// Errors from trajectory construction.
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectoryError {
    NonFinite { what: &'static str },
    ZeroTransverseMomentum,
    ZeroCharge,
    NonPositiveField { b_field: f64 },
    ZeroOmega,
}

impl std::fmt::Display for TrajectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFinite { what } => write!(f, "{} must be finite", what),
            Self::ZeroTransverseMomentum => write!(f, "transverse momentum is zero"),
            Self::ZeroCharge => write!(f, "charge is zero"),
            Self::NonPositiveField { b_field } => {
                write!(f, "field magnitude must be positive, got {}", b_field)
            }
            Self::ZeroOmega => write!(f, "omega is zero"),
        }
    }
}

impl std::error::Error for TrajectoryError {}

/// Track parameters at the PCA.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanonicalParams {
    /// Azimuth of the momentum at the PCA, in (−π, π].
    pub phi0: f64,
    /// Signed transverse impact parameter.
    pub d0: f64,
    /// z at the PCA.
    pub z0: f64,
    /// Signed curvature, `charge / radius`.
    pub omega: f64,
    pub tan_lambda: f64,
}

/// Intersection of the trajectory with a line or plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    /// Path time from the reference point; [`UNREACHABLE_TIME`] when there is
    /// no intersection.
    pub time: f64,
    pub point: [f64; 3],
}

impl PathPoint {
    pub fn unreachable() -> Self {
        Self {
            time: UNREACHABLE_TIME,
            point: [0.0; 3],
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.time < UNREACHABLE_TIME
    }
}

fn check_finite(values: &[f64], what: &'static str) -> Result<(), TrajectoryError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(TrajectoryError::NonFinite { what })
    }
}

fn check_field(b_field: f64) -> Result<(), TrajectoryError> {
    check_finite(&[b_field], "field")?;
    if b_field <= 0.0 {
        return Err(TrajectoryError::NonPositiveField { b_field });
    }
    Ok(())
}

/// Wrap an angle into (−π, π].
#[inline]
fn wrap_angle(mut a: f64) -> f64 {
    if a <= -PI {
        a += TAU;
    }
    if a > PI {
        a -= TAU;
    }
    a
}

/// Physical helix trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HelixTrajectory {
    reference: [f64; 3],
    momentum: [f64; 3],
    /// ±1.
    charge: f64,
    b_field: f64,
    pxy: f64,
    radius: f64,
    omega: f64,
    tan_lambda: f64,
    centre: [f64; 2],
    /// Azimuth of the reference point seen from the centre.
    phi_ref: f64,
    /// Azimuth of the PCA seen from the centre.
    phi_at_pca: f64,
    phi0: f64,
    d0: f64,
    z0: f64,
}

impl HelixTrajectory {
    /// Trajectory through `position` with `momentum`. Only the sign of
    /// `charge` is used.
    pub fn from_momentum(
        position: [f64; 3],
        momentum: [f64; 3],
        charge: f64,
        b_field: f64,
    ) -> Result<Self, TrajectoryError> {
        check_finite(&position, "position")?;
        check_finite(&momentum, "momentum")?;
        check_finite(&[charge], "charge")?;
        check_field(b_field)?;
        if charge == 0.0 {
            return Err(TrajectoryError::ZeroCharge);
        }
        let q = charge.signum();

        let pxy = momentum[0].hypot(momentum[1]);
        if pxy <= 0.0 {
            return Err(TrajectoryError::ZeroTransverseMomentum);
        }
        let radius = pxy / (FIELD_CONVERSION * b_field);
        let omega = q / radius;
        let tan_lambda = momentum[2] / pxy;
        let phi_mom = momentum[1].atan2(momentum[0]);

        let turn = phi_mom + FRAC_PI_2 * q;
        let centre = [
            position[0] + radius * turn.cos(),
            position[1] + radius * turn.sin(),
        ];
        let phi_ref = (position[1] - centre[1]).atan2(position[0] - centre[0]);
        let phi_at_pca = (-centre[1]).atan2(-centre[0]);
        let phi0 = wrap_angle(FRAC_PI_2 * q + phi_at_pca);

        let x_pca = centre[0] + radius * phi_at_pca.cos();
        let y_pca = centre[1] + radius * phi_at_pca.sin();
        let d0 = -x_pca * phi0.sin() + y_pca * phi0.cos();

        let z0 = if tan_lambda == 0.0 {
            position[2]
        } else {
            let delta_phi = phi_ref - phi_at_pca;
            let x_circles = (position[2] * q / (radius * tan_lambda) - delta_phi) / TAU;
            let n = nearest_winding(x_circles);
            position[2] - radius * tan_lambda * q * (delta_phi + TAU * n as f64)
        };

        Ok(Self {
            reference: position,
            momentum,
            charge: q,
            b_field,
            pxy,
            radius,
            omega,
            tan_lambda,
            centre,
            phi_ref,
            phi_at_pca,
            phi0,
            d0,
            z0,
        })
    }

    /// Trajectory from canonical parameters; the reference point becomes
    /// the PCA and the charge is the sign of `omega`.
    pub fn from_canonical(params: CanonicalParams, b_field: f64) -> Result<Self, TrajectoryError> {
        let CanonicalParams {
            phi0,
            d0,
            z0,
            omega,
            tan_lambda,
        } = params;
        check_finite(&[phi0, d0, z0, omega, tan_lambda], "canonical parameters")?;
        check_field(b_field)?;
        if omega == 0.0 {
            return Err(TrajectoryError::ZeroOmega);
        }

        let q = omega.signum();
        let radius = 1.0 / omega.abs();
        let reference = [-d0 * phi0.sin(), d0 * phi0.cos(), z0];
        let pxy = FIELD_CONVERSION * b_field * radius;
        let momentum = [pxy * phi0.cos(), pxy * phi0.sin(), tan_lambda * pxy];
        let phi_mom = momentum[1].atan2(momentum[0]);
        let turn = phi_mom + FRAC_PI_2 * q;
        let centre = [
            reference[0] + radius * turn.cos(),
            reference[1] + radius * turn.sin(),
        ];
        let phi_at_pca = (-centre[1]).atan2(-centre[0]);

        Ok(Self {
            reference,
            momentum,
            charge: q,
            b_field,
            pxy,
            radius,
            omega,
            tan_lambda,
            centre,
            phi_ref: phi_at_pca,
            phi_at_pca,
            phi0,
            d0,
            z0,
        })
    }

    pub fn reference(&self) -> [f64; 3] {
        self.reference
    }

    pub fn momentum(&self) -> [f64; 3] {
        self.momentum
    }

    pub fn charge(&self) -> f64 {
        self.charge
    }

    pub fn b_field(&self) -> f64 {
        self.b_field
    }

    pub fn pxy(&self) -> f64 {
        self.pxy
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn centre(&self) -> [f64; 2] {
        self.centre
    }

    pub fn omega(&self) -> f64 {
        self.omega
    }

    pub fn tan_lambda(&self) -> f64 {
        self.tan_lambda
    }

    pub fn phi0(&self) -> f64 {
        self.phi0
    }

    pub fn d0(&self) -> f64 {
        self.d0
    }

    pub fn z0(&self) -> f64 {
        self.z0
    }

    pub fn canonical(&self) -> CanonicalParams {
        CanonicalParams {
            phi0: self.phi0,
            d0: self.d0,
            z0: self.z0,
            omega: self.omega,
            tan_lambda: self.tan_lambda,
        }
    }

    /// Equivalent fitted-form helix, `None` for a trajectory that stays in
    /// one z plane.
    pub fn fitted_params(&self) -> Option<HelixParams> {
        if self.tan_lambda == 0.0 {
            return None;
        }
        let b = 1.0 / (self.charge * self.radius * self.tan_lambda);
        Some(HelixParams {
            x0: self.centre[0],
            y0: self.centre[1],
            r: self.radius,
            b,
            phi0: self.phi_ref - b * self.reference[2],
        })
    }

    /// Distance of `p` from the trajectory, combining the radial residual
    /// with the longitudinal residual at the nearest turn.
    pub fn distance_to_point(&self, p: [f64; 3]) -> f64 {
        match self.fitted_params() {
            Some(h) => distance_helix(p, &h),
            None => {
                let r = (p[0] - self.centre[0]).hypot(p[1] - self.centre[1]);
                (r - self.radius).hypot(p[2] - self.reference[2])
            }
        }
    }

    #[inline]
    fn azimuth(&self, x: f64, y: f64) -> f64 {
        (y - self.centre[1]).atan2(x - self.centre[0])
    }

    /// Path time from `reference` to the azimuth `phi`, moving in the
    /// direction of increasing phase for positive charge.
    fn time_to_azimuth(&self, phi: f64, phi_start: f64) -> f64 {
        let mut dphi = phi - phi_start;
        if dphi < 0.0 && self.charge > 0.0 {
            dphi += TAU;
        } else if dphi > 0.0 && self.charge < 0.0 {
            dphi -= TAU;
        }
        self.charge * dphi * self.radius / self.pxy
    }

    /// First crossing of the transverse line `line_point + s·direction`
    /// after `reference`.
    ///
    /// `direction` need not be normalized. Without an intersection the
    /// result is [`PathPoint::unreachable`].
    pub fn point_in_xy(
        &self,
        line_point: [f64; 2],
        direction: [f64; 2],
        reference: [f64; 3],
    ) -> PathPoint {
        let norm = direction[0].hypot(direction[1]);
        if !norm.is_finite() || norm <= 0.0 {
            return PathPoint::unreachable();
        }
        let ux = direction[0] / norm;
        let uy = direction[1] / norm;

        let dx = line_point[0] - self.centre[0];
        let dy = line_point[1] - self.centre[1];
        let bb = ux * dx + uy * dy;
        let cc = dx * dx + dy * dy - self.radius * self.radius;
        let det = bb * bb - cc;
        if det < 0.0 {
            return PathPoint::unreachable();
        }

        let sq = det.sqrt();
        let candidates = [-bb + sq, -bb - sq].map(|s| {
            let x = line_point[0] + s * ux;
            let y = line_point[1] + s * uy;
            (x, y)
        });
        let phi_start = self.azimuth(reference[0], reference[1]);
        let times = candidates.map(|(x, y)| self.time_to_azimuth(self.azimuth(x, y), phi_start));
        for t in times.iter().filter(|t| **t < 0.0) {
            tracing::warn!(time = *t, "line crossing lies behind the reference point");
        }

        let pick = match (times[0] >= 0.0, times[1] >= 0.0) {
            (true, false) => 0,
            (false, true) => 1,
            _ if times[0] < times[1] => 0,
            _ => 1,
        };
        let (x, y) = candidates[pick];
        let time = times[pick];
        PathPoint {
            time,
            point: [x, y, reference[2] + time * self.momentum[2]],
        }
    }

    /// Crossing of the plane at `z`, starting from `reference`.
    pub fn point_in_z(&self, z: f64, reference: [f64; 3]) -> PathPoint {
        if self.momentum[2] == 0.0 {
            return PathPoint::unreachable();
        }
        let time = (z - reference[2]) / self.momentum[2];
        if time < 0.0 {
            tracing::warn!(time, "z plane lies behind the reference point");
        }
        let phi = self.azimuth(reference[0], reference[1])
            + self.charge * self.pxy * time / self.radius;
        PathPoint {
            time,
            point: [
                self.centre[0] + self.radius * phi.cos(),
                self.centre[1] + self.radius * phi.sin(),
                z,
            ],
        }
    }
}
