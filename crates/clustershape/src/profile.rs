//! Longitudinal shower-profile regression along the principal axis.
//!
//! Model: `A(ℓ, t) = a · ℓ^b · exp(−c·ℓ − d·t)`, linearized as
//! `ln a + b·ln ℓ − c·ℓ − d·t = ln w` and solved through its 4×4 normal
//! equations.

use nalgebra::{Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::numeric::solve_4x4;
use crate::sample::Hit;
use crate::shape::ClusterShape;

/// Offset added to the longitudinal coordinate so that `ln ℓ` stays finite
/// for the start hit.
pub const LONGITUDINAL_OFFSET: f64 = 0.001;
/// Pad added under the transverse square root.
pub const TRANSVERSE_PAD: f64 = 0.1;

/// Errors from the profile fit.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileError {
    /// The normal equations have no unique solution.
    SingularSystem,
}

impl std::fmt::Display for ProfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingularSystem => write!(f, "profile normal equations are singular"),
        }
    }
}

impl std::error::Error for ProfileError {}

/// Shower-profile coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl ProfileParams {
    /// Model amplitude at longitudinal `l` and transverse `t`.
    #[inline]
    pub fn amplitude(&self, l: f64, t: f64) -> f64 {
        self.a * l.powf(self.b) * (-self.c * l - self.d * t).exp()
    }
}

/// Result of [`fit_profile`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileFit {
    pub params: ProfileParams,
    /// Relative chi-square per degree of freedom.
    pub chi2: f64,
    /// Point on the principal axis level with the rearmost hit.
    pub start: [f64; 3],
}

/// Per-hit profile coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileCoords {
    /// Longitudinal distance from the start point (offset included).
    pub l: f64,
    /// Transverse distance from the axis through the start point.
    pub t: f64,
}

/// Start point: centroid shifted along `axis` to the smallest signed
/// projection of any hit.
pub fn profile_start(hits: &[Hit], centroid: [f64; 3], axis: [f64; 3]) -> [f64; 3] {
    let c = Vector3::from(centroid);
    let a = Vector3::from(axis);
    let a_norm = a.norm();
    let prod_min = hits
        .iter()
        .map(|h| project(Vector3::from(h.position()) - c, a, a_norm))
        .fold(f64::INFINITY, f64::min);
    (c + a * prod_min).into()
}

#[inline]
fn project(x: Vector3<f64>, axis: Vector3<f64>, axis_norm: f64) -> f64 {
    if axis_norm > 0.0 {
        x.dot(&axis) / axis_norm
    } else {
        0.0
    }
}

/// Longitudinal/transverse coordinates of every hit relative to `start`.
pub fn profile_coords(hits: &[Hit], start: [f64; 3], axis: [f64; 3]) -> Vec<ProfileCoords> {
    let s = Vector3::from(start);
    let a = Vector3::from(axis);
    let a_norm = a.norm();
    hits.iter()
        .map(|h| {
            let x = Vector3::from(h.position()) - s;
            let l = LONGITUDINAL_OFFSET + project(x, a, a_norm);
            let t = (x.norm_squared() + TRANSVERSE_PAD - l * l).max(0.0).sqrt();
            ProfileCoords { l, t }
        })
        .collect()
}

/// `Σ((A(ℓ,t) − w)/w)² / max(1, N − 4)`.
pub fn chi2(hits: &[Hit], coords: &[ProfileCoords], params: &ProfileParams) -> f64 {
    let sum: f64 = hits
        .iter()
        .zip(coords)
        .map(|(h, pc)| {
            let r = (params.amplitude(pc.l, pc.t) - h.w) / h.w;
            r * r
        })
        .sum();
    let dof = (hits.len() as f64 - 4.0).max(1.0);
    sum / dof
}

/// Fit the profile model to `hits` around the given axis.
pub fn fit_profile(
    hits: &[Hit],
    centroid: [f64; 3],
    axis: [f64; 3],
) -> Result<ProfileFit, ProfileError> {
    let start = profile_start(hits, centroid, axis);
    let coords = profile_coords(hits, start, axis);

    let mut s_lnl = 0.0;
    let mut s_l = 0.0;
    let mut s_t = 0.0;
    let mut s_ln2l = 0.0;
    let mut s_l_lnl = 0.0;
    let mut s_t_lnl = 0.0;
    let mut s_ll = 0.0;
    let mut s_lt = 0.0;
    let mut s_tt = 0.0;
    let mut s_lna = 0.0;
    let mut s_lna_lnl = 0.0;
    let mut s_lna_l = 0.0;
    let mut s_lna_t = 0.0;
    for (h, pc) in hits.iter().zip(&coords) {
        let lnl = pc.l.ln();
        let lna = h.w.ln();
        s_lnl += lnl;
        s_l += pc.l;
        s_t += pc.t;
        s_ln2l += lnl * lnl;
        s_l_lnl += pc.l * lnl;
        s_t_lnl += pc.t * lnl;
        s_ll += pc.l * pc.l;
        s_lt += pc.l * pc.t;
        s_tt += pc.t * pc.t;
        s_lna += lna;
        s_lna_lnl += lna * lnl;
        s_lna_l += lna * pc.l;
        s_lna_t += lna * pc.t;
    }

    let n = hits.len() as f64;
    #[rustfmt::skip]
    let a = Matrix4::new(
        n,      s_lnl,    -s_l,     -s_t,
        s_lnl,  s_ln2l,   -s_l_lnl, -s_t_lnl,
        -s_l,   -s_l_lnl, s_ll,     s_lt,
        -s_t,   -s_t_lnl, s_lt,     s_tt,
    );
    let z = Vector4::new(s_lna, s_lna_lnl, -s_lna_l, -s_lna_t);
    let e = solve_4x4(&a, &z).ok_or(ProfileError::SingularSystem)?;

    let params = ProfileParams {
        a: e[0].exp(),
        b: e[1],
        c: e[2],
        d: e[3],
    };
    let chi2 = chi2(hits, &coords, &params);
    tracing::debug!(?params, chi2, "longitudinal profile fitted");

    Ok(ProfileFit {
        params,
        chi2,
        start,
    })
}

impl ClusterShape {
    /// Fit the longitudinal profile along this cluster's principal axis.
    pub fn fit_profile(&self) -> Result<ProfileFit, ProfileError> {
        fit_profile(
            self.sample().hits(),
            *self.centroid(),
            self.principal_axis(),
        )
    }

    /// Chi-square of externally supplied coefficients, with the same
    /// coordinates [`ClusterShape::fit_profile`] would use.
    pub fn profile_chi2(&self, params: &ProfileParams) -> f64 {
        let hits = self.sample().hits();
        let axis = self.principal_axis();
        let start = profile_start(hits, *self.centroid(), axis);
        let coords = profile_coords(hits, start, axis);
        chi2(hits, &coords, params)
    }
}
