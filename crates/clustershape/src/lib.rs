//! Shape descriptors and helix fits for weighted 3D hit
//! clusters.
//!
//! The analysis stages are:
//!
//! 1. **Sample** – validated, immutable weighted hits ([`WeightedPointSample`]).
//! 2. **Shape** – centroid, inertia eigen-decomposition, width and equivalent
//!    ellipsoid, evaluated lazily by [`ClusterShape`].
//! 3. **Profile** – log-linear longitudinal shower-profile regression along
//!    the principal axis.
//! 4. **Helix** – closed-form seed through three hits refined by damped least
//!    squares against all hits, with a winding-aware hit distance.
//! 5. **Trajectory** – analytic charged-particle helix from momentum or
//!    canonical track parameters, with line and plane crossings.

pub mod helix;
pub mod numeric;
pub mod profile;
pub mod sample;
pub mod shape;
pub mod trajectory;

#[cfg(test)]
pub(crate) mod test_utils;

pub use helix::{
    fit_helix, try_fit_helix, HelixFit, HelixFitConfig, HelixFitError, HelixFitMode,
    HelixFitStatus, HelixParams, HelixSeed, HelixSolver,
};
pub use profile::{ProfileError, ProfileFit, ProfileParams};
pub use sample::{Hit, HitArrays, SampleError, WeightedPointSample};
pub use shape::{ClusterShape, Ellipsoid, Gravity, Inertia, Quantity, ShapeSummary};
pub use trajectory::{CanonicalParams, HelixTrajectory, PathPoint, TrajectoryError};
