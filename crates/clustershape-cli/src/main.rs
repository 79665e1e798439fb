//! Command-line interface: shape moments, profile and helix fits over JSON hit files.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};

use clustershape::{
    ClusterShape, HelixFitConfig, HelixFitMode, HelixSolver, HelixTrajectory, HitArrays,
    PathPoint, ProfileFit, ShapeSummary, WeightedPointSample,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "clustershape")]
#[command(about = "Shape descriptors and helix fits for weighted 3D hit clusters")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute shape moments (and optionally the longitudinal profile).
    Shape(CliShapeArgs),

    /// Fit a helix through the hits.
    Helix(CliHelixArgs),

    /// Build an analytic trajectory and query plane/line crossings.
    Trajectory(CliTrajectoryArgs),
}

#[derive(Debug, Clone, Args)]
struct CliOutputArgs {
    /// Path to write results (JSON). Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliShapeArgs {
    /// Hit file: JSON object with `weights`, `x`, `y`, `z` arrays.
    #[arg(long)]
    hits: PathBuf,

    /// Also fit the longitudinal shower profile.
    #[arg(long)]
    profile: bool,

    #[command(flatten)]
    output: CliOutputArgs,
}

#[derive(Debug, Clone, Args)]
struct CliHelixArgs {
    /// Hit file: JSON object with `weights`, `x`, `y`, `z` arrays.
    #[arg(long)]
    hits: PathBuf,

    /// Helix fit configuration (JSON). Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report the closed-form seed without refinement.
    #[arg(long)]
    seed_only: bool,

    /// Refinement backend.
    #[arg(long, value_enum)]
    solver: Option<SolverArg>,

    /// Maximum solver iterations.
    #[arg(long)]
    max_iters: Option<usize>,

    #[command(flatten)]
    output: CliOutputArgs,
}

#[derive(Debug, Clone, Args)]
struct CliTrajectoryArgs {
    /// Reference position `x,y,z`.
    #[arg(long, required = true, value_delimiter = ',', num_args = 3, allow_hyphen_values = true)]
    position: Vec<f64>,

    /// Momentum `px,py,pz`.
    #[arg(long, required = true, value_delimiter = ',', num_args = 3, allow_hyphen_values = true)]
    momentum: Vec<f64>,

    /// Particle charge (only the sign is used).
    #[arg(long, allow_hyphen_values = true)]
    charge: f64,

    /// Field magnitude along z.
    #[arg(long)]
    bfield: f64,

    /// Query the crossing with this z plane.
    #[arg(long, allow_hyphen_values = true)]
    z_plane: Option<f64>,

    /// Query the crossing with the transverse line `x,y,dx,dy`.
    #[arg(long, value_delimiter = ',', num_args = 4, allow_hyphen_values = true)]
    line: Option<Vec<f64>>,

    #[command(flatten)]
    output: CliOutputArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SolverArg {
    Lm,
    TinySolver,
}

impl SolverArg {
    fn to_core(self) -> HelixSolver {
        match self {
            Self::Lm => HelixSolver::Lm,
            Self::TinySolver => HelixSolver::TinySolver,
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Shape(args) => run_shape(&args),
        Commands::Helix(args) => run_helix(&args),
        Commands::Trajectory(args) => run_trajectory(&args),
    }
}

fn load_sample(path: &Path) -> CliResult<WeightedPointSample> {
    tracing::info!("Loading hits: {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|e| -> CliError {
        format!("Failed to read hits {}: {}", path.display(), e).into()
    })?;
    let arrays: HitArrays = serde_json::from_str(&text)?;
    let sample = WeightedPointSample::try_from(arrays)?;
    tracing::info!("Loaded {} hits", sample.len());
    Ok(sample)
}

fn write_output<T: Serialize>(output: &CliOutputArgs, value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    match &output.out {
        Some(path) => {
            std::fs::write(path, &json)?;
            tracing::info!("Results written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

// ── shape ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ShapeReport {
    shape: ShapeSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<ProfileFit>,
}

fn run_shape(args: &CliShapeArgs) -> CliResult<()> {
    let shape = ClusterShape::new(load_sample(&args.hits)?);
    let summary = shape.summary();
    tracing::info!(
        "Centroid ({:.3}, {:.3}, {:.3}), width {:.3}",
        summary.gravity.centroid[0],
        summary.gravity.centroid[1],
        summary.gravity.centroid[2],
        summary.width,
    );

    let profile = if args.profile {
        let fit = shape.fit_profile()?;
        tracing::info!(
            "Profile a={:.4} b={:.4} c={:.4} d={:.4} chi2={:.4}",
            fit.params.a,
            fit.params.b,
            fit.params.c,
            fit.params.d,
            fit.chi2,
        );
        Some(fit)
    } else {
        None
    };

    write_output(
        &args.output,
        &ShapeReport {
            shape: summary,
            profile,
        },
    )
}

// ── helix ──────────────────────────────────────────────────────────────

fn load_helix_config(args: &CliHelixArgs) -> CliResult<HelixFitConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| -> CliError {
                format!("Failed to read config {}: {}", path.display(), e).into()
            })?;
            serde_json::from_str(&text)?
        }
        None => HelixFitConfig::default(),
    };
    if args.seed_only {
        cfg.mode = HelixFitMode::SeedOnly;
    }
    if let Some(solver) = args.solver {
        cfg.solver = solver.to_core();
    }
    if let Some(max_iters) = args.max_iters {
        cfg.max_iters = max_iters;
    }
    Ok(cfg)
}

fn run_helix(args: &CliHelixArgs) -> CliResult<()> {
    let cfg = load_helix_config(args)?;
    let shape = ClusterShape::new(load_sample(&args.hits)?);
    let fit = shape.try_fit_helix(&cfg)?;

    tracing::info!(
        "Helix {:?}: x0={:.3} y0={:.3} r={:.3} b={:.5} phi0={:.4} chi2={:.4} ({} iterations)",
        fit.status,
        fit.params.x0,
        fit.params.y0,
        fit.params.r,
        fit.params.b,
        fit.params.phi0,
        fit.chi2,
        fit.iterations,
    );

    write_output(&args.output, &fit)
}

// ── trajectory ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct TrajectoryReport {
    trajectory: HelixTrajectory,
    canonical: clustershape::CanonicalParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    z_crossing: Option<PathPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line_crossing: Option<PathPoint>,
}

fn run_trajectory(args: &CliTrajectoryArgs) -> CliResult<()> {
    let to3 = |v: &[f64]| [v[0], v[1], v[2]];
    let traj = HelixTrajectory::from_momentum(
        to3(&args.position),
        to3(&args.momentum),
        args.charge,
        args.bfield,
    )?;
    tracing::info!(
        "Trajectory radius {:.3}, d0 {:.4}, z0 {:.4}",
        traj.radius(),
        traj.d0(),
        traj.z0()
    );

    let reference = traj.reference();
    let z_crossing = args.z_plane.map(|z| traj.point_in_z(z, reference));
    let line_crossing = args
        .line
        .as_deref()
        .map(|l| traj.point_in_xy([l[0], l[1]], [l[2], l[3]], reference));
    for p in z_crossing.iter().chain(line_crossing.iter()) {
        if !p.is_reachable() {
            tracing::warn!("Requested crossing is not reachable");
        }
    }

    write_output(
        &args.output,
        &TrajectoryReport {
            trajectory: traj,
            canonical: traj.canonical(),
            z_crossing,
            line_crossing,
        },
    )
}
