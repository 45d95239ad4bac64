//! terrasurf CLI - terrain surfaces from survey points

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use terrasurf_algorithms::interpolation::{
    idw_monitored, optimize_power, ordinary_kriging_monitored, IdwConfig, InterpolationResult,
    KrigingConfig, PowerSearch, VariogramModel, VariogramParams, VariogramSpec,
};
use terrasurf_algorithms::points::{clean_points_monitored, CleaningOptions};
use terrasurf_algorithms::triangulation::{
    triangulate_monitored, ContourOptions, LandXmlOptions, TriangulationConfig,
};
use terrasurf_algorithms::validation::{
    assess_quality, compare_methods_monitored, cross_validate_monitored, identify_problem_areas,
    CrossValidationConfig, CrossValidationResult, InterpolationMethod, ProblemArea, QualityConfig,
    QualityReport, ValidationStrategy,
};
use terrasurf_core::{BoundingBox, GridConfig, GridStatistics, Monitor, Progress, SurveyPoint};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "terrasurf")]
#[command(author, version, about = "Terrain surface reconstruction from survey points", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove invalid, duplicate and outlier points
    Clean {
        /// Input JSON array of points ({x, y, z, id?})
        input: PathBuf,
        /// Output JSON file for the cleaned points
        output: PathBuf,
        /// Planar distance under which points are duplicates
        #[arg(long, default_value = "0.001")]
        duplicate_tolerance: f64,
        /// Standard deviations beyond which an elevation is an outlier
        #[arg(long, default_value = "3.0")]
        outlier_threshold: f64,
        /// Keep duplicate points
        #[arg(long)]
        keep_duplicates: bool,
        /// Keep elevation outliers
        #[arg(long)]
        keep_outliers: bool,
    },
    /// Build a Delaunay TIN and report its statistics
    Tin {
        /// Input JSON array of points
        input: PathBuf,
        /// Drop triangles with an edge longer than this
        #[arg(long)]
        max_edge_length: Option<f64>,
        /// Drop triangles smaller than this area
        #[arg(long)]
        min_area: Option<f64>,
        /// Write the surface as LandXML 1.2
        #[arg(long)]
        landxml: Option<PathBuf>,
        /// Surface name in the LandXML document
        #[arg(long, default_value = "terrasurf")]
        surface_name: String,
        /// Contour interval; contours are written to --contours
        #[arg(long)]
        contour_interval: Option<f64>,
        /// Output JSON file for contours
        #[arg(long, default_value = "contours.json")]
        contours: PathBuf,
    },
    /// Inverse Distance Weighting onto a grid
    Idw {
        input: PathBuf,
        /// Output JSON grid
        output: PathBuf,
        #[command(flatten)]
        grid: GridArgs,
        #[command(flatten)]
        idw: IdwArgs,
    },
    /// Ordinary Kriging onto a grid, with kriging variance
    Kriging {
        input: PathBuf,
        /// Output JSON grid
        output: PathBuf,
        #[command(flatten)]
        grid: GridArgs,
        #[command(flatten)]
        kriging: KrigingArgs,
    },
    /// Cross-validate one method and assess its quality
    Validate {
        input: PathBuf,
        #[arg(long, value_enum, default_value = "idw")]
        method: MethodArg,
        #[command(flatten)]
        idw: IdwArgs,
        #[command(flatten)]
        kriging: KrigingArgs,
        #[command(flatten)]
        validation: ValidationArgs,
        /// JSON file overriding the quality thresholds
        #[arg(long)]
        quality_config: Option<PathBuf>,
        /// Write the full report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Cross-validate IDW and kriging on the same folds and recommend one
    Compare {
        input: PathBuf,
        #[command(flatten)]
        idw: IdwArgs,
        #[command(flatten)]
        kriging: KrigingArgs,
        #[command(flatten)]
        validation: ValidationArgs,
        /// Write the comparison as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Choose the IDW power with the lowest cross-validated RMSE
    OptimizePower {
        input: PathBuf,
        /// Comma-separated candidate powers
        #[arg(long, value_delimiter = ',', default_values_t = [1.0, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0])]
        candidates: Vec<f64>,
        #[command(flatten)]
        idw: IdwArgs,
        #[command(flatten)]
        validation: ValidationArgs,
    },
}

#[derive(Args)]
struct GridArgs {
    /// Cell size
    #[arg(short, long)]
    resolution: f64,
    /// Grow the point extent by this distance on every side
    #[arg(long, default_value = "0.0")]
    margin: f64,
    /// Sentinel for cells without data
    #[arg(long, default_value = "-9999.0", allow_hyphen_values = true)]
    no_data: f64,
}

#[derive(Args)]
struct IdwArgs {
    /// IDW power parameter
    #[arg(long, default_value = "2.0")]
    power: f64,
    /// IDW search radius (unlimited when omitted)
    #[arg(long)]
    idw_radius: Option<f64>,
    /// IDW nearest neighbors per estimate
    #[arg(long, default_value = "12")]
    idw_max_neighbors: usize,
    /// IDW smoothing length
    #[arg(long)]
    smoothing: Option<f64>,
}

#[derive(Args)]
struct KrigingArgs {
    /// Variogram model; fitted automatically when omitted
    #[arg(long, value_enum)]
    model: Option<ModelArg>,
    #[arg(long, default_value = "0.0")]
    nugget: f64,
    /// Sill of the fixed model
    #[arg(long)]
    sill: Option<f64>,
    /// Range of the fixed model
    #[arg(long)]
    range: Option<f64>,
    /// Kriging search radius (unlimited when omitted)
    #[arg(long)]
    kriging_radius: Option<f64>,
    /// Kriging nearest neighbors per system
    #[arg(long, default_value = "16")]
    kriging_max_neighbors: usize,
    /// Experimental variogram bins
    #[arg(long, default_value = "12")]
    lags: usize,
    /// Seed for the variogram sample
    #[arg(long)]
    kriging_seed: Option<u64>,
}

#[derive(Args)]
struct ValidationArgs {
    #[arg(long, value_enum, default_value = "loo")]
    strategy: StrategyArg,
    /// Leave-one-out sample size
    #[arg(long, default_value = "200")]
    max_points: usize,
    /// Number of folds
    #[arg(short, long, default_value = "5")]
    k: usize,
    /// Random split repetitions
    #[arg(long, default_value = "5")]
    iterations: usize,
    /// Random split test share
    #[arg(long, default_value = "0.2")]
    test_fraction: f64,
    /// Seed for fold assignment
    #[arg(long)]
    seed: Option<u64>,
    /// Flag residuals larger than this
    #[arg(long)]
    threshold: Option<f64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Idw,
    Kriging,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelArg {
    Spherical,
    Exponential,
    Gaussian,
    Linear,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Loo,
    Kfold,
    Split,
}

impl From<ModelArg> for VariogramModel {
    fn from(m: ModelArg) -> Self {
        match m {
            ModelArg::Spherical => VariogramModel::Spherical,
            ModelArg::Exponential => VariogramModel::Exponential,
            ModelArg::Gaussian => VariogramModel::Gaussian,
            ModelArg::Linear => VariogramModel::Linear,
        }
    }
}

impl IdwArgs {
    fn config(&self) -> IdwConfig {
        IdwConfig {
            power: self.power,
            search_radius: self.idw_radius,
            max_neighbors: self.idw_max_neighbors,
            smoothing: self.smoothing,
            ..Default::default()
        }
    }
}

impl KrigingArgs {
    fn config(&self) -> Result<KrigingConfig> {
        let variogram = match self.model {
            None => VariogramSpec::Auto,
            Some(model) => {
                let sill = self.sill.context("--sill is required with --model")?;
                let range = self.range.context("--range is required with --model")?;
                VariogramSpec::Fixed(VariogramParams::new(model.into(), self.nugget, sill, range))
            }
        };
        Ok(KrigingConfig {
            variogram,
            search_radius: self.kriging_radius,
            max_neighbors: self.kriging_max_neighbors,
            lag_count: self.lags,
            seed: self.kriging_seed,
            ..Default::default()
        })
    }
}

impl ValidationArgs {
    fn config(&self) -> CrossValidationConfig {
        let strategy = match self.strategy {
            StrategyArg::Loo => ValidationStrategy::LeaveOneOut {
                max_points: self.max_points,
            },
            StrategyArg::Kfold => ValidationStrategy::KFold { k: self.k },
            StrategyArg::Split => ValidationStrategy::RandomSplit {
                iterations: self.iterations,
                test_fraction: self.test_fraction,
            },
        };
        CrossValidationConfig {
            strategy,
            seed: self.seed,
            error_threshold: self.threshold,
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:>18.cyan} [{bar:40.green/white}] {pos:>3}% {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

fn read_points(path: &Path) -> Result<Vec<SurveyPoint>> {
    let pb = spinner("Reading points...")?;
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let points: Vec<SurveyPoint> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse points from {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} points", points.len());
    Ok(points)
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).context("Failed to write JSON")?;
    writer.flush()?;
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

/// Run `f` with a monitor that drives a progress bar.
fn with_progress<T>(f: impl FnOnce(&Monitor<'_>) -> terrasurf_core::Result<T>) -> Result<T> {
    let pb = progress_bar()?;
    let callback = |p: Progress| {
        pb.set_prefix(p.stage.to_string());
        pb.set_position(p.percent.round() as u64);
        pb.set_message(p.message);
    };
    let monitor = Monitor::none().with_progress(&callback);
    let result = f(&monitor);
    pb.finish_and_clear();
    Ok(result?)
}

/// Grid written by the `idw` and `kriging` commands
#[derive(Serialize)]
struct GridOutput<'a> {
    method: &'static str,
    width: usize,
    height: usize,
    bounds: BoundingBox,
    resolution: f64,
    no_data_value: f64,
    statistics: GridStatistics,
    fallback_cells: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    variogram: Option<&'a VariogramParams>,
    /// Row-major from the southern row
    values: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    variance: Option<Vec<f32>>,
}

impl<'a> From<&'a InterpolationResult> for GridOutput<'a> {
    fn from(r: &'a InterpolationResult) -> Self {
        Self {
            method: r.method.label(),
            width: r.width,
            height: r.height,
            bounds: r.bounds,
            resolution: r.resolution,
            no_data_value: r.no_data_value(),
            statistics: r.statistics,
            fallback_cells: r.fallback_cells,
            variogram: r.variogram.as_ref(),
            values: r.to_f32_vec(),
            variance: r.variance_grid.as_ref().map(|g| g.to_f32_vec()),
        }
    }
}

fn print_grid_summary(result: &InterpolationResult) {
    let s = &result.statistics;
    println!("{} grid: {} x {}", result.method.label(), result.width, result.height);
    println!("  Valid cells: {} ({} without data)", s.valid_cells, s.invalid_cells);
    println!("  Elevation: {:.3} .. {:.3} (mean {:.3}, std {:.3})", s.min, s.max, s.mean, s.std_dev);
    if let Some(v) = &result.variogram {
        println!(
            "  Variogram: {} nugget {:.4} sill {:.4} range {:.3}",
            v.model.name(),
            v.nugget,
            v.sill,
            v.range
        );
    }
    if result.fallback_cells > 0 {
        println!("  Singular systems (nearest neighbor fallback): {}", result.fallback_cells);
    }
}

/// Quality thresholds from `path` (defaults for missing fields), validated.
fn load_quality_config(path: Option<&Path>) -> Result<QualityConfig> {
    let config = match path {
        None => QualityConfig::default(),
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse quality config from {}", path.display()))?
        }
    };
    config.validate().context("Invalid quality config")?;
    Ok(config)
}

fn grid_for(points: &[SurveyPoint], args: &GridArgs) -> Result<GridConfig> {
    Ok(GridConfig::covering(points, args.resolution, args.margin)
        .context("Invalid grid")?
        .with_no_data(args.no_data))
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Clean ────────────────────────────────────────────────────
        Commands::Clean {
            input,
            output,
            duplicate_tolerance,
            outlier_threshold,
            keep_duplicates,
            keep_outliers,
        } => {
            let raw = read_points(&input)?;
            let start = Instant::now();
            let options = CleaningOptions {
                remove_duplicates: !keep_duplicates,
                duplicate_tolerance,
                remove_outliers: !keep_outliers,
                outlier_threshold,
            };
            let cleaned = with_progress(|m| Ok(clean_points_monitored(&raw, &options, m)))?;
            let elapsed = start.elapsed();

            let s = &cleaned.statistics;
            println!("Points: {} in, {} kept", s.input_count, s.valid_count);
            println!(
                "  Invalid: {}  Duplicates: {}  Outliers: {}",
                s.invalid_count, s.duplicates_removed, s.outliers_removed
            );
            if s.valid_count > 0 {
                println!(
                    "  Elevation: {:.3} .. {:.3} (mean {:.3}, std {:.3})",
                    s.min_z, s.max_z, s.mean_z, s.std_dev_z
                );
            }
            for w in &cleaned.warnings {
                tracing::debug!("{}", w.message);
            }
            write_json(&cleaned.points, &output)?;
            done("Cleaned points", &output, elapsed);
        }

        // ── TIN ──────────────────────────────────────────────────────
        Commands::Tin {
            input,
            max_edge_length,
            min_area,
            landxml,
            surface_name,
            contour_interval,
            contours,
        } => {
            let points = read_points(&input)?;
            let config = TriangulationConfig {
                max_edge_length,
                min_triangle_area: min_area,
            };
            let tin = with_progress(|m| triangulate_monitored(&points, &config, m))?;

            let s = &tin.statistics;
            println!("TIN: {} points, {} triangles, {} edges", s.point_count, s.triangle_count, s.edge_count);
            println!("  Hull edges: {}  Filtered triangles: {}", s.hull_edge_count, s.filtered_triangles);
            println!(
                "  Area: {:.3} (triangle min {:.4}, max {:.4}, mean {:.4})",
                s.total_area, s.min_area, s.max_area, s.mean_area
            );
            println!("  Processing time: {:.2?}", s.compute_time);

            let surface = tin.surface_statistics();
            println!(
                "  Slope: {:.2}° .. {:.2}° (mean {:.2}°), {} flat triangles",
                surface.min_slope, surface.max_slope, surface.mean_slope, surface.flat_count
            );
            for band in &surface.slope_bands {
                println!("    {:<12} {:>7} ({:5.1}%)", band.class.label(), band.count, band.percent);
            }
            let sectors: Vec<String> = surface
                .aspect_sectors
                .iter()
                .map(|c| format!("{:?}={:.0}%", c.class, c.percent))
                .collect();
            println!("  Aspect: {}", sectors.join(" "));

            if let Some(path) = landxml {
                let options = LandXmlOptions {
                    surface_name,
                    description: Some(format!("{} points from {}", points.len(), input.display())),
                };
                let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
                tin.write_landxml(BufWriter::new(file), &options)
                    .context("Failed to write LandXML")?;
                println!("LandXML saved to: {}", path.display());
            }

            if let Some(interval) = contour_interval {
                let sets = tin
                    .contours(&ContourOptions { interval, base: 0.0 })
                    .context("Contour generation failed")?;
                let lines: usize = sets.iter().map(|s| s.polylines.len()).sum();
                info!("{} contour levels, {} polylines", sets.len(), lines);
                write_json(&sets, &contours)?;
                println!("Contours saved to: {}", contours.display());
            }
        }

        // ── IDW ──────────────────────────────────────────────────────
        Commands::Idw {
            input,
            output,
            grid,
            idw,
        } => {
            let points = read_points(&input)?;
            let grid = grid_for(&points, &grid)?;
            let config = idw.config();
            let start = Instant::now();
            let result = with_progress(|m| idw_monitored(&points, &config, &grid, m))?;
            let elapsed = start.elapsed();

            print_grid_summary(&result);
            write_json(&GridOutput::from(&result), &output)?;
            done("IDW grid", &output, elapsed);
        }

        // ── Kriging ──────────────────────────────────────────────────
        Commands::Kriging {
            input,
            output,
            grid,
            kriging,
        } => {
            let points = read_points(&input)?;
            let grid = grid_for(&points, &grid)?;
            let config = kriging.config()?;
            let start = Instant::now();
            let result = with_progress(|m| ordinary_kriging_monitored(&points, &config, &grid, m))?;
            let elapsed = start.elapsed();

            print_grid_summary(&result);
            write_json(&GridOutput::from(&result), &output)?;
            done("Kriging grid", &output, elapsed);
        }

        // ── Validate ─────────────────────────────────────────────────
        Commands::Validate {
            input,
            method,
            idw,
            kriging,
            validation,
            quality_config,
            report,
        } => {
            let quality_config = load_quality_config(quality_config.as_deref())?;
            let points = read_points(&input)?;
            let method = match method {
                MethodArg::Idw => InterpolationMethod::Idw(idw.config()),
                MethodArg::Kriging => InterpolationMethod::Kriging(kriging.config()?),
            };
            let config = validation.config();
            let cv = with_progress(|m| cross_validate_monitored(&points, &method, &config, m))?;
            let quality = assess_quality(&cv, &quality_config);

            let mt = &cv.metrics;
            println!(
                "{} {} validation: {} points ({} unpredicted, {} folds skipped)",
                method.label(),
                config.strategy.label(),
                mt.validation_points,
                cv.unpredicted,
                cv.skipped_folds.len()
            );
            println!(
                "  RMSE {:.4}  MAE {:.4}  Max {:.4}  R² {:.4}  MBE {:+.4}",
                mt.rmse, mt.mae, mt.max_error, mt.r2, mt.mbe
            );
            println!(
                "  Quality: {:.1} ({}), {}",
                quality.score,
                quality.rating.label(),
                if quality.passed { "passed" } else { "failed" }
            );
            for issue in &quality.issues {
                println!("  [{:?}] {}", issue.severity, issue.message);
            }
            for suggestion in &quality.suggestions {
                println!("  - {suggestion}");
            }

            let problems = config
                .error_threshold
                .map(|t| identify_problem_areas(&cv, t))
                .unwrap_or_default();
            for p in problems.iter().take(10) {
                println!(
                    "  {:?} error {:.3} at ({:.2}, {:.2}): actual {:.3}, predicted {:.3}",
                    p.severity, p.error, p.x, p.y, p.actual, p.predicted
                );
            }

            if let Some(path) = report {
                #[derive(Serialize)]
                struct Report<'a> {
                    validation: &'a CrossValidationResult,
                    quality: &'a QualityReport,
                    problem_areas: &'a [ProblemArea],
                }
                write_json(
                    &Report {
                        validation: &cv,
                        quality: &quality,
                        problem_areas: &problems,
                    },
                    &path,
                )?;
                println!("Report saved to: {}", path.display());
            }
        }

        // ── Compare ──────────────────────────────────────────────────
        Commands::Compare {
            input,
            idw,
            kriging,
            validation,
            report,
        } => {
            let points = read_points(&input)?;
            let (idw, kriging, config) = (idw.config(), kriging.config()?, validation.config());
            let cmp = with_progress(|m| compare_methods_monitored(&points, &idw, &kriging, &config, m))?;

            for s in [&cmp.idw, &cmp.kriging] {
                let mt = &s.validation.metrics;
                println!(
                    "{:<8} score {:5.1}  RMSE {:.4}  R² {:.4}  ({} points)",
                    s.method.label(),
                    s.score,
                    mt.rmse,
                    mt.r2,
                    mt.validation_points
                );
            }
            println!("Recommended: {}", cmp.recommended.label());
            println!("  {}", cmp.justification);

            if let Some(path) = report {
                write_json(&cmp, &path)?;
                println!("Comparison saved to: {}", path.display());
            }
        }

        // ── Optimize power ───────────────────────────────────────────
        Commands::OptimizePower {
            input,
            candidates,
            idw,
            validation,
        } => {
            let points = read_points(&input)?;
            let search = PowerSearch {
                candidates,
                validation: validation.config(),
            };
            let pb = spinner("Validating candidate powers...")?;
            let result = optimize_power(&points, &idw.config(), &search);
            pb.finish_and_clear();
            let result = result?;

            for s in &result.results {
                let marker = if s.power == result.best_power { "*" } else { " " };
                println!(
                    "{marker} power {:>5.2}  RMSE {:.4}  R² {:.4}  ({} points)",
                    s.power, s.metrics.rmse, s.metrics.r2, s.metrics.validation_points
                );
            }
            println!("Best power: {} (RMSE {:.4})", result.best_power, result.best_rmse);
        }
    }

    Ok(())
}
