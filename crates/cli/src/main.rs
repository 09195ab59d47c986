//! geokrige CLI - variogram fitting and ordinary kriging of point data

mod table;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geokrige_algorithms::interpolation::{
    auto_krige, estimate_semivariogram, fit_variogram_model, krige, leave_one_out,
    AutoKrigingParams, BinPolicy, Cutoff, EmpiricalSemivariogram, FitParams, FitWeighting,
    FittedVariogram, SamplePoint, VariogramFamily, VariogramModel,
};
use geokrige_core::TargetGrid;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geokrige")]
#[command(author, version, about = "Variogram fitting and ordinary kriging", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the empirical semivariogram and fit a model
    Variogram {
        /// Input points (x,y,value)
        input: PathBuf,
        #[command(flatten)]
        fit: FitArgs,
        /// Save the fitted model as JSON
        #[arg(short, long)]
        model_out: Option<PathBuf>,
    },
    /// Predict values and kriging variances at target locations
    Krige {
        /// Input points (x,y,value)
        input: PathBuf,
        /// Output file (x,y,prediction,variance)
        output: PathBuf,
        /// Target locations (x,y)
        #[arg(short, long, conflicts_with_all = ["rows", "cols"])]
        targets: Option<PathBuf>,
        /// Grid rows
        #[arg(long, requires = "cols")]
        rows: Option<usize>,
        /// Grid columns
        #[arg(long, requires = "rows")]
        cols: Option<usize>,
        /// Grid bounds as minx,miny,maxx,maxy (default: bounding box of the points)
        #[arg(short, long, requires = "rows")]
        bounds: Option<String>,
        /// Variogram model JSON; fitted from the points when absent
        #[arg(short, long)]
        model: Option<PathBuf>,
        #[command(flatten)]
        fit: FitArgs,
    },
    /// Leave-one-out cross-validation
    Cv {
        /// Input points (x,y,value)
        input: PathBuf,
        /// Variogram model JSON; fitted from the points when absent
        #[arg(short, long)]
        model: Option<PathBuf>,
        #[command(flatten)]
        fit: FitArgs,
    },
}

/// Binning and model fitting options
#[derive(Args)]
struct FitArgs {
    /// Number of uniform lag bins
    #[arg(short, long, default_value = "15")]
    lags: usize,
    /// Maximum lag distance. Overrides the default one-third cutoff.
    #[arg(long, conflicts_with = "cutoff_fraction")]
    cutoff: Option<f64>,
    /// Maximum lag as a fraction of the largest pairwise distance (default 1/3).
    /// Small datasets may have too few pairs within the default cutoff; use a
    /// larger fraction or an explicit --cutoff.
    #[arg(long)]
    cutoff_fraction: Option<f64>,
    /// Candidate families: spherical, exponential, gaussian
    #[arg(short, long, value_delimiter = ',', default_value = "spherical,exponential,gaussian")]
    families: Vec<VariogramFamily>,
    /// Bin weighting: uniform, pairs, cressie
    #[arg(short, long, default_value = "pairs")]
    weighting: String,
}

impl FitArgs {
    fn bin_policy(&self) -> BinPolicy {
        let cutoff = match (self.cutoff, self.cutoff_fraction) {
            (Some(d), _) => Cutoff::Distance(d),
            (None, Some(f)) => Cutoff::Fraction(f),
            (None, None) => Cutoff::default(),
        };
        BinPolicy::uniform(self.lags, cutoff)
    }

    fn fit_params(&self) -> Result<FitParams> {
        Ok(FitParams {
            families: self.families.clone(),
            weighting: parse_weighting(&self.weighting)?,
            ..Default::default()
        })
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_points(path: &Path) -> Result<Vec<SamplePoint>> {
    let points = table::read_points(path)?;
    info!("Input: {} points", points.len());
    Ok(points)
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_weighting(s: &str) -> Result<FitWeighting> {
    match s.to_lowercase().as_str() {
        "uniform" | "ols" => Ok(FitWeighting::Uniform),
        "pairs" | "npairs" | "pair-count" => Ok(FitWeighting::PairCount),
        "cressie" => Ok(FitWeighting::Cressie),
        _ => anyhow::bail!("Unknown weighting: {}. Use uniform, pairs, or cressie.", s),
    }
}

fn parse_bounds(s: &str) -> Result<(f64, f64, f64, f64)> {
    let parts = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().context("Invalid bound"))
        .collect::<Result<Vec<f64>>>()?;
    if parts.len() != 4 {
        anyhow::bail!("Bounds must be 'minx,miny,maxx,maxy', got: {}", s);
    }
    Ok((parts[0], parts[1], parts[2], parts[3]))
}

fn points_bounds(points: &[SamplePoint]) -> (f64, f64, f64, f64) {
    points.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(min_x, min_y, max_x, max_y), p| {
            (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
        },
    )
}

fn load_model(path: &Path) -> Result<VariogramModel> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let model: VariogramModel =
        serde_json::from_reader(BufReader::new(file)).context("Failed to parse model JSON")?;
    model.validate().context("Invalid variogram model")?;
    info!("Model: {}", model);
    Ok(model)
}

fn save_model(model: &VariogramModel, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), model).context("Failed to write model")?;
    Ok(())
}

fn fit_model(
    points: &[SamplePoint],
    fit: &FitArgs,
) -> Result<(EmpiricalSemivariogram, FittedVariogram)> {
    let pb = spinner("Fitting variogram...");
    let empirical = estimate_semivariogram(points, &fit.bin_policy())
        .context("Failed to estimate semivariogram")?;
    let fitted = fit_variogram_model(&empirical, &fit.fit_params()?)
        .context("Failed to fit variogram model")?;
    pb.finish_and_clear();
    info!("Model: {} (weighted SSE {:.6})", fitted.model, fitted.weighted_sse);
    Ok((empirical, fitted))
}

fn print_semivariogram(empirical: &EmpiricalSemivariogram, model: &VariogramModel) {
    println!("{:>12} {:>14} {:>14} {:>8}", "distance", "semivariance", "model", "pairs");
    for bin in empirical.iter() {
        println!(
            "{:>12.4} {:>14.6} {:>14.6} {:>8}",
            bin.distance,
            bin.semivariance,
            model.semivariance(bin.distance),
            bin.pair_count
        );
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Variogram ────────────────────────────────────────────────
        Commands::Variogram {
            input,
            fit,
            model_out,
        } => {
            let points = read_points(&input)?;
            let (empirical, fitted) = fit_model(&points, &fit)?;

            print_semivariogram(&empirical, &fitted.model);
            println!("\nModel: {}", fitted.model);
            println!("  Weighted SSE: {:.6}", fitted.weighted_sse);
            println!("  Iterations: {}", fitted.iterations);

            if let Some(path) = model_out {
                save_model(&fitted.model, &path)?;
                println!("Model saved to: {}", path.display());
            }
        }

        // ── Krige ────────────────────────────────────────────────────
        Commands::Krige {
            input,
            output,
            targets,
            rows,
            cols,
            bounds,
            model,
            fit,
        } => {
            let points = read_points(&input)?;
            let targets = match (targets, rows, cols) {
                (Some(path), _, _) => table::read_targets(&path)?,
                (None, Some(rows), Some(cols)) => {
                    let bounds = match bounds {
                        Some(b) => parse_bounds(&b)?,
                        None => points_bounds(&points),
                    };
                    TargetGrid::covering(bounds, rows, cols)
                        .context("Invalid target grid")?
                        .targets()
                }
                _ => anyhow::bail!("Either --targets or --rows and --cols is required"),
            };
            info!("Targets: {}", targets.len());

            let start = Instant::now();
            let predictions = match model {
                Some(path) => {
                    let model = load_model(&path)?;
                    let pb = spinner("Kriging...");
                    let predictions = krige(&points, &model, &targets).context("Kriging failed")?;
                    pb.finish_and_clear();
                    predictions
                }
                None => {
                    let params = AutoKrigingParams {
                        bins: fit.bin_policy(),
                        fit: fit.fit_params()?,
                    };
                    let pb = spinner("Fitting variogram and kriging...");
                    let result = auto_krige(&points, &params, &targets).context("Kriging failed")?;
                    pb.finish_and_clear();
                    info!("Model: {}", result.fitted.model);
                    result.predictions
                }
            };
            let elapsed = start.elapsed();

            table::save_predictions(&output, &predictions)?;
            done("Kriging", &output, elapsed);
        }

        // ── Cross-validation ─────────────────────────────────────────
        Commands::Cv { input, model, fit } => {
            let points = read_points(&input)?;
            let model = match model {
                Some(path) => load_model(&path)?,
                None => fit_model(&points, &fit)?.1.model,
            };

            let pb = spinner("Cross-validating...");
            let cv = leave_one_out(&points, &model).context("Cross-validation failed")?;
            pb.finish_and_clear();

            println!("Leave-one-out cross-validation ({} points)", cv.points.len());
            println!("  Model: {}", model);
            println!("  Mean error: {:.6}", cv.mean_error);
            println!("  RMSE: {:.6}", cv.rmse);
            if cv.msse.is_finite() {
                println!("  MSSE: {:.4}", cv.msse);
            } else {
                println!("  MSSE: undefined (all variances zero)");
            }
        }
    }

    Ok(())
}
