//! Variogram model fitting
//!
//! Fits each candidate family to an empirical semivariogram by weighted
//! least squares and keeps the family with the lowest weighted residual sum
//! of squares.
//!
//! Each family is fitted in three steps:
//! 1. a heuristic start (nugget from the first lag, partial sill from the
//!    plateau, range from where the plateau is first approached),
//! 2. a coarse grid search over (nugget, sill, range),
//! 3. Levenberg–Marquardt refinement from the better of the two, with the
//!    parameters projected back onto nugget ≥ 0, partial sill ≥ 0,
//!    range ∈ [ε, k·max_lag] after every step.
//!
//! Reference:
//! Cressie, N. (1985). Fitting variogram models by weighted least squares.
//! Mathematical Geology, 17(5), 563-586.
//! Marquardt, D.W. (1963). An algorithm for least-squares estimation of
//! nonlinear parameters. SIAM J. Appl. Math.

use geokrige_core::{Algorithm, Error, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::linalg::solve_dense;
use super::variogram::{EmpiricalSemivariogram, LagBin};
use super::variogram_model::{VariogramFamily, VariogramModel, ZERO_DISTANCE};

/// Minimum number of non-empty lag bins for a three-parameter fit
pub const MIN_FIT_BINS: usize = 3;

/// Lower bound of the Gaussian nugget as a fraction of the largest empirical
/// semivariance. Without it the covariance matrix of a Gaussian model is
/// numerically singular for any moderately dense set of points.
pub const GAUSSIAN_NUGGET_FLOOR: f64 = 1e-4;

/// Weighting of the lag bins in the least-squares objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FitWeighting {
    /// Every bin counts the same
    Uniform,
    /// Weight N(h): bins with more pairs are trusted more
    #[default]
    PairCount,
    /// Weight N(h)/γ(h)² (Cressie 1985), γ taken from the model
    Cressie,
}

/// Parameters for variogram model fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    /// Candidate families (default: spherical, exponential, Gaussian)
    pub families: Vec<VariogramFamily>,
    /// Bin weighting (default: pair count)
    pub weighting: FitWeighting,
    /// Levenberg–Marquardt iteration cap (default 200)
    pub max_iterations: usize,
    /// Upper bound of the range as a multiple of the largest lag distance (default 5)
    pub max_range_factor: f64,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            families: VariogramFamily::ALL.to_vec(),
            weighting: FitWeighting::default(),
            max_iterations: 200,
            max_range_factor: 5.0,
        }
    }
}

impl FitParams {
    pub fn with_families(families: impl Into<Vec<VariogramFamily>>) -> Self {
        Self {
            families: families.into(),
            ..Default::default()
        }
    }
}

/// A fitted variogram model and its goodness of fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedVariogram {
    pub model: VariogramModel,
    /// Weighted residual sum of squares against the empirical points (lower = better)
    pub weighted_sse: f64,
    /// Levenberg–Marquardt iterations spent
    pub iterations: usize,
}

/// Box constraints on (nugget, partial sill, range)
#[derive(Debug, Clone, Copy)]
struct Bounds {
    nugget_min: f64,
    range_min: f64,
    range_max: f64,
}

impl Bounds {
    fn project(&self, theta: [f64; 3]) -> [f64; 3] {
        [
            theta[0].max(self.nugget_min),
            theta[1].max(0.0),
            theta[2].clamp(self.range_min, self.range_max),
        ]
    }
}

fn model_of(family: VariogramFamily, theta: [f64; 3]) -> VariogramModel {
    VariogramModel {
        family,
        nugget: theta[0],
        partial_sill: theta[1],
        range: theta[2],
    }
}

/// Weighted residual of one bin and the factor that scales ∇γ into the
/// residual's gradient.
#[inline]
fn weighted_residual(bin: &LagBin, fitted: f64, weighting: FitWeighting) -> (f64, f64) {
    let n = (bin.pair_count as f64).sqrt();
    match weighting {
        FitWeighting::Uniform => (fitted - bin.semivariance, 1.0),
        FitWeighting::PairCount => (n * (fitted - bin.semivariance), n),
        FitWeighting::Cressie => {
            if fitted > 1e-12 {
                (
                    n * (1.0 - bin.semivariance / fitted),
                    n * bin.semivariance / (fitted * fitted),
                )
            } else {
                let scale = bin.semivariance.max(1e-12);
                (n * (fitted - bin.semivariance) / scale, n / scale)
            }
        }
    }
}

/// Weighted residual sum of squares of `model` against the empirical bins
fn objective(bins: &[LagBin], model: &VariogramModel, weighting: FitWeighting) -> f64 {
    bins.iter()
        .map(|bin| {
            let (r, _) = weighted_residual(bin, model.semivariance(bin.distance), weighting);
            r * r
        })
        .sum()
}

/// Residual vector and Jacobian with respect to (nugget, partial sill, range)
fn linearize(
    bins: &[LagBin],
    model: &VariogramModel,
    weighting: FitWeighting,
) -> (Array1<f64>, Array2<f64>) {
    let m = bins.len();
    let mut r = Array1::<f64>::zeros(m);
    let mut jac = Array2::<f64>::zeros((m, 3));

    for (k, bin) in bins.iter().enumerate() {
        let h = bin.distance;
        let (res, factor) = weighted_residual(bin, model.semivariance(h), weighting);
        r[k] = res;
        if h >= ZERO_DISTANCE {
            jac[[k, 0]] = factor;
            jac[[k, 1]] = factor * model.family.shape(h, model.range);
            jac[[k, 2]] = factor * model.partial_sill * model.family.shape_d_range(h, model.range);
        }
    }
    (r, jac)
}

/// Heuristic start: nugget from the first lag, partial sill from the plateau,
/// range from the first lag that reaches 95% of the plateau.
fn initial_guess(bins: &[LagBin], bounds: &Bounds) -> [f64; 3] {
    let max_sv = bins.iter().map(|b| b.semivariance).fold(0.0, f64::max);
    let nugget = bins[0].semivariance;
    let partial_sill = (max_sv - nugget).max(0.05 * max_sv);
    let range = bins
        .iter()
        .find(|b| b.semivariance >= 0.95 * max_sv)
        .map_or(bounds.range_max, |b| b.distance);
    bounds.project([nugget, partial_sill, range])
}

/// Coarse grid search over (nugget, sill, range); returns the best start.
fn grid_search(
    bins: &[LagBin],
    family: VariogramFamily,
    weighting: FitWeighting,
    bounds: &Bounds,
    max_lag: f64,
) -> ([f64; 3], f64) {
    let max_sv = bins.iter().map(|b| b.semivariance).fold(0.0, f64::max);

    let n_nugget = 10;
    let n_sill = 15;
    let n_range = 20;

    let mut best = [bounds.nugget_min, max_sv, max_lag.clamp(bounds.range_min, bounds.range_max)];
    let mut best_sse = f64::MAX;

    for in_ in 0..=n_nugget {
        let nugget = (max_sv * in_ as f64 / (2.0 * n_nugget as f64)).max(bounds.nugget_min);
        for is in 1..=n_sill {
            let sill = max_sv * is as f64 / 10.0;
            if sill <= nugget {
                continue;
            }
            for ir in 1..=n_range {
                let range = (max_lag * 2.0 * ir as f64 / n_range as f64)
                    .clamp(bounds.range_min, bounds.range_max);
                let theta = [nugget, sill - nugget, range];
                let sse = objective(bins, &model_of(family, theta), weighting);
                if sse < best_sse {
                    best_sse = sse;
                    best = theta;
                }
            }
        }
    }

    (best, best_sse)
}

/// Projected Levenberg–Marquardt with Marquardt diagonal scaling.
/// Returns the refined parameters, their objective and the iteration count.
fn refine(
    bins: &[LagBin],
    family: VariogramFamily,
    weighting: FitWeighting,
    bounds: &Bounds,
    start: [f64; 3],
    max_iterations: usize,
) -> ([f64; 3], f64, usize) {
    let mut theta = bounds.project(start);
    let mut cost = objective(bins, &model_of(family, theta), weighting);
    let mut mu = 1e-3;
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;
        let (r, jac) = linearize(bins, &model_of(family, theta), weighting);
        let jtj = jac.t().dot(&jac);
        let g = jac.t().dot(&r);

        if g.iter().all(|v| v.abs() < 1e-15 * (1.0 + cost)) {
            break;
        }

        let trace = (0..3).map(|i| jtj[[i, i]]).sum::<f64>();
        let floor = 1e-9 * trace.max(1e-300);

        let mut accepted = None;
        while mu < 1e12 {
            let mut damped = jtj.clone();
            for i in 0..3 {
                damped[[i, i]] += mu * jtj[[i, i]].max(floor);
            }
            let step = match solve_dense(damped, g.mapv(|v| -v)) {
                Ok(step) => step,
                Err(_) => {
                    mu *= 10.0;
                    continue;
                }
            };

            let candidate = bounds.project([
                theta[0] + step[0],
                theta[1] + step[1],
                theta[2] + step[2],
            ]);
            let candidate_cost = objective(bins, &model_of(family, candidate), weighting);
            if candidate_cost.is_finite() && candidate_cost < cost {
                accepted = Some((candidate, candidate_cost));
                mu = (mu * 0.1).max(1e-12);
                break;
            }
            mu *= 10.0;
        }

        match accepted {
            Some((candidate, candidate_cost)) => {
                let improvement = (cost - candidate_cost) / cost.max(1e-300);
                theta = candidate;
                cost = candidate_cost;
                if improvement < 1e-12 {
                    break;
                }
            }
            None => break,
        }
    }

    (theta, cost, iterations)
}

/// Fit a single variogram family to an empirical semivariogram.
///
/// # Errors
/// - [`Error::InsufficientData`] for fewer than [`MIN_FIT_BINS`] bins
/// - [`Error::FittingFailure`] if the fit collapses to a zero partial sill
///   or produces non-finite parameters
pub fn fit_family(
    empirical: &EmpiricalSemivariogram,
    family: VariogramFamily,
    params: &FitParams,
) -> Result<FittedVariogram> {
    let bins = &empirical.bins;
    if bins.len() < MIN_FIT_BINS {
        return Err(Error::InsufficientData(format!(
            "need at least {} non-empty lag bins to fit a variogram, got {}",
            MIN_FIT_BINS,
            bins.len()
        )));
    }
    if !(params.max_range_factor.is_finite() && params.max_range_factor > 0.0) {
        return Err(Error::invalid(
            "max_range_factor",
            params.max_range_factor,
            "must be positive",
        ));
    }

    let max_lag = empirical.max_distance();
    if max_lag <= 0.0 {
        return Err(Error::InsufficientData(
            "all lag bins are at zero distance".into(),
        ));
    }
    let max_sv = empirical.max_semivariance();
    if max_sv <= 0.0 {
        return Err(Error::FittingFailure(format!(
            "{}: all semivariance values are zero",
            family
        )));
    }

    let nugget_min = match family {
        VariogramFamily::Gaussian => GAUSSIAN_NUGGET_FLOOR * max_sv,
        VariogramFamily::Spherical | VariogramFamily::Exponential => 0.0,
    };
    let bounds = Bounds {
        nugget_min,
        range_min: 1e-6 * max_lag,
        range_max: params.max_range_factor * max_lag,
    };
    let weighting = params.weighting;

    let heuristic = initial_guess(bins, &bounds);
    let heuristic_sse = objective(bins, &model_of(family, heuristic), weighting);
    let (grid_best, grid_sse) = grid_search(bins, family, weighting, &bounds, max_lag);
    let start = if heuristic_sse <= grid_sse { heuristic } else { grid_best };

    let (theta, weighted_sse, iterations) =
        refine(bins, family, weighting, &bounds, start, params.max_iterations);
    let model = model_of(family, theta);

    if !(weighted_sse.is_finite() && theta.iter().all(|v| v.is_finite())) {
        return Err(Error::FittingFailure(format!(
            "{}: fit produced non-finite parameters",
            family
        )));
    }
    if model.partial_sill <= 1e-12 * max_sv {
        return Err(Error::FittingFailure(format!(
            "{}: partial sill collapsed to zero",
            family
        )));
    }
    if model.range <= 0.0 {
        return Err(Error::FittingFailure(format!("{}: non-positive range", family)));
    }

    tracing::debug!(
        family = %family,
        nugget = model.nugget,
        partial_sill = model.partial_sill,
        range = model.range,
        weighted_sse,
        iterations,
        "fitted variogram family"
    );

    Ok(FittedVariogram {
        model,
        weighted_sse,
        iterations,
    })
}

/// Fit every candidate family; the successful fits ordered by weighted SSE,
/// best first. Ties keep the order of `params.families`.
///
/// # Errors
/// - [`Error::InvalidParameter`] if no candidate family is given
/// - [`Error::InsufficientData`] for fewer than [`MIN_FIT_BINS`] bins
/// - [`Error::FittingFailure`] if no family yields a positive sill and range
pub fn fit_candidates(
    empirical: &EmpiricalSemivariogram,
    params: &FitParams,
) -> Result<Vec<FittedVariogram>> {
    if params.families.is_empty() {
        return Err(Error::invalid(
            "families",
            "[]",
            "need at least one candidate family",
        ));
    }

    let mut fits = Vec::with_capacity(params.families.len());
    let mut rejected = Vec::new();
    for &family in &params.families {
        match fit_family(empirical, family, params) {
            Ok(fitted) => fits.push(fitted),
            Err(Error::FittingFailure(reason)) => rejected.push(reason),
            Err(e) => return Err(e),
        }
    }

    if fits.is_empty() {
        return Err(Error::FittingFailure(rejected.join("; ")));
    }
    fits.sort_by(|a, b| a.weighted_sse.total_cmp(&b.weighted_sse));
    Ok(fits)
}

/// Fit every candidate family and return the one with the lowest weighted SSE.
///
/// # Errors
/// Same as [`fit_candidates`].
pub fn fit_variogram_model(
    empirical: &EmpiricalSemivariogram,
    params: &FitParams,
) -> Result<FittedVariogram> {
    let fitted = fit_candidates(empirical, params)?[0];
    tracing::debug!(model = %fitted.model, "selected variogram model");
    Ok(fitted)
}

/// Best-of-candidates variogram fitter
#[derive(Debug, Clone, Default)]
pub struct VariogramFitter;

impl Algorithm for VariogramFitter {
    type Input = EmpiricalSemivariogram;
    type Output = FittedVariogram;
    type Params = FitParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Variogram Fit"
    }

    fn description(&self) -> &'static str {
        "Weighted least-squares fit of spherical, exponential and Gaussian variogram models"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        fit_variogram_model(&input, &params)
    }
}
