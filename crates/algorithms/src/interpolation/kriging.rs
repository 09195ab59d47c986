//! Ordinary Kriging interpolation
//!
//! Best Linear Unbiased Estimator (BLUE) for spatial data. Uses a fitted
//! variogram model to compute optimal interpolation weights that minimize
//! estimation variance while satisfying an unbiasedness constraint.
//!
//! The kriging system for n sample points, in covariance form:
//! ```text
//! [C(x₁,x₁) ... C(x₁,xₙ) 1] [λ₁]   [C(x₁,x₀)]
//! [   ...     ...    ...    .]  [. ] = [   ...    ]
//! [C(xₙ,x₁) ... C(xₙ,xₙ) 1] [λₙ]   [C(xₙ,x₀)]
//! [  1       ...    1       0] [μ ]   [    1     ]
//! ```
//! where C(h) = σ² − γ(h), x₀ is the target location and μ is the Lagrange
//! multiplier ensuring Σλᵢ = 1.
//!
//! The bordered system is never assembled. C does not depend on the target,
//! so it is Cholesky-factored once and C·a = 1 is solved once; each target
//! then needs one solve C·b = c₀ and
//! ```text
//! μ = (1ᵀb − 1) / (1ᵀa),   λ = b − μ·a
//! ẑ₀ = λᵀz,                σ²(x₀) = σ² − λᵀc₀ − μ
//! ```
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use geokrige_core::{Algorithm, Error, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::maybe_rayon::*;

use super::linalg::Cholesky;
use super::variogram_model::VariogramModel;
use super::{validate_points, SamplePoint};

/// Cholesky pivots at or below this fraction of the total sill are singular
pub const PIVOT_TOLERANCE: f64 = 1e-10;

/// Negative variances above `-VARIANCE_TOLERANCE · σ²` are round-off and
/// are zeroed without a warning
pub const VARIANCE_TOLERANCE: f64 = 1e-12;

/// Observations closer than this (relative to the coordinate magnitude)
/// share a location
const DUPLICATE_TOLERANCE: f64 = 1e-12;

/// Kriging prediction at one target location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub x: f64,
    pub y: f64,
    /// Predicted value ẑ
    pub value: f64,
    /// Kriging (prediction) variance, always ≥ 0
    pub variance: f64,
    /// The raw variance came out negative and was clamped to zero
    pub variance_clamped: bool,
}

/// Kriging weights for one target
#[derive(Debug, Clone, PartialEq)]
pub struct KrigingWeights {
    /// Weight of each observation
    pub lambda: Array1<f64>,
    /// Lagrange multiplier of the Σλ = 1 constraint
    pub mu: f64,
}

impl KrigingWeights {
    /// Σλᵢ; equals 1 up to round-off
    pub fn sum(&self) -> f64 {
        self.lambda.sum()
    }
}

/// Ordinary kriging system with the observation covariance already factored.
///
/// Built once per run; [`OrdinaryKriging::predict`] can then be called for
/// any number of targets, including from several threads.
#[derive(Debug, Clone)]
pub struct OrdinaryKriging<'a> {
    points: &'a [SamplePoint],
    model: VariogramModel,
    values: Array1<f64>,
    factor: Cholesky,
    /// a = C⁻¹·1
    ones_solution: Array1<f64>,
    /// 1ᵀ·C⁻¹·1
    ones_total: f64,
}

impl<'a> OrdinaryKriging<'a> {
    /// Build and factor the covariance matrix of `points` under `model`.
    ///
    /// # Errors
    /// - [`Error::InsufficientData`] for fewer than 2 points
    /// - [`Error::InvalidParameter`] for non-finite points, an invalid model
    ///   or a zero total sill
    /// - [`Error::DegenerateInput`] if two observations share a location or
    ///   the covariance matrix is numerically singular
    pub fn new(points: &'a [SamplePoint], model: &VariogramModel) -> Result<Self> {
        let n = points.len();
        if n < 2 {
            return Err(Error::InsufficientData(format!(
                "kriging requires at least 2 sample points, got {}",
                n
            )));
        }
        validate_points(points)?;
        model.validate()?;
        let sill = model.sill();
        if sill <= 0.0 {
            return Err(Error::invalid("sill", sill, "total sill must be positive"));
        }

        check_duplicates(points)?;

        // C[i][j] = σ² − γ(h_ij), diagonal σ²
        let mut cov = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            cov[[i, i]] = sill;
            for j in (i + 1)..n {
                let h = points[i].dist(points[j].x, points[j].y);
                let c = model.covariance(h);
                cov[[i, j]] = c;
                cov[[j, i]] = c;
            }
        }

        let factor = Cholesky::factor(&cov, PIVOT_TOLERANCE * sill)?;
        let ones_solution = factor.solve(Array1::<f64>::ones(n).view());
        let ones_total = ones_solution.sum();
        if !(ones_total.is_finite() && ones_total > 0.0) {
            return Err(Error::degenerate(format!(
                "unbiasedness constraint is ill-conditioned (1ᵀC⁻¹1 = {:.3e})",
                ones_total
            )));
        }

        let values = points.iter().map(|p| p.value).collect::<Array1<f64>>();

        tracing::debug!(observations = n, model = %model, "factored kriging covariance matrix");

        Ok(Self {
            points,
            model: *model,
            values,
            factor,
            ones_solution,
            ones_total,
        })
    }

    /// Covariance vector c₀ between the observations and (x, y)
    fn covariance_vector(&self, x: f64, y: f64) -> Array1<f64> {
        self.points
            .iter()
            .map(|p| self.model.covariance(p.dist(x, y)))
            .collect()
    }

    fn solve_target(&self, cov_target: &Array1<f64>) -> KrigingWeights {
        let b = self.factor.solve(cov_target.view());
        let mu = (b.sum() - 1.0) / self.ones_total;
        let lambda = b - &(&self.ones_solution * mu);
        KrigingWeights { lambda, mu }
    }

    /// Kriging weights for target (x, y)
    pub fn weights(&self, x: f64, y: f64) -> KrigingWeights {
        self.solve_target(&self.covariance_vector(x, y))
    }

    /// Prediction and kriging variance at (x, y)
    pub fn predict(&self, x: f64, y: f64) -> Prediction {
        let cov_target = self.covariance_vector(x, y);
        let w = self.solve_target(&cov_target);

        let value = w.lambda.dot(&self.values);
        let sill = self.model.sill();
        let raw = sill - w.lambda.dot(&cov_target) - w.mu;

        let (variance, variance_clamped) = clamp_variance(raw, sill);
        if variance_clamped {
            tracing::warn!(x, y, raw_variance = raw, "negative kriging variance clamped to zero");
        }

        Prediction {
            x,
            y,
            value,
            variance,
            variance_clamped,
        }
    }

    /// Predict every target. Targets are independent, so they are solved in
    /// parallel against the shared factor when the `parallel` feature is on.
    pub fn predict_all(&self, targets: &[(f64, f64)]) -> Vec<Prediction> {
        targets
            .par_iter()
            .map(|&(x, y)| self.predict(x, y))
            .collect()
    }
}

/// Clamp a raw kriging variance at zero. Returns the variance and whether it
/// was negative beyond round-off.
fn clamp_variance(raw: f64, sill: f64) -> (f64, bool) {
    if raw >= 0.0 {
        (raw, false)
    } else if raw >= -VARIANCE_TOLERANCE * sill {
        (0.0, false)
    } else {
        (0.0, true)
    }
}

/// Reject observations that share a location; they make C singular.
fn check_duplicates(points: &[SamplePoint]) -> Result<()> {
    let scale = points
        .iter()
        .map(|p| p.x.abs().max(p.y.abs()))
        .fold(1.0_f64, f64::max);
    let tol = DUPLICATE_TOLERANCE * scale;

    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            if points[i].dist(points[j].x, points[j].y) <= tol {
                return Err(Error::degenerate(format!(
                    "observations {} and {} share location ({}, {})",
                    i, j, points[i].x, points[i].y
                )));
            }
        }
    }
    Ok(())
}

fn validate_targets(targets: &[(f64, f64)]) -> Result<()> {
    if let Some((i, &(x, y))) = targets
        .iter()
        .enumerate()
        .find(|(_, (x, y))| !(x.is_finite() && y.is_finite()))
    {
        return Err(Error::invalid(
            "targets",
            format!("#{} = ({}, {})", i, x, y),
            "target coordinates must be finite",
        ));
    }
    Ok(())
}

/// Perform Ordinary Kriging at a set of target locations.
///
/// # Arguments
/// * `points` — Sample points with (x, y, value)
/// * `model` — Variogram model (e.g. from [`fit_variogram_model`](super::fit_variogram_model))
/// * `targets` — (x, y) locations to predict
///
/// # Returns
/// One [`Prediction`] per target, in target order.
///
/// # Errors
/// See [`OrdinaryKriging::new`]; non-finite targets are rejected as
/// [`Error::InvalidParameter`].
pub fn krige(
    points: &[SamplePoint],
    model: &VariogramModel,
    targets: &[(f64, f64)],
) -> Result<Vec<Prediction>> {
    validate_targets(targets)?;
    let system = OrdinaryKriging::new(points, model)?;
    Ok(system.predict_all(targets))
}

/// Input bundle for the [`Kriging`] algorithm
#[derive(Debug, Clone)]
pub struct KrigingInput {
    pub points: Vec<SamplePoint>,
    pub model: VariogramModel,
    pub targets: Vec<(f64, f64)>,
}

/// Ordinary kriging
#[derive(Debug, Clone, Default)]
pub struct Kriging;

impl Algorithm for Kriging {
    type Input = KrigingInput;
    type Output = Vec<Prediction>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Ordinary Kriging"
    }

    fn description(&self) -> &'static str {
        "Best linear unbiased prediction with kriging variance from a variogram model"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        krige(&input.points, &input.model, &input.targets)
    }
}
