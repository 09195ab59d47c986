//! Estimate → fit → krige in one call

use geokrige_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::kriging::{krige, Prediction};
use super::variogram::{estimate_semivariogram, BinPolicy, EmpiricalSemivariogram};
use super::variogram_fit::{fit_candidates, FitParams, FittedVariogram};
use super::SamplePoint;

/// Parameters for [`auto_krige`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoKrigingParams {
    /// Lag binning for the empirical semivariogram
    pub bins: BinPolicy,
    /// Candidate families and weighting for the model fit
    pub fit: FitParams,
}

/// Everything produced by one automatic kriging run
#[derive(Debug, Clone)]
pub struct AutoKriging {
    pub empirical: EmpiricalSemivariogram,
    pub fitted: FittedVariogram,
    pub predictions: Vec<Prediction>,
}

/// Estimate the empirical semivariogram, fit the candidate models and krige
/// the targets with the best one.
///
/// A fitted model whose covariance matrix turns out singular for these
/// points is skipped in favour of the next-best fit.
///
/// # Errors
/// The first error of the estimation or fitting stage, or of kriging with
/// the last candidate when every candidate is degenerate.
pub fn auto_krige(
    points: &[SamplePoint],
    params: &AutoKrigingParams,
    targets: &[(f64, f64)],
) -> Result<AutoKriging> {
    let empirical = estimate_semivariogram(points, &params.bins)?;
    let candidates = fit_candidates(&empirical, &params.fit)?;
    tracing::info!(bins = empirical.len(), candidates = candidates.len(), "variogram fitted");

    let (fitted, predictions) = krige_first_usable(points, candidates, targets)?;
    tracing::info!(targets = predictions.len(), model = %fitted.model, "kriging complete");

    Ok(AutoKriging {
        empirical,
        fitted,
        predictions,
    })
}

/// Krige with the first candidate whose covariance matrix can be factored.
fn krige_first_usable(
    points: &[SamplePoint],
    candidates: Vec<FittedVariogram>,
    targets: &[(f64, f64)],
) -> Result<(FittedVariogram, Vec<Prediction>)> {
    let mut last_err = None;
    for fitted in candidates {
        match krige(points, &fitted.model, targets) {
            Ok(predictions) => return Ok((fitted, predictions)),
            Err(err @ Error::DegenerateInput { .. }) => {
                tracing::warn!(model = %fitted.model, error = %err, "model rejected, trying next fit");
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or_else(|| Error::FittingFailure("no candidate model".into())))
}
