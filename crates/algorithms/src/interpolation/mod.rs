//! Geostatistical interpolation
//!
//! Predict values at unsampled locations from scattered observations:
//! - Variogram: empirical semivariogram estimation
//! - Variogram models: spherical, exponential and Gaussian families
//! - Variogram fitting: weighted least squares over candidate families
//! - Ordinary Kriging: BLUE prediction with kriging variance
//! - Residual Kriging: external trend + OK on residuals
//! - Cross-validation: leave-one-out diagnostics
//! - Pipeline: estimate → fit → krige

mod cross_validation;
pub mod kriging;
mod linalg;
mod pipeline;
mod residual_kriging;
pub mod variogram;
pub mod variogram_fit;
pub mod variogram_model;

pub use cross_validation::{leave_one_out, CrossValidation, CrossValidationPoint};
pub use kriging::{krige, Kriging, KrigingInput, KrigingWeights, OrdinaryKriging, Prediction};
pub use pipeline::{auto_krige, AutoKriging, AutoKrigingParams};
pub use residual_kriging::{residual_kriging, residuals, TrendSurface};
pub use variogram::{
    estimate_semivariogram, BinPolicy, Cutoff, EmpiricalSemivariogram, LagBin,
    SemivariogramEstimator,
};
pub use variogram_fit::{
    fit_candidates, fit_family, fit_variogram_model, FitParams, FitWeighting, FittedVariogram,
    VariogramFitter,
};
pub use variogram_model::{VariogramFamily, VariogramModel};

use geokrige_core::{Error, Result};

/// A sample point with x, y coordinates and a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    /// Squared Euclidean distance to another point
    #[inline]
    pub fn dist_sq(&self, other_x: f64, other_y: f64) -> f64 {
        let dx = self.x - other_x;
        let dy = self.y - other_y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn dist(&self, other_x: f64, other_y: f64) -> f64 {
        self.dist_sq(other_x, other_y).sqrt()
    }
}

/// Reject non-finite coordinates or values.
pub(crate) fn validate_points(points: &[SamplePoint]) -> Result<()> {
    for (i, pt) in points.iter().enumerate() {
        if !(pt.x.is_finite() && pt.y.is_finite() && pt.value.is_finite()) {
            return Err(Error::invalid(
                "points",
                format!("#{} = ({}, {}, {})", i, pt.x, pt.y, pt.value),
                "coordinates and values must be finite",
            ));
        }
    }
    Ok(())
}

/// Largest pairwise distance among the points (0 for fewer than 2).
pub(crate) fn max_pairwise_distance(points: &[SamplePoint]) -> f64 {
    let mut max_dist = 0.0_f64;
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let d = points[i].dist(points[j].x, points[j].y);
            if d > max_dist {
                max_dist = d;
            }
        }
    }
    max_dist
}
