//! Leave-one-out cross-validation for kriging
//!
//! Each observation is predicted from all the others with the same
//! variogram model. The errors show how well the model predicts, and the
//! standardized errors show whether the kriging variance is calibrated.
//!
//! Summary statistics:
//! ```text
//! ME   = (1/n) Σ (ẑᵢ − zᵢ)              mean error, ≈ 0 when unbiased
//! RMSE = sqrt((1/n) Σ (ẑᵢ − zᵢ)²)
//! MSSE = (1/n) Σ (ẑᵢ − zᵢ)² / σ²ᵢ       ≈ 1 when the variance is calibrated
//! ```

use geokrige_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::kriging::OrdinaryKriging;
use super::variogram_model::VariogramModel;
use super::SamplePoint;

/// Outcome for one held-out observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationPoint {
    pub x: f64,
    pub y: f64,
    pub observed: f64,
    pub predicted: f64,
    pub variance: f64,
}

impl CrossValidationPoint {
    /// Prediction error ẑ − z
    pub fn error(&self) -> f64 {
        self.predicted - self.observed
    }
}

/// Leave-one-out cross-validation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidation {
    pub points: Vec<CrossValidationPoint>,
    pub mean_error: f64,
    pub rmse: f64,
    /// Mean standardized squared error; `NaN` if every variance is zero
    pub msse: f64,
}

/// Leave-one-out cross-validation of `model` on `points`.
///
/// # Errors
/// - [`Error::InsufficientData`] for fewer than 3 points (each fold needs 2)
/// - Any error of [`OrdinaryKriging::new`] on a fold
pub fn leave_one_out(points: &[SamplePoint], model: &VariogramModel) -> Result<CrossValidation> {
    let n = points.len();
    if n < 3 {
        return Err(Error::InsufficientData(format!(
            "leave-one-out needs at least 3 points, got {}",
            n
        )));
    }

    let mut results = Vec::with_capacity(n);
    let mut fold: Vec<SamplePoint> = Vec::with_capacity(n - 1);
    for (i, held_out) in points.iter().enumerate() {
        fold.clear();
        fold.extend(
            points
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, p)| *p),
        );

        let system = OrdinaryKriging::new(&fold, model)?;
        let p = system.predict(held_out.x, held_out.y);
        results.push(CrossValidationPoint {
            x: held_out.x,
            y: held_out.y,
            observed: held_out.value,
            predicted: p.value,
            variance: p.variance,
        });
    }

    let nf = n as f64;
    let mean_error = results.iter().map(|r| r.error()).sum::<f64>() / nf;
    let rmse = (results.iter().map(|r| r.error().powi(2)).sum::<f64>() / nf).sqrt();

    let standardized: Vec<f64> = results
        .iter()
        .filter(|r| r.variance > 0.0)
        .map(|r| r.error().powi(2) / r.variance)
        .collect();
    let msse = if standardized.is_empty() {
        f64::NAN
    } else {
        standardized.iter().sum::<f64>() / standardized.len() as f64
    };

    tracing::debug!(points = n, mean_error, rmse, msse, "leave-one-out cross-validation");

    Ok(CrossValidation {
        points: results,
        mean_error,
        rmse,
        msse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::variogram_model::VariogramFamily;
    use approx::assert_relative_eq;

    fn grid_points(f: impl Fn(f64, f64) -> f64) -> Vec<SamplePoint> {
        let mut points = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                let (x, y) = (i as f64 * 10.0, j as f64 * 10.0);
                points.push(SamplePoint::new(x, y, f(x, y)));
            }
        }
        points
    }

    #[test]
    fn test_constant_field_has_no_error() {
        let points = grid_points(|_, _| 7.0);
        let model = VariogramModel::new(VariogramFamily::Exponential, 0.1, 1.0, 30.0).unwrap();
        let cv = leave_one_out(&points, &model).unwrap();

        assert_eq!(cv.points.len(), 25);
        assert_relative_eq!(cv.mean_error, 0.0, epsilon = 1e-9);
        assert_relative_eq!(cv.rmse, 0.0, epsilon = 1e-9);
        assert!(cv.points.iter().all(|p| p.variance > 0.0));
    }

    #[test]
    fn test_smooth_field_is_predicted_well() {
        let points = grid_points(|x, y| (x / 20.0).sin() + (y / 20.0).cos());
        let model = VariogramModel::new(VariogramFamily::Gaussian, 0.001, 1.0, 60.0).unwrap();
        let cv = leave_one_out(&points, &model).unwrap();

        let spread = 2.0;
        assert!(cv.rmse < 0.25 * spread, "rmse {:.4}", cv.rmse);
        assert!(cv.msse.is_finite());
    }

    #[test]
    fn test_too_few_points() {
        let points = vec![SamplePoint::new(0.0, 0.0, 1.0), SamplePoint::new(1.0, 0.0, 2.0)];
        let model = VariogramModel::new(VariogramFamily::Exponential, 0.0, 1.0, 3.0).unwrap();
        assert!(matches!(
            leave_one_out(&points, &model).unwrap_err(),
            Error::InsufficientData(_)
        ));
    }
}
