//! Residual Kriging
//!
//! Decomposes the spatial field into:
//! ```text
//! Z(x) = m(x) + ε(x)
//! ```
//! where m(x) is a deterministic trend supplied by the caller (for example
//! an OLS polynomial trend surface) and ε(x) is a spatially correlated
//! residual interpolated by Ordinary Kriging.
//!
//! The variogram passed in must describe the residuals, not the raw values.
//! The reported variance is the kriging variance of the residual component;
//! trend-estimation uncertainty is not included.
//!
//! Reference:
//! Hengl, T. et al. (2007). About regression-kriging. Computers & Geosciences.

use geokrige_core::Result;

use super::kriging::{krige, Prediction};
use super::variogram_model::VariogramModel;
use super::SamplePoint;

/// Deterministic trend m(x, y) removed before kriging.
pub trait TrendSurface {
    fn trend_at(&self, x: f64, y: f64) -> f64;
}

impl<F> TrendSurface for F
where
    F: Fn(f64, f64) -> f64,
{
    fn trend_at(&self, x: f64, y: f64) -> f64 {
        self(x, y)
    }
}

/// Residuals ε(xᵢ) = z(xᵢ) − m(xᵢ) at the sample points.
pub fn residuals<T: TrendSurface + ?Sized>(points: &[SamplePoint], trend: &T) -> Vec<SamplePoint> {
    points
        .iter()
        .map(|pt| SamplePoint::new(pt.x, pt.y, pt.value - trend.trend_at(pt.x, pt.y)))
        .collect()
}

/// Krige the trend residuals and add the trend back at every target.
///
/// # Arguments
/// * `points` — Sample points with raw values
/// * `trend` — External trend surface m(x, y)
/// * `residual_model` — Variogram model fitted to the residuals
/// * `targets` — (x, y) locations to predict
///
/// # Errors
/// Same as [`krige`].
pub fn residual_kriging<T: TrendSurface + ?Sized>(
    points: &[SamplePoint],
    trend: &T,
    residual_model: &VariogramModel,
    targets: &[(f64, f64)],
) -> Result<Vec<Prediction>> {
    let eps = residuals(points, trend);
    let kriged = krige(&eps, residual_model, targets)?;

    Ok(kriged
        .into_iter()
        .map(|p| Prediction {
            value: trend.trend_at(p.x, p.y) + p.value,
            ..p
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::variogram_model::VariogramFamily;
    use approx::assert_relative_eq;

    /// A planar trend object, standing in for an external OLS fit
    struct Plane {
        intercept: f64,
        bx: f64,
        by: f64,
    }

    impl TrendSurface for Plane {
        fn trend_at(&self, x: f64, y: f64) -> f64 {
            self.intercept + self.bx * x + self.by * y
        }
    }

    fn sampled_plane_with_bumps() -> Vec<SamplePoint> {
        let mut points = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                let x = i as f64 * 10.0 + (j % 2) as f64 * 3.0;
                let y = j as f64 * 10.0;
                let bump = 2.0 * ((x / 12.0).sin() * (y / 9.0).cos());
                points.push(SamplePoint::new(x, y, 5.0 + 0.5 * x - 0.25 * y + bump));
            }
        }
        points
    }

    #[test]
    fn test_residuals_remove_trend() {
        let points = vec![SamplePoint::new(1.0, 2.0, 10.0), SamplePoint::new(3.0, 4.0, 20.0)];
        let trend = |x: f64, y: f64| x + y;
        let eps = residuals(&points, &trend);
        assert_relative_eq!(eps[0].value, 7.0);
        assert_relative_eq!(eps[1].value, 13.0);
        assert_relative_eq!(eps[1].x, 3.0);
    }

    #[test]
    fn test_exact_at_samples() {
        let points = sampled_plane_with_bumps();
        let trend = Plane {
            intercept: 5.0,
            bx: 0.5,
            by: -0.25,
        };
        let model = VariogramModel::new(VariogramFamily::Exponential, 0.0, 2.0, 30.0).unwrap();
        let targets: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();

        let predictions = residual_kriging(&points, &trend, &model, &targets).unwrap();
        for (p, pt) in predictions.iter().zip(&points) {
            assert_relative_eq!(p.value, pt.value, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_follows_trend_far_from_data() {
        let points = sampled_plane_with_bumps();
        let trend = Plane {
            intercept: 5.0,
            bx: 0.5,
            by: -0.25,
        };
        let model = VariogramModel::new(VariogramFamily::Spherical, 0.1, 2.0, 15.0).unwrap();

        // Beyond the range the residual estimate is the residual mean,
        // so the prediction tracks the trend
        let far = (500.0, 500.0);
        let predictions = residual_kriging(&points, &trend, &model, &[far]).unwrap();
        let expected_trend = trend.trend_at(far.0, far.1);
        assert!(
            (predictions[0].value - expected_trend).abs() < 3.0,
            "far prediction {:.2} should be near the trend {:.2}",
            predictions[0].value,
            expected_trend
        );
        assert!(predictions[0].variance > 2.0);
    }
}
