//! # geokrige Algorithms
//!
//! Geostatistical interpolation for scattered point data.
//!
//! The `interpolation` category is a one-way pipeline:
//!
//! - **variogram**: empirical semivariogram estimation with configurable binning
//! - **variogram_model** / **variogram_fit**: parametric models and
//!   best-of-candidates least-squares fitting
//! - **kriging**: ordinary kriging with a covariance factor shared by all targets
//! - **residual_kriging**: kriging of residuals from an external trend surface
//! - **cross_validation**: leave-one-out diagnostics for a fitted model
//! - **pipeline**: estimate → fit → krige in one call

pub mod interpolation;
pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::interpolation::{
        auto_krige, estimate_semivariogram, fit_variogram_model, krige, leave_one_out,
        residual_kriging, AutoKriging, AutoKrigingParams, BinPolicy, Cutoff,
        EmpiricalSemivariogram, FitParams, FittedVariogram, OrdinaryKriging, Prediction,
        SamplePoint, TrendSurface, VariogramFamily, VariogramModel,
    };
    pub use geokrige_core::prelude::*;
}
