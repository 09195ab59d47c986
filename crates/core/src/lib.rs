//! # geokrige Core
//!
//! Core types and traits shared by the geokrige crates.
//!
//! This crate provides:
//! - `Error` / `Result`: the error type every pipeline stage returns
//! - `GeoTransform`: affine transform between grid cells and world coordinates
//! - `TargetGrid`: regular grid of kriging target locations
//! - `Algorithm`: trait for a consistent algorithm API

pub mod error;
pub mod grid;

pub use error::{Error, Result};
pub use grid::{GeoTransform, TargetGrid};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::grid::{GeoTransform, TargetGrid};
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in geokrige.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
