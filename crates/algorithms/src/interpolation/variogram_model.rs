//! Theoretical variogram models
//!
//! Closed-form semivariance functions used by the fitter and by kriging.
//! `range` is the practical range a: the structured part reaches its full
//! (spherical) or ~95% (exponential, Gaussian) contribution at h = a.
//!
//! Reference:
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.
//! Webster, R. & Oliver, M.A. (2007). Geostatistics for Environmental Scientists.

use std::fmt;
use std::str::FromStr;

use geokrige_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Distances below this are treated as zero separation
pub(crate) const ZERO_DISTANCE: f64 = 1e-15;

/// Theoretical variogram family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariogramFamily {
    /// Spherical model: γ(h) = c₀ + c·[1.5(h/a) - 0.5(h/a)³] for h ≤ a; c₀+c for h > a
    Spherical,
    /// Exponential model: γ(h) = c₀ + c·[1 - exp(-3h/a)]
    Exponential,
    /// Gaussian model: γ(h) = c₀ + c·[1 - exp(-3h²/a²)]
    Gaussian,
}

impl VariogramFamily {
    pub const ALL: [VariogramFamily; 3] = [
        VariogramFamily::Spherical,
        VariogramFamily::Exponential,
        VariogramFamily::Gaussian,
    ];

    /// Unit-sill structure function s(h; a), rising from 0 to 1.
    #[inline]
    pub fn shape(&self, h: f64, range: f64) -> f64 {
        match self {
            VariogramFamily::Spherical => {
                if h >= range {
                    1.0
                } else {
                    let hr = h / range;
                    1.5 * hr - 0.5 * hr * hr * hr
                }
            }
            VariogramFamily::Exponential => 1.0 - (-3.0 * h / range).exp(),
            VariogramFamily::Gaussian => 1.0 - (-3.0 * h * h / (range * range)).exp(),
        }
    }

    /// ∂s/∂a, used for the analytic Jacobian when fitting.
    #[inline]
    pub(crate) fn shape_d_range(&self, h: f64, range: f64) -> f64 {
        match self {
            VariogramFamily::Spherical => {
                if h >= range {
                    0.0
                } else {
                    let a2 = range * range;
                    -1.5 * h / a2 + 1.5 * h * h * h / (a2 * a2)
                }
            }
            VariogramFamily::Exponential => {
                -(-3.0 * h / range).exp() * 3.0 * h / (range * range)
            }
            VariogramFamily::Gaussian => {
                let a2 = range * range;
                -(-3.0 * h * h / a2).exp() * 6.0 * h * h / (a2 * range)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VariogramFamily::Spherical => "spherical",
            VariogramFamily::Exponential => "exponential",
            VariogramFamily::Gaussian => "gaussian",
        }
    }
}

impl fmt::Display for VariogramFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariogramFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sph" | "spherical" => Ok(VariogramFamily::Spherical),
            "exp" | "exponential" => Ok(VariogramFamily::Exponential),
            "gau" | "gauss" | "gaussian" => Ok(VariogramFamily::Gaussian),
            other => Err(Error::invalid(
                "family",
                other,
                "expected spherical, exponential or gaussian",
            )),
        }
    }
}

/// Variogram model: a family plus nugget, partial sill and range.
///
/// Invariant: nugget ≥ 0, partial sill ≥ 0, range > 0. Use [`VariogramModel::new`]
/// to construct a checked model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariogramModel {
    pub family: VariogramFamily,
    /// Nugget (c₀): semivariance at h → 0⁺ (measurement error + micro-scale variation)
    pub nugget: f64,
    /// Partial sill (c): variance contributed by the spatial structure
    pub partial_sill: f64,
    /// Practical range (a)
    pub range: f64,
}

impl VariogramModel {
    pub fn new(family: VariogramFamily, nugget: f64, partial_sill: f64, range: f64) -> Result<Self> {
        let model = Self {
            family,
            nugget,
            partial_sill,
            range,
        };
        model.validate()?;
        Ok(model)
    }

    /// Check the parameter invariants.
    pub fn validate(&self) -> Result<()> {
        if !(self.nugget.is_finite() && self.nugget >= 0.0) {
            return Err(Error::invalid("nugget", self.nugget, "must be finite and >= 0"));
        }
        if !(self.partial_sill.is_finite() && self.partial_sill >= 0.0) {
            return Err(Error::invalid(
                "partial_sill",
                self.partial_sill,
                "must be finite and >= 0",
            ));
        }
        if !(self.range.is_finite() && self.range > 0.0) {
            return Err(Error::invalid("range", self.range, "must be finite and > 0"));
        }
        Ok(())
    }

    /// Total sill σ² = nugget + partial sill
    #[inline]
    pub fn sill(&self) -> f64 {
        self.nugget + self.partial_sill
    }

    /// Semivariance γ(h). γ(0) = 0; the nugget applies for any h > 0.
    #[inline]
    pub fn semivariance(&self, h: f64) -> f64 {
        if h < ZERO_DISTANCE {
            return 0.0;
        }
        self.nugget + self.partial_sill * self.family.shape(h, self.range)
    }

    /// Covariance C(h) = σ² − γ(h)
    #[inline]
    pub fn covariance(&self, h: f64) -> f64 {
        self.sill() - self.semivariance(h)
    }
}

impl fmt::Display for VariogramModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (nugget = {:.6}, partial sill = {:.6}, range = {:.6})",
            self.family, self.nugget, self.partial_sill, self.range
        )
    }
}
