//! Empirical semivariogram estimation
//!
//! Computes the empirical (experimental) semivariogram from sample points.
//! It is the input to variogram model fitting and, through the fitted
//! model, to kriging.
//!
//! The semivariance γ(h) measures spatial dissimilarity as a function of
//! separation distance h:
//! ```text
//! γ(h) = (1/2N(h)) Σ [z(xᵢ) - z(xⱼ)]²   for all pairs with |xᵢ-xⱼ| in the bin of h
//! ```
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use geokrige_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};

use super::{max_pairwise_distance, validate_points, SamplePoint};

/// Default number of lag bins
pub const DEFAULT_N_LAGS: usize = 15;

/// Default cutoff as a fraction of the maximum pairwise distance
pub const DEFAULT_CUTOFF_FRACTION: f64 = 1.0 / 3.0;

/// Upper limit on the number of bins a policy may generate
const MAX_BINS: usize = 100_000;

/// One non-empty lag bin of an empirical semivariogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagBin {
    /// Mean separation distance of the pairs in the bin
    pub distance: f64,
    /// Semivariance γ(h) of the bin
    pub semivariance: f64,
    /// Number of point pairs in the bin (always > 0)
    pub pair_count: usize,
}

/// Empirical semivariogram: one entry per non-empty lag bin, ordered by distance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmpiricalSemivariogram {
    pub bins: Vec<LagBin>,
}

impl EmpiricalSemivariogram {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LagBin> {
        self.bins.iter()
    }

    /// Lag distances
    pub fn distances(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.distance).collect()
    }

    /// Semivariance values
    pub fn semivariances(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.semivariance).collect()
    }

    /// Largest semivariance over all bins (0 when empty)
    pub fn max_semivariance(&self) -> f64 {
        self.bins.iter().map(|b| b.semivariance).fold(0.0, f64::max)
    }

    /// Distance of the last bin (0 when empty)
    pub fn max_distance(&self) -> f64 {
        self.bins.last().map_or(0.0, |b| b.distance)
    }

    /// Total number of pairs over all bins
    pub fn total_pairs(&self) -> usize {
        self.bins.iter().map(|b| b.pair_count).sum()
    }
}

/// Maximum separation distance taken into account.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Cutoff {
    /// Fraction of the maximum pairwise distance among the observations
    Fraction(f64),
    /// Absolute distance
    Distance(f64),
}

impl Default for Cutoff {
    fn default() -> Self {
        Cutoff::Fraction(DEFAULT_CUTOFF_FRACTION)
    }
}

impl Cutoff {
    fn resolve(&self, max_distance: impl FnOnce() -> f64) -> Result<f64> {
        match *self {
            Cutoff::Fraction(f) => {
                if !(f.is_finite() && f > 0.0) {
                    return Err(Error::invalid("cutoff_fraction", f, "must be positive"));
                }
                let max_dist = max_distance();
                if max_dist <= 0.0 {
                    return Err(Error::InsufficientData(
                        "all observations share one location".into(),
                    ));
                }
                Ok(max_dist * f)
            }
            Cutoff::Distance(d) => {
                if !(d.is_finite() && d > 0.0) {
                    return Err(Error::invalid("cutoff", d, "must be positive"));
                }
                Ok(d)
            }
        }
    }
}

/// How pair distances are grouped into lag bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BinPolicy {
    /// `n_lags` equal-width bins over `[0, cutoff]`
    Uniform { n_lags: usize, cutoff: Cutoff },
    /// Bins of fixed `width` over `[0, cutoff]`; the last one may be narrower
    Width { width: f64, cutoff: Cutoff },
    /// Explicit, strictly increasing bin edges. Bin k holds `[e_k, e_{k+1})`,
    /// the last bin is closed on the right.
    Edges(Vec<f64>),
}

impl Default for BinPolicy {
    fn default() -> Self {
        BinPolicy::Uniform {
            n_lags: DEFAULT_N_LAGS,
            cutoff: Cutoff::default(),
        }
    }
}

impl BinPolicy {
    pub fn uniform(n_lags: usize, cutoff: Cutoff) -> Self {
        BinPolicy::Uniform { n_lags, cutoff }
    }

    pub fn width(width: f64, cutoff: Cutoff) -> Self {
        BinPolicy::Width { width, cutoff }
    }

    pub fn edges(edges: impl Into<Vec<f64>>) -> Self {
        BinPolicy::Edges(edges.into())
    }

    /// Resolve the policy into bin edges. `max_distance` is only called for
    /// fractional cutoffs.
    fn bin_edges(&self, max_distance: impl FnOnce() -> f64) -> Result<Vec<f64>> {
        match self {
            BinPolicy::Uniform { n_lags, cutoff } => {
                if *n_lags == 0 || *n_lags > MAX_BINS {
                    return Err(Error::invalid(
                        "n_lags",
                        n_lags,
                        format!("must be in 1..={}", MAX_BINS),
                    ));
                }
                let cutoff = cutoff.resolve(max_distance)?;
                let n = *n_lags as f64;
                Ok((0..=*n_lags).map(|k| cutoff * k as f64 / n).collect())
            }
            BinPolicy::Width { width, cutoff } => {
                if !(width.is_finite() && *width > 0.0) {
                    return Err(Error::invalid("width", width, "must be positive"));
                }
                let cutoff = cutoff.resolve(max_distance)?;
                if cutoff / width > MAX_BINS as f64 {
                    return Err(Error::invalid(
                        "width",
                        width,
                        format!("produces more than {} bins", MAX_BINS),
                    ));
                }
                let mut edges = vec![0.0];
                let mut k = 1;
                loop {
                    let e = k as f64 * width;
                    if e >= cutoff * (1.0 - 1e-12) {
                        edges.push(cutoff);
                        break;
                    }
                    edges.push(e);
                    k += 1;
                }
                Ok(edges)
            }
            BinPolicy::Edges(edges) => {
                if edges.len() < 2 {
                    return Err(Error::invalid(
                        "edges",
                        format!("{:?}", edges),
                        "need at least 2 edges",
                    ));
                }
                if edges.iter().any(|e| !e.is_finite()) || edges[0] < 0.0 {
                    return Err(Error::invalid(
                        "edges",
                        format!("{:?}", edges),
                        "edges must be finite and non-negative",
                    ));
                }
                if edges.windows(2).any(|w| w[1] <= w[0]) {
                    return Err(Error::invalid(
                        "edges",
                        format!("{:?}", edges),
                        "edges must be strictly increasing",
                    ));
                }
                Ok(edges.clone())
            }
        }
    }
}

/// Index of the bin containing `h`, or `None` outside the edges.
#[inline]
fn bin_index(edges: &[f64], h: f64) -> Option<usize> {
    let last = edges.len() - 1;
    if h < edges[0] || h > edges[last] {
        return None;
    }
    let k = edges.partition_point(|&e| e <= h) - 1;
    Some(k.min(last - 1))
}

/// Estimate the empirical semivariogram of a set of sample points.
///
/// # Arguments
/// * `points` — Sample points with (x, y, value); values may be trend residuals
/// * `policy` — Distance binning policy
///
/// # Returns
/// [`EmpiricalSemivariogram`] with one entry per non-empty bin.
///
/// # Errors
/// - [`Error::InsufficientData`] for fewer than 2 points or when no pair
///   falls inside any bin
/// - [`Error::InvalidParameter`] for a malformed policy or non-finite input
pub fn estimate_semivariogram(
    points: &[SamplePoint],
    policy: &BinPolicy,
) -> Result<EmpiricalSemivariogram> {
    let n = points.len();
    if n < 2 {
        return Err(Error::InsufficientData(format!(
            "need at least 2 points for a semivariogram, got {}",
            n
        )));
    }
    validate_points(points)?;

    let edges = policy.bin_edges(|| max_pairwise_distance(points))?;
    let n_bins = edges.len() - 1;

    let mut dist_sum = vec![0.0_f64; n_bins];
    let mut sq_sum = vec![0.0_f64; n_bins];
    let mut counts = vec![0_usize; n_bins];

    for i in 0..n {
        for j in (i + 1)..n {
            let d = points[i].dist(points[j].x, points[j].y);
            if let Some(k) = bin_index(&edges, d) {
                let dz = points[i].value - points[j].value;
                dist_sum[k] += d;
                sq_sum[k] += dz * dz;
                counts[k] += 1;
            }
        }
    }

    // γ(h) = (1/2N) Σ (zᵢ - zⱼ)², empty bins dropped
    let bins: Vec<LagBin> = (0..n_bins)
        .filter(|&k| counts[k] > 0)
        .map(|k| LagBin {
            distance: dist_sum[k] / counts[k] as f64,
            semivariance: sq_sum[k] / (2.0 * counts[k] as f64),
            pair_count: counts[k],
        })
        .collect();

    if bins.is_empty() {
        return Err(Error::InsufficientData(format!(
            "no point pairs within the lag bins (cutoff {:.4})",
            edges[n_bins]
        )));
    }

    tracing::debug!(
        points = n,
        bins = bins.len(),
        cutoff = edges[n_bins],
        "estimated empirical semivariogram"
    );

    Ok(EmpiricalSemivariogram { bins })
}

/// Empirical semivariogram estimator
#[derive(Debug, Clone, Default)]
pub struct SemivariogramEstimator;

impl Algorithm for SemivariogramEstimator {
    type Input = Vec<SamplePoint>;
    type Output = EmpiricalSemivariogram;
    type Params = BinPolicy;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Empirical Semivariogram"
    }

    fn description(&self) -> &'static str {
        "Bin pairwise squared differences by separation distance (Matheron estimator)"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        estimate_semivariogram(&input, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn generate_spatially_correlated(n: usize, range: f64, seed: u64) -> Vec<SamplePoint> {
        // Simple pseudo-random spatially correlated points
        let mut points = Vec::with_capacity(n);
        let mut rng = seed;

        for _ in 0..n {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let x = (rng >> 33) as f64 / (1u64 << 31) as f64 * 100.0;
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let y = (rng >> 33) as f64 / (1u64 << 31) as f64 * 100.0;
            let value = 10.0 * ((x / range).sin() + (y / range).sin());
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let noise = (rng >> 33) as f64 / (1u64 << 31) as f64 * 2.0 - 1.0;
            points.push(SamplePoint::new(x, y, value + noise));
        }

        points
    }

    #[test]
    fn test_two_points_single_bin() {
        let points = vec![
            SamplePoint::new(0.0, 0.0, 5.0),
            SamplePoint::new(10.0, 0.0, 9.0),
        ];
        let policy = BinPolicy::uniform(4, Cutoff::Distance(12.0));
        let emp = estimate_semivariogram(&points, &policy).unwrap();

        assert_eq!(emp.len(), 1);
        assert_eq!(emp.bins[0].pair_count, 1);
        assert_relative_eq!(emp.bins[0].semivariance, 8.0, epsilon = 1e-12);
        assert_relative_eq!(emp.bins[0].distance, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_default_cutoff_excludes_lone_pair() {
        // One third of the only pair distance: nothing falls inside
        let points = vec![
            SamplePoint::new(0.0, 0.0, 5.0),
            SamplePoint::new(10.0, 0.0, 9.0),
        ];
        let err = estimate_semivariogram(&points, &BinPolicy::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientData(_)));
    }

    #[test]
    fn test_too_few_points() {
        let points = vec![SamplePoint::new(0.0, 0.0, 1.0)];
        let err = estimate_semivariogram(&points, &BinPolicy::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientData(_)));
    }

    #[test]
    fn test_coincident_points() {
        let points = vec![
            SamplePoint::new(3.0, 3.0, 1.0),
            SamplePoint::new(3.0, 3.0, 2.0),
        ];
        let err = estimate_semivariogram(&points, &BinPolicy::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientData(_)));
    }

    #[test]
    fn test_non_finite_rejected() {
        let points = vec![
            SamplePoint::new(0.0, 0.0, 1.0),
            SamplePoint::new(1.0, f64::NAN, 2.0),
        ];
        let err = estimate_semivariogram(&points, &BinPolicy::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn test_explicit_edges() {
        // Distances: 1 (a-b), 2 (b-c), 3 (a-c)
        let points = vec![
            SamplePoint::new(0.0, 0.0, 0.0),
            SamplePoint::new(1.0, 0.0, 2.0),
            SamplePoint::new(3.0, 0.0, 6.0),
        ];
        let emp = estimate_semivariogram(&points, &BinPolicy::edges(vec![0.5, 1.5, 3.0])).unwrap();

        assert_eq!(emp.len(), 2);
        assert_eq!(emp.bins[0].pair_count, 1);
        assert_relative_eq!(emp.bins[0].semivariance, 2.0, epsilon = 1e-12);
        // Upper edge is closed: d = 3 lands in the last bin with d = 2
        assert_eq!(emp.bins[1].pair_count, 2);
        assert_relative_eq!(emp.bins[1].distance, 2.5, epsilon = 1e-12);
        assert_relative_eq!(emp.bins[1].semivariance, (16.0 + 36.0) / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_bins_omitted() {
        let points = vec![
            SamplePoint::new(0.0, 0.0, 0.0),
            SamplePoint::new(1.0, 0.0, 1.0),
            SamplePoint::new(9.0, 0.0, 3.0),
        ];
        // Distances 1, 8, 9 over ten unit bins: only three are occupied
        let emp = estimate_semivariogram(&points, &BinPolicy::uniform(10, Cutoff::Distance(10.0)))
            .unwrap();
        assert_eq!(emp.len(), 3);
        assert!(emp.iter().all(|b| b.pair_count > 0));
        assert_eq!(emp.total_pairs(), 3);
    }

    #[test]
    fn test_width_policy() {
        let policy = BinPolicy::width(3.0, Cutoff::Distance(10.0));
        let edges = policy.bin_edges(|| unreachable!()).unwrap();
        assert_eq!(edges, vec![0.0, 3.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn test_invalid_policies() {
        let points = generate_spatially_correlated(10, 20.0, 1);
        let bad = [
            BinPolicy::uniform(0, Cutoff::default()),
            BinPolicy::uniform(5, Cutoff::Distance(-1.0)),
            BinPolicy::uniform(5, Cutoff::Fraction(0.0)),
            BinPolicy::width(0.0, Cutoff::default()),
            BinPolicy::edges(vec![1.0]),
            BinPolicy::edges(vec![0.0, 2.0, 1.0]),
            BinPolicy::edges(vec![-1.0, 2.0]),
        ];
        for policy in &bad {
            let err = estimate_semivariogram(&points, policy).unwrap_err();
            assert!(
                matches!(err, Error::InvalidParameter { .. }),
                "{:?} should be rejected, got {:?}",
                policy,
                err
            );
        }
    }

    #[test]
    fn test_correlated_field_semivariance_increases() {
        let points = generate_spatially_correlated(150, 20.0, 42);
        let emp = estimate_semivariogram(&points, &BinPolicy::default()).unwrap();

        assert!(emp.len() >= 10, "Should have most lags occupied, got {}", emp.len());
        let distances = emp.distances();
        assert!(
            distances.windows(2).all(|w| w[0] <= w[1]),
            "Distances must be non-decreasing"
        );

        let sv = emp.semivariances();
        assert!(
            sv[0] < *sv.last().unwrap(),
            "Semivariance should increase: first={:.2}, last={:.2}",
            sv[0],
            sv.last().unwrap()
        );
    }

    #[test]
    fn test_algorithm_trait() {
        let points = generate_spatially_correlated(40, 20.0, 7);
        let estimator = SemivariogramEstimator;
        let via_trait = estimator.execute_default(points.clone()).unwrap();
        let direct = estimate_semivariogram(&points, &BinPolicy::default()).unwrap();
        assert_eq!(via_trait, direct);
    }
}
