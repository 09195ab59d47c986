//! Property tests for ordinary kriging.
//!
//! Observations are drawn on a jittered lattice so no two coincide. The
//! main properties use models with a nugget; nugget-free models get their
//! own properties at the end.

use geokrige_algorithms::interpolation::{
    krige, OrdinaryKriging, SamplePoint, VariogramFamily, VariogramModel,
};
use geokrige_core::Error;
use proptest::prelude::*;

const SPACING: f64 = 10.0;

fn family() -> impl Strategy<Value = VariogramFamily> {
    prop_oneof![
        Just(VariogramFamily::Spherical),
        Just(VariogramFamily::Exponential),
        Just(VariogramFamily::Gaussian),
    ]
}

fn model() -> impl Strategy<Value = VariogramModel> {
    (family(), 0.05_f64..5.0, 0.1_f64..10.0, 0.5_f64..60.0).prop_map(
        |(family, nugget, partial_sill, range)| VariogramModel {
            family,
            nugget,
            partial_sill,
            range,
        },
    )
}

fn nugget_free_model(families: Vec<VariogramFamily>) -> impl Strategy<Value = VariogramModel> {
    (proptest::sample::select(families), 0.1_f64..10.0, 0.5_f64..60.0).prop_map(
        |(family, partial_sill, range)| VariogramModel {
            family,
            nugget: 0.0,
            partial_sill,
            range,
        },
    )
}

/// 3–16 points, one per lattice cell, jittered inside the cell
fn observations() -> impl Strategy<Value = Vec<SamplePoint>> {
    proptest::collection::vec((0.0_f64..0.4, 0.0_f64..0.4, -100.0_f64..100.0), 3..=16).prop_map(
        |cells| {
            cells
                .into_iter()
                .enumerate()
                .map(|(i, (jx, jy, value))| {
                    let (col, row) = ((i % 4) as f64, (i / 4) as f64);
                    SamplePoint::new((col + jx) * SPACING, (row + jy) * SPACING, value)
                })
                .collect()
        },
    )
}

fn target() -> impl Strategy<Value = (f64, f64)> {
    (-10.0_f64..50.0, -10.0_f64..50.0)
}

fn min_distance(points: &[SamplePoint], (x, y): (f64, f64)) -> f64 {
    points
        .iter()
        .map(|p| p.dist(x, y))
        .fold(f64::INFINITY, f64::min)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // --- Prediction variance is never negative ---
    #[test]
    fn variance_non_negative(points in observations(), model in model(), targets in proptest::collection::vec(target(), 1..20)) {
        let predictions = krige(&points, &model, &targets).unwrap();
        for p in &predictions {
            prop_assert!(p.variance >= 0.0, "variance {} at ({}, {})", p.variance, p.x, p.y);
            prop_assert!(p.value.is_finite());
        }
    }

    // --- Weights sum to one ---
    #[test]
    fn weights_sum_to_one(points in observations(), model in model(), t in target()) {
        let system = OrdinaryKriging::new(&points, &model).unwrap();
        let w = system.weights(t.0, t.1);
        let l1: f64 = w.lambda.iter().map(|l| l.abs()).sum();
        prop_assert!(
            (w.sum() - 1.0).abs() <= 1e-9 * (1.0 + l1),
            "Σλ = {}",
            w.sum()
        );
    }

    // --- Repeated calls give identical results ---
    #[test]
    fn krige_is_idempotent(points in observations(), model in model(), targets in proptest::collection::vec(target(), 1..10)) {
        let first = krige(&points, &model, &targets).unwrap();
        let second = krige(&points, &model, &targets).unwrap();
        prop_assert_eq!(first, second);
    }

    // --- Kriging honours the data at observation locations ---
    #[test]
    fn exact_at_observations(points in observations(), model in model()) {
        let targets: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
        let predictions = krige(&points, &model, &targets).unwrap();
        for (p, obs) in predictions.iter().zip(&points) {
            prop_assert!(
                (p.value - obs.value).abs() < 1e-6 * (1.0 + obs.value.abs()),
                "predicted {} for observed {}",
                p.value,
                obs.value
            );
            prop_assert!(p.variance < 1e-8 * model.sill(), "variance {}", p.variance);
        }
    }

    // --- More nugget means more variance away from the data ---
    #[test]
    fn variance_increases_with_nugget(
        points in observations(),
        model in model(),
        extra in 0.1_f64..5.0,
        t in target(),
    ) {
        prop_assume!(min_distance(&points, t) > 1e-3);

        let noisier = VariogramModel {
            nugget: model.nugget + extra,
            ..model
        };
        let v1 = OrdinaryKriging::new(&points, &model).unwrap().predict(t.0, t.1).variance;
        let v2 = OrdinaryKriging::new(&points, &noisier).unwrap().predict(t.0, t.1).variance;
        // dσ²/dnugget = 1 + |λ|² ≥ 1 at any fixed non-observation target
        prop_assert!(v2 - v1 > 0.5 * extra, "variance {} -> {} for nugget +{}", v1, v2, extra);
    }

    // --- Nugget-free models: clean result or a reported degenerate system ---
    #[test]
    fn nugget_free_models_finite_or_degenerate(
        points in observations(),
        model in nugget_free_model(VariogramFamily::ALL.to_vec()),
        targets in proptest::collection::vec(target(), 1..10),
    ) {
        match krige(&points, &model, &targets) {
            Ok(predictions) => {
                for p in &predictions {
                    prop_assert!(p.value.is_finite(), "value {} with {}", p.value, model);
                    prop_assert!(
                        p.variance.is_finite() && p.variance >= 0.0,
                        "variance {} with {}",
                        p.variance,
                        model
                    );
                }
            }
            Err(Error::DegenerateInput { .. }) => {}
            Err(e) => {
                prop_assert!(false, "unexpected error {} with {}", e, model);
            }
        }
    }

    // --- Spherical and exponential models without a nugget stay solvable ---
    #[test]
    fn nugget_free_spherical_exponential_honour_data(
        points in observations(),
        model in nugget_free_model(vec![VariogramFamily::Spherical, VariogramFamily::Exponential]),
        t in target(),
    ) {
        let system = OrdinaryKriging::new(&points, &model).unwrap();

        let w = system.weights(t.0, t.1);
        let l1: f64 = w.lambda.iter().map(|l| l.abs()).sum();
        prop_assert!((w.sum() - 1.0).abs() <= 1e-9 * (1.0 + l1), "Σλ = {}", w.sum());
        prop_assert!(system.predict(t.0, t.1).variance >= 0.0);

        for obs in &points {
            let p = system.predict(obs.x, obs.y);
            prop_assert!(
                (p.value - obs.value).abs() < 1e-6 * (1.0 + obs.value.abs()),
                "predicted {} for observed {}",
                p.value,
                obs.value
            );
            prop_assert!(p.variance < 1e-8 * model.sill(), "variance {}", p.variance);
        }
    }
}
