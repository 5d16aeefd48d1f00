use super::*;
use proptest::prelude::*;

fn dv(v: &[f64]) -> Value {
    Value::DoubleVector(v.to_vec())
}

#[test]
fn l1_and_l2_basics() {
    let a = dv(&[1.0, 0.0, 0.0]);
    let b = dv(&[0.0, 1.0, 0.0]);
    assert_eq!(Distance::L1.compute(&a, &b).unwrap(), 2.0);
    assert_eq!(Distance::L2.compute(&a, &b).unwrap(), 2.0f64.sqrt());
    assert_eq!(Distance::L2.compute(&a, &a).unwrap(), 0.0);
}

#[test]
fn minkowski_generalises_l1_and_l2() {
    let a = dv(&[3.0, -1.0]);
    let b = dv(&[0.0, 1.0]);
    let l1 = Distance::L1.compute(&a, &b).unwrap();
    let l2 = Distance::L2.compute(&a, &b).unwrap();
    assert!((Distance::Minkowski { p: 1 }.compute(&a, &b).unwrap() - l1).abs() < 1e-12);
    assert!((Distance::Minkowski { p: 2 }.compute(&a, &b).unwrap() - l2).abs() < 1e-12);
    assert!(Distance::Minkowski { p: 0 }.compute(&a, &b).is_err());
}

#[test]
fn cosine_distance_of_parallel_vectors_is_zero() {
    let a = dv(&[1.0, 2.0]);
    let b = dv(&[2.0, 4.0]);
    assert!(Distance::Cosine.compute(&a, &b).unwrap().abs() < 1e-12);
    let orthogonal = Distance::Cosine
        .compute(&dv(&[1.0, 0.0]), &dv(&[0.0, 1.0]))
        .unwrap();
    assert!((orthogonal - 1.0).abs() < 1e-12);
}

#[test]
fn hamming_counts_differing_components() {
    let a = Value::IntVector(vec![1, 2, 3, 4]);
    let b = Value::IntVector(vec![1, 0, 3, 0]);
    assert_eq!(Distance::Hamming.compute(&a, &b).unwrap(), 2.0);
}

#[test]
fn chi_squared_skips_zero_denominators() {
    let a = dv(&[0.0, 1.0]);
    let b = dv(&[0.0, 3.0]);
    // First term is 0/0 and contributes nothing; second is (3-1)^2/4.
    assert_eq!(Distance::ChiSquared.compute(&a, &b).unwrap(), 1.0);
}

#[test]
fn weighted_l2_matches_the_tie_scenario() {
    // weights [2,1,1], query at the origin: both candidates sit at √2.
    let w = dv(&[2.0, 1.0, 1.0]);
    let q = dv(&[0.0, 0.0, 0.0]);
    let a = dv(&[1.0, 0.0, 0.0]);
    let b = dv(&[0.0, 1.0, 1.0]);
    let da = Distance::L2.compute_weighted(&q, &a, &w).unwrap();
    let db = Distance::L2.compute_weighted(&q, &b, &w).unwrap();
    assert!((da - 2.0f64.sqrt()).abs() < 1e-12);
    assert!((db - 2.0f64.sqrt()).abs() < 1e-12);
}

#[test]
fn weighted_chi_squared_scales_terms() {
    let w = dv(&[3.0]);
    let a = dv(&[1.0]);
    let b = dv(&[3.0]);
    assert_eq!(
        Distance::ChiSquared.compute_weighted(&a, &b, &w).unwrap(),
        3.0
    );
}

#[test]
fn mixed_element_types_are_widened() {
    let a = Value::IntVector(vec![1, 0]);
    let b = dv(&[0.0, 1.0]);
    assert_eq!(Distance::L1.compute(&a, &b).unwrap(), 2.0);
}

#[test]
fn size_mismatch_is_a_size_error() {
    let err = Distance::L2.compute(&dv(&[1.0]), &dv(&[1.0, 2.0])).unwrap_err();
    assert!(matches!(err, DbError::Size(_)));
    let err = Distance::L2
        .compute_weighted(&dv(&[1.0]), &dv(&[1.0]), &dv(&[1.0, 2.0]))
        .unwrap_err();
    assert!(matches!(err, DbError::Size(_)));
}

#[test]
fn non_vector_operands_are_a_type_error() {
    let err = Distance::L2.compute(&Value::Long(1), &dv(&[1.0])).unwrap_err();
    assert!(matches!(err, DbError::Type(_)));
}

#[test]
fn kernel_costs_are_positive() {
    for d in [
        Distance::L1,
        Distance::L2,
        Distance::Minkowski { p: 3 },
        Distance::Cosine,
        Distance::InnerProduct,
        Distance::Hamming,
        Distance::ChiSquared,
    ] {
        assert!(d.cost() > 0.0);
    }
}

proptest! {
    #[test]
    fn l2_symmetry(
        pairs in prop::collection::vec((-1e3f64..1e3, -1e3f64..1e3), 1..32),
    ) {
        let a: Vec<f64> = pairs.iter().map(|(x, _)| *x).collect();
        let b: Vec<f64> = pairs.iter().map(|(_, y)| *y).collect();
        let d1 = Distance::L2.compute(&dv(&a), &dv(&b)).unwrap();
        let d2 = Distance::L2.compute(&dv(&b), &dv(&a)).unwrap();
        prop_assert!(d1 >= 0.0);
        prop_assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn uniformly_weighted_matches_unweighted(
        pairs in prop::collection::vec((-1e3f64..1e3, -1e3f64..1e3), 1..32),
    ) {
        let a: Vec<f64> = pairs.iter().map(|(x, _)| *x).collect();
        let b: Vec<f64> = pairs.iter().map(|(_, y)| *y).collect();
        let w = vec![1.0; a.len()];
        for kernel in [Distance::L1, Distance::L2, Distance::Hamming, Distance::ChiSquared] {
            let plain = kernel.compute(&dv(&a), &dv(&b)).unwrap();
            let weighted = kernel.compute_weighted(&dv(&a), &dv(&b), &dv(&w)).unwrap();
            prop_assert!((plain - weighted).abs() < 1e-9, "{kernel:?}");
        }
    }
}
