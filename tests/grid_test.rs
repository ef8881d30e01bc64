//! Combination-generator contract tests

use autodse::grid::{ParameterSpec, SweepGrid, ZipGroup};
use autodse::Error;
use serde_json::json;

#[test]
fn test_product_size_is_product_of_lengths() {
    let spec = ParameterSpec::new()
        .param("a", (0..4).map(|i| json!(i)))
        .unwrap()
        .param("b", (0..3).map(|i| json!(i)))
        .unwrap()
        .param("c", (0..5).map(|i| json!(i)))
        .unwrap();
    let combos = SweepGrid::product_only(spec).combinations();

    assert_eq!(combos.len(), 4 * 3 * 5);
    // every combination is a complete assignment
    assert!(combos.iter().all(|c| c.len() == 3));
}

#[test]
fn test_zero_parameters_yield_one_empty_combination() {
    let combos = SweepGrid::product_only(ParameterSpec::new()).combinations();
    assert_eq!(combos.len(), 1);
    assert!(combos[0].is_empty());
}

#[test]
fn test_cross_zip_group_sizes() {
    let g_a = ZipGroup::new()
        .param("x", [json!(1), json!(2), json!(3)])
        .unwrap()
        .param("y", [json!(10), json!(20), json!(30)])
        .unwrap();
    let g_b = ZipGroup::new()
        .param("z", [json!("p"), json!("q")])
        .unwrap();

    let combos = SweepGrid::new(ParameterSpec::new(), vec![g_a, g_b]).combinations();
    assert_eq!(combos.len(), 3 * 2);
    assert!(combos.iter().all(|c| c.len() == 3));
}

#[test]
fn test_mismatched_zip_lengths_fail_at_construction() {
    let err = ZipGroup::new()
        .param("x", [json!(1), json!(2), json!(3)])
        .unwrap()
        .param("y", [json!(10), json!(20)])
        .unwrap_err();

    assert!(matches!(
        err,
        Error::MismatchedZipLength { expected: 3, actual: 2, .. }
    ));
}

#[test]
fn test_empty_candidate_sequence_fails_everywhere() {
    assert!(matches!(
        ParameterSpec::new().param("a", []),
        Err(Error::EmptyValueSet(_))
    ));
    assert!(matches!(
        ZipGroup::new().param("a", []),
        Err(Error::EmptyValueSet(_))
    ));
}

#[test]
fn test_generator_is_idempotent() {
    let spec = ParameterSpec::new()
        .param("a", [json!(1), json!(2)])
        .unwrap()
        .param("b", [json!("u"), json!("v"), json!("w")])
        .unwrap();
    let group = ZipGroup::new()
        .param("c", [json!(true), json!(false)])
        .unwrap();
    let grid = SweepGrid::new(spec, vec![group]);

    let first = grid.combinations();
    let second = grid.combinations();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_documented_nesting_order() {
    // {a: [1,2], d: [x,y]} enumerates with the last parameter fastest
    let spec = ParameterSpec::new()
        .param("a", [json!(1), json!(2)])
        .unwrap()
        .param("d", [json!("x"), json!("y")])
        .unwrap();
    let combos = SweepGrid::product_only(spec).combinations();

    let pairs: Vec<(i64, &str)> = combos
        .iter()
        .map(|c| (c["a"].as_i64().unwrap(), c["d"].as_str().unwrap()))
        .collect();
    assert_eq!(pairs, vec![(1, "x"), (1, "y"), (2, "x"), (2, "y")]);
}
