use approx::assert_abs_diff_eq;
use smartcore::linalg::basic::arrays::Array;

use crate::graph::Graph;
use crate::laplacian::*;
use crate::tests::test_data::two_cliques;
use crate::tests::{id, ids, init};

use log::debug;

#[test]
fn test_laplacian_mathematical_properties() {
    init();
    let laplacian = build_laplacian(&two_cliques(Some(0.01))).unwrap();
    let n = laplacian.nnodes;
    assert_eq!(laplacian.shape(), (20, 20));

    // Property 1: zero row sums
    for i in 0..n {
        let row_sum: f64 = (0..n).map(|j| laplacian.get(i, j)).sum();
        assert_abs_diff_eq!(row_sum, 0.0, epsilon = 1e-12);
    }

    // Property 2: symmetric
    assert!(laplacian.max_asymmetry() < 1e-12);

    // Property 3: degrees include the bridge on both ends
    let degrees = laplacian.degrees();
    assert_abs_diff_eq!(degrees[0], 9.01, epsilon = 1e-12);
    assert_abs_diff_eq!(degrees[10], 9.01, epsilon = 1e-12);
    assert_abs_diff_eq!(degrees[5], 9.0, epsilon = 1e-12);

    let validation = laplacian.verify_properties(1e-10);
    assert!(validation.is_valid(), "{:?}", validation);
    debug!("{}", laplacian.statistics());
    assert!(laplacian.rayleigh_quotient(&[1.0; 3]).is_err());
}

#[test]
fn test_symmetrization_keeps_heavier_direction() {
    let g = Graph::from_edges(
        ids(3),
        &[(id(0), id(1), 0.5), (id(1), id(0), 0.2), (id(1), id(2), 0.3)],
    )
    .unwrap();

    let sym = symmetrized_adjacency(&g).unwrap();
    assert_eq!(sym.get(0, 1).copied(), Some(0.5));
    assert_eq!(sym.get(1, 0).copied(), Some(0.5));
    assert_eq!(sym.get(2, 1).copied(), Some(0.3));
    assert_eq!(sym.get(0, 2), None);

    let laplacian = build_laplacian(&g).unwrap();
    assert_abs_diff_eq!(laplacian.get(1, 1), 0.8, epsilon = 1e-12);
    assert_abs_diff_eq!(laplacian.get(0, 1), -0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(laplacian.get(2, 2), 0.3, epsilon = 1e-12);
}

#[test]
fn test_rayleigh_quotient() {
    let laplacian = build_laplacian(&two_cliques(Some(0.01))).unwrap();

    // constant vectors span the null space
    assert_abs_diff_eq!(laplacian.rayleigh_quotient(&[1.0; 20]).unwrap(), 0.0, epsilon = 1e-12);

    // block indicator only cuts the bridge: xᵀLx = 0.01 * 2² over |x|² = 20
    let indicator: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { -1.0 }).collect();
    assert_abs_diff_eq!(laplacian.rayleigh_quotient(&indicator).unwrap(), 0.04 / 20.0, epsilon = 1e-12);
}

#[test]
fn test_isolated_vertex_has_zero_row() {
    let g = Graph::from_edges(ids(3), &[(id(0), id(1), 1.0)]).unwrap();
    let laplacian = build_laplacian(&g).unwrap();
    for j in 0..3 {
        assert_abs_diff_eq!(laplacian.get(2, j), 0.0);
    }
    assert_eq!(laplacian.nnz(), 4);
    assert_abs_diff_eq!(*laplacian.matrix().get((0, 0)), 1.0);
}
