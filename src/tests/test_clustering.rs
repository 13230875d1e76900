use approx::assert_relative_eq;
use log::debug;

use crate::builder::SimilarityGraphBuilder;
use crate::clustering::*;
use crate::distance::DistanceMetric;
use crate::error::Error;
use crate::graph::Graph;
use crate::tests::test_data::{two_blobs, two_cliques};
use crate::tests::{id, ids, init};

#[test]
fn test_bipartition_separates_weakly_joined_cliques() {
    init();
    let graph = two_cliques(Some(0.01));
    let split = SpectralClusterer::new().bipartition(&graph).unwrap();

    let first = split.side(&id(0)).unwrap();
    let second = split.side(&id(10)).unwrap();
    assert_ne!(first, second);
    for v in 0..10u64 {
        assert_eq!(split.side(&id(v)), Some(first), "vertex {}", v);
        assert_eq!(split.side(&id(v + 10)), Some(second), "vertex {}", v + 10);
    }

    assert!(split.fiedler_value > 0.0 && split.fiedler_value < 0.1);
    assert_eq!(split.fiedler_vector.len(), 20);
    assert_eq!(split.members(Side::A).len(), 10);
    assert_eq!(split.members(Side::B).len(), 10);
}

#[test]
fn test_bipartition_sides_follow_fiedler_sign() {
    let graph = two_cliques(Some(0.01));
    let split = SpectralClusterer::new().bipartition(&graph).unwrap();
    for (v, x) in &split.fiedler_vector {
        let expected = if *x < 0.0 { Side::A } else { Side::B };
        assert_eq!(split.side(v), Some(expected));
    }
}

#[test]
fn test_kway_clustering_of_cliques() {
    let graph = two_cliques(Some(0.01));
    let assignment = SpectralClusterer::new().cluster(&graph, 2).unwrap();

    // labels numbered by first appearance
    assert_eq!(assignment.label(&id(0)), Some(0));
    assert_eq!(assignment.label(&id(10)), Some(1));
    assert_eq!(assignment.members(0), ids(10));
    assert_eq!(assignment.sizes(), vec![10, 10]);
    assert_eq!(assignment.embedding.len(), 20);
}

#[test]
fn test_clustering_is_deterministic() {
    let space = two_blobs(12, 9);
    let graph = SimilarityGraphBuilder::new()
        .with_k(4)
        .build_from_features(&space, DistanceMetric::Euclidean)
        .unwrap();

    let clusterer = SpectralClusterer::new().with_seed(7);
    let a = clusterer.cluster(&graph, 3).unwrap();
    let b = clusterer.cluster(&graph, 3).unwrap();
    assert_eq!(a.labels, b.labels);

    assert_eq!(a.labels.len(), 24);
    assert!(a.labels.values().all(|&l| l < 3));
    assert_eq!(a.sizes().iter().sum::<usize>(), 24);
    debug!("sizes {:?}, CH {:.3}", a.sizes(), a.calinski_harabasz());
}

#[test]
fn test_cluster_count_bounds() {
    let graph = two_cliques(Some(0.01));
    let clusterer = SpectralClusterer::new();
    assert!(matches!(
        clusterer.cluster(&graph, 1),
        Err(Error::InvalidParameter { name: "c", .. })
    ));
    assert!(matches!(
        clusterer.cluster(&graph, 20),
        Err(Error::InvalidParameter { name: "c", .. })
    ));

    let empty = Graph::from_edges(Vec::new(), &[]).unwrap();
    assert!(matches!(clusterer.bipartition(&empty), Err(Error::EmptyGraph)));
    assert!(matches!(clusterer.cluster(&empty, 2), Err(Error::EmptyGraph)));
}

#[test]
fn test_kmeans_lloyd_separates_groups() {
    let rows = vec![vec![0.0], vec![0.1], vec![10.0], vec![10.1]];
    let labels = kmeans_lloyd(&rows, 2, 50, CLUSTERING_SEED).unwrap();
    assert_eq!(labels.len(), 4);
    assert_eq!(labels[0], labels[1]);
    assert_eq!(labels[2], labels[3]);
    assert_ne!(labels[0], labels[2]);
}

#[test]
fn test_calinski_harabasz_score() {
    let rows = vec![vec![0.0], vec![0.1], vec![10.0], vec![10.1]];
    // BGSS = 100, WGSS = 0.01
    let score = calinski_harabasz_score(&rows, &[0, 0, 1, 1], 2);
    assert_relative_eq!(score, 20000.0, max_relative = 1e-6);
    assert_eq!(calinski_harabasz_score(&rows, &[0, 0, 0, 0], 1), 0.0);
}
