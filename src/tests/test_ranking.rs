use approx::assert_abs_diff_eq;
use log::debug;

use crate::builder::SimilarityGraphBuilder;
use crate::core::ItemId;
use crate::error::Error;
use crate::graph::Graph;
use crate::ranking::*;
use crate::tests::test_data::{six_item_matrix, two_cliques};
use crate::tests::{id, ids, init};

fn assert_distribution(ranks: &RankVector) {
    let total: f64 = ranks.scores().iter().sum();
    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-6);
    assert!(ranks.scores().iter().all(|&s| s >= 0.0));
}

#[test]
fn test_directed_cycle_is_uniform() {
    let g = Graph::from_edges(
        ids(3),
        &[(id(0), id(1), 1.0), (id(1), id(2), 2.0), (id(2), id(0), 0.5)],
    )
    .unwrap();
    let ranks = RandomWalkRankingEngine::default()
        .with_tolerance(1e-12)
        .global(&g)
        .unwrap();

    assert_distribution(&ranks);
    for v in 0..3 {
        assert_abs_diff_eq!(ranks.score(&id(v)).unwrap(), 1.0 / 3.0, epsilon = 1e-9);
    }
}

#[test]
fn test_sink_mass_follows_restart() {
    // 0 -> 1 and 1 is a sink. With d = 0.85 and uniform restart the fixed point is
    // s = 0.15 / (1 - 0.85 * 0.925), r0 = s / 2, r1 = 0.925 s.
    let g = Graph::from_edges(ids(2), &[(id(0), id(1), 1.0)]).unwrap();
    let ranks = rank(&g, 0.85, &RestartDistribution::Uniform, 1000, 1e-12).unwrap();

    let s = 0.15 / (1.0 - 0.85 * 0.925);
    assert!(ranks.converged());
    assert_abs_diff_eq!(ranks.score(&id(0)).unwrap(), s / 2.0, epsilon = 1e-8);
    assert_abs_diff_eq!(ranks.score(&id(1)).unwrap(), 0.925 * s, epsilon = 1e-8);
    assert_distribution(&ranks);
}

#[test]
fn test_zero_iterations_returns_restart() {
    let g = two_cliques(Some(0.01));
    let seeds = RestartDistribution::Seeds(vec![id(3), id(12)]);
    let ranks = rank(&g, 0.85, &seeds, 0, 1e-3).unwrap();

    assert_eq!(ranks.iterations(), 0);
    assert!(!ranks.converged());
    assert_abs_diff_eq!(ranks.score(&id(3)).unwrap(), 0.5);
    assert_abs_diff_eq!(ranks.score(&id(12)).unwrap(), 0.5);
    assert_abs_diff_eq!(ranks.score(&id(0)).unwrap(), 0.0);
    assert_distribution(&ranks);
}

#[test]
fn test_personalization_favours_seed() {
    init();
    let g = two_cliques(Some(0.01));
    let engine = RandomWalkRankingEngine::default().with_tolerance(1e-10).with_max_iter(500);

    let global = engine.global(&g).unwrap();
    let personal = engine.personalized(&g, &[id(3)]).unwrap();
    assert_distribution(&global);
    assert_distribution(&personal);

    assert!(personal.score(&id(3)).unwrap() > global.score(&id(3)).unwrap());
    assert_eq!(personal.top(1)[0].0, id(3));
    // the walk never leaves the first clique except through the 0 -> 10 bridge
    let first: f64 = (0..10).map(|v| personal.score(&id(v)).unwrap()).sum();
    assert!(first > 0.9, "mass on seed clique {}", first);
    debug!("top-3 personalized: {:?}", personal.top(3));
}

#[test]
fn test_six_item_scenario() {
    let graph = SimilarityGraphBuilder::new().with_k(2).build(&six_item_matrix()).unwrap();
    assert_eq!(graph.len(), 6);
    assert_eq!(graph.edge_count(), 12);
    assert!(graph.ids().iter().all(|v| graph.out_degree(v).unwrap() == 2));

    let run = || rank(&graph, 0.85, &RestartDistribution::Uniform, 200, 1e-9).unwrap();
    let (a, b) = (run(), run());
    assert!(a.converged());
    assert!(a.iterations() <= 200);
    assert_distribution(&a);
    for (x, y) in a.scores().iter().zip(b.scores()) {
        assert_eq!(x.to_bits(), y.to_bits());
    }

    // mirror-symmetric line: ranks are symmetric about the middle
    assert_abs_diff_eq!(a.scores()[0], a.scores()[5], epsilon = 1e-6);
    assert_abs_diff_eq!(a.scores()[2], a.scores()[3], epsilon = 1e-6);
}

#[test]
fn test_top_orders_by_score_then_id() {
    let g = Graph::from_edges(
        ids(4),
        &[(id(0), id(1), 1.0), (id(1), id(0), 1.0), (id(2), id(3), 1.0), (id(3), id(2), 1.0)],
    )
    .unwrap();
    let ranks = RandomWalkRankingEngine::default().global(&g).unwrap();
    let top: Vec<_> = ranks.top(4).into_iter().map(|(v, _)| v).collect();
    assert_eq!(top, ids(4));
    assert_eq!(ranks.top(10).len(), 4);
}

#[test]
fn test_weighted_restart() {
    let g = two_cliques(Some(0.01));
    let restart = RestartDistribution::Weighted(vec![(id(1), 0.25), (id(15), 0.75)]);
    let ranks = rank(&g, 0.85, &restart, 100, 1e-8).unwrap();
    assert_distribution(&ranks);
    assert!(ranks.score(&id(15)).unwrap() > ranks.score(&id(1)).unwrap());
}

#[test]
fn test_invalid_arguments() {
    let g = two_cliques(Some(0.01));
    let uniform = RestartDistribution::Uniform;

    assert!(matches!(
        rank(&g, 1.5, &uniform, 10, 1e-3),
        Err(Error::InvalidParameter { name: "damping", .. })
    ));
    assert!(matches!(
        rank(&g, 0.85, &uniform, 10, -1.0),
        Err(Error::InvalidParameter { name: "tolerance", .. })
    ));
    assert!(matches!(
        rank(&g, 0.85, &RestartDistribution::Weighted(vec![(id(0), 0.5)]), 10, 1e-3),
        Err(Error::InvalidParameter { name: "restart_distribution", .. })
    ));
    assert!(matches!(
        rank(&g, 0.85, &RestartDistribution::Seeds(vec![id(99)]), 10, 1e-3),
        Err(Error::InvalidParameter { name: "restart_distribution", .. })
    ));
    assert!(matches!(
        rank(&g, 0.85, &RestartDistribution::Seeds(Vec::new()), 10, 1e-3),
        Err(Error::InvalidParameter { name: "restart_distribution", .. })
    ));

    let empty = Graph::from_edges(Vec::new(), &[]).unwrap();
    assert!(matches!(rank(&empty, 0.85, &uniform, 10, 1e-3), Err(Error::EmptyGraph)));
}

#[test]
fn test_iteration_cap_is_not_an_error() {
    let g = two_cliques(Some(0.01));
    let ranks = rank(&g, 0.99, &RestartDistribution::Seeds(vec![id(0)]), 2, 0.0).unwrap();
    assert_eq!(ranks.iterations(), 2);
    assert!(!ranks.converged());
    assert!(ranks.residual() > 0.0);
    assert_distribution(&ranks);
}

#[test]
fn test_params_default() {
    let params = RankParams::default();
    assert_eq!(params, RankParams { damping: 0.85, tolerance: 1e-3, max_iter: 100 });
    assert_eq!(RandomWalkRankingEngine::new(params.clone()).params(), &params);
}

#[test]
fn test_score_lookup_by_named_id() {
    let names = ["rome", "paris", "oslo"];
    let vertices: Vec<ItemId> = names.iter().map(|&n| ItemId::from(n)).collect();
    let g = Graph::from_edges(
        vertices.clone(),
        &[
            (vertices[0].clone(), vertices[1].clone(), 1.0),
            (vertices[1].clone(), vertices[0].clone(), 1.0),
            (vertices[2].clone(), vertices[0].clone(), 1.0),
        ],
    )
    .unwrap();
    let ranks = RandomWalkRankingEngine::default().global(&g).unwrap();
    for (i, v) in vertices.iter().enumerate() {
        assert_eq!(ranks.score(v), Some(ranks.scores()[i]));
    }
    assert_eq!(ranks.ids(), &vertices[..]);
    assert!(ranks.score(&ItemId::from("lima")).is_none());
    assert!(ranks.score(&vertices[0]).unwrap() > ranks.score(&vertices[2]).unwrap());
}
