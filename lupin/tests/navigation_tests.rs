//! Active-set edits on small hand-made and randomly coarsened hierarchies.

use lupin::common::*;
use lupin::refine_map::RefineMap;
use lupin::{
    ActiveSelection, CoarsenArgs, CoarsenAssignment, CoarseningOracle, Edit,
    HeavyEdgeCoarsening, Hierarchy, HierarchyBuilder,
};
use matrix_util::knn_graph::{KnnGraph, KnnGraphArgs};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn membership(r: &RefineMap) -> anyhow::Result<CscMat> {
    let triplets: Vec<(usize, usize, f32)> = (0..r.n_coarse())
        .flat_map(|k| r.expand(k).map(move |i| (k, i, 1.0)))
        .collect();
    CscMat::from_nonzero_triplets(r.n_coarse(), r.n_fine(), triplets)
}

fn ring(n: usize) -> anyhow::Result<CscMat> {
    let triplets: Vec<(usize, usize, f32)> = (0..n)
        .flat_map(|i| {
            let j = (i + 1) % n;
            [(i, j, 1.0), (j, i, 1.0)]
        })
        .collect();
    CscMat::from_nonzero_triplets(n, n, triplets)
}

/// sizes [8, 4, 2]
/// level 1: {0,1,2}, {3}, {4,5}, {6,7}
/// level 2: {0,1}, {2,3}
fn eight_four_two() -> anyhow::Result<Arc<Hierarchy>> {
    let a0 = CoarsenAssignment::from_groups(8, &[vec![0, 1, 2], vec![4, 5], vec![6, 7]])?;
    let a1 = CoarsenAssignment::from_groups(4, &[vec![0, 1], vec![2, 3]])?;
    let c0 = membership(&RefineMap::from_assignment(&a0))?;
    let c1 = membership(&RefineMap::from_assignment(&a1))?;

    let features = CscMat::from_nonzero_triplets(
        2,
        8,
        (0..8)
            .flat_map(|j| [(0, j, 1.0), (1, j, j as f32)])
            .collect::<Vec<(usize, usize, f32)>>(),
    )?;

    let h = HierarchyBuilder::new(vec![ring(8)?, ring(4)?, ring(2)?], vec![a0, a1], vec![c0, c1])
        .with_features(features, vec!["flat".into(), "ramp".into()])
        .fit()?;
    Ok(Arc::new(h))
}

/// random points, kNN graph, heavy-edge coarsening, random features
fn random_hierarchy(n: usize, seed: u64) -> anyhow::Result<Arc<Hierarchy>> {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut points = Mat::zeros(2, n);
    for x in points.iter_mut() {
        *x = rng.random::<f32>();
    }
    let graph = KnnGraph::from_columns(
        &points,
        &KnnGraphArgs {
            knn: 4,
            reciprocal: false,
        },
    )?
    .affinity()?;

    let coarsening = HeavyEdgeCoarsening::new(CoarsenArgs {
        reduction: 0.9,
        max_levels: 6,
        min_nodes: 2,
    })
    .coarsen(&graph)?;

    let n_features = 5;
    let mut triplets = vec![];
    for j in 0..n {
        for g in 0..n_features {
            if rng.random_bool(0.4) {
                triplets.push((g, j, rng.random_range(1..10) as f32));
            }
        }
    }
    let x = CscMat::from_nonzero_triplets(n_features, n, triplets)?;
    let names = (0..n_features)
        .map(|g| format!("f{}", g).into_boxed_str())
        .collect();

    let h = HierarchyBuilder::from_coarsening(coarsening)
        .with_features(x, names)
        .fit()?;
    Ok(Arc::new(h))
}

fn random_positions(rng: &mut StdRng, n_active: usize) -> Vec<usize> {
    let k = rng.random_range(1..=n_active.clamp(1, 4));
    (0..k).map(|_| rng.random_range(0..n_active.max(1))).collect()
}

/// finest-level nodes under the selected positions
fn coverage_of(sel: &ActiveSelection, flat: &[usize]) -> Vec<usize> {
    let h = sel.hierarchy();
    let mut ret: Vec<usize> = sel
        .select(flat)
        .iter()
        .enumerate()
        .flat_map(|(l, nodes)| {
            nodes
                .iter()
                .flat_map(move |&k| h.finest_descendants(l, k))
                .collect::<Vec<_>>()
        })
        .collect();
    ret.sort_unstable();
    ret
}

#[test]
fn three_level_walkthrough() -> anyhow::Result<()> {
    let h = eight_four_two()?;
    assert_eq!(h.level_sizes(), &[8, 4, 2]);

    let mut sel = ActiveSelection::new(h);
    sel.reset();
    assert_eq!(sel.level_nodes(), &vec![vec![], vec![], vec![0, 1]]);
    assert_eq!(sel.node_weights(), vec![4.0, 4.0]);
    assert_eq!(sel.total_weight(), 8.0);

    // expand level-2 node 0
    let edit = sel.refine(&[0], false)?;
    assert_eq!(edit, Edit::Applied { n_active: 3 });
    assert_eq!(sel.level_nodes(), &vec![vec![], vec![0, 1], vec![1]]);
    assert_eq!(sel.node_weights(), vec![3.0, 1.0, 4.0]);
    assert_eq!(sel.total_weight(), 8.0);

    // remove level-1 node 1, displayed at position 1
    assert_eq!(sel.locate(1), Some((1, 1)));
    sel.remove(&[1])?;
    assert_eq!(sel.level_nodes(), &vec![vec![], vec![0], vec![1]]);
    assert_eq!(sel.total_weight(), 7.0);
    assert_eq!(sel.finest_coverage(), vec![0, 1, 2, 4, 5, 6, 7]);
    Ok(())
}

#[test]
fn zoom_keeps_only_the_selection() -> anyhow::Result<()> {
    let mut sel = ActiveSelection::new(eight_four_two()?);
    sel.refine(&[0], false)?;
    // active: L1 [0, 1], L2 [1]; zoom into L1 node 0
    sel.refine(&[0], true)?;
    assert_eq!(sel.level_nodes(), &vec![vec![0, 1, 2], vec![], vec![]]);

    // refining finest nodes keeps them
    sel.refine(&[1], false)?;
    assert_eq!(sel.level_nodes()[0], vec![0, 1, 2]);
    Ok(())
}

#[test]
fn empty_selection_changes_nothing() -> anyhow::Result<()> {
    let mut sel = ActiveSelection::new(eight_four_two()?);
    let before = sel.level_nodes().clone();
    assert_eq!(sel.refine(&[], false)?, Edit::NoSelection);
    assert_eq!(sel.refine(&[17], true)?, Edit::NoSelection);
    assert_eq!(sel.remove(&[2])?, Edit::NoSelection);
    assert_eq!(sel.level_nodes(), &before);
    Ok(())
}

#[test]
fn duplicate_positions_collapse() -> anyhow::Result<()> {
    let sel = ActiveSelection::new(eight_four_two()?);
    assert_eq!(sel.select(&[1, 1, 0, 5]), vec![vec![], vec![], vec![0, 1]]);
    assert_eq!(sel.level_boundaries(), vec![0, 0, 0, 2]);
    Ok(())
}

#[test]
fn reset_is_idempotent() -> anyhow::Result<()> {
    let mut sel = ActiveSelection::new(eight_four_two()?);
    sel.refine(&[0, 1], false)?;
    sel.reset();
    let once = sel.level_nodes().clone();
    sel.reset();
    assert_eq!(sel.level_nodes(), &once);
    sel.initialize();
    assert_eq!(sel.level_nodes(), &once);
    Ok(())
}

#[test]
fn combined_adjacency_mixes_levels() -> anyhow::Result<()> {
    let mut sel = ActiveSelection::new(eight_four_two()?);
    sel.refine(&[0], false)?;
    let a = Mat::from(&sel.combined_adjacency()?);
    assert_eq!(a.shape(), (3, 3));
    assert_eq!(a, a.transpose());
    for i in 0..3 {
        assert_eq!(a[(i, i)], 1.0);
    }
    // L2 node 1 = L1 {2, 3} touches L1 node 1 by the level-1 ring edge 1-2
    assert!(a[(1, 2)] > 0.0);
    Ok(())
}

#[test]
fn combined_adjacency_symmetric_over_lopsided_graphs() -> anyhow::Result<()> {
    // level graphs whose two triangles differ in the last bits
    let a0 = CoarsenAssignment::from_groups(4, &[vec![0, 1], vec![2, 3]])?;
    let c0 = membership(&RefineMap::from_assignment(&a0))?;
    let g0 = CscMat::from_nonzero_triplets(
        4,
        4,
        vec![
            (0, 1, 1.0),
            (1, 0, 1.000_000_1),
            (1, 2, 0.3),
            (2, 1, 0.300_000_04),
            (2, 3, 0.7),
            (3, 2, 0.7),
        ],
    )?;
    let g1 = CscMat::from_nonzero_triplets(2, 2, vec![(0, 1, 0.5), (1, 0, 0.500_000_06)])?;
    let h = HierarchyBuilder::new(vec![g0, g1], vec![a0], vec![c0]).fit()?;

    let mut sel = ActiveSelection::new(Arc::new(h));
    let a = Mat::from(&sel.combined_adjacency()?);
    assert_eq!(a, a.transpose());

    sel.refine(&[0], false)?;
    assert_eq!(sel.level_counts(), vec![2, 1]);
    let a = Mat::from(&sel.combined_adjacency()?);
    assert_eq!(a, a.transpose());
    assert_eq!(a[(0, 1)], a[(1, 0)]);

    sel.refine(&[2], false)?;
    assert_eq!(sel.level_counts(), vec![4, 0]);
    let a = Mat::from(&sel.combined_adjacency()?);
    assert_eq!(a, a.transpose());
    assert!(a.diagonal().iter().all(|&d| d == 1.0));
    Ok(())
}

#[test]
fn features_follow_active_nodes() -> anyhow::Result<()> {
    let mut sel = ActiveSelection::new(eight_four_two()?);
    sel.refine(&[0], false)?;

    let x = sel.feature_matrix()?;
    assert_eq!((x.nrows(), x.ncols()), (2, 3));

    // "ramp" is largest on the right half of the ring
    let scores = sel.feature_scores(&[1])?;
    assert_eq!(scores.len(), 3);
    assert_eq!(scores[2], 1.0);
    assert_eq!(scores[0], 0.0);

    let profile = sel.node_group_profile(&[2])?;
    assert_eq!(profile.len(), 2);
    Ok(())
}

#[test]
fn expansion_preserves_coverage() -> anyhow::Result<()> {
    for seed in 0..5 {
        let h = random_hierarchy(60, seed)?;
        let n0 = h.n_finest();
        let everything: Vec<usize> = (0..n0).collect();
        let mut rng = StdRng::seed_from_u64(seed + 100);

        let mut sel = ActiveSelection::new(h);
        for step in 0..25 {
            if step % 10 == 9 {
                sel.reset();
            } else {
                let flat = random_positions(&mut rng, sel.n_active());
                sel.refine(&flat, false)?;
            }
            assert_eq!(sel.finest_coverage(), everything);
            assert_eq!(sel.total_weight(), n0 as f32);
        }
    }
    Ok(())
}

#[test]
fn zoom_and_remove_shrink_coverage() -> anyhow::Result<()> {
    for seed in 0..5 {
        let h = random_hierarchy(50, seed)?;
        let mut rng = StdRng::seed_from_u64(seed + 200);
        let mut sel = ActiveSelection::new(h);

        for _ in 0..15 {
            if sel.n_active() == 0 {
                sel.reset();
            }
            let flat = random_positions(&mut rng, sel.n_active());
            let before = sel.finest_coverage();
            let selected = coverage_of(&sel, &flat);

            if rng.random_bool(0.5) {
                sel.refine(&flat, true)?;
                assert_eq!(sel.finest_coverage(), selected);
            } else {
                sel.remove(&flat)?;
                let expected: Vec<usize> = before
                    .iter()
                    .copied()
                    .filter(|i| selected.binary_search(i).is_err())
                    .collect();
                let after = sel.finest_coverage();
                assert_eq!(after, expected);
                assert!(after.len() < before.len());
            }
        }
    }
    Ok(())
}

#[test]
fn adjacency_symmetric_for_any_cut() -> anyhow::Result<()> {
    let h = random_hierarchy(40, 7)?;
    let mut rng = StdRng::seed_from_u64(7);
    let mut sel = ActiveSelection::new(h);

    for _ in 0..10 {
        let flat = random_positions(&mut rng, sel.n_active());
        sel.refine(&flat, false)?;

        let a = Mat::from(&sel.combined_adjacency()?);
        assert_eq!(a.nrows(), sel.n_active());
        assert_eq!(a, a.transpose());
        assert!(a.diagonal().iter().all(|&d| d == 1.0));
    }
    Ok(())
}

#[test]
fn weights_add_up_per_level() -> anyhow::Result<()> {
    let h = random_hierarchy(80, 3)?;
    for l in 0..h.n_levels() {
        let total: f32 = h.node_weights(l).iter().sum();
        assert_eq!(total, h.n_finest() as f32);
        for k in 0..h.level_size(l) {
            assert_eq!(
                h.node_weights(l)[k],
                h.finest_descendants(l, k).len() as f32
            );
        }
    }
    Ok(())
}
