use crate::traits::MatTriplets;

use fnv::FnvHashMap as HashMap;
use indicatif::ParallelProgressIterator;
use instant_distance::{Builder, HnswMap, Search};
use log::info;
use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;
use rayon::prelude::*;

/// Undirected kNN graph over the columns of a matrix
pub struct KnnGraph {
    /// `(i, j, distance)` with `i < j`, sorted, one entry per pair
    pub edges: Vec<(usize, usize, f32)>,
    pub n_nodes: usize,
}

pub struct KnnGraphArgs {
    pub knn: usize,
    /// keep a pair only if each end lists the other among its
    /// neighbours; otherwise either direction suffices
    pub reciprocal: bool,
}

impl Default for KnnGraphArgs {
    fn default() -> Self {
        Self {
            knn: 10,
            reciprocal: false,
        }
    }
}

#[derive(Clone, Debug)]
struct Column(Vec<f32>);

impl instant_distance::Point for Column {
    fn distance(&self, other: &Self) -> f32 {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Directed neighbour lists `(i, j) -> d`, self excluded
fn search_neighbours(points: &DMatrix<f32>, knn: usize) -> HashMap<(usize, usize), f32> {
    let nn = points.ncols();
    let columns: Vec<Column> = points
        .column_iter()
        .map(|x| Column(x.iter().copied().collect()))
        .collect();

    let index: HnswMap<Column, usize> =
        Builder::default().build(columns.clone(), (0..nn).collect());

    let n_query = (knn + 1).min(nn);

    (0..nn)
        .into_par_iter()
        .progress_count(nn as u64)
        .map_init(Search::default, |search, i| {
            index
                .search(&columns[i], search)
                .take(n_query)
                .filter(|hit| *hit.value != i)
                .map(|hit| ((i, *hit.value), hit.distance))
                .collect::<Vec<_>>()
        })
        .flatten()
        .collect()
}

/// Collapse directed pairs into undirected edges, keeping the shorter
/// of the two distances when both directions exist
fn symmetrize(directed: &HashMap<(usize, usize), f32>, reciprocal: bool) -> Vec<(usize, usize, f32)> {
    let mut edges: Vec<(usize, usize, f32)> = directed
        .iter()
        .filter_map(|(&(i, j), &d)| match directed.get(&(j, i)) {
            Some(&d_rev) if i < j => Some((i, j, d.min(d_rev))),
            None if !reciprocal => Some((i.min(j), i.max(j), d)),
            _ => None,
        })
        .collect();

    edges.sort_by_key(|&(i, j, _)| (i, j));
    edges.dedup_by_key(|e| (e.0, e.1));
    edges
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    Some(if n % 2 == 0 {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    } else {
        values[n / 2]
    })
}

impl KnnGraph {
    /// * `points` - d x n, one point per column
    pub fn from_columns(points: &DMatrix<f32>, args: &KnnGraphArgs) -> anyhow::Result<KnnGraph> {
        let nn = points.ncols();
        if nn < 2 {
            anyhow::bail!("need at least two points to build a graph, found {}", nn);
        }

        let directed = search_neighbours(points, args.knn);
        if directed.is_empty() {
            anyhow::bail!("no neighbour found among {} points", nn);
        }
        info!("{} directed neighbour pairs", directed.len());

        let edges = symmetrize(&directed, args.reciprocal);
        info!(
            "{} {} edges over {} nodes",
            edges.len(),
            if args.reciprocal { "reciprocal" } else { "union" },
            nn
        );

        Ok(KnnGraph { edges, n_nodes: nn })
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Median edge distance, or 1 for a degenerate graph
    pub fn bandwidth(&self) -> f32 {
        let mut d: Vec<f32> = self.edges.iter().map(|e| e.2).collect();
        match median(&mut d) {
            Some(sigma) if sigma > 0.0 => sigma,
            _ => 1.0,
        }
    }

    /// Symmetric `n x n` affinity `exp(-d / σ)` with an empty diagonal
    pub fn affinity(&self) -> anyhow::Result<CscMatrix<f32>> {
        let sigma = self.bandwidth();
        info!("affinity bandwidth σ = {:.4}", sigma);

        let triplets: Vec<(usize, usize, f32)> = self
            .edges
            .iter()
            .flat_map(|&(i, j, d)| {
                let w = (-d / sigma).exp();
                [(i, j, w), (j, i, w)]
            })
            .collect();
        CscMatrix::from_nonzero_triplets(self.n_nodes, self.n_nodes, triplets)
    }
}
