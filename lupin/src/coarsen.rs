use crate::common::*;
use crate::refine_map::{CoarsenAssignment, RefineMap};
use fnv::FnvHashMap as HashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Levels, assignments and operators of a coarsening run
pub struct Coarsening {
    /// `levels[l]`: `n_l x n_l` weighted adjacency, finest first
    pub levels: Vec<CscMat>,
    /// `assignments[l]` merges level `l` into level `l + 1`
    pub assignments: Vec<CoarsenAssignment>,
    /// `coarseners[l]`: `n_{l+1} x n_l` fine-to-coarse operator
    pub coarseners: Vec<CscMat>,
}

impl Coarsening {
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level_sizes(&self) -> Vec<usize> {
        self.levels.iter().map(|g| g.nrows()).collect()
    }
}

/// Anything that turns a graph into a stack of coarser graphs
pub trait CoarseningOracle {
    fn coarsen(&self, graph: &CscMat) -> anyhow::Result<Coarsening>;
}

#[derive(Debug, Clone)]
pub struct CoarsenArgs {
    /// stop once `1 - n_l / n_0` reaches this
    pub reduction: f32,
    /// maximum number of coarsening steps
    pub max_levels: usize,
    /// stop before a level would have fewer nodes than this
    pub min_nodes: usize,
}

impl Default for CoarsenArgs {
    fn default() -> Self {
        Self {
            reduction: 0.9,
            max_levels: 10,
            min_nodes: 2,
        }
    }
}

/// Greedy heavy-edge matching, one round of pairwise merges per level
pub struct HeavyEdgeCoarsening {
    pub args: CoarsenArgs,
}

impl HeavyEdgeCoarsening {
    pub fn new(args: CoarsenArgs) -> Self {
        Self { args }
    }
}

impl Default for HeavyEdgeCoarsening {
    fn default() -> Self {
        Self::new(CoarsenArgs::default())
    }
}

/// An edge ranked by weight (max-heap), lower indices first on ties
struct MatchCandidate {
    weight: f32,
    node_a: usize,
    node_b: usize,
}

impl PartialEq for MatchCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MatchCandidate {}

impl PartialOrd for MatchCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatchCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .partial_cmp(&other.weight)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node_a.cmp(&self.node_a))
            .then_with(|| other.node_b.cmp(&self.node_b))
    }
}

/// Pairs of matched nodes `[survivor, absorbed]`, survivor the smaller
fn heavy_edge_matching(graph: &CscMat) -> Vec<Vec<usize>> {
    let n = graph.nrows();

    let mut heap: BinaryHeap<MatchCandidate> = graph
        .triplet_iter()
        .filter(|&(i, j, &w)| i < j && w.is_finite() && w > 0.0)
        .map(|(i, j, &w)| MatchCandidate {
            weight: w,
            node_a: i,
            node_b: j,
        })
        .collect();

    let mut matched = vec![false; n];
    let mut groups = vec![];

    while let Some(c) = heap.pop() {
        if matched[c.node_a] || matched[c.node_b] {
            continue;
        }
        matched[c.node_a] = true;
        matched[c.node_b] = true;
        groups.push(vec![c.node_a, c.node_b]);
    }
    groups
}

/// `n_coarse x n_fine` with `1/√|group|` for every member
fn coarsening_operator(refine: &RefineMap) -> anyhow::Result<CscMat> {
    let mut triplets = Vec::with_capacity(refine.n_fine());
    for k in 0..refine.n_coarse() {
        let c = 1.0 / (refine.group_size(k) as f32).sqrt();
        triplets.extend(refine.expand(k).map(|i| (k, i, c)));
    }
    CscMat::from_nonzero_triplets(refine.n_coarse(), refine.n_fine(), triplets)
}

/// `M W M'` without self-loops, where `M` is the 0/1 membership.
/// Only the upper triangle is summed; the lower one is its mirror, so
/// the result is exactly symmetric.
fn coarse_graph(graph: &CscMat, refine: &RefineMap) -> anyhow::Result<CscMat> {
    let labels = refine.coarse_labels();
    let mut upper: HashMap<(usize, usize), f32> = HashMap::default();
    for (i, j, &w) in graph.triplet_iter() {
        let (a, b) = (labels[i], labels[j]);
        if a < b {
            *upper.entry((a, b)).or_insert(0.0) += w;
        }
    }
    let triplets: Vec<(usize, usize, f32)> = upper
        .into_iter()
        .flat_map(|((a, b), w)| [(a, b, w), (b, a, w)])
        .collect();
    let n = refine.n_coarse();
    CscMat::from_nonzero_triplets(n, n, triplets)
}

impl CoarseningOracle for HeavyEdgeCoarsening {
    fn coarsen(&self, graph: &CscMat) -> anyhow::Result<Coarsening> {
        if graph.nrows() != graph.ncols() {
            anyhow::bail!(
                "cannot coarsen a non-square graph [{} x {}]",
                graph.nrows(),
                graph.ncols()
            );
        }

        let n0 = graph.nrows();
        let mut levels = vec![graph.clone()];
        let mut assignments = vec![];
        let mut coarseners = vec![];

        while assignments.len() < self.args.max_levels {
            let current = &levels[levels.len() - 1];
            let n_curr = current.nrows();

            if 1.0 - (n_curr as f32) / (n0.max(1) as f32) >= self.args.reduction {
                break;
            }

            let mut groups = heavy_edge_matching(current);
            let room = n_curr.saturating_sub(self.args.min_nodes);
            if room == 0 || groups.is_empty() {
                break;
            }
            // each pair removes one node
            groups.truncate(room);

            let assignment = CoarsenAssignment::from_groups(n_curr, &groups)?;
            let refine = RefineMap::from_assignment(&assignment);
            let next = coarse_graph(current, &refine)?;
            let op = coarsening_operator(&refine)?;

            info!(
                "level {}: {} -> {} nodes, {} edges",
                assignments.len() + 1,
                n_curr,
                next.nrows(),
                next.nnz() / 2
            );

            levels.push(next);
            assignments.push(assignment);
            coarseners.push(op);
        }

        if assignments.is_empty() {
            warn!("the graph could not be coarsened; a single level is kept");
        }

        Ok(Coarsening {
            levels,
            assignments,
            coarseners,
        })
    }
}
