use crate::block_adjacency::BlockAdjacency;
use crate::coarsen::Coarsening;
use crate::common::*;
use crate::error::ensure_consistent;
use crate::refine_map::{CoarsenAssignment, RefineMap};

/// Library size that each feature row is scaled to
pub const DEFAULT_RESCALE: f32 = 10_000.0;

/// Immutable multi-resolution summary of a coarsened graph.
///
/// Level 0 is the finest (original) level. Everything here is derived
/// once by [`HierarchyBuilder::fit`] and never mutated afterwards, so a
/// `Hierarchy` can be shared freely (e.g., behind an `Arc`).
pub struct Hierarchy {
    level_sizes: Vec<usize>,
    /// `refine_maps[l - 1]` maps level `l` to level `l - 1`
    refine_maps: Vec<RefineMap>,
    node_weights: Vec<Vec<f32>>,
    /// `features[l]`: features x level-`l` nodes
    features: Vec<CscMat>,
    feature_names: Vec<Box<str>>,
    adjacency: BlockAdjacency,
}

pub struct HierarchyBuilder {
    graphs: Vec<CscMat>,
    assignments: Vec<CoarsenAssignment>,
    coarseners: Vec<CscMat>,
    features: Option<(CscMat, Vec<Box<str>>)>,
    rescale: f32,
}

impl HierarchyBuilder {
    /// * `graphs` - level graphs, finest to coarsest
    /// * `assignments` - `assignments[l]` merges level `l` into `l + 1`
    /// * `coarseners` - `coarseners[l]`: `n_{l+1} x n_l` linear operator
    pub fn new(
        graphs: Vec<CscMat>,
        assignments: Vec<CoarsenAssignment>,
        coarseners: Vec<CscMat>,
    ) -> Self {
        Self {
            graphs,
            assignments,
            coarseners,
            features: None,
            rescale: DEFAULT_RESCALE,
        }
    }

    pub fn from_coarsening(coarsening: Coarsening) -> Self {
        Self::new(
            coarsening.levels,
            coarsening.assignments,
            coarsening.coarseners,
        )
    }

    /// * `features` - features x finest-level nodes
    /// * `names` - one name per feature row
    pub fn with_features(mut self, features: CscMat, names: Vec<Box<str>>) -> Self {
        self.features = Some((features, names));
        self
    }

    pub fn with_rescale(mut self, rescale: f32) -> Self {
        self.rescale = rescale;
        self
    }

    fn validate(&self) -> anyhow::Result<Vec<usize>> {
        let n_levels = self.graphs.len();
        ensure_consistent!(n_levels > 0, "no coarsening level");

        for (l, g) in self.graphs.iter().enumerate() {
            ensure_consistent!(
                g.nrows() == g.ncols(),
                "graph of level {} is not square [{} x {}]",
                l,
                g.nrows(),
                g.ncols()
            );
        }
        let level_sizes: Vec<usize> = self.graphs.iter().map(|g| g.nrows()).collect();

        ensure_consistent!(
            self.assignments.len() + 1 == n_levels,
            "{} assignments for {} levels",
            self.assignments.len(),
            n_levels
        );

        ensure_consistent!(
            self.coarseners.len() + 1 == n_levels,
            "{} coarsening operators for {} levels",
            self.coarseners.len(),
            n_levels
        );

        for (l, a) in self.assignments.iter().enumerate() {
            ensure_consistent!(
                a.n_fine() == level_sizes[l],
                "assignment {} -> {} expects {} fine nodes, level {} has {}",
                l,
                l + 1,
                a.n_fine(),
                l,
                level_sizes[l]
            );
            ensure_consistent!(
                a.n_coarse() == level_sizes[l + 1],
                "assignment {} -> {} leaves {} nodes, level {} has {}",
                l,
                l + 1,
                a.n_coarse(),
                l + 1,
                level_sizes[l + 1]
            );
        }

        for (l, c) in self.coarseners.iter().enumerate() {
            ensure_consistent!(
                c.nrows() == level_sizes[l + 1] && c.ncols() == level_sizes[l],
                "operator {} -> {} is [{} x {}], expected [{} x {}]",
                l,
                l + 1,
                c.nrows(),
                c.ncols(),
                level_sizes[l + 1],
                level_sizes[l]
            );
        }

        if let Some((x, names)) = &self.features {
            ensure_consistent!(
                x.ncols() == level_sizes[0],
                "feature matrix has {} columns, the finest level has {} nodes",
                x.ncols(),
                level_sizes[0]
            );
            ensure_consistent!(
                names.len() == x.nrows(),
                "{} feature names for {} feature rows",
                names.len(),
                x.nrows()
            );
        }

        Ok(level_sizes)
    }

    /// Derive refine maps, node weights, feature summaries and the
    /// cross-level adjacency blocks
    pub fn fit(self) -> anyhow::Result<Hierarchy> {
        let level_sizes = self.validate()?;

        let refine_maps: Vec<RefineMap> = self
            .assignments
            .iter()
            .map(RefineMap::from_assignment)
            .collect();

        let node_weights = build_node_weights(level_sizes[0], &refine_maps);

        let (features0, feature_names) = match self.features {
            Some((x, names)) => (x, names),
            None => (CscMat::zeros(0, level_sizes[0]), vec![]),
        };

        let features = build_features(features0, &refine_maps, self.rescale)?;

        let adjacency = BlockAdjacency::compose(&self.graphs, &self.coarseners)?;

        info!(
            "fitted a hierarchy of {} levels: {:?} nodes, {} features",
            level_sizes.len(),
            level_sizes,
            feature_names.len()
        );

        Ok(Hierarchy {
            level_sizes,
            refine_maps,
            node_weights,
            features,
            feature_names,
            adjacency,
        })
    }
}

/// level 0: all ones; level `l`: sum of the children's weights
fn build_node_weights(n_finest: usize, refine_maps: &[RefineMap]) -> Vec<Vec<f32>> {
    let mut ret = vec![vec![1_f32; n_finest]];
    for r in refine_maps {
        let prev = &ret[ret.len() - 1];
        let w: Vec<f32> = (0..r.n_coarse())
            .map(|k| r.expand(k).map(|i| prev[i]).sum())
            .collect();
        ret.push(w);
    }
    ret
}

/// Aggregate raw feature columns bottom-up (mean over each merged
/// group), then scale each level's feature rows to `rescale`
fn build_features(
    finest: CscMat,
    refine_maps: &[RefineMap],
    rescale: f32,
) -> anyhow::Result<Vec<CscMat>> {
    let mut raw = vec![finest];

    for r in refine_maps {
        let prev = &raw[raw.len() - 1];
        let mut triplets = Vec::with_capacity(prev.nnz());
        for k in 0..r.n_coarse() {
            let denom = r.group_size(k) as f32;
            for i in r.expand(k) {
                let x_i = prev.col(i);
                for (&g, &x_gi) in x_i.row_indices().iter().zip(x_i.values()) {
                    triplets.push((g, k, x_gi / denom));
                }
            }
        }
        let next = CscMat::from_nonzero_triplets(prev.nrows(), r.n_coarse(), triplets)?;
        raw.push(next);
    }

    for x in raw.iter_mut() {
        x.normalize_rows_inplace(rescale);
    }
    Ok(raw)
}

impl Hierarchy {
    pub fn n_levels(&self) -> usize {
        self.level_sizes.len()
    }

    pub fn level_size(&self, level: usize) -> usize {
        self.level_sizes[level]
    }

    pub fn level_sizes(&self) -> &[usize] {
        &self.level_sizes
    }

    pub fn n_finest(&self) -> usize {
        self.level_sizes[0]
    }

    /// The map from `level` down to `level - 1`; `None` for the finest
    /// level and past the coarsest
    pub fn refine_map(&self, level: usize) -> Option<&RefineMap> {
        level.checked_sub(1).and_then(|l| self.refine_maps.get(l))
    }

    /// Number of finest-level nodes under each node of `level`
    pub fn node_weights(&self, level: usize) -> &[f32] {
        &self.node_weights[level]
    }

    /// features x nodes at `level`
    pub fn features(&self, level: usize) -> &CscMat {
        &self.features[level]
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_names(&self) -> &[Box<str>] {
        &self.feature_names
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|x| x.as_ref() == name)
    }

    pub fn adjacency(&self) -> &BlockAdjacency {
        &self.adjacency
    }

    /// Number of undirected edges in the graph of `level`, self-loops aside
    pub fn n_edges(&self, level: usize) -> usize {
        let a = self.adjacency.lower(level, level);
        a.triplet_iter().filter(|&(i, j, _)| i < j).count()
    }

    /// Empty node sets for every level; `initialized` activates all
    /// nodes of the coarsest level
    pub fn create_level_nodes(&self, initialized: bool) -> LevelNodes {
        let mut ret = vec![vec![]; self.n_levels()];
        if initialized {
            let top = self.n_levels() - 1;
            ret[top] = (0..self.level_sizes[top]).collect();
        }
        ret
    }

    /// Children of `nodes` (at `level >= 1`), sorted
    pub fn refine_level(&self, nodes: &[usize], level: usize) -> anyhow::Result<Vec<usize>> {
        match self.refine_map(level) {
            Some(r) => r.refine_nodes(nodes),
            None => Err(HierarchyError::inconsistent(format!(
                "cannot refine level {} of {}",
                level,
                self.n_levels()
            ))
            .into()),
        }
    }

    /// Move every node one level down; level-0 nodes stay where they are
    pub fn refine(&self, level_nodes: &LevelNodes) -> anyhow::Result<LevelNodes> {
        ensure_consistent!(
            level_nodes.len() == self.n_levels(),
            "{} node sets for {} levels",
            level_nodes.len(),
            self.n_levels()
        );

        let mut ret = self.create_level_nodes(false);
        for level in 1..self.n_levels() {
            ret[level - 1] = self.refine_level(&level_nodes[level], level)?;
        }
        ret[0] = sorted_union(&ret[0], &level_nodes[0]);
        Ok(ret)
    }

    /// All finest-level nodes under `node` of `level`; empty for a
    /// level that does not exist
    pub fn finest_descendants(&self, level: usize, node: usize) -> Vec<usize> {
        if level >= self.n_levels() {
            return vec![];
        }
        let mut frontier = vec![node];
        for r in self.refine_maps[..level].iter().rev() {
            frontier = frontier.iter().flat_map(|&k| r.expand(k)).collect();
        }
        frontier.sort_unstable();
        frontier
    }
}

/// Union of two sorted, duplicate-free index sets
pub fn sorted_union(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut ret = Vec::with_capacity(a.len() + b.len());
    ret.extend_from_slice(a);
    ret.extend_from_slice(b);
    ret.sort_unstable();
    ret.dedup();
    ret
}

/// `a \ b`. If either side is empty `a` comes back unchanged: an
/// empty operand can neither remove nor add anything.
pub fn sorted_difference(a: &[usize], b: &[usize]) -> Vec<usize> {
    if a.is_empty() || b.is_empty() {
        return a.to_vec();
    }
    a.iter()
        .copied()
        .filter(|x| b.binary_search(x).is_err())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// sizes [8, 4, 2]
    /// level 1: {0,1,2}, {3}, {4,5}, {6,7}
    /// level 2: {0,1}, {2,3}
    fn toy_builder() -> anyhow::Result<HierarchyBuilder> {
        let a0 = CoarsenAssignment::from_groups(8, &[vec![0, 1, 2], vec![4, 5], vec![6, 7]])?;
        let a1 = CoarsenAssignment::from_groups(4, &[vec![0, 1], vec![2, 3]])?;
        let c0 = membership(&RefineMap::from_assignment(&a0))?;
        let c1 = membership(&RefineMap::from_assignment(&a1))?;
        let graphs = vec![CscMat::zeros(8, 8), CscMat::zeros(4, 4), CscMat::zeros(2, 2)];
        Ok(HierarchyBuilder::new(graphs, vec![a0, a1], vec![c0, c1]))
    }

    fn membership(r: &RefineMap) -> anyhow::Result<CscMat> {
        let triplets: Vec<(usize, usize, f32)> = (0..r.n_coarse())
            .flat_map(|k| r.expand(k).map(move |i| (k, i, 1.0)))
            .collect();
        CscMat::from_nonzero_triplets(r.n_coarse(), r.n_fine(), triplets)
    }

    #[test]
    fn weights_count_finest_nodes() -> anyhow::Result<()> {
        let h = toy_builder()?.fit()?;
        assert_eq!(h.node_weights(0), &[1.0; 8]);
        assert_eq!(h.node_weights(1), &[3.0, 1.0, 2.0, 2.0]);
        assert_eq!(h.node_weights(2), &[4.0, 4.0]);
        Ok(())
    }

    #[test]
    fn features_average_merged_groups() -> anyhow::Result<()> {
        // one feature: value = node index + 1
        let x = CscMat::from_nonzero_triplets(
            1,
            8,
            (0..8).map(|j| (0, j, (j + 1) as f32)).collect::<Vec<(usize, usize, f32)>>(),
        )?;
        let h = toy_builder()?
            .with_features(x, vec!["g".into()])
            .with_rescale(1.0)
            .fit()?;

        // raw level-1 means: 2, 4, 5.5, 7.5 -> total 19
        let x1 = Mat::from(h.features(1));
        assert_abs_diff_eq!(x1[(0, 0)], 2.0 / 19.0, epsilon = 1e-6);
        assert_abs_diff_eq!(x1[(0, 2)], 5.5 / 19.0, epsilon = 1e-6);
        assert_abs_diff_eq!(x1.sum(), 1.0, epsilon = 1e-6);

        // raw level-2 means: 3, 6.5
        let x2 = Mat::from(h.features(2));
        assert_abs_diff_eq!(x2[(0, 1)], 6.5 / 9.5, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn bad_level_size_is_rejected() -> anyhow::Result<()> {
        let mut b = toy_builder()?;
        b.graphs[1] = CscMat::zeros(5, 5);
        let err = b.fit().err().ok_or(anyhow::anyhow!("should fail"))?;
        assert!(matches!(
            err.downcast_ref::<HierarchyError>(),
            Some(HierarchyError::Inconsistent { .. })
        ));
        Ok(())
    }

    #[test]
    fn refine_moves_one_level_down() -> anyhow::Result<()> {
        let h = toy_builder()?.fit()?;
        let nodes = vec![vec![7], vec![2], vec![0]];
        let refined = h.refine(&nodes)?;
        assert_eq!(refined, vec![vec![4, 5, 7], vec![0, 1], vec![]]);
        assert_eq!(h.finest_descendants(2, 1), vec![4, 5, 6, 7]);
        Ok(())
    }

    #[test]
    fn refine_map_exists_between_levels_only() -> anyhow::Result<()> {
        let h = toy_builder()?.fit()?;
        assert!(h.refine_map(0).is_none());
        assert!(h.refine_map(3).is_none());
        assert_eq!(h.refine_map(1).map(|r| r.n_fine()), Some(8));
        assert_eq!(h.refine_map(2).map(|r| r.n_coarse()), Some(2));

        let err = h
            .refine_level(&[0], 0)
            .err()
            .ok_or(anyhow::anyhow!("level 0 has no children"))?;
        assert!(matches!(
            err.downcast_ref::<HierarchyError>(),
            Some(HierarchyError::Inconsistent { .. })
        ));
        assert!(h.finest_descendants(3, 0).is_empty());
        Ok(())
    }

    #[test]
    fn set_operations_treat_empty_operands() {
        assert_eq!(sorted_difference(&[1, 2, 3], &[]), vec![1, 2, 3]);
        assert_eq!(sorted_difference(&[], &[1]), Vec::<usize>::new());
        assert_eq!(sorted_difference(&[1, 2, 3], &[2]), vec![1, 3]);
        assert_eq!(sorted_union(&[3, 5], &[1, 5]), vec![1, 3, 5]);
    }
}
