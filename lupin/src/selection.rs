use crate::common::*;
use crate::hierarchy::{sorted_difference, sorted_union, Hierarchy};
use std::sync::Arc;

/// Result of an edit on the active set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    /// The active set was replaced; `n_active` nodes are now displayed
    Applied { n_active: usize },
    /// Nothing was selected, so nothing changed
    NoSelection,
}

/// The cut of the hierarchy that is currently displayed.
///
/// Active nodes are listed per level, sorted within a level. The
/// displayed ordering (used by every flat index) concatenates the
/// levels finest first.
#[derive(Clone)]
pub struct ActiveSelection {
    hierarchy: Arc<Hierarchy>,
    level_nodes: LevelNodes,
}

impl ActiveSelection {
    /// A selection showing the whole coarsest level
    pub fn new(hierarchy: Arc<Hierarchy>) -> Self {
        let level_nodes = hierarchy.create_level_nodes(true);
        Self {
            hierarchy,
            level_nodes,
        }
    }

    pub fn hierarchy(&self) -> &Arc<Hierarchy> {
        &self.hierarchy
    }

    pub fn initialize(&mut self) {
        self.reset();
    }

    /// Back to all nodes of the coarsest level
    pub fn reset(&mut self) {
        self.level_nodes = self.hierarchy.create_level_nodes(true);
        debug!("reset to {} coarsest nodes", self.n_active());
    }

    pub fn level_nodes(&self) -> &LevelNodes {
        &self.level_nodes
    }

    pub fn level_counts(&self) -> Vec<usize> {
        self.level_nodes.iter().map(|x| x.len()).collect()
    }

    /// Cumulative counts `[0, c_0, c_0 + c_1, ...]`; level `l` occupies
    /// flat positions `b[l]..b[l + 1]`
    pub fn level_boundaries(&self) -> Vec<usize> {
        let mut ret = Vec::with_capacity(self.level_nodes.len() + 1);
        ret.push(0);
        let mut acc = 0;
        for nodes in &self.level_nodes {
            acc += nodes.len();
            ret.push(acc);
        }
        ret
    }

    pub fn n_active(&self) -> usize {
        self.level_nodes.iter().map(|x| x.len()).sum()
    }

    /// `(level, node)` at the flat position `flat`
    pub fn locate(&self, flat: usize) -> Option<(usize, usize)> {
        let bounds = self.level_boundaries();
        if flat >= bounds[bounds.len() - 1] {
            return None;
        }
        let level = bounds.partition_point(|&b| b <= flat) - 1;
        Some((level, self.level_nodes[level][flat - bounds[level]]))
    }

    /// Translate flat positions into level-local node indices.
    /// Duplicates collapse; out-of-range positions are dropped.
    pub fn select(&self, flat: &[usize]) -> LevelNodes {
        let n_active = self.n_active();
        let mut flat = flat.to_vec();
        flat.sort_unstable();
        flat.dedup();

        let n_bad = flat.iter().filter(|&&i| i >= n_active).count();
        if n_bad > 0 {
            warn!(
                "ignoring {} selected position(s) beyond {} active nodes",
                n_bad, n_active
            );
        }

        let mut ret = self.hierarchy.create_level_nodes(false);
        for i in flat.into_iter().filter(|&i| i < n_active) {
            if let Some((level, node)) = self.locate(i) {
                ret[level].push(node);
            }
        }
        ret
    }

    /// Expand (`remove_deselected = false`) or zoom into (`true`) the
    /// selected nodes, one level down
    pub fn refine(&mut self, flat: &[usize], remove_deselected: bool) -> anyhow::Result<Edit> {
        let selected = self.select(flat);
        if is_empty(&selected) {
            warn!("nothing selected to refine");
            return Ok(Edit::NoSelection);
        }

        let refined = self.hierarchy.refine(&selected)?;

        let next: LevelNodes = if remove_deselected {
            refined
        } else {
            refined
                .iter()
                .zip(self.level_nodes.iter().zip(selected.iter()))
                .map(|(r, (active, sel))| sorted_union(r, &sorted_difference(active, sel)))
                .collect()
        };

        Ok(self.replace(next))
    }

    /// Drop the selected nodes from display
    pub fn remove(&mut self, flat: &[usize]) -> anyhow::Result<Edit> {
        let selected = self.select(flat);
        if is_empty(&selected) {
            warn!("nothing selected to remove");
            return Ok(Edit::NoSelection);
        }

        let next: LevelNodes = self
            .level_nodes
            .iter()
            .zip(selected.iter())
            .map(|(active, sel)| sorted_difference(active, sel))
            .collect();

        Ok(self.replace(next))
    }

    fn replace(&mut self, next: LevelNodes) -> Edit {
        self.level_nodes = next;
        let n_active = self.n_active();
        debug!("active nodes per level: {:?}", self.level_counts());
        Edit::Applied { n_active }
    }

    /// Weight of each active node, in display order
    pub fn node_weights(&self) -> Vec<f32> {
        self.level_nodes
            .iter()
            .enumerate()
            .flat_map(|(l, nodes)| {
                let w = self.hierarchy.node_weights(l);
                nodes.iter().map(move |&k| w[k])
            })
            .collect()
    }

    pub fn total_weight(&self) -> f32 {
        self.node_weights().iter().sum()
    }

    /// Sorted finest-level nodes represented by the active set
    pub fn finest_coverage(&self) -> Vec<usize> {
        let mut ret: Vec<usize> = self
            .level_nodes
            .iter()
            .enumerate()
            .flat_map(|(l, nodes)| {
                nodes
                    .iter()
                    .flat_map(move |&k| self.hierarchy.finest_descendants(l, k))
            })
            .collect();
        ret.sort_unstable();
        ret
    }

    /// features x active nodes
    pub fn feature_matrix(&self) -> anyhow::Result<CscMat> {
        let blocks = self
            .level_nodes
            .iter()
            .enumerate()
            .map(|(l, nodes)| self.hierarchy.features(l).select_columns(nodes))
            .collect::<anyhow::Result<Vec<_>>>()?;
        CscMat::hstack(&blocks)
    }

    /// Symmetric adjacency over the active nodes with a unit diagonal
    pub fn combined_adjacency(&self) -> anyhow::Result<CscMat> {
        let n = self.n_active();
        let bounds = self.level_boundaries();
        let adj = self.hierarchy.adjacency();

        let mut triplets = vec![];
        for to in 0..self.level_nodes.len() {
            for from in 0..=to {
                let (rows, cols) = (&self.level_nodes[to], &self.level_nodes[from]);
                if rows.is_empty() || cols.is_empty() {
                    continue;
                }
                let block = adj.lower(to, from).select_submatrix(rows, cols)?;
                let (r0, c0) = (bounds[to], bounds[from]);
                // same-level blocks contribute their lower triangle only;
                // every entry is then mirrored
                for (i, j, &a_ij) in block.triplet_iter() {
                    if to == from && i <= j {
                        continue;
                    }
                    triplets.push((r0 + i, c0 + j, a_ij));
                    triplets.push((c0 + j, r0 + i, a_ij));
                }
            }
        }

        CscMat::from_nonzero_triplets(n, n, triplets)?.set_diagonal(1.0)
    }

    /// Per active node, the summed values of `features`, scaled to [0, 1]
    pub fn feature_scores(&self, features: &[usize]) -> anyhow::Result<Vec<f32>> {
        let n_features = self.hierarchy.n_features();
        let features: Vec<usize> = features
            .iter()
            .copied()
            .filter(|&g| {
                let ok = g < n_features;
                if !ok {
                    warn!("feature {} out of {}", g, n_features);
                }
                ok
            })
            .collect();

        let x = self.feature_matrix()?.select_rows(&features)?;
        let mut scores = x.column_sums();
        min_max_scale(&mut scores);
        Ok(scores)
    }

    /// Per feature, the summed values over the selected active nodes,
    /// scaled to [0, 1]
    pub fn node_group_profile(&self, flat: &[usize]) -> anyhow::Result<Vec<f32>> {
        let n_active = self.n_active();
        let mut cols: Vec<usize> = flat.iter().copied().filter(|&i| i < n_active).collect();
        cols.sort_unstable();
        cols.dedup();
        if cols.len() < flat.len() {
            debug!("{} duplicate or out-of-range positions", flat.len() - cols.len());
        }

        let x = self.feature_matrix()?.select_columns(&cols)?;
        let mut profile = x.row_sums();
        min_max_scale(&mut profile);
        Ok(profile)
    }
}

fn is_empty(level_nodes: &LevelNodes) -> bool {
    level_nodes.iter().all(|x| x.is_empty())
}

/// `(x - min) / (max - min)`, skipped when the range is zero
pub fn min_max_scale(xx: &mut [f32]) {
    let (lb, ub) = xx
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lb, ub), &x| {
            (lb.min(x), ub.max(x))
        });
    let range = ub - lb;
    if range.is_nan() || range <= 0.0 {
        return;
    }
    xx.iter_mut().for_each(|x| *x = (*x - lb) / range);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_scale_skips_flat_vectors() {
        let mut x = vec![2.0, 2.0, 2.0];
        min_max_scale(&mut x);
        assert_eq!(x, vec![2.0, 2.0, 2.0]);

        let mut y = vec![1.0, 3.0, 2.0];
        min_max_scale(&mut y);
        assert_eq!(y, vec![0.0, 1.0, 0.5]);

        let mut z: Vec<f32> = vec![];
        min_max_scale(&mut z);
        assert!(z.is_empty());
    }
}
