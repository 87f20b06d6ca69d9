use crate::common::*;
use crate::error::ensure_consistent;
use indicatif::{ProgressBar, ProgressStyle};
use std::borrow::Cow;

/// Edge weights between the nodes of any two levels.
///
/// Only the lower triangle `A[(to, from)]`, `from <= to`, is stored;
/// the upper blocks are transposes.
pub struct BlockAdjacency {
    blocks: Vec<Vec<CscMat>>,
}

fn new_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("Composing blocks {bar:40} {pos}/{len}") {
        pb.set_style(style);
    }
    pb
}

impl BlockAdjacency {
    /// Fill the block table level by level.
    ///
    /// `A[(l, f)] = C[l-1] * B[(l-1, f)]` for `f < l`, where `B` is the
    /// table with the raw level graphs on its diagonal. `A[(l, l)]` is
    /// the level-`l` graph with a unit diagonal, set after composition.
    ///
    /// * `graphs` - `graphs[l]` is the `n_l x n_l` adjacency of level `l`
    /// * `coarseners` - `coarseners[l]` is the `n_{l+1} x n_l` operator
    pub fn compose(graphs: &[CscMat], coarseners: &[CscMat]) -> anyhow::Result<Self> {
        let n_levels = graphs.len();
        ensure_consistent!(
            coarseners.len() + 1 == n_levels,
            "{} coarsening operators for {} levels",
            coarseners.len(),
            n_levels
        );

        for (l, c) in coarseners.iter().enumerate() {
            ensure_consistent!(
                c.nrows() == graphs[l + 1].nrows() && c.ncols() == graphs[l].nrows(),
                "operator {} -> {} is [{} x {}], but the levels have {} and {} nodes",
                l,
                l + 1,
                c.nrows(),
                c.ncols(),
                graphs[l + 1].nrows(),
                graphs[l].nrows()
            );
        }

        let pb = new_progress_bar((n_levels * (n_levels + 1) / 2) as u64);

        let mut blocks: Vec<Vec<CscMat>> = Vec::with_capacity(n_levels);
        for to in 0..n_levels {
            let mut row = Vec::with_capacity(to + 1);
            for from in 0..to {
                let prev = if from + 1 == to {
                    &graphs[from]
                } else {
                    &blocks[to - 1][from]
                };
                row.push(&coarseners[to - 1] * prev);
                pb.inc(1);
            }
            row.push(graphs[to].set_diagonal(1.0)?);
            pb.inc(1);
            blocks.push(row);
        }
        pb.finish_and_clear();

        debug!(
            "composed {} adjacency blocks over {} levels",
            blocks.iter().map(|b| b.len()).sum::<usize>(),
            n_levels
        );

        Ok(Self { blocks })
    }

    pub fn n_levels(&self) -> usize {
        self.blocks.len()
    }

    /// number of stored blocks, `L (L + 1) / 2`
    pub fn n_blocks(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }

    /// `A[(to, from)]` for `from <= to`
    pub fn lower(&self, to: usize, from: usize) -> &CscMat {
        debug_assert!(from <= to);
        &self.blocks[to][from]
    }

    /// `A[(to, from)]`: `n_to x n_from`, for any pair of levels
    pub fn block(&self, to: usize, from: usize) -> Cow<'_, CscMat> {
        if from <= to {
            Cow::Borrowed(self.lower(to, from))
        } else {
            Cow::Owned(self.lower(from, to).transpose())
        }
    }
}
