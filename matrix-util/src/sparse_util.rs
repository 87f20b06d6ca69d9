use crate::traits::*;
use fnv::FnvHashMap as HashMap;
use nalgebra_sparse::{CooMatrix, CscMatrix};

fn check_bound(idx: &[usize], n: usize, what: &str) -> anyhow::Result<()> {
    if let Some(&bad) = idx.iter().find(|&&i| i >= n) {
        anyhow::bail!("{} index {} out of bound {}", what, bad, n);
    }
    Ok(())
}

/// old row index -> positions in the selection (a row can be picked
/// more than once)
fn row_lookup(rows: &[usize]) -> HashMap<usize, Vec<usize>> {
    let mut ret: HashMap<usize, Vec<usize>> = HashMap::default();
    for (new_i, &old_i) in rows.iter().enumerate() {
        ret.entry(old_i).or_default().push(new_i);
    }
    ret
}

impl MatTriplets for CscMatrix<f32> {
    type Mat = Self;
    type Scalar = f32;

    fn from_nonzero_triplets<I>(
        nrow: usize,
        ncol: usize,
        triplets: Vec<(I, I, Self::Scalar)>,
    ) -> anyhow::Result<Self::Mat>
    where
        I: TryInto<usize> + Copy,
        <I as TryInto<usize>>::Error: std::fmt::Debug,
    {
        let mut coo = CooMatrix::<f32>::new(nrow, ncol);
        for (ii, jj, x_ij) in triplets {
            let i: usize = ii
                .try_into()
                .map_err(|e| anyhow::anyhow!("bad row index: {:?}", e))?;
            let j: usize = jj
                .try_into()
                .map_err(|e| anyhow::anyhow!("bad column index: {:?}", e))?;
            if i >= nrow || j >= ncol {
                anyhow::bail!("({}, {}) out of bound [{} x {}]", i, j, nrow, ncol);
            }
            coo.push(i, j, x_ij);
        }
        Ok(CscMatrix::from(&coo))
    }

    fn to_nonzero_triplets(
        &self,
    ) -> anyhow::Result<(usize, usize, Vec<(usize, usize, Self::Scalar)>)> {
        let triplets = self
            .triplet_iter()
            .map(|(i, j, &x_ij)| (i, j, x_ij))
            .collect();
        Ok((self.nrows(), self.ncols(), triplets))
    }
}

impl SparseSliceOps for CscMatrix<f32> {
    type Mat = Self;

    fn select_rows(&self, rows: &[usize]) -> anyhow::Result<Self::Mat> {
        let cols: Vec<usize> = (0..self.ncols()).collect();
        self.select_submatrix(rows, &cols)
    }

    fn select_columns(&self, cols: &[usize]) -> anyhow::Result<Self::Mat> {
        check_bound(cols, self.ncols(), "column")?;

        let mut triplets = vec![];
        for (new_j, &old_j) in cols.iter().enumerate() {
            let x_j = self.col(old_j);
            for (&i, &x_ij) in x_j.row_indices().iter().zip(x_j.values()) {
                triplets.push((i, new_j, x_ij));
            }
        }
        CscMatrix::from_nonzero_triplets(self.nrows(), cols.len(), triplets)
    }

    fn select_submatrix(&self, rows: &[usize], cols: &[usize]) -> anyhow::Result<Self::Mat> {
        check_bound(rows, self.nrows(), "row")?;
        check_bound(cols, self.ncols(), "column")?;

        let lookup = row_lookup(rows);
        let mut triplets = vec![];
        for (new_j, &old_j) in cols.iter().enumerate() {
            let x_j = self.col(old_j);
            for (i, &x_ij) in x_j.row_indices().iter().zip(x_j.values()) {
                if let Some(new_rows) = lookup.get(i) {
                    for &new_i in new_rows {
                        triplets.push((new_i, new_j, x_ij));
                    }
                }
            }
        }
        CscMatrix::from_nonzero_triplets(rows.len(), cols.len(), triplets)
    }

    fn hstack(blocks: &[Self::Mat]) -> anyhow::Result<Self::Mat> {
        let nrows = match blocks.first() {
            Some(b) => b.nrows(),
            None => return Ok(CscMatrix::zeros(0, 0)),
        };

        let mut triplets = vec![];
        let mut offset = 0;
        for b in blocks {
            if b.nrows() != nrows {
                anyhow::bail!("hstack: {} rows vs. {} rows", b.nrows(), nrows);
            }
            triplets.extend(b.triplet_iter().map(|(i, j, &x_ij)| (i, j + offset, x_ij)));
            offset += b.ncols();
        }
        CscMatrix::from_nonzero_triplets(nrows, offset, triplets)
    }
}

impl SparseDiagOps for CscMatrix<f32> {
    type Mat = Self;
    type Scalar = f32;

    fn set_diagonal(&self, value: f32) -> anyhow::Result<Self::Mat> {
        if self.nrows() != self.ncols() {
            anyhow::bail!(
                "set_diagonal on a non-square matrix [{} x {}]",
                self.nrows(),
                self.ncols()
            );
        }
        let nn = self.nrows();
        let mut triplets: Vec<(usize, usize, f32)> = self
            .triplet_iter()
            .filter(|&(i, j, _)| i != j)
            .map(|(i, j, &x_ij)| (i, j, x_ij))
            .collect();
        triplets.extend((0..nn).map(|i| (i, i, value)));
        CscMatrix::from_nonzero_triplets(nn, nn, triplets)
    }
}

impl SparseNormOps for CscMatrix<f32> {
    type Scalar = f32;

    fn row_sums(&self) -> Vec<f32> {
        let mut ret = vec![0_f32; self.nrows()];
        for (i, _, &x_ij) in self.triplet_iter() {
            ret[i] += x_ij;
        }
        ret
    }

    fn column_sums(&self) -> Vec<f32> {
        self.col_iter().map(|x_j| x_j.values().iter().sum()).collect()
    }

    fn normalize_rows_inplace(&mut self, rescale: f32) {
        let totals = self.row_sums();
        let (_, row_indices, values) = self.csc_data_mut();
        for (&i, x_ij) in row_indices.iter().zip(values.iter_mut()) {
            let tot = totals[i];
            if tot != 0.0 {
                *x_ij *= rescale / tot;
            }
        }
    }
}
