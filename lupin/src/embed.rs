use crate::common::*;

/// Anything that places nodes (or features) on a 2D canvas
pub trait EmbeddingOracle {
    /// `n x 2` coordinates for a symmetric `n x n` affinity
    fn embed_affinity(&self, affinity: &CscMat) -> anyhow::Result<Mat>;

    /// Coordinates of the non-empty rows of a `features x nodes`
    /// matrix, together with the indices of those rows
    fn embed_features(&self, features: &CscMat) -> anyhow::Result<(Vec<usize>, Mat)>;
}

#[derive(Debug, Clone)]
pub struct DiffusionMapArgs {
    /// diffusion time
    pub t: usize,
}

impl Default for DiffusionMapArgs {
    fn default() -> Self {
        Self { t: 1 }
    }
}

/// Two leading non-trivial diffusion components
pub struct DiffusionMap {
    pub args: DiffusionMapArgs,
}

impl DiffusionMap {
    pub fn new(args: DiffusionMapArgs) -> Self {
        Self { args }
    }
}

impl Default for DiffusionMap {
    fn default() -> Self {
        Self::new(DiffusionMapArgs::default())
    }
}

const N_DIM: usize = 2;

impl EmbeddingOracle for DiffusionMap {
    fn embed_affinity(&self, affinity: &CscMat) -> anyhow::Result<Mat> {
        let n = affinity.nrows();
        if n != affinity.ncols() {
            anyhow::bail!("affinity is not square [{} x {}]", n, affinity.ncols());
        }
        if n <= 1 {
            return Ok(Mat::zeros(n, N_DIM));
        }

        // D^{-1/2} A D^{-1/2}
        let inv_sqrt_deg: Vec<f32> = affinity
            .column_sums()
            .into_iter()
            .map(|d| if d > 0.0 { 1.0 / d.sqrt() } else { 1.0 })
            .collect();

        let mut sym = Mat::zeros(n, n);
        for (i, j, &a_ij) in affinity.triplet_iter() {
            sym[(i, j)] = a_ij * inv_sqrt_deg[i] * inv_sqrt_deg[j];
        }

        let eig = sym.symmetric_eigen();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            eig.eigenvalues[b]
                .partial_cmp(&eig.eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut coords = Mat::zeros(n, N_DIM);
        for (k, &c) in order.iter().skip(1).take(N_DIM).enumerate() {
            let lambda_t = eig.eigenvalues[c].powi(self.args.t as i32);
            for i in 0..n {
                coords[(i, k)] = eig.eigenvectors[(i, c)] * inv_sqrt_deg[i] * lambda_t;
            }
        }
        debug!("diffusion map of {} nodes", n);
        Ok(coords)
    }

    fn embed_features(&self, features: &CscMat) -> anyhow::Result<(Vec<usize>, Mat)> {
        let norms: Vec<f32> = features
            .transpose()
            .col_iter()
            .map(|x_g| x_g.values().iter().map(|x| x * x).sum::<f32>().sqrt())
            .collect();

        let kept: Vec<usize> = (0..features.nrows()).filter(|&g| norms[g] > 0.0).collect();
        if kept.len() < features.nrows() {
            info!("{} empty feature(s) left out", features.nrows() - kept.len());
        }

        // cosine similarity between the kept rows
        let mut x = features.select_rows(&kept)?;
        {
            let (_, row_indices, values) = x.csc_data_mut();
            for (&i, x_ij) in row_indices.iter().zip(values.iter_mut()) {
                *x_ij /= norms[kept[i]];
            }
        }
        let xt = x.transpose();
        let affinity = &x * &xt;

        let coords = self.embed_affinity(&affinity)?;
        Ok((kept, coords))
    }
}
