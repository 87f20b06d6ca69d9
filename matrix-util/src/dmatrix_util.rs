use crate::traits::SampleOps;
use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

impl SampleOps for DMatrix<f32> {
    type Mat = Self;
    type Scalar = f32;

    /// Sample d,n matrix from U(0,1)
    fn runif(dd: usize, nn: usize) -> Self::Mat {
        let rvec = (0..(dd * nn))
            .into_par_iter()
            .map_init(rand::rng, |rng, _| rng.random::<f32>())
            .collect();
        DMatrix::<f32>::from_vec(dd, nn, rvec)
    }

    /// Sample d,n matrix from N(0,1)
    fn rnorm(dd: usize, nn: usize) -> Self::Mat {
        let rvec = (0..(dd * nn))
            .into_par_iter()
            .map_init(rand::rng, |rng, _| rng.sample::<f32, _>(StandardNormal))
            .collect();
        DMatrix::<f32>::from_vec(dd, nn, rvec)
    }
}

/// Centre each row of a d x n matrix: `x[i,] -= mean(x[i,])`
pub fn centre_rows_inplace(xx: &mut DMatrix<f32>) {
    for mut x_i in xx.row_iter_mut() {
        let mu = x_i.mean();
        x_i.add_scalar_mut(-mu);
    }
}

/// Normalize d x m matrix X by columns
/// Y[,j] = X[,j] / max(1e-8, norm(X[,j]))
pub fn normalize_columns_inplace(xx: &mut DMatrix<f32>) {
    for mut xx_j in xx.column_iter_mut() {
        let denom = xx_j.norm().max(1e-8);
        xx_j /= denom;
    }
}
