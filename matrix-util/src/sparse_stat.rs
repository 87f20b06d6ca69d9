use nalgebra_sparse::CscMatrix;
use num_traits::Float;
use std::ops::AddAssign;

/// Row-wise first and second moments accumulated over sparse columns.
/// Structural zeros are observations too.
#[derive(Clone)]
pub struct SparseRunningStatistics<T>
where
    T: Float,
{
    ncols: usize,
    s1: Vec<T>,
    s2: Vec<T>,
}

impl<T> SparseRunningStatistics<T>
where
    T: Float + AddAssign + nalgebra::Scalar,
{
    pub fn new(nrows: usize) -> Self {
        SparseRunningStatistics {
            ncols: 0,
            s1: vec![T::zero(); nrows],
            s2: vec![T::zero(); nrows],
        }
    }

    /// Accumulate `f(x)` for every stored `x` of one column. `f` must
    /// map zero to zero, or the implicit entries would be miscounted.
    /// Non-finite transformed values are skipped.
    pub fn add_column_with<F>(&mut self, row_indices: &[usize], values: &[T], f: F)
    where
        F: Fn(T) -> T,
    {
        debug_assert_eq!(row_indices.len(), values.len());
        for (&i, &x) in row_indices.iter().zip(values) {
            let y = f(x);
            if y.is_finite() {
                self.s1[i] += y;
                self.s2[i] += y * y;
            }
        }
        self.ncols += 1;
    }

    /// Every column of `csc`, transformed by `f`
    pub fn add_csc_with<F>(&mut self, csc: &CscMatrix<T>, f: F)
    where
        F: Fn(T) -> T,
    {
        for x_j in csc.col_iter() {
            self.add_column_with(x_j.row_indices(), x_j.values(), &f);
        }
    }

    pub fn add_csc(&mut self, csc: &CscMatrix<T>) {
        self.add_csc_with(csc, |x| x);
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    fn n_obs(&self) -> T {
        T::from(self.ncols.max(1)).unwrap_or(T::one())
    }

    pub fn mean(&self) -> Vec<T> {
        let n = self.n_obs();
        self.s1.iter().map(|&s| s / n).collect()
    }

    /// Population variance, clamped at zero
    pub fn variance(&self) -> Vec<T> {
        let n = self.n_obs();
        self.s1
            .iter()
            .zip(&self.s2)
            .map(|(&s1, &s2)| {
                let mu = s1 / n;
                (s2 / n - mu * mu).max(T::zero())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MatTriplets;
    use approx::assert_abs_diff_eq;

    #[test]
    fn implicit_zeros_are_observations() -> anyhow::Result<()> {
        // [1, 0]
        // [0, 2]
        // [3, 3]
        let x = CscMatrix::from_nonzero_triplets(
            3,
            2,
            vec![(0, 0, 1.0_f32), (1, 1, 2.0), (2, 0, 3.0), (2, 1, 3.0)],
        )?;
        let mut stat = SparseRunningStatistics::<f32>::new(3);
        stat.add_csc(&x);

        assert_eq!(stat.ncols(), 2);
        assert_eq!(stat.mean(), vec![0.5, 1.0, 3.0]);
        let var = stat.variance();
        assert_abs_diff_eq!(var[0], 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(var[1], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(var[2], 0.0, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn transformed_moments() -> anyhow::Result<()> {
        let x = CscMatrix::from_nonzero_triplets(1, 2, vec![(0, 0, std::f32::consts::E - 1.0)])?;
        let mut stat = SparseRunningStatistics::<f32>::new(1);
        stat.add_csc_with(&x, |v| v.ln_1p());
        // log1p values [1, 0]
        assert_abs_diff_eq!(stat.mean()[0], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(stat.variance()[0], 0.25, epsilon = 1e-6);
        Ok(())
    }
}
