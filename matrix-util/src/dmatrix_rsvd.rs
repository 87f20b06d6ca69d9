use crate::traits::SampleOps;
use nalgebra::{DMatrix, DVector};

type Mat = DMatrix<f32>;
type DVec = DVector<f32>;

pub trait RSVD {
    /// `(U, d, V)` such that `self ≈ U * diag(d) * V'`
    fn rsvd(&self, rank: usize) -> anyhow::Result<(Mat, DVec, Mat)>;
}

impl RSVD for Mat {
    fn rsvd(&self, rank: usize) -> anyhow::Result<(Mat, DVec, Mat)> {
        let default_iter = 5;
        let mut rsvd = RandomizedSVD::new(rank, default_iter);
        rsvd.compute(self)?;
        Ok((rsvd.u_vectors, rsvd.singular_values, rsvd.v_vectors))
    }
}

/// Randomized SVD
///
/// Subspace iteration of Halko, Martinsson & Tropp (2009), Alg 4.4,
/// re-orthonormalizing by QR after every multiplication.
pub struct RandomizedSVD {
    max_rank: usize,
    iter: usize,
    u_vectors: Mat,
    singular_values: DVec,
    v_vectors: Mat,
}

impl RandomizedSVD {
    pub fn new(max_rank: usize, iter: usize) -> Self {
        Self {
            max_rank,
            iter,
            u_vectors: Mat::zeros(0, 0),
            singular_values: DVec::zeros(0),
            v_vectors: Mat::zeros(0, 0),
        }
    }

    pub fn matrix_u(&self) -> &Mat {
        &self.u_vectors
    }

    pub fn matrix_v(&self) -> &Mat {
        &self.v_vectors
    }

    pub fn singular_values(&self) -> &DVec {
        &self.singular_values
    }

    pub fn compute(&mut self, xx: &Mat) -> anyhow::Result<()> {
        let nr = xx.nrows();
        let nc = xx.ncols();

        let full_rank = nr.min(nc);
        if full_rank == 0 {
            anyhow::bail!("empty matrix [{} x {}]", nr, nc);
        }

        let rank = if self.max_rank > 0 {
            self.max_rank.min(full_rank)
        } else {
            full_rank
        };
        let oversample = (full_rank - rank).min(5);

        let qq = self.range_finder(xx, rank + oversample);

        let bb = qq.transpose() * xx;
        let svd = bb.svd(true, true);

        if let (Some(svd_u), Some(svd_vt)) = (svd.u, svd.v_t) {
            let rank = rank.min(svd.singular_values.len());
            self.u_vectors = &qq * svd_u.columns(0, rank);
            self.v_vectors = svd_vt.transpose().columns(0, rank).into_owned();
            self.singular_values = svd.singular_values.rows(0, rank).into_owned();
        } else {
            anyhow::bail!("SVD failed");
        }
        Ok(())
    }

    /// Find an orthonormal matrix whose range approximates the range of xx
    fn range_finder(&self, xx: &Mat, kk: usize) -> Mat {
        let omega = Mat::rnorm(xx.ncols(), kk);
        let mut qq = (xx * omega).qr().q();

        for _ in 0..self.iter {
            let ww = (xx.transpose() * &qq).qr().q();
            qq = (xx * ww).qr().q();
        }
        qq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn recovers_low_rank_matrix() -> anyhow::Result<()> {
        let aa = Mat::rnorm(30, 3);
        let bb = Mat::rnorm(3, 20);
        let xx = &aa * &bb;

        let (u, d, v) = xx.rsvd(3)?;
        assert_eq!(u.ncols(), 3);
        assert_eq!(v.ncols(), 3);

        let xx_hat = &u * Mat::from_diagonal(&d) * v.transpose();
        assert_abs_diff_eq!(xx, xx_hat, epsilon = 1e-2);

        let utu = u.transpose() * &u;
        assert_abs_diff_eq!(utu, Mat::identity(3, 3), epsilon = 1e-4);
        Ok(())
    }
}
