use crate::common_io::Delimiter;

/// Convert to and from the vector of triplets
pub trait MatTriplets {
    type Mat;
    type Scalar;

    /// Build a matrix from `(row, col, value)` triplets. Duplicated
    /// coordinates are summed.
    fn from_nonzero_triplets<I>(
        nrow: usize,
        ncol: usize,
        triplets: Vec<(I, I, Self::Scalar)>,
    ) -> anyhow::Result<Self::Mat>
    where
        I: TryInto<usize> + Copy,
        <I as TryInto<usize>>::Error: std::fmt::Debug;

    fn to_nonzero_triplets(
        &self,
    ) -> anyhow::Result<(usize, usize, Vec<(usize, usize, Self::Scalar)>)>;
}

/// Take sub-matrices and stack sparse matrices
pub trait SparseSliceOps {
    type Mat;

    /// `self[rows, :]`, output rows follow the order of `rows`
    fn select_rows(&self, rows: &[usize]) -> anyhow::Result<Self::Mat>;

    /// `self[:, cols]`, output columns follow the order of `cols`
    fn select_columns(&self, cols: &[usize]) -> anyhow::Result<Self::Mat>;

    /// `self[rows, cols]`
    fn select_submatrix(&self, rows: &[usize], cols: &[usize]) -> anyhow::Result<Self::Mat>;

    /// `[m_1, m_2, ...]` side by side; every block must share `nrows`
    fn hstack(blocks: &[Self::Mat]) -> anyhow::Result<Self::Mat>;
}

/// Operations on the diagonal of a square sparse matrix
pub trait SparseDiagOps {
    type Mat;
    type Scalar;

    /// Overwrite (or insert) every diagonal element by `value`
    fn set_diagonal(&self, value: Self::Scalar) -> anyhow::Result<Self::Mat>;
}

/// Row/column totals and library-size scaling
pub trait SparseNormOps {
    type Scalar;

    fn row_sums(&self) -> Vec<Self::Scalar>;

    fn column_sums(&self) -> Vec<Self::Scalar>;

    /// Rescale each row so that it sums up to `rescale`. Rows with a
    /// zero total are left as they are.
    fn normalize_rows_inplace(&mut self, rescale: Self::Scalar);
}

/// Operations to sample random matrices
pub trait SampleOps {
    type Mat;
    type Scalar;

    /// Sample a matrix from a uniform distribution `U(0,1)`
    fn runif(dd: usize, nn: usize) -> Self::Mat;

    /// Sample a matrix from a normal distribution `N(0,1)`
    fn rnorm(dd: usize, nn: usize) -> Self::Mat;
}

/// Read and write matrices from and to files
pub trait IoOps {
    type Scalar;
    type Mat;

    fn read_file_delim(
        file: &str,
        delim: impl Into<Delimiter>,
        skip: Option<usize>,
    ) -> anyhow::Result<Self::Mat>;

    fn from_tsv(tsv_file: &str, skip: Option<usize>) -> anyhow::Result<Self::Mat> {
        Self::read_file_delim(tsv_file, "\t", skip)
    }

    fn write_file_delim(&self, file: &str, delim: &str) -> anyhow::Result<()>;

    fn to_tsv(&self, tsv_file: &str) -> anyhow::Result<()> {
        self.write_file_delim(tsv_file, "\t")
    }
}
