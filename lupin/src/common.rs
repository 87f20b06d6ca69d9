pub type Mat = nalgebra::DMatrix<f32>;
pub type DVec = nalgebra::DVector<f32>;
pub type CscMat = nalgebra_sparse::CscMatrix<f32>;

/// Node indices per level, finest level first
pub type LevelNodes = Vec<Vec<usize>>;

pub use crate::error::HierarchyError;
pub use matrix_util::traits::*;

pub use log::{debug, info, warn};
pub use rayon::prelude::*;
