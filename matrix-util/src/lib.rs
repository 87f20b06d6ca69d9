pub mod common_io;
pub mod dmatrix_io;
pub mod dmatrix_rsvd;
pub mod dmatrix_util;
pub mod knn_graph;
pub mod mtx_io;
pub mod sparse_stat;
pub mod sparse_util;
pub mod traits;
