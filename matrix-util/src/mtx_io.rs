use crate::common_io::*;
use crate::traits::MatTriplets;
use nalgebra_sparse::CscMatrix;
use std::io::Write;

/// Write a sparse matrix into a MatrixMarket file with 1-based indices
/// * `mat` - the matrix to write
/// * `mtx_file` - the output file (e.g., "matrix.mtx.gz")
pub fn write_mtx(mat: &CscMatrix<f32>, mtx_file: &str) -> anyhow::Result<()> {
    mkdir(mtx_file)?;
    let mut buf = open_buf_writer(mtx_file)?;

    writeln!(buf, "%%MatrixMarket matrix coordinate real general")?;
    let (nrow, ncol, triplets) = mat.to_nonzero_triplets()?;
    writeln!(buf, "{}\t{}\t{}", nrow, ncol, triplets.len())?;

    for (row, col, val) in triplets {
        writeln!(buf, "{}\t{}\t{}", row + 1, col + 1, val)?;
    }

    buf.flush()?;
    Ok(())
}

/// Read a MatrixMarket coordinate file
/// * `mtx_file` - Path to the matrix market file
pub fn read_mtx(mtx_file: &str) -> anyhow::Result<CscMatrix<f32>> {
    let words = read_lines_of_words(mtx_file, 0)?;

    let shape: Vec<usize> = words
        .header
        .iter()
        .map(|x| x.parse::<usize>())
        .collect::<Result<_, _>>()
        .map_err(|e| anyhow::anyhow!("failed to parse mtx header of {}: {}", mtx_file, e))?;

    let [nrow, ncol, nnz] = shape[..] else {
        anyhow::bail!("{}: expected `nrow ncol nnz` header", mtx_file);
    };

    // convert 1-based to 0-based
    fn parse_row_col_val(words: &[Box<str>]) -> Option<(usize, usize, f32)> {
        if words.len() != 3 {
            return None;
        }
        let row = words[0].parse::<usize>().ok()?.checked_sub(1)?;
        let col = words[1].parse::<usize>().ok()?.checked_sub(1)?;
        let val = words[2].parse::<f32>().ok()?;
        Some((row, col, val))
    }

    let triplets: Vec<(usize, usize, f32)> = words
        .lines
        .iter()
        .filter_map(|w| parse_row_col_val(w))
        .collect();

    if triplets.len() != nnz {
        log::warn!(
            "{}: header says {} non-zeros, but found {}",
            mtx_file,
            nnz,
            triplets.len()
        );
    }

    CscMatrix::<f32>::from_nonzero_triplets(nrow, ncol, triplets)
}
