use crate::common_io::{read_lines_of_types, write_lines, Delimiter};
use crate::traits::IoOps;
use nalgebra::DMatrix;

use std::fmt::{Debug, Display};
use std::str::FromStr;

impl<T> IoOps for DMatrix<T>
where
    T: nalgebra::Scalar + Send + FromStr + Display + Copy,
    <T as FromStr>::Err: Debug,
{
    type Scalar = T;
    type Mat = Self;

    fn read_file_delim(
        file: &str,
        delim: impl Into<Delimiter>,
        skip: Option<usize>,
    ) -> anyhow::Result<Self::Mat> {
        let hdr_line = skip.map_or(-1, |n| n as i64);
        let rows = read_lines_of_types::<T>(file, delim, hdr_line)?.lines;

        let nrows = rows.len();
        let ncols = rows.first().map_or(0, |r| r.len());
        if nrows == 0 || ncols == 0 {
            anyhow::bail!("no numeric rows in {}", file);
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != ncols) {
            anyhow::bail!("row {} of {} has a different number of fields", bad, file);
        }

        Ok(DMatrix::<T>::from_row_iterator(
            nrows,
            ncols,
            rows.into_iter().flatten(),
        ))
    }

    fn write_file_delim(&self, file: &str, delim: &str) -> anyhow::Result<()> {
        let lines: Vec<String> = self
            .row_iter()
            .map(|row| {
                let fields: Vec<String> = row.iter().map(|x| x.to_string()).collect();
                fields.join(delim)
            })
            .collect();
        write_lines(&lines, file)
    }
}
