// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dense matrix datatype carried on `Matrix` ports.

use dataflow_network::AlgorithmError;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Row-major dense matrix of doubles
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix(Array2<f64>);

impl DenseMatrix {
    /// Wrap an ndarray
    pub fn new(data: Array2<f64>) -> Self {
        Self(data)
    }

    /// Matrix of zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self(Array2::zeros((rows, cols)))
    }

    /// Fill from a function of `(row, col)`
    pub fn from_fn(rows: usize, cols: usize, f: impl FnMut((usize, usize)) -> f64) -> Self {
        Self(Array2::from_shape_fn((rows, cols), f))
    }

    /// Build from row vectors; all rows must have the same length
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, AlgorithmError> {
        let ncols = rows.first().map_or(0, Vec::len);
        let data: Vec<f64> = rows.iter().flatten().copied().collect();
        Array2::from_shape_vec((rows.len(), ncols), data)
            .map(Self)
            .map_err(|e| AlgorithmError::Failed(format!("ragged matrix rows: {e}")))
    }

    /// Underlying array
    pub fn as_array(&self) -> &Array2<f64> {
        &self.0
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.0.ncols()
    }

    /// Element at `(row, col)`
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.0.get((row, col)).copied()
    }

    /// Number of non-zero entries
    pub fn nnz(&self) -> usize {
        self.0.iter().filter(|v| **v != 0.0).count()
    }

    /// Smallest entry
    pub fn min(&self) -> Option<f64> {
        self.0.iter().copied().reduce(f64::min)
    }

    /// Largest entry
    pub fn max(&self) -> Option<f64> {
        self.0.iter().copied().reduce(f64::max)
    }

    /// Transposed copy
    pub fn transpose(&self) -> Self {
        Self(self.0.t().to_owned())
    }

    /// Negated copy
    pub fn negate(&self) -> Self {
        Self(self.0.mapv(|v| -v))
    }

    /// Copy scaled by `factor`
    pub fn scale(&self, factor: f64) -> Self {
        Self(self.0.mapv(|v| v * factor))
    }

    fn check_same_shape(&self, other: &Self, op: &str) -> Result<(), AlgorithmError> {
        if self.0.dim() != other.0.dim() {
            return Err(AlgorithmError::Failed(format!(
                "cannot {op} {}x{} and {}x{} matrices",
                self.rows(),
                self.cols(),
                other.rows(),
                other.cols()
            )));
        }
        Ok(())
    }

    /// Element-wise sum
    pub fn checked_add(&self, other: &Self) -> Result<Self, AlgorithmError> {
        self.check_same_shape(other, "add")?;
        Ok(Self(&self.0 + &other.0))
    }

    /// Element-wise difference
    pub fn checked_sub(&self, other: &Self) -> Result<Self, AlgorithmError> {
        self.check_same_shape(other, "subtract")?;
        Ok(Self(&self.0 - &other.0))
    }

    /// Matrix product
    pub fn checked_mul(&self, other: &Self) -> Result<Self, AlgorithmError> {
        if self.cols() != other.rows() {
            return Err(AlgorithmError::Failed(format!(
                "cannot multiply {}x{} by {}x{} matrix",
                self.rows(),
                self.cols(),
                other.rows(),
                other.cols()
            )));
        }
        Ok(Self(self.0.dot(&other.0)))
    }

    /// Summary of the matrix
    pub fn info(&self) -> MatrixInfo {
        MatrixInfo {
            type_name: "DenseMatrix".to_string(),
            rows: self.rows(),
            cols: self.cols(),
            nnz: self.nnz(),
            min: self.min().unwrap_or(0.0),
            max: self.max().unwrap_or(0.0),
        }
    }
}

impl fmt::Display for DenseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.0.rows() {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            writeln!(f, "{}", cells.join(" "))?;
        }
        Ok(())
    }
}

/// Matrix summary produced by `ReportMatrixInfo`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixInfo {
    /// Matrix type
    pub type_name: String,
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub cols: usize,
    /// Number of non-zero entries
    pub nnz: usize,
    /// Smallest entry (0 for empty matrices)
    pub min: f64,
    /// Largest entry (0 for empty matrices)
    pub max: f64,
}

impl fmt::Display for MatrixInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}x{} nnz={} min={} max={}",
            self.type_name, self.rows, self.cols, self.nnz, self.min, self.max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m1() -> DenseMatrix {
        DenseMatrix::from_fn(3, 3, |(i, j)| 3.0 * i as f64 + j as f64)
    }

    #[test]
    fn test_transpose_and_negate() {
        let m = m1();
        assert_eq!(m.transpose().get(0, 1), Some(3.0));
        assert_eq!(m.negate().get(2, 2), Some(-8.0));
        assert_eq!(m.scale(2.0).get(1, 1), Some(8.0));
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let a = DenseMatrix::zeros(2, 3);
        let b = DenseMatrix::zeros(2, 2);
        assert!(a.checked_add(&b).is_err());
        assert!(a.checked_mul(&b).is_err());
        assert_eq!(b.checked_mul(&a).map(|m| (m.rows(), m.cols())), Ok((2, 3)));
    }

    #[test]
    fn test_info() {
        let info = m1().info();
        assert_eq!((info.rows, info.cols, info.nnz), (3, 3, 8));
        assert_eq!(info.min, 0.0);
        assert_eq!(info.max, 8.0);
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        let ok = DenseMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(ok.get(1, 0), Some(3.0));
        assert!(DenseMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }
}
