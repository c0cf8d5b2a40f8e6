//! 1-based vectors and matrices for the historical calling convention.
//!
//! The minimizers work on 0-based `ndarray` containers internally. These
//! buffers exist only at the boundary with code that expects positions
//! `1..=n` (slot 0 is allocated and ignored), such as legacy objective
//! functions and the caller-allocated checkpoint reader.

use crate::error::MinimizerError;
use ndarray::prelude::*;
use std::ops::{Index, IndexMut};

fn zeroed(len: usize) -> Result<Vec<f64>, MinimizerError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| MinimizerError::Allocation(len))?;
    data.resize(len, 0.0);
    Ok(data)
}

/// Vector addressable at `1..=len`.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyVector {
    data: Vec<f64>,
}

impl LegacyVector {
    pub fn zeros(n: usize) -> Result<Self, MinimizerError> {
        if n == 0 {
            return Err(MinimizerError::InvalidDimension);
        }
        Ok(LegacyVector { data: zeroed(n + 1)? })
    }

    /// Copy a 0-based array so that `x[i]` lands at position `i + 1`.
    pub fn from_array(x: &ArrayView1<f64>) -> Result<Self, MinimizerError> {
        let mut v = LegacyVector::zeros(x.len())?;
        v.load(x);
        Ok(v)
    }

    pub fn len(&self) -> usize {
        self.data.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite positions `1..=len` from a 0-based array of the same length.
    pub fn load(&mut self, x: &ArrayView1<f64>) {
        for (dst, &src) in self.data[1..].iter_mut().zip(x.iter()) {
            *dst = src;
        }
    }

    /// The full backing slice including the unused slot 0.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn to_array(&self) -> Array1<f64> {
        Array1::from_iter(self.data[1..].iter().copied())
    }
}

impl Index<usize> for LegacyVector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        assert!(i >= 1, "LegacyVector index 0 is reserved");
        &self.data[i]
    }
}

impl IndexMut<usize> for LegacyVector {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        assert!(i >= 1, "LegacyVector index 0 is reserved");
        &mut self.data[i]
    }
}

/// Contiguous matrix addressable at `[1..=rows][1..=cols]`.
///
/// Row 0 and column 0 are allocated so each row can be handed out as a
/// 1-based slice.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl LegacyMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Result<Self, MinimizerError> {
        if rows == 0 || cols == 0 {
            return Err(MinimizerError::InvalidDimension);
        }
        let len = (rows + 1)
            .checked_mul(cols + 1)
            .ok_or(MinimizerError::Allocation(usize::MAX))?;
        Ok(LegacyMatrix {
            rows,
            cols,
            data: zeroed(len)?,
        })
    }

    pub fn from_array(m: &ArrayView2<f64>) -> Result<Self, MinimizerError> {
        let (rows, cols) = m.dim();
        let mut out = LegacyMatrix::zeros(rows, cols)?;
        for ((i, j), &v) in m.indexed_iter() {
            out[(i + 1, j + 1)] = v;
        }
        Ok(out)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row `i` as a 1-based slice (element 0 unused).
    pub fn row(&self, i: usize) -> &[f64] {
        assert!(i >= 1 && i <= self.rows, "row {} out of 1..={}", i, self.rows);
        let start = i * (self.cols + 1);
        &self.data[start..start + self.cols + 1]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        assert!(i >= 1 && i <= self.rows, "row {} out of 1..={}", i, self.rows);
        let start = i * (self.cols + 1);
        &mut self.data[start..start + self.cols + 1]
    }

    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.rows, self.cols), |(i, j)| self[(i + 1, j + 1)])
    }
}

impl Index<(usize, usize)> for LegacyMatrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.row(i)[j]
    }
}

impl IndexMut<(usize, usize)> for LegacyMatrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.row_mut(i)[j]
    }
}
