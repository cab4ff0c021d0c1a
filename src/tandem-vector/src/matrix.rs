use std::{fmt, slice::ChunksExact};

/// A dense, row-major matrix of `f64` values.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub(crate) fn from_raw(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(rows * cols, data.len());
        Self { rows, cols, data }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Gets the entry at row `i` and column `j`, if in bounds.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i < self.rows && j < self.cols {
            Some(self.data[i * self.cols + j])
        } else {
            None
        }
    }

    /// Gets row `i` as a slice, if in bounds.
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        if i < self.rows {
            Some(&self.data[i * self.cols..][..self.cols])
        } else {
            None
        }
    }

    /// Iterates over all rows in order.
    pub fn iter_rows(&self) -> RowIter<'_> {
        RowIter {
            // `chunks_exact` rejects a chunk size of zero; an empty
            // column count can only come with empty data anyway.
            inner: self.data.chunks_exact(self.cols.max(1)),
            empty_rows: if self.cols == 0 { self.rows } else { 0 },
        }
    }

    /// Converts the matrix into nested row vectors.
    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.iter_rows().map(<[f64]>::to_vec).collect()
    }
}

/// Iterator over the rows of a [`Matrix`].
#[derive(Debug)]
pub struct RowIter<'a> {
    inner: ChunksExact<'a, f64>,
    empty_rows: usize,
}

impl<'a> Iterator for RowIter<'a> {
    type Item = &'a [f64];

    fn next(&mut self) -> Option<Self::Item> {
        if self.empty_rows > 0 {
            self.empty_rows -= 1;
            return Some(<&[f64]>::default());
        }
        self.inner.next()
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for row in self.iter_rows() {
            write!(f, "{row:?}")?;
        }
        f.write_str("]")
    }
}
