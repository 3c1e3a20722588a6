use crate::error::{MatmulError, Result};
use std::fmt;

/// The dimensions of a dense row-major matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    rows: usize,
    cols: usize,
}

impl Shape {
    /// Create a new `rows x cols` shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Shape { rows, cols }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of elements (`rows * cols`).
    ///
    /// # Panics
    /// Panics if the count overflows `usize`; fallible paths use
    /// [`Shape::try_numel`].
    pub fn numel(&self) -> usize {
        match self.checked_numel() {
            Some(n) => n,
            None => panic!("{} element count overflows usize", self),
        }
    }

    /// Element count, or `None` if `rows * cols` overflows `usize`.
    pub fn checked_numel(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }

    /// Element count for sizing a buffer; errors instead of wrapping.
    pub fn try_numel(&self) -> Result<usize> {
        self.checked_numel().ok_or(MatmulError::ElementCount {
            rows: self.rows,
            cols: self.cols,
        })
    }

    /// Distance in elements between the starts of consecutive rows.
    ///
    /// Storage is contiguous row-major, so this is always the column count.
    pub fn row_stride(&self) -> usize {
        self.cols
    }

    /// Flat index of element `(row, col)`.
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.row_stride() + col
    }

    /// Output shape of `self @ rhs`.
    ///
    /// The shared dimension must agree: `self.cols == rhs.rows`.
    pub fn matmul(&self, rhs: &Shape) -> Result<Shape> {
        if self.cols != rhs.rows {
            return Err(MatmulError::MatmulMismatch {
                m: self.rows,
                k: self.cols,
                k2: rhs.rows,
                n: rhs.cols,
            });
        }
        Ok(Shape::new(self.rows, rhs.cols))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}x{}]", self.rows, self.cols)
    }
}

impl From<(usize, usize)> for Shape {
    fn from((rows, cols): (usize, usize)) -> Self {
        Shape::new(rows, cols)
    }
}
