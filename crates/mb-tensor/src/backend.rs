use std::fmt::Debug;

use crate::error::{MatmulError, Result};
use crate::shape::Shape;
use crate::storage::Storage;

/// Trait for pluggable matmul backends (naive CPU, SIMD CPU, Metal).
///
/// Every backend computes the same thing, `OUT = A @ B` over row-major f32
/// buffers, so a driver can treat them interchangeably. Each backend owns
/// its buffer type: host vectors for the CPU paths, device-shared memory for
/// the GPU path.
pub trait ComputeBackend: Debug {
    /// Storage this backend reads inputs from and writes results into.
    type Buffer: Storage;

    /// Returns the name of this backend (e.g., "cpu", "simd", "metal").
    fn name(&self) -> &str;

    /// Allocate a zero-filled buffer of `len` f32 elements.
    fn allocate(&self, len: usize) -> Result<Self::Buffer>;

    /// Matrix multiplication into a preallocated output: OUT = A @ B.
    ///
    /// - `a`: row-major data of shape [out_rows, a_cols]
    /// - `b`: row-major data of shape [a_cols, out_cols]
    /// - `out`: row-major data of shape [out_rows, out_cols], overwritten
    ///
    /// Blocks until the result is in `out`. Buffer lengths are checked
    /// against the dimensions before any work is issued.
    fn dot(
        &self,
        a: &Self::Buffer,
        b: &Self::Buffer,
        out: &mut Self::Buffer,
        a_cols: usize,
        out_rows: usize,
        out_cols: usize,
    ) -> Result<()>;
}

/// Check operand lengths for `A[m x k] @ B[k x n] = OUT[m x n]`.
///
/// Shared by every backend so a bad call is rejected on the host, before a
/// kernel could read or write out of bounds.
pub fn check_dot_args(
    a_len: usize,
    b_len: usize,
    out_len: usize,
    a_cols: usize,
    out_rows: usize,
    out_cols: usize,
) -> Result<()> {
    check_operand("A", a_len, out_rows, a_cols)?;
    check_operand("B", b_len, a_cols, out_cols)?;
    check_operand("OUT", out_len, out_rows, out_cols)
}

fn check_operand(operand: &'static str, got: usize, rows: usize, cols: usize) -> Result<()> {
    let expected = Shape::new(rows, cols).try_numel()?;
    if got != expected {
        return Err(MatmulError::ShapeMismatch {
            operand,
            expected,
            got,
        });
    }
    Ok(())
}
