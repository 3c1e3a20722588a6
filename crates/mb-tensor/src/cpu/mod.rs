use crate::backend::{check_dot_args, ComputeBackend};
use crate::error::Result;
use crate::storage::{CpuStorage, Storage};

/// Pure-Rust scalar CPU backend.
///
/// A plain triple loop with no blocking or vectorization. It is the
/// correctness oracle the other backends are checked against, and the
/// slowest entry in the benchmark.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    type Buffer = CpuStorage;

    fn name(&self) -> &str {
        "cpu"
    }

    fn allocate(&self, len: usize) -> Result<CpuStorage> {
        Ok(CpuStorage::zeros(len))
    }

    fn dot(
        &self,
        a: &CpuStorage,
        b: &CpuStorage,
        out: &mut CpuStorage,
        a_cols: usize,
        out_rows: usize,
        out_cols: usize,
    ) -> Result<()> {
        reference_dot(
            a.as_slice(),
            b.as_slice(),
            out.as_mut_slice(),
            a_cols,
            out_rows,
            out_cols,
        )
    }
}

/// Reference matmul over raw slices: `out[r][c] = sum_i a[r][i] * b[i][c]`.
///
/// Accumulates in f32 in index order, the same order the GPU kernel uses for
/// each output cell.
pub fn reference_dot(
    a: &[f32],
    b: &[f32],
    out: &mut [f32],
    a_cols: usize,
    out_rows: usize,
    out_cols: usize,
) -> Result<()> {
    check_dot_args(a.len(), b.len(), out.len(), a_cols, out_rows, out_cols)?;

    for row in 0..out_rows {
        for col in 0..out_cols {
            let mut val = 0.0f32;
            for i in 0..a_cols {
                val += a[row * a_cols + i] * b[i * out_cols + col];
            }
            out[row * out_cols + col] = val;
        }
    }
    Ok(())
}
