use log::trace;

use crate::backend::{check_dot_args, ComputeBackend};
use crate::error::{MatmulError, Result};
use crate::storage::{CpuStorage, Storage};

/// Vectorized CPU backend built on `matrixmultiply::sgemm`.
///
/// `sgemm` packs blocks of A and B into cache-sized panels and runs a
/// register-blocked microkernel, picking AVX/FMA/NEON code paths at runtime.
/// Strides are passed explicitly, so the row-major host buffers are used
/// as-is with no transposition.
#[derive(Debug, Clone, Default)]
pub struct SimdBackend;

impl SimdBackend {
    pub fn new() -> Self {
        SimdBackend
    }
}

impl ComputeBackend for SimdBackend {
    type Buffer = CpuStorage;

    fn name(&self) -> &str {
        "simd"
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
        sgemm_dot(
            a.as_slice(),
            b.as_slice(),
            out.as_mut_slice(),
            a_cols,
            out_rows,
            out_cols,
        )
    }
}

/// Row-major `out = a @ b` through `matrixmultiply::sgemm`.
pub fn sgemm_dot(
    a: &[f32],
    b: &[f32],
    out: &mut [f32],
    a_cols: usize,
    out_rows: usize,
    out_cols: usize,
) -> Result<()> {
    check_dot_args(a.len(), b.len(), out.len(), a_cols, out_rows, out_cols)?;

    if out.is_empty() {
        return Ok(());
    }
    if a_cols == 0 {
        out.fill(0.0);
        return Ok(());
    }

    trace!("sgemm: [{}x{}] @ [{}x{}]", out_rows, a_cols, a_cols, out_cols);
    let rsa = to_stride(a_cols)?;
    let rsb = to_stride(out_cols)?;
    let rsc = rsb;

    // SAFETY: lengths were checked against (m, k, n) above, so every element
    // sgemm touches through these strides lies inside the slices. `out` is
    // a unique borrow and cannot alias `a` or `b`. beta = 0 means the prior
    // contents of `out` are never read.
    unsafe {
        matrixmultiply::sgemm(
            // m, k, n
            out_rows,
            a_cols,
            out_cols,
            // alpha
            1.0,
            // A pointer and strides
            a.as_ptr(),
            rsa,
            1,
            // B pointer and strides
            b.as_ptr(),
            rsb,
            1,
            // beta
            0.0,
            // OUT pointer and strides
            out.as_mut_ptr(),
            rsc,
            1,
        );
    }
    Ok(())
}

fn to_stride(n: usize) -> Result<isize> {
    isize::try_from(n).map_err(|_| MatmulError::DimensionOverflow(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::reference_dot;
    use approx::assert_relative_eq;

    #[test]
    fn test_dot_identity() {
        let backend = SimdBackend::new();
        let a = CpuStorage::from_f32_vec(vec![1.0, 0.0, 0.0, 1.0]);
        let b = CpuStorage::from_f32_vec(vec![5.0, 6.0, 7.0, 8.0]);
        let mut out = backend.allocate(4).unwrap();
        backend.dot(&a, &b, &mut out, 2, 2, 2).unwrap();
        assert_eq!(out.as_slice(), &[5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_dot_row_times_column() {
        let mut out = [0.0f32; 1];
        sgemm_dot(&[2.0, 0.0, 0.0], &[4.0, 5.0, 6.0], &mut out, 3, 1, 1).unwrap();
        assert_eq!(out, [8.0]);
    }

    #[test]
    fn test_dot_ignores_stale_output() {
        let mut out = [f32::NAN; 4];
        sgemm_dot(&[1.0, 2.0, 3.0, 4.0], &[5.0, 6.0, 7.0, 8.0], &mut out, 2, 2, 2).unwrap();
        assert_eq!(out, [19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matches_reference_on_odd_shape() {
        // Sizes that are not multiples of any microkernel tile.
        let (m, k, n) = (13, 29, 7);
        let a: Vec<f32> = (0..m * k).map(|i| ((i % 17) as f32) * 0.25 - 2.0).collect();
        let b: Vec<f32> = (0..k * n).map(|i| ((i % 11) as f32) * 0.5 - 1.5).collect();

        let mut expected = vec![0.0f32; m * n];
        reference_dot(&a, &b, &mut expected, k, m, n).unwrap();

        let mut got = vec![0.0f32; m * n];
        sgemm_dot(&a, &b, &mut got, k, m, n).unwrap();

        for (g, e) in got.iter().zip(expected.iter()) {
            assert_relative_eq!(g, e, epsilon = 1e-4, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_dot_zero_shared_dim() {
        let mut out = [3.0f32; 6];
        sgemm_dot(&[], &[], &mut out, 0, 2, 3).unwrap();
        assert_eq!(out, [0.0; 6]);
    }

    #[test]
    fn test_dot_empty_output() {
        let mut out: [f32; 0] = [];
        assert!(sgemm_dot(&[], &[1.0, 2.0], &mut out, 2, 0, 1).is_ok());
    }

    #[test]
    fn test_dot_length_mismatch() {
        let mut out = [0.0f32; 4];
        assert!(sgemm_dot(&[1.0; 4], &[1.0; 3], &mut out, 2, 2, 2).is_err());
    }
}
