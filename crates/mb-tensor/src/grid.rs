//! Dispatch geometry for the one-thread-per-output-element GPU kernel.
//!
//! Kept free of any device types so the sizing rules can be tested on every
//! platform. The Metal backend converts these into `MTLSize` at encode time.

use std::fmt;

use crate::error::{MatmulError, Result};

/// A 3-D extent in threads (grid) or threads per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dim3 {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl Dim3 {
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Dim3 {
            width,
            height,
            depth,
        }
    }

    /// Total threads covered by this extent.
    pub fn volume(&self) -> usize {
        self.width * self.height * self.depth
    }
}

impl fmt::Display for Dim3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.width, self.height, self.depth)
    }
}

/// Grid and thread-group sizes for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGeometry {
    /// Total threads: one per output element, `(OUT_cols, OUT_rows, 1)`.
    pub grid: Dim3,
    /// Threads per group, derived from the pipeline's limits.
    pub threadgroup: Dim3,
}

impl DispatchGeometry {
    /// Geometry for an `out_rows x out_cols` output on a pipeline reporting
    /// `execution_width` and `max_threads` per group.
    pub fn for_output(
        out_rows: usize,
        out_cols: usize,
        execution_width: usize,
        max_threads: usize,
    ) -> Result<Self> {
        Ok(DispatchGeometry {
            grid: dispatch_grid(out_rows, out_cols),
            threadgroup: threadgroup_size(execution_width, max_threads)?,
        })
    }

    /// Number of thread groups along each axis, counting partial groups at
    /// the right and bottom edges.
    pub fn threadgroups(&self) -> Dim3 {
        Dim3::new(
            self.grid.width.div_ceil(self.threadgroup.width),
            self.grid.height.div_ceil(self.threadgroup.height),
            self.grid.depth.div_ceil(self.threadgroup.depth),
        )
    }
}

/// One thread per output element. x walks columns, y walks rows.
pub fn dispatch_grid(out_rows: usize, out_cols: usize) -> Dim3 {
    Dim3::new(out_cols, out_rows, 1)
}

/// Thread-group size `(w, T / w, 1)` from the pipeline's SIMD execution width
/// `w` and its per-group thread limit `T`.
///
/// The result never exceeds `T` threads and never has a zero dimension. A
/// width larger than the limit is clamped to `(T, 1, 1)`.
pub fn threadgroup_size(execution_width: usize, max_threads: usize) -> Result<Dim3> {
    if execution_width == 0 || max_threads == 0 {
        return Err(MatmulError::InvalidThreadgroup {
            execution_width,
            max_threads,
        });
    }
    let w = execution_width.min(max_threads);
    let h = max_threads / w;
    Ok(Dim3::new(w, h, 1))
}

/// Scalar parameters `[A_cols, OUT_rows, OUT_cols]` for the `dot` kernel.
///
/// The kernel indexes A, B and OUT with 32-bit flat offsets, so every buffer
/// length must fit in `u32` as well as every dimension. The largest offset
/// into each buffer is `len - 1`.
pub fn kernel_params(
    a_len: usize,
    b_len: usize,
    out_len: usize,
    a_cols: usize,
    out_rows: usize,
    out_cols: usize,
) -> Result<[u32; 3]> {
    for len in [a_len, b_len, out_len] {
        to_u32(len)?;
    }
    Ok([to_u32(a_cols)?, to_u32(out_rows)?, to_u32(out_cols)?])
}

fn to_u32(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| MatmulError::DimensionOverflow(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_typical_apple_gpu() {
        // Apple GPUs report a 32-wide SIMD group and 1024 threads per group.
        let tg = threadgroup_size(32, 1024).unwrap();
        assert_eq!(tg, Dim3::new(32, 32, 1));
        assert_eq!(tg.volume(), 1024);
    }

    #[test]
    fn test_non_dividing_width() {
        let tg = threadgroup_size(24, 1000).unwrap();
        assert_eq!(tg, Dim3::new(24, 41, 1));
        assert!(tg.volume() <= 1000);
    }

    #[test]
    fn test_width_above_limit_is_clamped() {
        assert_eq!(threadgroup_size(64, 16).unwrap(), Dim3::new(16, 1, 1));
    }

    #[test]
    fn test_zero_limits_rejected() {
        assert!(matches!(
            threadgroup_size(0, 1024),
            Err(MatmulError::InvalidThreadgroup { .. })
        ));
        assert!(matches!(
            threadgroup_size(32, 0),
            Err(MatmulError::InvalidThreadgroup { .. })
        ));
    }

    #[test]
    fn test_grid_is_cols_by_rows() {
        assert_eq!(dispatch_grid(1000, 100), Dim3::new(100, 1000, 1));
    }

    #[test]
    fn test_threadgroup_count() {
        let geo = DispatchGeometry::for_output(1000, 100, 32, 1024).unwrap();
        // 100 / 32 -> 4 groups (last one partial), 1000 / 32 -> 32 groups.
        assert_eq!(geo.threadgroups(), Dim3::new(4, 32, 1));
    }

    #[test]
    fn test_kernel_params() {
        // [2x3] @ [3x4]
        assert_eq!(kernel_params(6, 12, 8, 3, 2, 4).unwrap(), [3, 2, 4]);
        let max = u32::MAX as usize;
        assert!(kernel_params(max, 1, max, max, 1, 1).is_ok());
    }

    #[test]
    fn test_kernel_params_rejects_wide_offsets() {
        // Every dimension fits in u32 but rows * cols does not, so the
        // kernel's flat offsets would wrap.
        let rows = 70_000usize;
        let len = rows * rows;
        match kernel_params(len, rows, rows, rows, rows, 1) {
            Err(MatmulError::DimensionOverflow(n)) => assert_eq!(n, len),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            kernel_params(rows, len, len, 1, rows, rows),
            Err(MatmulError::DimensionOverflow(_))
        ));
    }

    #[test]
    fn test_kernel_params_rejects_wide_dimension() {
        let wide = u32::MAX as usize + 1;
        assert!(matches!(
            kernel_params(0, 0, 0, 0, 0, wide),
            Err(MatmulError::DimensionOverflow(n)) if n == wide
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Dim3::new(32, 32, 1).to_string(), "(32, 32, 1)");
    }

    proptest! {
        #[test]
        fn prop_threadgroup_within_limit(w in 1usize..=4096, t in 1usize..=4096) {
            let tg = threadgroup_size(w, t).unwrap();
            prop_assert!(tg.width >= 1);
            prop_assert!(tg.height >= 1);
            prop_assert_eq!(tg.depth, 1);
            prop_assert!(tg.volume() <= t);
        }

        #[test]
        fn prop_grid_covers_output(rows in 1usize..4096, cols in 1usize..4096, w in 1usize..=64) {
            let geo = DispatchGeometry::for_output(rows, cols, w, 1024).unwrap();
            prop_assert_eq!(geo.grid.volume(), rows * cols);
            let groups = geo.threadgroups();
            prop_assert!(groups.width * geo.threadgroup.width >= cols);
            prop_assert!(groups.height * geo.threadgroup.height >= rows);
        }
    }
}
