//! `mb-tensor` - Row-major f32 matrices with pluggable matmul backends for matmul-bench.
//!
//! This crate provides:
//! - A `Matrix` type over any backend's storage, plus `Shape` utilities
//! - A `ComputeBackend` trait shared by every backend
//! - `CpuBackend`, the scalar reference implementation
//! - `SimdBackend`, a vectorized CPU implementation on `matrixmultiply`
//! - `MetalBackend` (feature `metal`, macOS), a GPU compute-kernel dispatch
//! - Dispatch geometry helpers for the GPU grid and thread groups

pub mod backend;
pub mod cpu;
pub mod error;
pub mod grid;
pub mod matrix;
#[cfg(all(feature = "metal", target_os = "macos"))]
pub mod metal;
pub mod shape;
pub mod simd;
pub mod storage;

// Re-export primary types at the crate root for convenience.
pub use backend::{check_dot_args, ComputeBackend};
pub use cpu::{reference_dot, CpuBackend};
pub use error::{MatmulError, Result};
pub use grid::{kernel_params, threadgroup_size, Dim3, DispatchGeometry};
pub use matrix::{matmul, matmul_into, Matrix};
#[cfg(all(feature = "metal", target_os = "macos"))]
pub use metal::{MetalBackend, SharedBuffer};
pub use shape::Shape;
pub use simd::SimdBackend;
pub use storage::{CpuStorage, Storage};
