use crate::backend::ComputeBackend;
use crate::error::{MatmulError, Result};
use crate::shape::Shape;
use crate::storage::{CpuStorage, Storage};

/// A dense row-major f32 matrix.
///
/// The storage type decides where the elements live: [`CpuStorage`] for host
/// memory, or a backend's own buffer type (for example the Metal shared
/// buffer). The element count always equals `rows * cols`.
#[derive(Debug, Clone)]
pub struct Matrix<S: Storage = CpuStorage> {
    storage: S,
    shape: Shape,
}

impl Matrix<CpuStorage> {
    /// Create a new host matrix from f32 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Matrix {
            storage: CpuStorage::from_f32_vec(data),
            shape,
        }
    }

    /// Create a zero-filled host matrix with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        Matrix {
            storage: CpuStorage::zeros(shape.numel()),
            shape,
        }
    }

    /// Create a host matrix with every element set to `value`.
    pub fn filled(shape: Shape, value: f32) -> Self {
        Matrix {
            storage: CpuStorage::filled(shape.numel(), value),
            shape,
        }
    }

    /// Create a host matrix filled with ones.
    pub fn ones(shape: Shape) -> Self {
        Self::filled(shape, 1.0)
    }

    /// Identity matrix of size `n x n`.
    pub fn identity(n: usize) -> Self {
        let shape = Shape::new(n, n);
        let mut m = Self::zeros(shape);
        for i in 0..n {
            m.storage.as_mut_slice()[shape.index(i, i)] = 1.0;
        }
        m
    }
}

impl<S: Storage> Matrix<S> {
    /// Wrap existing storage, checking that its length matches `shape`.
    pub fn from_storage(storage: S, shape: Shape) -> Result<Self> {
        let expected = shape.try_numel()?;
        if storage.len() != expected {
            return Err(MatmulError::ShapeMismatch {
                operand: "matrix",
                expected,
                got: storage.len(),
            });
        }
        Ok(Matrix { storage, shape })
    }

    /// Returns the matrix shape.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape.rows()
    }

    pub fn cols(&self) -> usize {
        self.shape.cols()
    }

    /// Row-major element data.
    pub fn data(&self) -> &[f32] {
        self.storage.as_slice()
    }

    /// Mutable row-major element data.
    pub fn data_mut(&mut self) -> &mut [f32] {
        self.storage.as_mut_slice()
    }

    /// Element at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the position is out of bounds.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        assert!(
            row < self.rows() && col < self.cols(),
            "index ({}, {}) out of bounds for {}",
            row,
            col,
            self.shape
        );
        self.data()[self.shape.index(row, col)]
    }

    /// Returns the underlying storage reference.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Consume the matrix, returning its storage.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Copy this matrix into a buffer allocated by `backend`.
    pub fn to_backend<B>(&self, backend: &B) -> Result<Matrix<B::Buffer>>
    where
        B: ComputeBackend,
    {
        let mut buffer = backend.allocate(self.shape.try_numel()?)?;
        buffer.copy_from_slice(self.data());
        Ok(Matrix {
            storage: buffer,
            shape: self.shape,
        })
    }

    /// Copy this matrix into host memory.
    pub fn to_host(&self) -> Matrix<CpuStorage> {
        Matrix {
            storage: CpuStorage::from_f32_vec(self.data().to_vec()),
            shape: self.shape,
        }
    }
}

impl<S: Storage> PartialEq for Matrix<S> {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.data() == other.data()
    }
}

/// Matrix multiplication of two matrices held in `backend`'s buffers.
///
/// `out` must already have shape `[a.rows, b.cols]`; `a.cols` must equal
/// `b.rows`.
pub fn matmul_into<B>(
    a: &Matrix<B::Buffer>,
    b: &Matrix<B::Buffer>,
    out: &mut Matrix<B::Buffer>,
    backend: &B,
) -> Result<()>
where
    B: ComputeBackend,
{
    let expected = a.shape.matmul(&b.shape)?;
    if out.shape != expected {
        return Err(MatmulError::OutputShape {
            expected,
            got: out.shape,
        });
    }
    backend.dot(
        &a.storage,
        &b.storage,
        &mut out.storage,
        a.cols(),
        expected.rows(),
        expected.cols(),
    )
}

/// Matrix multiplication allocating the result in `backend`'s memory.
pub fn matmul<B>(
    a: &Matrix<B::Buffer>,
    b: &Matrix<B::Buffer>,
    backend: &B,
) -> Result<Matrix<B::Buffer>>
where
    B: ComputeBackend,
{
    let shape = a.shape.matmul(&b.shape)?;
    let mut out = Matrix {
        storage: backend.allocate(shape.try_numel()?)?,
        shape,
    };
    matmul_into(a, b, &mut out, backend)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;
    use crate::simd::SimdBackend;

    #[test]
    fn test_new_matrix() {
        let t = Matrix::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(2, 3));
        assert_eq!(t.rows(), 2);
        assert_eq!(t.cols(), 3);
        assert_eq!(t.get(1, 0), 4.0);
        assert_eq!(t.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_zeros_ones_identity() {
        let z = Matrix::zeros(Shape::new(2, 3));
        assert_eq!(z.data(), &[0.0; 6]);

        let o = Matrix::ones(Shape::new(1, 3));
        assert_eq!(o.data(), &[1.0, 1.0, 1.0]);

        let i = Matrix::identity(2);
        assert_eq!(i.data(), &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    #[should_panic]
    fn test_new_shape_mismatch_panics() {
        let _t = Matrix::new(vec![1.0, 2.0], Shape::new(3, 1));
    }

    #[test]
    fn test_from_storage_checks_length() {
        let ok = Matrix::from_storage(CpuStorage::zeros(6), Shape::new(2, 3));
        assert!(ok.is_ok());

        let bad = Matrix::from_storage(CpuStorage::zeros(5), Shape::new(2, 3));
        assert!(matches!(bad, Err(MatmulError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_matmul() {
        let backend = CpuBackend::new();
        let a = Matrix::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(2, 2));
        let b = Matrix::new(vec![5.0, 6.0, 7.0, 8.0], Shape::new(2, 2));
        let c = matmul(&a, &b, &backend).unwrap();
        assert_eq!(c.shape(), Shape::new(2, 2));
        assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matmul_identity_on_simd() {
        let backend = SimdBackend::new();
        let a = Matrix::identity(2);
        let b = Matrix::new(vec![5.0, 6.0, 7.0, 8.0], Shape::new(2, 2));
        let c = matmul(&a, &b, &backend).unwrap();
        assert_eq!(c, b);
    }

    #[test]
    fn test_matmul_dimension_mismatch() {
        let backend = CpuBackend::new();
        let a = Matrix::new(vec![1.0, 2.0, 3.0], Shape::new(1, 3));
        let b = Matrix::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(2, 2));
        assert!(matches!(
            matmul(&a, &b, &backend),
            Err(MatmulError::MatmulMismatch { .. })
        ));
    }

    #[test]
    fn test_matmul_into_wrong_output_shape() {
        let backend = CpuBackend::new();
        let a = Matrix::ones(Shape::new(2, 3));
        let b = Matrix::ones(Shape::new(3, 4));
        let mut out = Matrix::zeros(Shape::new(4, 2));
        let err = matmul_into(&a, &b, &mut out, &backend).unwrap_err();
        assert!(matches!(err, MatmulError::OutputShape { .. }));
    }

    #[test]
    fn test_matmul_output_count_overflow() {
        // Both inputs are empty but the output would need usize::MAX * 2 cells.
        let backend = CpuBackend::new();
        let a = Matrix::from_storage(CpuStorage::zeros(0), Shape::new(usize::MAX, 0)).unwrap();
        let b = Matrix::from_storage(CpuStorage::zeros(0), Shape::new(0, 2)).unwrap();
        assert!(matches!(
            matmul(&a, &b, &backend),
            Err(MatmulError::ElementCount { .. })
        ));
    }

    #[test]
    fn test_to_backend_and_back() {
        let backend = SimdBackend::new();
        let a = Matrix::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(2, 2));
        let on_backend = a.to_backend(&backend).unwrap();
        assert_eq!(on_backend.to_host(), a);
    }
}
