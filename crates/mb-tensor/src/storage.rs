/// A flat, contiguous block of `f32` elements holding a row-major matrix.
///
/// Every backend allocates its own storage type (host vectors for the CPU
/// backends, device-shared buffers for Metal), but all of them expose the
/// same element view so inputs can be populated and results read back
/// without knowing where the memory lives.
pub trait Storage {
    /// The elements as a slice.
    fn as_slice(&self) -> &[f32];

    /// The elements as a mutable slice.
    fn as_mut_slice(&mut self) -> &mut [f32];

    /// Number of `f32` elements.
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite every element from `src`.
    ///
    /// # Panics
    /// Panics if `src.len() != self.len()`.
    fn copy_from_slice(&mut self, src: &[f32]) {
        self.as_mut_slice().copy_from_slice(src);
    }
}

/// Host-memory storage used by the CPU backends.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CpuStorage {
    data: Vec<f32>,
}

impl CpuStorage {
    /// Zero-filled storage of `n` elements.
    pub fn zeros(n: usize) -> Self {
        CpuStorage { data: vec![0.0; n] }
    }

    /// Storage of `n` elements, all set to `value`.
    pub fn filled(n: usize, value: f32) -> Self {
        CpuStorage {
            data: vec![value; n],
        }
    }

    /// Create storage from an f32 vector.
    pub fn from_f32_vec(data: Vec<f32>) -> Self {
        CpuStorage { data }
    }

    /// Consume the storage, returning the underlying vector.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

impl Storage for CpuStorage {
    fn as_slice(&self) -> &[f32] {
        &self.data
    }

    fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

impl From<Vec<f32>> for CpuStorage {
    fn from(data: Vec<f32>) -> Self {
        CpuStorage::from_f32_vec(data)
    }
}
