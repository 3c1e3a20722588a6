use std::fmt;
use std::mem;
use std::slice;

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_metal::{MTLBuffer, MTLDevice, MTLResourceOptions};

use crate::error::{MatmulError, Result};
use crate::storage::Storage;

/// An f32 buffer in shared storage mode: one allocation the CPU and GPU
/// both address directly, with no upload or readback copies.
///
/// The `MTLBuffer` is reference counted. This handle holds one reference and
/// releases it on drop; a command buffer that binds the buffer holds its own
/// until the submission completes, so dropping the handle early cannot free
/// memory the GPU is still using.
pub struct SharedBuffer {
    raw: Retained<ProtocolObject<dyn MTLBuffer>>,
    len: usize,
}

impl SharedBuffer {
    /// Allocate a zero-filled shared buffer of `len` f32 elements.
    pub(crate) fn new(device: &ProtocolObject<dyn MTLDevice>, len: usize) -> Result<Self> {
        let bytes = len
            .checked_mul(mem::size_of::<f32>())
            .ok_or(MatmulError::DimensionOverflow(len))?;
        // Metal refuses zero-length buffers; back empty matrices with one element.
        let alloc_bytes = bytes.max(mem::size_of::<f32>());

        let raw = unsafe {
            device.newBufferWithLength_options(alloc_bytes, MTLResourceOptions::StorageModeShared)
        }
        .ok_or(MatmulError::Allocation { bytes: alloc_bytes })?;

        // SAFETY: `contents` points at `alloc_bytes` bytes of CPU-visible
        // memory owned by `raw`, and nothing else references it yet.
        unsafe {
            std::ptr::write_bytes(raw.contents().as_ptr().cast::<u8>(), 0, alloc_bytes);
        }

        Ok(SharedBuffer { raw, len })
    }

    /// Logical size in bytes (`len * 4`).
    pub fn byte_len(&self) -> usize {
        self.len * mem::size_of::<f32>()
    }

    /// The underlying Metal buffer, for binding to an encoder.
    pub fn as_raw(&self) -> &ProtocolObject<dyn MTLBuffer> {
        &self.raw
    }
}

impl Storage for SharedBuffer {
    fn as_slice(&self) -> &[f32] {
        // SAFETY: the allocation holds at least `len` f32s, is zero-filled at
        // creation and stays mapped for the lifetime of `raw`. Dispatches
        // borrow the output buffer mutably and block until the GPU is done,
        // so no device write overlaps this borrow.
        unsafe { slice::from_raw_parts(self.raw.contents().as_ptr().cast::<f32>(), self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [f32] {
        // SAFETY: as above; `&mut self` makes this the only live view.
        unsafe {
            slice::from_raw_parts_mut(self.raw.contents().as_ptr().cast::<f32>(), self.len)
        }
    }

    fn len(&self) -> usize {
        self.len
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.len)
            .field("byte_len", &self.byte_len())
            .finish()
    }
}
