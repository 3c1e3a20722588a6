// Metal GPU compute backend (macOS only).
#![allow(unused_unsafe)]

mod buffer;

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

use log::debug;
use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_foundation::{NSError, NSString};
use objc2_metal::{
    MTLCommandBuffer, MTLCommandBufferStatus, MTLCommandEncoder, MTLCommandQueue,
    MTLComputeCommandEncoder, MTLComputePipelineState, MTLCreateSystemDefaultDevice, MTLDevice,
    MTLLibrary, MTLSize,
};

use crate::backend::{check_dot_args, ComputeBackend};
use crate::error::{MatmulError, Result};
use crate::grid::{kernel_params, Dim3, DispatchGeometry};
use crate::storage::Storage;

pub use buffer::SharedBuffer;

/// Metal Shading Language source for the matmul kernel, compiled at runtime.
pub const KERNEL_SOURCE: &str = include_str!("../../shaders/matmul.metal");

/// Entry point inside [`KERNEL_SOURCE`].
pub const KERNEL_NAME: &str = "dot";

// MTLCreateSystemDefaultDevice only returns a device when CoreGraphics is linked.
#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {}

/// Metal backend: one device, one compiled `dot` pipeline, one command queue.
///
/// All three are created in [`MetalBackend::new`] and never change afterwards.
/// Each [`dot`](ComputeBackend::dot) call encodes a single dispatch, commits
/// it and waits for completion before returning.
pub struct MetalBackend {
    device: Retained<ProtocolObject<dyn MTLDevice>>,
    pipeline: Retained<ProtocolObject<dyn MTLComputePipelineState>>,
    queue: Retained<ProtocolObject<dyn MTLCommandQueue>>,
}

impl MetalBackend {
    /// Create a backend on the system default device.
    pub fn new() -> Result<Self> {
        let device = unsafe { MTLCreateSystemDefaultDevice() }.ok_or(MatmulError::NoDevice)?;
        Self::from_device(device)
    }

    /// Compile the kernel and build the pipeline and queue on `device`.
    pub fn from_device(device: Retained<ProtocolObject<dyn MTLDevice>>) -> Result<Self> {
        let pipeline = compile_pipeline(&device, KERNEL_SOURCE, KERNEL_NAME)?;
        let queue = unsafe { device.newCommandQueue() }.ok_or(MatmulError::CommandQueue)?;

        let backend = MetalBackend {
            device,
            pipeline,
            queue,
        };
        debug!(
            "metal: device={} execution_width={} max_threads_per_threadgroup={}",
            backend.device_name(),
            backend.execution_width(),
            backend.max_threads_per_threadgroup()
        );
        Ok(backend)
    }

    /// Human-readable GPU name.
    pub fn device_name(&self) -> String {
        unsafe { self.device.name() }.to_string()
    }

    /// SIMD width the pipeline executes at.
    pub fn execution_width(&self) -> usize {
        unsafe { self.pipeline.threadExecutionWidth() }
    }

    /// Largest thread group the pipeline can run.
    pub fn max_threads_per_threadgroup(&self) -> usize {
        unsafe { self.pipeline.maxTotalThreadsPerThreadgroup() }
    }

    /// Grid and thread-group sizes for an `out_rows x out_cols` result,
    /// from the pipeline's current limits.
    pub fn geometry(&self, out_rows: usize, out_cols: usize) -> Result<DispatchGeometry> {
        DispatchGeometry::for_output(
            out_rows,
            out_cols,
            self.execution_width(),
            self.max_threads_per_threadgroup(),
        )
    }

    fn encode_and_wait(
        &self,
        a: &SharedBuffer,
        b: &SharedBuffer,
        out: &SharedBuffer,
        dims: [u32; 3],
        geometry: DispatchGeometry,
    ) -> Result<()> {
        let command_buffer = unsafe { self.queue.commandBuffer() }
            .ok_or_else(|| MatmulError::CommandBuffer("queue returned no command buffer".into()))?;
        let encoder = unsafe { command_buffer.computeCommandEncoder() }
            .ok_or_else(|| MatmulError::CommandBuffer("no compute encoder".into()))?;

        unsafe {
            encoder.setComputePipelineState(&self.pipeline);
            encoder.setBuffer_offset_atIndex(Some(a.as_raw()), 0, 0);
            encoder.setBuffer_offset_atIndex(Some(b.as_raw()), 0, 1);
            encoder.setBuffer_offset_atIndex(Some(out.as_raw()), 0, 2);
        }
        // A_cols, OUT_rows, OUT_cols at indices 3, 4, 5.
        for (i, value) in dims.iter().enumerate() {
            let bytes: NonNull<c_void> = NonNull::from(value).cast();
            // SAFETY: Metal copies the 4 bytes during the call.
            unsafe {
                encoder.setBytes_length_atIndex(bytes, std::mem::size_of::<u32>(), 3 + i);
            }
        }

        unsafe {
            encoder.dispatchThreads_threadsPerThreadgroup(
                mtl_size(geometry.grid),
                mtl_size(geometry.threadgroup),
            );
            encoder.endEncoding();
            command_buffer.commit();
            command_buffer.waitUntilCompleted();
        }

        let status = unsafe { command_buffer.status() };
        if status == MTLCommandBufferStatus::Error {
            let msg = unsafe { command_buffer.error() }
                .map(|e| describe(&e))
                .unwrap_or_else(|| "command buffer finished in error state".to_string());
            return Err(MatmulError::DeviceExecution(msg));
        }
        Ok(())
    }
}

impl ComputeBackend for MetalBackend {
    type Buffer = SharedBuffer;

    fn name(&self) -> &str {
        "metal"
    }

    fn allocate(&self, len: usize) -> Result<SharedBuffer> {
        SharedBuffer::new(&self.device, len)
    }

    fn dot(
        &self,
        a: &SharedBuffer,
        b: &SharedBuffer,
        out: &mut SharedBuffer,
        a_cols: usize,
        out_rows: usize,
        out_cols: usize,
    ) -> Result<()> {
        check_dot_args(a.len(), b.len(), out.len(), a_cols, out_rows, out_cols)?;

        if out_rows == 0 || out_cols == 0 {
            return Ok(());
        }
        if a_cols == 0 {
            out.as_mut_slice().fill(0.0);
            return Ok(());
        }

        let dims = kernel_params(a.len(), b.len(), out.len(), a_cols, out_rows, out_cols)?;
        let geometry = self.geometry(out_rows, out_cols)?;
        debug!(
            "metal dot: [{}x{}] @ [{}x{}] grid={} threadgroup={}",
            out_rows, a_cols, a_cols, out_cols, geometry.grid, geometry.threadgroup
        );

        self.encode_and_wait(a, b, out, dims, geometry)
    }
}

impl fmt::Debug for MetalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetalBackend")
            .field("device", &self.device_name())
            .field("execution_width", &self.execution_width())
            .field(
                "max_threads_per_threadgroup",
                &self.max_threads_per_threadgroup(),
            )
            .finish()
    }
}

fn mtl_size(d: Dim3) -> MTLSize {
    MTLSize {
        width: d.width,
        height: d.height,
        depth: d.depth,
    }
}

/// Compile `source` at runtime and build a compute pipeline for `entry`.
///
/// Compiler diagnostics are returned verbatim in
/// [`MatmulError::ShaderCompile`].
pub(crate) fn compile_pipeline(
    device: &ProtocolObject<dyn MTLDevice>,
    source: &str,
    entry: &str,
) -> Result<Retained<ProtocolObject<dyn MTLComputePipelineState>>> {
    let source = NSString::from_str(source);
    let library = unsafe { device.newLibraryWithSource_options_error(&source, None) }
        .map_err(|e| MatmulError::ShaderCompile(describe(&e)))?;

    let name = NSString::from_str(entry);
    let function = unsafe { library.newFunctionWithName(&name) }
        .ok_or_else(|| MatmulError::KernelNotFound(entry.to_string()))?;

    unsafe { device.newComputePipelineStateWithFunction_error(&function) }
        .map_err(|e| MatmulError::Pipeline(describe(&e)))
}

fn describe(e: &NSError) -> String {
    unsafe { e.localizedDescription() }.to_string()
}
