use thiserror::Error;

use crate::shape::Shape;

#[derive(Error, Debug)]
pub enum MatmulError {
    // Setup
    #[error("no Metal device available")]
    NoDevice,
    #[error("kernel compilation failed: {0}")]
    ShaderCompile(String),
    #[error("kernel entry point not found: {0}")]
    KernelNotFound(String),
    #[error("compute pipeline creation failed: {0}")]
    Pipeline(String),
    #[error("could not create command queue")]
    CommandQueue,

    #[error("device allocation of {bytes} bytes failed")]
    Allocation { bytes: usize },

    // Host-side shape validation
    #[error("{operand}: expected {expected} elements, got {got}")]
    ShapeMismatch {
        operand: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("matmul dimension mismatch: [{m}x{k}] @ [{k2}x{n}]")]
    MatmulMismatch {
        m: usize,
        k: usize,
        k2: usize,
        n: usize,
    },
    #[error("output shape mismatch: expected {expected}, got {got}")]
    OutputShape { expected: Shape, got: Shape },
    #[error("size {0} exceeds the supported index range")]
    DimensionOverflow(usize),
    #[error("[{rows}x{cols}] element count overflows usize")]
    ElementCount { rows: usize, cols: usize },

    // Execution
    #[error("command buffer error: {0}")]
    CommandBuffer(String),
    #[error("device execution failed: {0}")]
    DeviceExecution(String),

    #[error("invalid threadgroup limits: execution width {execution_width}, max threads {max_threads}")]
    InvalidThreadgroup {
        execution_width: usize,
        max_threads: usize,
    },
}

pub type Result<T> = std::result::Result<T, MatmulError>;
