//! Error types for dpforce

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using dpforce's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dpforce operations
///
/// Every error an operation reports is raised before any kernel runs. The
/// kernels themselves cannot fail on input that passed validation.
#[derive(Error, Debug)]
pub enum Error {
    /// Shape mismatch in an operation
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Operator attributes describe a layout the kernels do not support
    #[error("Unsupported configuration: {reason}")]
    UnsupportedConfig {
        /// Description of the rejected configuration
        reason: String,
    },

    /// `natoms` carries fewer than the three leading entries
    #[error("natoms should have at least 3 entries, got {got}")]
    InsufficientAtoms {
        /// Number of entries supplied
        got: usize,
    },

    /// Unsupported dtype for an operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// DType mismatch between operands
    #[error("DType mismatch: {lhs:?} vs {rhs:?}")]
    DTypeMismatch {
        /// Left-hand side dtype
        lhs: DType,
        /// Right-hand side dtype
        rhs: DType,
    },

    /// A neighbor list entry is neither the empty sentinel nor a valid atom
    #[error(
        "Neighbor index {index} out of range for {nall} atoms (frame {frame:?}, atom {atom:?}, slot {slot:?}, {count} bad entries)"
    )]
    NeighborOutOfRange {
        /// Offending index, or the first one seen
        index: i64,
        /// Size of the all-atoms space
        nall: usize,
        /// Frame of the offending entry, when known
        frame: Option<usize>,
        /// Local atom of the offending entry, when known
        atom: Option<usize>,
        /// Neighbor slot of the offending entry, when known
        slot: Option<usize>,
        /// Total number of out-of-range entries
        count: usize,
    },

    /// Device mismatch between operands
    #[error("Device mismatch: tensors must be on the same device")]
    DeviceMismatch,

    /// Out of memory
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),

    /// CUDA-specific error
    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] cudarc::driver::DriverError),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Create an unsupported dtype error
    pub fn unsupported_dtype(dtype: DType, op: &'static str) -> Self {
        Self::UnsupportedDType { dtype, op }
    }
}
