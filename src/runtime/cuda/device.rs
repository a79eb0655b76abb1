//! CUDA Device implementation

use crate::error::Error;
use crate::runtime::Device;

/// CUDA Device using cudarc
///
/// Identifies one GPU by ordinal. The context and stream live in the
/// cached `CudaClient` for that ordinal.
#[derive(Clone, Debug)]
pub struct CudaDevice {
    /// Index of the GPU device (0, 1, 2, ...)
    pub(crate) index: usize,
}

impl CudaDevice {
    /// Create a new CUDA device
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    /// Get the compute capability of this CUDA device
    ///
    /// Returns (major, minor), e.g. (8, 6) for sm_86. Double-precision
    /// `atomicAdd` needs at least (6, 0).
    pub fn compute_capability(&self) -> Result<(u32, u32), CudaError> {
        use cudarc::driver::sys::CUdevice_attribute;

        cudarc::driver::result::init()
            .map_err(|e| CudaError::DeviceError(format!("Failed to initialise CUDA: {:?}", e)))?;
        let device = cudarc::driver::result::device::get(self.index as i32).map_err(|e| {
            CudaError::DeviceError(format!("Failed to get CUDA device {}: {:?}", self.index, e))
        })?;

        let attribute = |attr: CUdevice_attribute| {
            // SAFETY: `device` is a valid ordinal returned by the driver.
            unsafe { cudarc::driver::result::device::get_attribute(device, attr) }.map_err(|e| {
                CudaError::DeviceError(format!("Failed to query {:?}: {:?}", attr, e))
            })
        };
        let major = attribute(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR)?;
        let minor = attribute(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR)?;

        Ok((major as u32, minor as u32))
    }
}

impl Device for CudaDevice {
    fn id(&self) -> usize {
        self.index
    }

    fn name(&self) -> String {
        format!("cuda:{}", self.index)
    }
}

impl Default for CudaDevice {
    fn default() -> Self {
        Self::new(0)
    }
}

/// CUDA-specific errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum CudaError {
    /// Device initialization or query error
    #[error("CUDA device error: {0}")]
    DeviceError(String),
    /// Context or stream creation error
    #[error("CUDA context error: {0}")]
    ContextError(String),
    /// Kernel load or launch error
    #[error("CUDA kernel error: {0}")]
    KernelError(String),
}

impl From<CudaError> for Error {
    fn from(err: CudaError) -> Self {
        Error::Backend(err.to_string())
    }
}
