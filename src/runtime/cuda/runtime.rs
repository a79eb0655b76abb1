//! CUDA runtime implementation

use super::cache::{get_or_create_client, is_cuda_context_valid, try_get_cached_stream};
use super::client::CudaClient;
use super::device::CudaDevice;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use cudarc::driver::sys::{self, CUresult};

/// CUDA Runtime adapter
///
/// Implements the generic Runtime trait for CUDA backend.
/// Uses cudarc for direct GPU control.
#[derive(Clone, Debug, Default)]
pub struct CudaRuntime;

impl Runtime for CudaRuntime {
    type Device = CudaDevice;
    type Client = CudaClient;

    fn name() -> &'static str {
        "cuda"
    }

    /// Allocate zero-filled GPU memory.
    ///
    /// Returns `Err(OutOfMemory)` if CUDA memory allocation fails.
    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }

        let client = get_or_create_client(device)?;
        let stream = client.stream.cu_stream();

        unsafe {
            let mut ptr: u64 = 0;
            let mut result = sys::cuMemAllocAsync(&mut ptr, size_bytes, stream);

            if result != CUresult::CUDA_SUCCESS {
                // Pending stream-ordered frees are only returned to the pool on sync
                client.stream.synchronize()?;
                result = sys::cuMemAllocAsync(&mut ptr, size_bytes, stream);
            }
            if result != CUresult::CUDA_SUCCESS {
                return Err(Error::OutOfMemory { size: size_bytes });
            }

            let result = sys::cuMemsetD8Async(ptr, 0, size_bytes, stream);
            if result != CUresult::CUDA_SUCCESS {
                let _ = sys::cuMemFreeAsync(ptr, stream);
                return Err(Error::Backend(format!(
                    "CUDA memset failed: {} bytes ({:?})",
                    size_bytes, result
                )));
            }

            Ok(ptr)
        }
    }

    fn deallocate(ptr: u64, _size_bytes: usize, device: &Self::Device) {
        if ptr == 0 {
            return;
        }

        unsafe {
            // Memory of a destroyed context is reclaimed by the driver
            if !is_cuda_context_valid() {
                return;
            }

            let result = match try_get_cached_stream(device.index) {
                Some(stream) => sys::cuMemFreeAsync(ptr, stream),
                None => sys::cuMemFree_v2(ptr),
            };

            if result != CUresult::CUDA_SUCCESS {
                log::warn!("cuda: cuMemFree failed for ptr 0x{ptr:x}: {result:?}");
            }
        }
    }

    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()> {
        if src.is_empty() || dst == 0 {
            return Ok(());
        }

        let client = get_or_create_client(device)?;

        unsafe {
            let result = sys::cuMemcpyHtoDAsync_v2(
                dst,
                src.as_ptr() as *const std::ffi::c_void,
                src.len(),
                client.stream.cu_stream(),
            );

            if result != CUresult::CUDA_SUCCESS {
                return Err(Error::Backend(format!(
                    "CUDA host-to-device copy failed: {} bytes ({:?})",
                    src.len(),
                    result
                )));
            }
        }

        // `src` may be freed as soon as we return
        client.stream.synchronize()?;
        Ok(())
    }

    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()> {
        if dst.is_empty() || src == 0 {
            return Ok(());
        }

        let client = get_or_create_client(device)?;

        unsafe {
            let result = sys::cuMemcpyDtoHAsync_v2(
                dst.as_mut_ptr() as *mut std::ffi::c_void,
                src,
                dst.len(),
                client.stream.cu_stream(),
            );

            if result != CUresult::CUDA_SUCCESS {
                return Err(Error::Backend(format!(
                    "CUDA device-to-host copy failed: {} bytes ({:?})",
                    dst.len(),
                    result
                )));
            }
        }

        client.stream.synchronize()?;
        Ok(())
    }

    fn default_device() -> Self::Device {
        CudaDevice::new(0)
    }

    fn default_client(device: &Self::Device) -> Result<Self::Client> {
        get_or_create_client(device)
    }
}

/// Check if CUDA is available on this system
///
/// cudarc loads the driver library lazily and panics when it is missing,
/// so the probe runs under `catch_unwind`.
pub fn is_cuda_available() -> bool {
    std::panic::catch_unwind(|| get_or_create_client(&CudaDevice::new(0)).is_ok())
        .unwrap_or(false)
}
