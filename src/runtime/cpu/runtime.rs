//! CPU runtime implementation

use super::client::CpuClient;
use super::device::CpuDevice;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use std::alloc::{Layout as AllocLayout, alloc_zeroed, dealloc};

/// Allocation alignment (AVX-512 width)
const ALIGN: usize = 64;

/// CPU compute runtime
///
/// This is the default runtime that works on any platform.
/// Memory is allocated on the heap using the system allocator.
#[derive(Clone, Debug, Default)]
pub struct CpuRuntime;

impl Runtime for CpuRuntime {
    type Device = CpuDevice;
    type Client = CpuClient;

    fn name() -> &'static str {
        "cpu"
    }

    fn allocate(size_bytes: usize, _device: &Self::Device) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }

        let layout = AllocLayout::from_size_align(size_bytes, ALIGN)
            .map_err(|_| Error::OutOfMemory { size: size_bytes })?;

        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(Error::OutOfMemory { size: size_bytes });
        }

        Ok(ptr as u64)
    }

    fn deallocate(ptr: u64, size_bytes: usize, _device: &Self::Device) {
        if ptr == 0 || size_bytes == 0 {
            return;
        }

        match AllocLayout::from_size_align(size_bytes, ALIGN) {
            // SAFETY: ptr was returned by `allocate` with this exact layout.
            Ok(layout) => unsafe { dealloc(ptr as *mut u8, layout) },
            Err(_) => log::warn!("cpu: refusing to free {size_bytes} bytes with invalid layout"),
        }
    }

    fn copy_to_device(src: &[u8], dst: u64, _device: &Self::Device) -> Result<()> {
        if src.is_empty() || dst == 0 {
            return Ok(());
        }

        // SAFETY: dst points to an allocation of at least src.len() bytes.
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), dst as *mut u8, src.len());
        }
        Ok(())
    }

    fn copy_from_device(src: u64, dst: &mut [u8], _device: &Self::Device) -> Result<()> {
        if dst.is_empty() || src == 0 {
            return Ok(());
        }

        // SAFETY: src points to an allocation of at least dst.len() bytes.
        unsafe {
            std::ptr::copy_nonoverlapping(src as *const u8, dst.as_mut_ptr(), dst.len());
        }
        Ok(())
    }

    fn default_device() -> Self::Device {
        CpuDevice::new()
    }

    fn default_client(device: &Self::Device) -> Result<Self::Client> {
        Ok(CpuClient::new(device.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_is_zeroed() {
        let device = CpuDevice::new();
        let ptr = CpuRuntime::allocate(256, &device).unwrap();
        let mut out = vec![0xffu8; 256];
        CpuRuntime::copy_from_device(ptr, &mut out, &device).unwrap();
        assert!(out.iter().all(|&b| b == 0));
        CpuRuntime::deallocate(ptr, 256, &device);
    }

    #[test]
    fn test_zero_size_allocation() {
        let device = CpuDevice::new();
        assert_eq!(CpuRuntime::allocate(0, &device).unwrap(), 0);
        CpuRuntime::deallocate(0, 0, &device);
    }

    #[test]
    fn test_round_trip_bytes() {
        let device = CpuDevice::new();
        let src: Vec<u8> = (0..64).collect();
        let ptr = CpuRuntime::allocate(src.len(), &device).unwrap();
        CpuRuntime::copy_to_device(&src, ptr, &device).unwrap();
        let mut dst = vec![0u8; src.len()];
        CpuRuntime::copy_from_device(ptr, &mut dst, &device).unwrap();
        assert_eq!(src, dst);
        CpuRuntime::deallocate(ptr, src.len(), &device);
    }
}
