//! WebGPU runtime implementation

use super::cache::get_or_create_client;
use super::client::{WgpuClient, get_buffer, register_buffer, unregister_buffer};
use super::device::WgpuDevice;
use crate::error::{Error, Result};
use crate::runtime::Runtime;

/// WebGPU Runtime adapter
///
/// Cross-platform GPU backend. WGSL has no 64-bit floats, so only F32
/// tensors can be reduced here.
#[derive(Clone, Debug, Default)]
pub struct WgpuRuntime;

impl Runtime for WgpuRuntime {
    type Device = WgpuDevice;
    type Client = WgpuClient;

    fn name() -> &'static str {
        "wgpu"
    }

    /// Allocate a zero-initialised storage buffer.
    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }

        let client = get_or_create_client(device)?;
        register_buffer(&client, size_bytes)
    }

    fn deallocate(ptr: u64, _size_bytes: usize, _device: &Self::Device) {
        if ptr == 0 {
            return;
        }
        unregister_buffer(ptr);
    }

    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()> {
        if src.is_empty() || dst == 0 {
            return Ok(());
        }

        let client = get_or_create_client(device)?;
        let buffer = get_buffer(dst)
            .ok_or_else(|| Error::Backend("Buffer not found for copy_to_device".into()))?;

        // write_buffer needs a length that is a multiple of 4
        if src.len() % 4 == 0 {
            client.queue.write_buffer(&buffer, 0, src);
        } else {
            let mut padded = src.to_vec();
            padded.resize(src.len().div_ceil(4) * 4, 0);
            client.queue.write_buffer(&buffer, 0, &padded);
        }
        client.queue.submit(std::iter::empty());
        Ok(())
    }

    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()> {
        if dst.is_empty() || src == 0 {
            return Ok(());
        }

        let client = get_or_create_client(device)?;
        let buffer = get_buffer(src)
            .ok_or_else(|| Error::Backend("Buffer not found for copy_from_device".into()))?;

        if dst.len() % 4 == 0 {
            return client.read_buffer(&buffer, 0, dst);
        }
        let mut padded = vec![0u8; dst.len().div_ceil(4) * 4];
        client.read_buffer(&buffer, 0, &mut padded)?;
        dst.copy_from_slice(&padded[..dst.len()]);
        Ok(())
    }

    fn default_device() -> Self::Device {
        WgpuDevice::new(0)
    }

    fn default_client(device: &Self::Device) -> Result<Self::Client> {
        get_or_create_client(device)
    }
}

/// Check whether a WebGPU adapter can be initialised.
pub fn is_wgpu_available() -> bool {
    std::panic::catch_unwind(|| get_or_create_client(&WgpuDevice::new(0)).is_ok()).unwrap_or(false)
}
