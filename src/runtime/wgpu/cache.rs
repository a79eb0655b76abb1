//! Global client cache for WebGPU runtime

use super::client::WgpuClient;
use super::device::WgpuDevice;
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Device index -> cached WgpuClient
static CLIENT_CACHE: OnceLock<Mutex<HashMap<usize, WgpuClient>>> = OnceLock::new();

/// Get or create the cached WgpuClient for a device.
///
/// Only one `wgpu::Device` exists per device index: wgpu buffers belong
/// to the device that created them and cannot be bound on another one.
pub(super) fn get_or_create_client(device: &WgpuDevice) -> Result<WgpuClient> {
    let cache = CLIENT_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache.lock();

    if let Some(client) = guard.get(&device.index) {
        return Ok(client.clone());
    }

    let client = WgpuClient::new_uncached(device.clone())?;
    log::debug!(
        "wgpu: created client for adapter {} ({})",
        device.index,
        client.device_id.adapter_name()
    );
    guard.insert(device.index, client.clone());
    Ok(client)
}
