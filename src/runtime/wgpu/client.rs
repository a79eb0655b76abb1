//! WebGPU Client implementation.
//!
//! `WgpuClient` owns the WebGPU device and queue for kernel dispatch.
//!
//! # Thread Safety
//!
//! `WgpuClient` is `Clone`; the underlying `wgpu::Device` and `wgpu::Queue`
//! are `Send + Sync`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use wgpu::{Buffer, BufferDescriptor, BufferUsages, Device, Queue};

use super::WgpuRuntime;
use super::device::{WgpuDevice, WgpuError, query_adapter_info_blocking};
use super::shaders::PipelineCache;
use crate::error::{Error, Result};
use crate::runtime::RuntimeClient;

/// Upper bound on a blocking device poll
const POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// WebGPU Runtime Client.
///
/// All kernels are submitted through this client's queue, so passes
/// recorded by one client execute in submission order.
#[derive(Clone)]
pub struct WgpuClient {
    /// GPU device identifier (with adapter info)
    pub(crate) device_id: WgpuDevice,

    /// WebGPU device handle
    pub(crate) wgpu_device: Arc<Device>,

    /// WebGPU queue for command submission
    pub(crate) queue: Arc<Queue>,

    /// Pipeline cache for compute shaders
    pub(crate) pipeline_cache: Arc<PipelineCache>,
}

impl std::fmt::Debug for WgpuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuClient")
            .field("device", &self.device_id)
            .finish_non_exhaustive()
    }
}

impl WgpuClient {
    /// Get the client for a device, creating the WebGPU device on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if no suitable adapter is found or device creation fails.
    pub fn new(device: WgpuDevice) -> Result<Self> {
        super::cache::get_or_create_client(&device)
    }

    pub(super) fn new_uncached(device: WgpuDevice) -> std::result::Result<Self, WgpuError> {
        let (adapter, info) = query_adapter_info_blocking(device.index)?;

        let (wgpu_device, queue) = pollster::block_on(async {
            adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("dpforce WebGPU Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    trace: wgpu::Trace::Off,
                    experimental_features: wgpu::ExperimentalFeatures::default(),
                })
                .await
        })
        .map_err(|e| WgpuError::DeviceError(format!("{:?}", e)))?;

        let wgpu_device = Arc::new(wgpu_device);
        let queue = Arc::new(queue);
        let pipeline_cache = Arc::new(PipelineCache::new(wgpu_device.clone()));

        Ok(Self {
            device_id: WgpuDevice::with_info(device.index, info),
            wgpu_device,
            queue,
            pipeline_cache,
        })
    }

    /// Get reference to the WebGPU device.
    #[inline]
    pub fn wgpu_device(&self) -> &Device {
        &self.wgpu_device
    }

    /// Get reference to the WebGPU queue.
    #[inline]
    pub fn wgpu_queue(&self) -> &Queue {
        &self.queue
    }

    /// Get reference to the pipeline cache.
    #[inline]
    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.pipeline_cache
    }

    /// Create a staging buffer for CPU readback.
    pub fn create_staging_buffer(&self, label: &str, size: u64) -> Buffer {
        self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Create a uniform buffer holding `data`.
    pub fn create_params_buffer<T: bytemuck::Pod>(&self, label: &str, data: &T) -> Buffer {
        let buffer = self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<T>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(&buffer, 0, bytemuck::bytes_of(data));
        buffer
    }

    /// Create a read-write storage buffer used as a staging area for one chunk.
    pub fn create_storage_buffer(&self, label: &str, size: u64) -> Buffer {
        self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: size.max(4),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    /// Largest byte range a single storage binding may cover on this device.
    pub fn max_storage_binding_size(&self) -> u64 {
        u64::from(self.wgpu_device.limits().max_storage_buffer_binding_size)
    }

    /// Create a small read-write storage buffer initialised with `data`.
    pub fn create_storage_buffer_init<T: bytemuck::Pod>(&self, label: &str, data: &[T]) -> Buffer {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: bytes.len().max(4) as u64,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(&buffer, 0, bytes);
        buffer
    }

    /// Submit commands and wait for completion.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) -> Result<()> {
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: Some(POLL_TIMEOUT),
            })
            .map_err(|e| Error::Backend(format!("GPU poll failed: {e}")))?;
        Ok(())
    }

    /// Copy `output.len()` elements starting at `byte_offset` of `src` to host memory.
    pub fn read_buffer<T: bytemuck::Pod>(
        &self,
        src: &Buffer,
        byte_offset: u64,
        output: &mut [T],
    ) -> Result<()> {
        let size = std::mem::size_of_val(output) as u64;
        if size == 0 {
            return Ok(());
        }
        let staging = self.create_staging_buffer("readback_staging", size);

        let mut encoder = self
            .wgpu_device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(src, byte_offset, &staging, 0, size);
        self.submit_and_wait(encoder)?;

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(POLL_TIMEOUT),
            })
            .map_err(|e| Error::Backend(format!("GPU poll failed during buffer read: {e}")))?;

        let map_result = receiver.recv().map_err(|_| {
            Error::Backend("map_async callback was not invoked during buffer read".into())
        })?;
        map_result
            .map_err(|e| Error::Backend(format!("map_async failed during buffer read: {e}")))?;

        {
            let data = slice.get_mapped_range();
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(output);
            bytes.copy_from_slice(&data[..bytes.len()]);
        }

        staging.unmap();
        Ok(())
    }
}

impl RuntimeClient<WgpuRuntime> for WgpuClient {
    fn device(&self) -> &WgpuDevice {
        &self.device_id
    }

    fn synchronize(&self) -> Result<()> {
        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(POLL_TIMEOUT),
            })
            .map_err(|e| Error::Backend(format!("GPU poll failed: {e}")))?;
        Ok(())
    }
}

// ============================================================================
// Buffer registry
// ============================================================================

/// WebGPU doesn't expose raw GPU pointers, so tensor storage holds a u64 id
/// that maps to a buffer here.
static BUFFER_REGISTRY: OnceLock<parking_lot::Mutex<HashMap<u64, Arc<Buffer>>>> = OnceLock::new();

/// Counter for generating unique buffer IDs (0 is the null handle).
static BUFFER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn buffer_registry() -> &'static parking_lot::Mutex<HashMap<u64, Arc<Buffer>>> {
    BUFFER_REGISTRY.get_or_init(|| parking_lot::Mutex::new(HashMap::new()))
}

/// Get a buffer by its ID.
pub(crate) fn get_buffer(id: u64) -> Option<Arc<Buffer>> {
    if id == 0 {
        return None;
    }
    buffer_registry().lock().get(&id).cloned()
}

/// Allocate a zero-initialised storage buffer and return its ID.
pub(crate) fn register_buffer(client: &WgpuClient, size_bytes: usize) -> Result<u64> {
    // WebGPU requires buffer sizes to be aligned to 4 bytes
    let aligned_size = size_bytes.div_ceil(4) * 4;
    if aligned_size as u64 > client.wgpu_device.limits().max_buffer_size {
        return Err(Error::OutOfMemory { size: size_bytes });
    }

    let buffer = client.wgpu_device.create_buffer(&BufferDescriptor {
        label: Some("dpforce tensor buffer"),
        size: aligned_size as u64,
        usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });

    let id = BUFFER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    buffer_registry().lock().insert(id, Arc::new(buffer));
    Ok(id)
}

/// Drop the registry's reference to a buffer.
pub(crate) fn unregister_buffer(id: u64) {
    if buffer_registry().lock().remove(&id).is_none() {
        log::warn!("wgpu: deallocating unknown buffer id {id}");
    }
}
