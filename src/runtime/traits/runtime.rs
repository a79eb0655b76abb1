//! Core trait for compute backends

/// Core trait for compute backends
///
/// `Runtime` abstracts over compute devices with static dispatch: the
/// runtime type chosen by the caller selects the kernel implementation.
///
/// # Associated Types
///
/// - `Device`: identifies a specific compute unit (e.g., GPU 0, GPU 1)
/// - `Client`: handles kernel dispatch and synchronization
///
/// # Memory Contract
///
/// Device memory is addressed by an opaque `u64` handle: a host pointer on
/// CPU, a device pointer on CUDA, a buffer id on WebGPU. `allocate` always
/// returns zero-filled memory.
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: super::Device;

    /// Client for dispatching operations
    type Client: super::RuntimeClient<Self>;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Allocate zero-filled device memory
    ///
    /// Returns `Err(OutOfMemory)` if allocation fails. A zero-byte request
    /// may return the null handle `0`.
    fn allocate(size_bytes: usize, device: &Self::Device) -> crate::error::Result<u64>;

    /// Deallocate device memory
    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device);

    /// Copy data from host to device
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> crate::error::Result<()>;

    /// Copy data from device to host
    fn copy_from_device(
        src: u64,
        dst: &mut [u8],
        device: &Self::Device,
    ) -> crate::error::Result<()>;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Get the default client for a device
    ///
    /// GPU runtimes initialise (or reuse) the device context here, which
    /// fails when no adapter or driver is present.
    fn default_client(device: &Self::Device) -> crate::error::Result<Self::Client>;
}
