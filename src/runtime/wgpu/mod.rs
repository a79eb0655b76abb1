//! WebGPU runtime implementation (requires `wgpu` feature)
//!
//! Cross-platform GPU acceleration via WebGPU (Vulkan, Metal, DX12).
//!
//! # Limitations
//!
//! - F32 only: WGSL has no 64-bit float type
//! - Float accumulation uses compare-and-swap loops on `atomic<u32>`, so the
//!   summation order (and the last bits of the result) vary between runs

mod cache;
mod client;
mod device;
mod runtime;
pub(crate) mod shaders;

pub use crate::tensor::Tensor;
pub(crate) use client::get_buffer;
pub use client::WgpuClient;
pub use device::{WgpuDevice, WgpuError};
pub use runtime::{WgpuRuntime, is_wgpu_available};
