//! CUDA runtime implementation
//!
//! GPU acceleration via NVIDIA CUDA using cudarc.
//!
//! - `CudaDevice` - Represents a CUDA GPU device
//! - `CudaClient` - Owns the context and stream kernels launch on
//! - `CudaRuntime` - Implements the generic Runtime trait
//!
//! Kernels are written in CUDA C (`kernels/*.cu`) and compiled to PTX by
//! `build.rs`. Both F32 and F64 reductions accumulate with `atomicAdd`,
//! so the summation order across neighbor slots is not fixed.

mod cache;
mod client;
mod device;
pub(crate) mod kernels;
mod runtime;

pub use crate::tensor::Tensor;
pub use client::CudaClient;
pub use device::{CudaDevice, CudaError};
pub use runtime::{CudaRuntime, is_cuda_available};
