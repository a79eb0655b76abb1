//! # dpforce
//!
//! **Deep-potential force reduction on CPU, CUDA and WebGPU.**
//!
//! dpforce reconstructs per-atom forces of a smooth-edition, all-angular
//! ("se_a") deep potential from two derivative tensors and a padded neighbor
//! list, using the chain rule:
//!
//! - `net_deriv`: gradient of the energy w.r.t. each local atom's descriptor
//! - `in_deriv`: gradient of each descriptor component w.r.t. the coordinates
//!   of the atom it depends on
//! - `nlist`: fixed-width neighbor list, negative entries mark empty slots
//!
//! Every angular slot `j` of local atom `i` holding neighbor `k` contributes
//! `f = sum_m net_deriv[i, j, m] * in_deriv[i, j, m, :]` to atom `i` and
//! `-f` to atom `k`, so contributions always come in action-reaction pairs.
//!
//! ## Quick Start
//!
//! ```
//! use dpforce::prelude::*;
//!
//! let client = CpuRuntime::default_client(&CpuDevice::new())?;
//! let device = client.device().clone();
//!
//! // one frame, one local atom, one ghost atom, one neighbor slot
//! let net_deriv = Tensor::<CpuRuntime>::from_slice(&[1.0f64; 4], &[1, 4], &device);
//! let in_deriv = Tensor::<CpuRuntime>::from_slice(
//!     &[1.0f64, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
//!     &[1, 12],
//!     &device,
//! );
//! let nlist = Tensor::<CpuRuntime>::from_slice(&[1i32], &[1, 1], &device);
//!
//! let force = client.prod_force_se_a(&net_deriv, &in_deriv, &nlist, &[1, 2, 1], &ProdForceSeA::new(1))?;
//! assert_eq!(force.to_vec::<f64>(), vec![4.0, 0.0, 0.0, -4.0, 0.0, 0.0]);
//! # Ok::<(), dpforce::error::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cpu` (default): CPU backend
//! - `rayon` (default): frame-parallel CPU kernels
//! - `cuda`: NVIDIA CUDA backend (F32 and F64)
//! - `wgpu`: cross-platform GPU via WebGPU (F32 only)
//!
//! ## Logging
//!
//! Kernel dispatch is reported through the [`log`] facade at `debug` level
//! and cache misses at `trace`. No logger is installed by the library.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod dtype;
pub mod error;
pub mod ops;
pub mod runtime;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::ops::{ForceOps, ProdForceGeometry, ProdForceSeA};
    pub use crate::runtime::{Device, Runtime, RuntimeClient};
    pub use crate::tensor::{Layout, Tensor};

    #[cfg(feature = "cpu")]
    pub use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime, ParallelismConfig};

    #[cfg(feature = "cuda")]
    pub use crate::runtime::cuda::{CudaClient, CudaDevice, CudaRuntime};

    #[cfg(feature = "wgpu")]
    pub use crate::runtime::wgpu::{WgpuClient, WgpuDevice, WgpuRuntime};
}

/// Default runtime based on enabled features
///
/// - With `cuda` feature: `CudaRuntime`
/// - With `wgpu` feature (no cuda): `WgpuRuntime`
/// - Otherwise: `CpuRuntime`
#[cfg(feature = "cuda")]
pub type DefaultRuntime = runtime::cuda::CudaRuntime;

/// Default runtime based on enabled features
#[cfg(all(feature = "wgpu", not(feature = "cuda")))]
pub type DefaultRuntime = runtime::wgpu::WgpuRuntime;

/// Default runtime based on enabled features
#[cfg(not(any(feature = "cuda", feature = "wgpu")))]
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
