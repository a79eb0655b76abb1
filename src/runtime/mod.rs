//! Runtime backends for force computation
//!
//! This module defines the `Runtime` trait and provides implementations
//! for the compute backends (CPU, CUDA, WebGPU).
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity, memory transfer)
//! ├── Device (identifies a specific GPU/CPU)
//! └── Client (dispatches kernels, owns stream/queue and caches)
//! ```

mod traits;

pub mod cpu;

#[cfg(feature = "cuda")]
pub mod cuda;

#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use traits::{Device, Runtime, RuntimeClient};
