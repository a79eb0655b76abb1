//! CPU runtime implementation
//!
//! The CPU runtime uses standard heap allocation and provides the reference
//! implementation of every force kernel. Results are bit-identical from run
//! to run regardless of the thread count: frames are the unit of
//! parallelism and each frame is reduced by a single thread in a fixed
//! order.

mod client;
mod device;
pub(crate) mod kernels;
mod runtime;

pub use crate::tensor::Tensor;
pub use client::{CpuClient, ParallelismConfig};
pub use device::CpuDevice;
pub use runtime::CpuRuntime;
