//! CPU kernel implementations
//!
//! Kernels are generic over `T: Float` and operate on raw device pointers
//! handed over by the ops layer.

#![allow(unsafe_op_in_unsafe_fn)] // Kernels are already marked unsafe, inner unsafe is redundant

pub mod force;

pub use force::prod_force_se_a_kernel;
