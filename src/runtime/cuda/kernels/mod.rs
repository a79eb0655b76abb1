//! CUDA kernels for force operations
//!
//! - `loader` - PTX loading, module cache and launch configuration
//! - `force` - Launchers for `prod_force.cu`

mod force;
mod loader;

pub use force::{launch_prod_force_se_a, launch_validate_nlist};
