//! WGSL compute shader infrastructure for WebGPU operations
//!
//! # Module Structure
//!
//! - `pipeline` - Pipeline caching and dispatch utilities
//! - `force_wgsl` - WGSL sources for the force reduction
//! - `force` - Force reduction launchers

pub mod force;
pub mod force_wgsl;
pub mod pipeline;

pub use force::{
    ForceChunk, ProdForceParams, encode_prod_force_se_a, encode_validate_nlist, encode_zero_force,
    plan_chunks,
};
pub use pipeline::PipelineCache;
