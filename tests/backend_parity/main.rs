//! Backend parity tests: CUDA and WebGPU results against the CPU reference

#[path = "../common/mod.rs"]
mod common;

mod force;
mod helpers;
