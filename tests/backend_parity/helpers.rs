//! Shared helpers for backend parity tests: assertion utilities, backend locks, client creation.
#![allow(dead_code)]

#[cfg(feature = "cuda")]
use crate::common::create_cuda_client;
#[cfg(feature = "wgpu")]
use crate::common::create_wgpu_client;
#[cfg(any(feature = "cuda", feature = "wgpu"))]
use std::sync::{Mutex, OnceLock};

#[cfg(feature = "cuda")]
static CUDA_BACKEND_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
#[cfg(feature = "wgpu")]
static WGPU_BACKEND_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Single precision sums of order-dependent atomics drift by a few ulps of
/// the largest term, so near-cancelling elements need an absolute floor.
pub fn assert_parity_f32(a: &[f32], b: &[f32], op: &str) {
    let rtol = 1e-5f32;
    let atol = 1e-4f32;
    assert_eq!(
        a.len(),
        b.len(),
        "parity_f32[{}]: length mismatch: {} vs {}",
        op,
        a.len(),
        b.len()
    );

    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();

        if diff > tol {
            panic!(
                "parity_f32[{}] at index {}: {} vs {} (diff={}, tol={})",
                op, i, x, y, diff, tol
            );
        }
    }
}

pub fn assert_parity_f64(a: &[f64], b: &[f64], op: &str) {
    let rtol = 1e-12f64;
    let atol = 1e-13f64;
    assert_eq!(
        a.len(),
        b.len(),
        "parity_f64[{}]: length mismatch: {} vs {}",
        op,
        a.len(),
        b.len()
    );

    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();

        if diff > tol {
            panic!(
                "parity_f64[{}] at index {}: {} vs {} (diff={}, tol={})",
                op, i, x, y, diff, tol
            );
        }
    }
}

/// Run `f` against the CUDA backend, skipping when no device is present
#[cfg(feature = "cuda")]
pub fn with_cuda_backend<F>(mut f: F)
where
    F: FnMut(dpforce::runtime::cuda::CudaClient, dpforce::runtime::cuda::CudaDevice),
{
    let _guard = CUDA_BACKEND_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    match create_cuda_client() {
        Some((client, device)) => f(client, device),
        None => log::warn!("CUDA feature is enabled but no CUDA device is available; skipping"),
    }
}

/// Run `f` against the WebGPU backend, skipping when no adapter is present
#[cfg(feature = "wgpu")]
pub fn with_wgpu_backend<F>(mut f: F)
where
    F: FnMut(dpforce::runtime::wgpu::WgpuClient, dpforce::runtime::wgpu::WgpuDevice),
{
    let _guard = WGPU_BACKEND_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    match create_wgpu_client() {
        Some((client, device)) => f(client, device),
        None => log::warn!("WGPU feature is enabled but no adapter is available; skipping"),
    }
}
