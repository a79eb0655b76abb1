//! Common test utilities
#![allow(dead_code)]

use dpforce::runtime::Runtime;
use dpforce::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
#[cfg(feature = "cuda")]
use dpforce::runtime::cuda::{CudaClient, CudaDevice, CudaRuntime};
#[cfg(feature = "wgpu")]
use dpforce::runtime::wgpu::{WgpuClient, WgpuDevice, WgpuRuntime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Install a test logger once; repeated calls are no-ops
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Create a CPU client and device for testing
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    init_logging();
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device).expect("CPU client is infallible");
    (client, device)
}

/// Create a CUDA client and device, returning None if CUDA is unavailable
#[cfg(feature = "cuda")]
pub fn create_cuda_client() -> Option<(CudaClient, CudaDevice)> {
    init_logging();
    if !dpforce::runtime::cuda::is_cuda_available() {
        return None;
    }
    let device = CudaDevice::new(0);
    let client = CudaRuntime::default_client(&device).ok()?;
    Some((client, device))
}

/// Create a WebGPU client and device, returning None if WebGPU is unavailable
#[cfg(feature = "wgpu")]
pub fn create_wgpu_client() -> Option<(WgpuClient, WgpuDevice)> {
    init_logging();
    if !dpforce::runtime::wgpu::is_wgpu_available() {
        return None;
    }
    let device = WgpuDevice::new(0);
    let client = WgpuRuntime::default_client(&device).ok()?;
    Some((client, device))
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert two f32 slices are close within tolerance
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Host-side inputs for one `prod_force_se_a` call
#[derive(Clone, Debug)]
pub struct ForceSystem {
    pub nframes: usize,
    pub nloc: usize,
    pub nall: usize,
    pub n_a_sel: usize,
    pub net_deriv: Vec<f64>,
    pub in_deriv: Vec<f64>,
    pub nlist: Vec<i32>,
}

impl ForceSystem {
    /// Random system with roughly a quarter of the slots empty
    pub fn random(seed: u64, nframes: usize, nloc: usize, nall: usize, n_a_sel: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let ndescrpt = n_a_sel * 4;

        let net_deriv = (0..nframes * nloc * ndescrpt)
            .map(|_| rng.random_range(-1.0..1.0))
            .collect();
        let in_deriv = (0..nframes * nloc * ndescrpt * 3)
            .map(|_| rng.random_range(-1.0..1.0))
            .collect();
        let nlist = (0..nframes * nloc * n_a_sel)
            .map(|_| {
                if rng.random_bool(0.25) {
                    -1
                } else {
                    rng.random_range(0..nall as i32)
                }
            })
            .collect();

        Self {
            nframes,
            nloc,
            nall,
            n_a_sel,
            net_deriv,
            in_deriv,
            nlist,
        }
    }

    pub fn natoms(&self) -> [i32; 3] {
        [self.nloc as i32, self.nall as i32, self.nloc as i32]
    }

    pub fn net_deriv_shape(&self) -> [usize; 2] {
        [self.nframes, self.nloc * self.n_a_sel * 4]
    }

    pub fn in_deriv_shape(&self) -> [usize; 2] {
        [self.nframes, self.nloc * self.n_a_sel * 12]
    }

    pub fn nlist_shape(&self) -> [usize; 2] {
        [self.nframes, self.nloc * self.n_a_sel]
    }

    pub fn net_deriv_f32(&self) -> Vec<f32> {
        self.net_deriv.iter().map(|&v| v as f32).collect()
    }

    pub fn in_deriv_f32(&self) -> Vec<f32> {
        self.in_deriv.iter().map(|&v| v as f32).collect()
    }

    /// Straightforward host evaluation of the chain rule, in f64
    pub fn reference_force(&self) -> Vec<f64> {
        let ndescrpt = self.n_a_sel * 4;
        let mut force = vec![0.0; self.nframes * self.nall * 3];
        for frame in 0..self.nframes {
            for i in 0..self.nloc {
                for j in 0..self.n_a_sel {
                    let k = self.nlist[frame * self.nloc * self.n_a_sel + i * self.n_a_sel + j];
                    if k < 0 {
                        continue;
                    }
                    let k = k as usize;
                    for x in 0..3 {
                        let mut f = 0.0;
                        for m in 0..4 {
                            let g = self.net_deriv[frame * self.nloc * ndescrpt + i * ndescrpt + j * 4 + m];
                            let c = self.in_deriv
                                [frame * self.nloc * ndescrpt * 3 + i * ndescrpt * 3 + j * 12 + m * 3 + x];
                            f += g * c;
                        }
                        force[frame * self.nall * 3 + i * 3 + x] += f;
                        force[frame * self.nall * 3 + k * 3 + x] -= f;
                    }
                }
            }
        }
        force
    }
}
