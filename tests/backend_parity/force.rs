// Backend parity tests for ForceOps
//
// CPU is the reference; CUDA and WebGPU accumulate with atomics, so results
// agree within tolerance rather than bit for bit.

#![allow(unused_imports)]

use dpforce::error::Error;
use dpforce::ops::{ForceOps, ProdForceSeA};
use dpforce::runtime::Runtime;
use dpforce::tensor::Tensor;

use crate::common::{ForceSystem, create_cpu_client};
#[cfg(feature = "cuda")]
use crate::helpers::with_cuda_backend;
#[cfg(feature = "wgpu")]
use crate::helpers::with_wgpu_backend;
use crate::helpers::{assert_parity_f32, assert_parity_f64};

fn systems() -> Vec<ForceSystem> {
    vec![
        ForceSystem::random(1, 1, 1, 2, 1),
        ForceSystem::random(2, 3, 8, 14, 12),
        // many local atoms sharing few neighbors stresses contention
        ForceSystem::random(3, 2, 64, 70, 16),
        ForceSystem::random(4, 5, 17, 17, 7),
    ]
}

fn run_f32<R: Runtime>(
    client: &impl ForceOps<R>,
    device: &R::Device,
    system: &ForceSystem,
    attrs: &ProdForceSeA,
) -> dpforce::error::Result<Vec<f32>> {
    let net = Tensor::<R>::from_slice(&system.net_deriv_f32(), &system.net_deriv_shape(), device);
    let inp = Tensor::<R>::from_slice(&system.in_deriv_f32(), &system.in_deriv_shape(), device);
    let nlist = Tensor::<R>::from_slice(&system.nlist, &system.nlist_shape(), device);
    let force = client.prod_force_se_a(&net, &inp, &nlist, &system.natoms(), attrs)?;
    assert_eq!(force.shape(), &[system.nframes, system.nall * 3]);
    Ok(force.to_vec())
}

fn run_f64<R: Runtime>(
    client: &impl ForceOps<R>,
    device: &R::Device,
    system: &ForceSystem,
    attrs: &ProdForceSeA,
) -> dpforce::error::Result<Vec<f64>> {
    let net = Tensor::<R>::from_slice(&system.net_deriv, &system.net_deriv_shape(), device);
    let inp = Tensor::<R>::from_slice(&system.in_deriv, &system.in_deriv_shape(), device);
    let nlist = Tensor::<R>::from_slice(&system.nlist, &system.nlist_shape(), device);
    let force = client.prod_force_se_a(&net, &inp, &nlist, &system.natoms(), attrs)?;
    Ok(force.to_vec())
}

fn with_bad_neighbor(seed: u64) -> ForceSystem {
    let mut system = ForceSystem::random(seed, 2, 4, 6, 5);
    // frame 1, atom 3, slot 0 and frame 1, atom 3, slot 4
    system.nlist[20 + 15] = 6;
    system.nlist[20 + 19] = 1000;
    system
}

fn assert_bad_neighbor(err: Error) {
    match err {
        Error::NeighborOutOfRange {
            index,
            nall,
            frame,
            atom,
            slot,
            count,
        } => {
            assert_eq!(index, 6);
            assert_eq!(nall, 6);
            assert_eq!((frame, atom, slot), (Some(1), Some(3), Some(0)));
            assert_eq!(count, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_prod_force_se_a_parity_f32() {
    let (cpu_client, cpu_device) = create_cpu_client();
    let cases = systems();
    let cpu_results: Vec<Vec<f32>> = cases
        .iter()
        .map(|s| run_f32(&cpu_client, &cpu_device, s, &ProdForceSeA::new(s.n_a_sel)).unwrap())
        .collect();

    #[cfg(feature = "cuda")]
    with_cuda_backend(|client, device| {
        for (idx, system) in cases.iter().enumerate() {
            let got = run_f32(&client, &device, system, &ProdForceSeA::new(system.n_a_sel)).unwrap();
            assert_parity_f32(&cpu_results[idx], &got, &format!("prod_force_cuda_case_{idx}"));
        }
    });

    #[cfg(feature = "wgpu")]
    with_wgpu_backend(|client, device| {
        for (idx, system) in cases.iter().enumerate() {
            let got = run_f32(&client, &device, system, &ProdForceSeA::new(system.n_a_sel)).unwrap();
            assert_parity_f32(&cpu_results[idx], &got, &format!("prod_force_wgpu_case_{idx}"));
        }
    });

    let _ = cpu_results;
}

#[test]
fn test_prod_force_se_a_parity_f64() {
    let (cpu_client, cpu_device) = create_cpu_client();
    let cases = systems();
    let cpu_results: Vec<Vec<f64>> = cases
        .iter()
        .map(|s| run_f64(&cpu_client, &cpu_device, s, &ProdForceSeA::new(s.n_a_sel)).unwrap())
        .collect();
    for (system, result) in cases.iter().zip(&cpu_results) {
        assert_parity_f64(&system.reference_force(), result, "prod_force_cpu_reference");
    }

    #[cfg(feature = "cuda")]
    with_cuda_backend(|client, device| {
        for (idx, system) in cases.iter().enumerate() {
            let got = run_f64(&client, &device, system, &ProdForceSeA::new(system.n_a_sel)).unwrap();
            assert_parity_f64(&cpu_results[idx], &got, &format!("prod_force_cuda_case_{idx}"));
        }
    });

    #[cfg(feature = "wgpu")]
    with_wgpu_backend(|client, device| {
        let system = &cases[0];
        let err = run_f64(&client, &device, system, &ProdForceSeA::new(system.n_a_sel)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDType { .. }), "{err}");
    });
}

#[test]
fn test_prod_force_se_a_neighbor_check_parity() {
    let (cpu_client, cpu_device) = create_cpu_client();
    let system = with_bad_neighbor(31);
    let attrs = ProdForceSeA::new(system.n_a_sel);

    assert_bad_neighbor(run_f32(&cpu_client, &cpu_device, &system, &attrs).unwrap_err());
    let unchecked = attrs.clone().check_neighbors(false);
    let cpu_skipped = run_f32(&cpu_client, &cpu_device, &system, &unchecked).unwrap();

    #[cfg(feature = "cuda")]
    with_cuda_backend(|client, device| {
        assert_bad_neighbor(run_f32(&client, &device, &system, &attrs).unwrap_err());
        let got = run_f32(&client, &device, &system, &unchecked).unwrap();
        assert_parity_f32(&cpu_skipped, &got, "prod_force_cuda_unchecked");
    });

    #[cfg(feature = "wgpu")]
    with_wgpu_backend(|client, device| {
        assert_bad_neighbor(run_f32(&client, &device, &system, &attrs).unwrap_err());
        let got = run_f32(&client, &device, &system, &unchecked).unwrap();
        assert_parity_f32(&cpu_skipped, &got, "prod_force_wgpu_unchecked");
    });

    let _ = cpu_skipped;
}

#[test]
fn test_prod_force_se_a_zero_neighbors_all_backends() {
    let (cpu_client, cpu_device) = create_cpu_client();
    let mut system = ForceSystem::random(41, 3, 6, 9, 4);
    system.nlist.iter_mut().for_each(|k| *k = -1);
    let attrs = ProdForceSeA::new(system.n_a_sel);

    let cpu = run_f32(&cpu_client, &cpu_device, &system, &attrs).unwrap();
    assert!(cpu.iter().all(|&f| f == 0.0));

    #[cfg(feature = "cuda")]
    with_cuda_backend(|client, device| {
        let got = run_f32(&client, &device, &system, &attrs).unwrap();
        assert!(got.iter().all(|&f| f == 0.0));
    });

    #[cfg(feature = "wgpu")]
    with_wgpu_backend(|client, device| {
        let got = run_f32(&client, &device, &system, &attrs).unwrap();
        assert!(got.iter().all(|&f| f == 0.0));
    });
}

#[cfg(any(feature = "cuda", feature = "wgpu"))]
fn large_frame_force<R: Runtime>(client: &impl ForceOps<R>, device: &R::Device) -> Vec<f32> {
    // one frame of 3000 atoms x 1000 slots: in_deriv alone is 144 MB
    let (nloc, nall, n_a_sel) = (3000usize, 3000usize, 1000usize);
    let ndescrpt = n_a_sel * 4;
    let mut nlist = vec![-1i32; nloc * n_a_sel];
    // last atom pulls on atom 0 through its last slot
    nlist[nloc * n_a_sel - 1] = 0;

    let net = Tensor::<R>::from_slice(&vec![1.0f32; nloc * ndescrpt], &[1, nloc * ndescrpt], device);
    let inp = Tensor::<R>::from_slice(
        &vec![1.0f32; nloc * ndescrpt * 3],
        &[1, nloc * ndescrpt * 3],
        device,
    );
    let nlist = Tensor::<R>::from_slice(&nlist, &[1, nloc * n_a_sel], device);
    let natoms = [nloc as i32, nall as i32, nloc as i32];
    client
        .prod_force_se_a(&net, &inp, &nlist, &natoms, &ProdForceSeA::new(n_a_sel))
        .unwrap()
        .to_vec()
}

#[cfg(any(feature = "cuda", feature = "wgpu"))]
#[test]
fn test_prod_force_se_a_beyond_storage_binding_limit() {
    let nall = 3000;
    let mut expected = vec![0.0f32; nall * 3];
    expected[..3].copy_from_slice(&[-4.0; 3]);
    expected[(nall - 1) * 3..].copy_from_slice(&[4.0; 3]);

    #[cfg(feature = "cuda")]
    with_cuda_backend(|client, device| {
        let got = large_frame_force(&client, &device);
        assert_parity_f32(&expected, &got, "prod_force_cuda_large_frame");
    });

    #[cfg(feature = "wgpu")]
    with_wgpu_backend(|client, device| {
        let got = large_frame_force(&client, &device);
        assert_parity_f32(&expected, &got, "prod_force_wgpu_large_frame");
    });
}
