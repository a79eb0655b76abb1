//! Integration tests for the se_a force reduction on the CPU backend

mod common;

use common::{ForceSystem, assert_allclose_f32, assert_allclose_f64, create_cpu_client};
use dpforce::error::Error;
use dpforce::prelude::*;

fn worked_inputs() -> (Vec<f64>, Vec<f64>, Vec<i32>) {
    let net_deriv = vec![1.0; 4];
    let in_deriv = (0..4).flat_map(|_| [1.0, 0.0, 0.0]).collect();
    (net_deriv, in_deriv, vec![1])
}

fn run_f64(
    client: &CpuClient,
    device: &CpuDevice,
    system: &ForceSystem,
    attrs: &ProdForceSeA,
) -> dpforce::error::Result<Vec<f64>> {
    let net = Tensor::<CpuRuntime>::from_slice(&system.net_deriv, &system.net_deriv_shape(), device);
    let inp = Tensor::<CpuRuntime>::from_slice(&system.in_deriv, &system.in_deriv_shape(), device);
    let nlist = Tensor::<CpuRuntime>::from_slice(&system.nlist, &system.nlist_shape(), device);
    let force = client.prod_force_se_a(&net, &inp, &nlist, &system.natoms(), attrs)?;
    assert_eq!(force.shape(), &[system.nframes, system.nall * 3]);
    Ok(force.to_vec())
}

#[test]
fn test_worked_scenario_f64() {
    let (client, device) = create_cpu_client();
    let (net, inp, nl) = worked_inputs();

    let net = Tensor::<CpuRuntime>::from_slice(&net, &[1, 4], &device);
    let inp = Tensor::<CpuRuntime>::from_slice(&inp, &[1, 12], &device);
    let nlist = Tensor::<CpuRuntime>::from_slice(&nl, &[1, 1], &device);

    let force = client
        .prod_force_se_a(&net, &inp, &nlist, &[1, 2, 1], &ProdForceSeA::new(1))
        .unwrap();
    assert_eq!(force.dtype(), DType::F64);
    assert_eq!(force.to_vec::<f64>(), vec![4.0, 0.0, 0.0, -4.0, 0.0, 0.0]);
}

#[test]
fn test_worked_scenario_f32() {
    let (client, device) = create_cpu_client();
    let (net, inp, nl) = worked_inputs();
    let net: Vec<f32> = net.iter().map(|&v| v as f32).collect();
    let inp: Vec<f32> = inp.iter().map(|&v| v as f32).collect();

    let net = Tensor::<CpuRuntime>::from_slice(&net, &[1, 4], &device);
    let inp = Tensor::<CpuRuntime>::from_slice(&inp, &[1, 12], &device);
    let nlist = Tensor::<CpuRuntime>::from_slice(&nl, &[1, 1], &device);

    let force = client
        .prod_force_se_a(&net, &inp, &nlist, &[1, 2, 1], &ProdForceSeA::new(1))
        .unwrap();
    assert_eq!(force.dtype(), DType::F32);
    assert_eq!(force.to_vec::<f32>(), vec![4.0, 0.0, 0.0, -4.0, 0.0, 0.0]);
}

#[test]
fn test_matches_reference() {
    let (client, device) = create_cpu_client();
    let system = ForceSystem::random(7, 3, 5, 9, 6);
    let force = run_f64(&client, &device, &system, &ProdForceSeA::new(6)).unwrap();
    assert_allclose_f64(&force, &system.reference_force(), 1e-12, 1e-12, "reference");
}

#[test]
fn test_matches_reference_f32() {
    let (client, device) = create_cpu_client();
    let system = ForceSystem::random(11, 2, 4, 7, 5);

    let net = Tensor::<CpuRuntime>::from_slice(&system.net_deriv_f32(), &system.net_deriv_shape(), &device);
    let inp = Tensor::<CpuRuntime>::from_slice(&system.in_deriv_f32(), &system.in_deriv_shape(), &device);
    let nlist = Tensor::<CpuRuntime>::from_slice(&system.nlist, &system.nlist_shape(), &device);
    let force = client
        .prod_force_se_a(&net, &inp, &nlist, &system.natoms(), &ProdForceSeA::new(5))
        .unwrap()
        .to_vec::<f32>();

    let reference: Vec<f32> = system.reference_force().iter().map(|&v| v as f32).collect();
    assert_allclose_f32(&force, &reference, 1e-5, 1e-5, "reference_f32");
}

#[test]
fn test_zero_neighbors_gives_zero_force() {
    let (client, device) = create_cpu_client();
    let mut system = ForceSystem::random(3, 2, 4, 6, 3);
    system.nlist.iter_mut().for_each(|k| *k = -1);

    let force = run_f64(&client, &device, &system, &ProdForceSeA::new(3)).unwrap();
    assert!(force.iter().all(|&f| f == 0.0));
}

#[test]
fn test_action_reaction_single_pair() {
    let (client, device) = create_cpu_client();
    let mut system = ForceSystem::random(5, 2, 3, 5, 4);
    // only atom 1 slot 2 of each frame points at atom 4
    system.nlist.iter_mut().for_each(|k| *k = -1);
    for frame in 0..system.nframes {
        system.nlist[frame * 3 * 4 + 4 + 2] = 4;
    }

    let force = run_f64(&client, &device, &system, &ProdForceSeA::new(4)).unwrap();
    for frame in force.chunks(system.nall * 3) {
        let center = &frame[3..6];
        let neighbor = &frame[12..15];
        for x in 0..3 {
            assert_eq!(center[x], -neighbor[x]);
        }
        assert!(center.iter().any(|&f| f != 0.0));
        let others: f64 = frame[..3].iter().chain(&frame[6..12]).map(|f| f.abs()).sum();
        assert_eq!(others, 0.0);
    }
}

#[test]
fn test_frame_independence_bit_exact() {
    let (client, device) = create_cpu_client();
    let system = ForceSystem::random(17, 4, 6, 10, 5);
    let attrs = ProdForceSeA::new(5);
    let batched = run_f64(&client, &device, &system, &attrs).unwrap();

    let net_len = system.nloc * system.n_a_sel * 4;
    let nlist_len = system.nloc * system.n_a_sel;
    let mut concatenated = Vec::new();
    for frame in 0..system.nframes {
        let single = ForceSystem {
            nframes: 1,
            net_deriv: system.net_deriv[frame * net_len..(frame + 1) * net_len].to_vec(),
            in_deriv: system.in_deriv[frame * net_len * 3..(frame + 1) * net_len * 3].to_vec(),
            nlist: system.nlist[frame * nlist_len..(frame + 1) * nlist_len].to_vec(),
            ..system.clone()
        };
        concatenated.extend(run_f64(&client, &device, &single, &attrs).unwrap());
    }

    assert_eq!(batched, concatenated);
}

#[test]
fn test_deterministic_across_runs_and_pools() {
    let (client, device) = create_cpu_client();
    let system = ForceSystem::random(23, 16, 8, 12, 6);
    let attrs = ProdForceSeA::new(6);

    let first = run_f64(&client, &device, &system, &attrs).unwrap();
    let second = run_f64(&client, &device, &system, &attrs).unwrap();
    assert_eq!(first, second);

    for threads in [1, 2, 4] {
        let pooled = CpuClient::new(device.clone())
            .with_parallelism(
                ParallelismConfig::default()
                    .with_num_threads(threads)
                    .with_min_frames_per_task(3),
            )
            .unwrap();
        assert_eq!(run_f64(&pooled, &device, &system, &attrs).unwrap(), first, "{threads} threads");
    }
}

#[test]
fn test_empty_batch() {
    let (client, device) = create_cpu_client();
    let system = ForceSystem::random(1, 0, 2, 4, 3);
    let force = run_f64(&client, &device, &system, &ProdForceSeA::new(3)).unwrap();
    assert!(force.is_empty());
}

#[test]
fn test_rejects_radial_slots() {
    let (client, device) = create_cpu_client();
    let system = ForceSystem::random(2, 1, 2, 4, 4);
    let err = run_f64(&client, &device, &system, &ProdForceSeA::with_radial(3, 1)).unwrap_err();
    assert!(matches!(err, Error::UnsupportedConfig { .. }), "{err}");
}

#[test]
fn test_rejects_neighbor_count_mismatch() {
    let (client, device) = create_cpu_client();
    let system = ForceSystem::random(2, 1, 2, 4, 4);
    let err = run_f64(&client, &device, &system, &ProdForceSeA::new(3)).unwrap_err();
    match err {
        Error::InvalidArgument { reason, .. } => {
            assert!(reason.contains("number of neighbors should match"), "{reason}")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_rejects_descriptor_not_multiple_of_four() {
    let (client, device) = create_cpu_client();
    // nloc=1, nnei=1, ndescrpt=5
    let net = Tensor::<CpuRuntime>::from_slice(&[0.0f64; 5], &[1, 5], &device);
    let inp = Tensor::<CpuRuntime>::from_slice(&[0.0f64; 15], &[1, 15], &device);
    let nlist = Tensor::<CpuRuntime>::from_slice(&[0i32], &[1, 1], &device);
    let err = client
        .prod_force_se_a(&net, &inp, &nlist, &[1, 2, 1], &ProdForceSeA::new(1))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }), "{err}");
}

#[test]
fn test_rejects_short_natoms() {
    let (client, device) = create_cpu_client();
    let system = ForceSystem::random(2, 1, 2, 4, 2);
    let net = Tensor::<CpuRuntime>::from_slice(&system.net_deriv, &system.net_deriv_shape(), &device);
    let inp = Tensor::<CpuRuntime>::from_slice(&system.in_deriv, &system.in_deriv_shape(), &device);
    let nlist = Tensor::<CpuRuntime>::from_slice(&system.nlist, &system.nlist_shape(), &device);
    let err = client
        .prod_force_se_a(&net, &inp, &nlist, &[2, 4], &ProdForceSeA::new(2))
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientAtoms { got: 2 }), "{err}");
}

#[test]
fn test_rejects_dtype_mismatch() {
    let (client, device) = create_cpu_client();
    let net = Tensor::<CpuRuntime>::from_slice(&[1.0f64; 4], &[1, 4], &device);
    let inp = Tensor::<CpuRuntime>::from_slice(&[1.0f32; 12], &[1, 12], &device);
    let nlist = Tensor::<CpuRuntime>::from_slice(&[1i32], &[1, 1], &device);
    let err = client
        .prod_force_se_a(&net, &inp, &nlist, &[1, 2, 1], &ProdForceSeA::new(1))
        .unwrap_err();
    assert!(
        matches!(err, Error::DTypeMismatch { lhs: DType::F64, rhs: DType::F32 }),
        "{err}"
    );
}

#[test]
fn test_rejects_integer_derivatives() {
    let (client, device) = create_cpu_client();
    let net = Tensor::<CpuRuntime>::from_slice(&[1i32; 4], &[1, 4], &device);
    let inp = Tensor::<CpuRuntime>::from_slice(&[1i32; 12], &[1, 12], &device);
    let nlist = Tensor::<CpuRuntime>::from_slice(&[1i32], &[1, 1], &device);
    let err = client
        .prod_force_se_a(&net, &inp, &nlist, &[1, 2, 1], &ProdForceSeA::new(1))
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedDType { dtype: DType::I32, .. }), "{err}");
}

#[test]
fn test_neighbor_out_of_range_is_reported() {
    let (client, device) = create_cpu_client();
    let mut system = ForceSystem::random(9, 2, 3, 5, 4);
    // frame 1, atom 2, slot 1
    system.nlist[12 + 2 * 4 + 1] = 5;
    system.nlist[12 + 2 * 4 + 3] = 40;

    let err = run_f64(&client, &device, &system, &ProdForceSeA::new(4)).unwrap_err();
    match err {
        Error::NeighborOutOfRange {
            index,
            nall,
            frame,
            atom,
            slot,
            count,
        } => {
            assert_eq!(index, 5);
            assert_eq!(nall, 5);
            assert_eq!((frame, atom, slot), (Some(1), Some(2), Some(1)));
            assert_eq!(count, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_disabled_check_skips_bad_entries() {
    let (client, device) = create_cpu_client();
    let mut system = ForceSystem::random(13, 1, 3, 5, 4);
    system.nlist[6] = 99;

    let attrs = ProdForceSeA::new(4).check_neighbors(false);
    let force = run_f64(&client, &device, &system, &attrs).unwrap();

    // the bad slot contributes nothing
    system.nlist[6] = -1;
    assert_allclose_f64(&force, &system.reference_force(), 1e-12, 1e-12, "skipped");
}
