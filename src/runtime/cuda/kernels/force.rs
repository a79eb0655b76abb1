//! Launchers for the se_a force reduction kernels

use cudarc::driver::PushKernelArg;
use cudarc::driver::safe::{CudaContext, CudaStream};
use std::sync::Arc;

use super::loader::{elementwise_launch_config, get_kernel_function, get_or_load_module, kernel_name};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::ops::ProdForceGeometry;

const PROD_FORCE_MODULE: &str = "prod_force";

/// Zero `force` and scatter every slot contribution into it.
///
/// Both kernels are queued on `stream` and run in order.
///
/// # Safety
///
/// All pointers must be device allocations on `context` sized for `geom`,
/// with element type `dtype` (`nlist` is always `i32`).
#[allow(clippy::too_many_arguments)]
pub unsafe fn launch_prod_force_se_a(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    dtype: DType,
    force_ptr: u64,
    net_deriv_ptr: u64,
    in_deriv_ptr: u64,
    nlist_ptr: u64,
    geom: &ProdForceGeometry,
) -> Result<()> {
    let module = get_or_load_module(context, device_index, PROD_FORCE_MODULE)?;

    let force_len = (geom.nframes * geom.force_frame_len()) as u64;
    if force_len == 0 {
        return Ok(());
    }

    let zero_name = kernel_name("prod_force_zero", dtype);
    let zero = get_kernel_function(&module, &zero_name)?;
    let mut builder = stream.launch_builder(&zero);
    builder.arg(&force_ptr);
    builder.arg(&force_len);
    // SAFETY: force_ptr holds force_len elements of dtype.
    unsafe { builder.launch(elementwise_launch_config(force_len as usize)) }.map_err(|e| {
        Error::Internal(format!("CUDA kernel '{}' launch failed: {:?}", zero_name, e))
    })?;

    let total = geom.slot_count() as u64;
    if total == 0 {
        return Ok(());
    }

    let nloc = geom.nloc as u64;
    let nall = geom.nall as u64;
    let nnei = geom.nnei as u64;
    let ndescrpt = geom.ndescrpt as u64;
    let n_a_sel = geom.n_a_sel as u64;

    let func_name = kernel_name("prod_force_se_a", dtype);
    let func = get_kernel_function(&module, &func_name)?;
    let mut builder = stream.launch_builder(&func);
    builder.arg(&force_ptr);
    builder.arg(&net_deriv_ptr);
    builder.arg(&in_deriv_ptr);
    builder.arg(&nlist_ptr);
    builder.arg(&nloc);
    builder.arg(&nall);
    builder.arg(&nnei);
    builder.arg(&ndescrpt);
    builder.arg(&n_a_sel);
    builder.arg(&total);
    // SAFETY: argument order and types match prod_force.cu.
    unsafe { builder.launch(elementwise_launch_config(total as usize)) }.map_err(|e| {
        Error::Internal(format!("CUDA kernel '{}' launch failed: {:?}", func_name, e))
    })?;

    Ok(())
}

/// Count neighbor entries outside `[0, nall)` into `status`.
///
/// # Safety
///
/// `status_ptr` must point to two `u64` words initialised to `[0, u64::MAX]`,
/// and `nlist_ptr` to the `i32` neighbor list described by `geom`.
pub unsafe fn launch_validate_nlist(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    nlist_ptr: u64,
    status_ptr: u64,
    geom: &ProdForceGeometry,
) -> Result<()> {
    let total = geom.slot_count() as u64;
    if total == 0 {
        return Ok(());
    }

    let module = get_or_load_module(context, device_index, PROD_FORCE_MODULE)?;
    let func = get_kernel_function(&module, "prod_force_validate_nlist")?;

    let nloc = geom.nloc as u64;
    let nall = geom.nall as u64;
    let nnei = geom.nnei as u64;
    let n_a_sel = geom.n_a_sel as u64;

    let mut builder = stream.launch_builder(&func);
    builder.arg(&nlist_ptr);
    builder.arg(&status_ptr);
    builder.arg(&nloc);
    builder.arg(&nall);
    builder.arg(&nnei);
    builder.arg(&n_a_sel);
    builder.arg(&total);
    // SAFETY: argument order and types match prod_force.cu.
    unsafe { builder.launch(elementwise_launch_config(total as usize)) }.map_err(|e| {
        Error::Internal(format!("CUDA kernel 'prod_force_validate_nlist' launch failed: {:?}", e))
    })?;

    Ok(())
}
