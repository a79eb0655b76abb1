//! CPU implementation of force operations.

use crate::error::Result;
use crate::ops::{ForceOps, ProdForceGeometry, ProdForceSeA, check_neighbor_indices};
use crate::runtime::cpu::{CpuClient, CpuRuntime, kernels};
use crate::tensor::Tensor;

/// ForceOps implementation for CPU runtime.
impl ForceOps<CpuRuntime> for CpuClient {
    fn prod_force_se_a(
        &self,
        net_deriv: &Tensor<CpuRuntime>,
        in_deriv: &Tensor<CpuRuntime>,
        nlist: &Tensor<CpuRuntime>,
        natoms: &[i32],
        attrs: &ProdForceSeA,
    ) -> Result<Tensor<CpuRuntime>> {
        let geom = ProdForceGeometry::from_tensors(
            &self.device,
            net_deriv,
            in_deriv,
            nlist,
            natoms,
            attrs,
        )?;
        let dtype = net_deriv.dtype();

        if attrs.check_neighbors && geom.slot_count() > 0 {
            // SAFETY: nlist is a contiguous I32 tensor of numel elements.
            let nlist_host =
                unsafe { std::slice::from_raw_parts(nlist.ptr() as *const i32, nlist.numel()) };
            check_neighbor_indices(nlist_host, &geom)?;
        }

        log::debug!(
            "cpu prod_force_se_a: dtype={dtype} nframes={} nloc={} nall={} nnei={}",
            geom.nframes,
            geom.nloc,
            geom.nall,
            geom.nnei
        );

        let out = Tensor::<CpuRuntime>::try_zeros(&geom.output_shape(), dtype, &self.device)?;

        // Addresses cross into the pool as integers; raw pointers are not Send.
        let out_addr = out.ptr() as usize;
        let net_addr = net_deriv.ptr() as usize;
        let in_addr = in_deriv.ptr() as usize;
        let nlist_addr = nlist.ptr() as usize;
        let min_frames = self.parallelism().min_frames_per_task;

        crate::dispatch_float_dtype!(dtype, T => {
            self.install(|| unsafe {
                kernels::prod_force_se_a_kernel::<T>(
                    out_addr as *mut T,
                    net_addr as *const T,
                    in_addr as *const T,
                    nlist_addr as *const i32,
                    &geom,
                    min_frames,
                );
            });
        }, "prod_force_se_a");

        Ok(out)
    }
}
