//! CUDA implementation of force operations.

use crate::error::{Error, Result};
use crate::ops::{ForceOps, ProdForceGeometry, ProdForceSeA};
use crate::runtime::cuda::kernels::{launch_prod_force_se_a, launch_validate_nlist};
use crate::runtime::cuda::{CudaClient, CudaRuntime};
use crate::runtime::{Runtime, RuntimeClient};
use crate::tensor::Tensor;

const STATUS_BYTES: usize = 2 * std::mem::size_of::<u64>();

/// Run the range check on the device and report the first bad entry.
fn validate_nlist(
    client: &CudaClient,
    nlist: &Tensor<CudaRuntime>,
    geom: &ProdForceGeometry,
) -> Result<()> {
    let device = client.device();
    let status = CudaRuntime::allocate(STATUS_BYTES, device)?;

    let result = (|| -> Result<[u64; 2]> {
        let init = [0u64, u64::MAX];
        CudaRuntime::copy_to_device(bytemuck::cast_slice(&init), status, device)?;
        // SAFETY: status holds two u64 words, nlist matches geom.
        unsafe {
            launch_validate_nlist(
                client.context(),
                client.stream(),
                device.index,
                nlist.ptr(),
                status,
                geom,
            )?;
        }
        let mut words = [0u64; 2];
        CudaRuntime::copy_from_device(status, bytemuck::cast_slice_mut(&mut words), device)?;
        Ok(words)
    })();
    CudaRuntime::deallocate(status, STATUS_BYTES, device);

    let [count, first] = result?;
    if count == 0 {
        return Ok(());
    }

    let (frame, atom, slot) = geom.slot_coords(first as usize);
    let offset = frame * geom.nlist_frame_len() + geom.nlist_offset(atom, slot);
    let mut index = [0i32; 1];
    CudaRuntime::copy_from_device(
        nlist.ptr() + (offset * std::mem::size_of::<i32>()) as u64,
        bytemuck::cast_slice_mut(&mut index),
        device,
    )?;

    Err(Error::NeighborOutOfRange {
        index: index[0] as i64,
        nall: geom.nall,
        frame: Some(frame),
        atom: Some(atom),
        slot: Some(slot),
        count: count as usize,
    })
}

impl ForceOps<CudaRuntime> for CudaClient {
    fn prod_force_se_a(
        &self,
        net_deriv: &Tensor<CudaRuntime>,
        in_deriv: &Tensor<CudaRuntime>,
        nlist: &Tensor<CudaRuntime>,
        natoms: &[i32],
        attrs: &ProdForceSeA,
    ) -> Result<Tensor<CudaRuntime>> {
        let geom = ProdForceGeometry::from_tensors(
            &self.device,
            net_deriv,
            in_deriv,
            nlist,
            natoms,
            attrs,
        )?;
        let dtype = net_deriv.dtype();

        let out = Tensor::<CudaRuntime>::try_zeros(&geom.output_shape(), dtype, &self.device)?;
        if geom.slot_count() == 0 {
            return Ok(out);
        }

        if attrs.check_neighbors {
            validate_nlist(self, nlist, &geom)?;
        }

        log::debug!(
            "cuda prod_force_se_a: dtype={dtype} nframes={} nloc={} nall={} nnei={}",
            geom.nframes,
            geom.nloc,
            geom.nall,
            geom.nnei
        );

        // SAFETY: every pointer comes from a tensor validated against geom,
        // and from_tensors only admits F32 and F64 data.
        unsafe {
            launch_prod_force_se_a(
                self.context(),
                self.stream(),
                self.device.index,
                dtype,
                out.ptr(),
                net_deriv.ptr(),
                in_deriv.ptr(),
                nlist.ptr(),
                &geom,
            )?;
        }

        self.synchronize()?;
        Ok(out)
    }
}
