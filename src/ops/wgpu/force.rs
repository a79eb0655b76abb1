//! WebGPU implementation of force operations.

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::ops::{ForceOps, ProdForceGeometry, ProdForceSeA};
use crate::runtime::RuntimeClient;
use crate::runtime::wgpu::shaders::{
    ForceChunk, ProdForceParams, encode_prod_force_se_a, encode_validate_nlist, encode_zero_force,
    plan_chunks,
};
use crate::runtime::wgpu::{WgpuClient, WgpuRuntime, get_buffer};
use crate::tensor::Tensor;
use std::sync::Arc;
use wgpu::{Buffer, CommandEncoder};

const ELEM_BYTES: u64 = 4;

fn buffer_of(tensor: &Tensor<WgpuRuntime>, name: &str) -> Result<Arc<Buffer>> {
    get_buffer(tensor.ptr())
        .ok_or_else(|| Error::Internal(format!("{name} buffer not found in registry")))
}

/// Whole-batch buffers of one call
struct Operands {
    net_deriv: Arc<Buffer>,
    in_deriv: Arc<Buffer>,
    nlist: Arc<Buffer>,
    force: Arc<Buffer>,
}

/// Buffers a chunk is bound from
///
/// With a single chunk these are the tensors themselves. Otherwise each
/// chunk's rows are copied into scratch buffers sized for the largest chunk.
enum Binding<'a> {
    Direct(&'a Operands),
    Staged {
        source: &'a Operands,
        scratch: Operands,
    },
}

impl<'a> Binding<'a> {
    fn new(
        client: &WgpuClient,
        source: &'a Operands,
        chunks: &[ForceChunk],
        geom: &ProdForceGeometry,
    ) -> Self {
        if chunks.len() == 1 && chunks[0].is_whole(geom) {
            return Binding::Direct(source);
        }

        let rows = chunks.iter().map(ForceChunk::rows).max().unwrap_or(0) as u64;
        let frames = chunks.iter().map(|c| c.frame_count).max().unwrap_or(0) as u64;
        let scratch = |label: &str, elems: u64| {
            Arc::new(client.create_storage_buffer(label, elems * ELEM_BYTES))
        };
        let ndescrpt = geom.ndescrpt as u64;
        let scratch = Operands {
            net_deriv: scratch("net_deriv_chunk", rows * ndescrpt),
            in_deriv: scratch("in_deriv_chunk", rows * ndescrpt * 3),
            nlist: scratch("nlist_chunk", rows * geom.nnei as u64),
            force: scratch("force_chunk", frames * geom.force_frame_len() as u64),
        };
        Binding::Staged { source, scratch }
    }

    fn is_staged(&self) -> bool {
        matches!(self, Binding::Staged { .. })
    }

    fn bound(&self) -> &Operands {
        match self {
            Binding::Direct(source) => source,
            Binding::Staged { scratch, .. } => scratch,
        }
    }

    fn stage_nlist(
        &self,
        encoder: &mut CommandEncoder,
        chunk: &ForceChunk,
        geom: &ProdForceGeometry,
    ) {
        if let Binding::Staged { source, scratch } = self {
            copy_rows(encoder, &source.nlist, &scratch.nlist, chunk, geom, geom.nnei);
        }
    }

    fn stage_inputs(
        &self,
        encoder: &mut CommandEncoder,
        chunk: &ForceChunk,
        geom: &ProdForceGeometry,
    ) {
        if let Binding::Staged { source, scratch } = self {
            let ndescrpt = geom.ndescrpt;
            copy_rows(encoder, &source.net_deriv, &scratch.net_deriv, chunk, geom, ndescrpt);
            copy_rows(encoder, &source.in_deriv, &scratch.in_deriv, chunk, geom, ndescrpt * 3);
            copy_rows(encoder, &source.nlist, &scratch.nlist, chunk, geom, geom.nnei);
        }
    }

    /// Copy the partial sums of the chunk's frames into scratch
    fn load_force(
        &self,
        encoder: &mut CommandEncoder,
        chunk: &ForceChunk,
        geom: &ProdForceGeometry,
    ) {
        if let Binding::Staged { source, scratch } = self {
            let (offset, size) = force_range(chunk, geom);
            encoder.copy_buffer_to_buffer(&source.force, offset, &scratch.force, 0, size);
        }
    }

    fn store_force(
        &self,
        encoder: &mut CommandEncoder,
        chunk: &ForceChunk,
        geom: &ProdForceGeometry,
    ) {
        if let Binding::Staged { source, scratch } = self {
            let (offset, size) = force_range(chunk, geom);
            encoder.copy_buffer_to_buffer(&scratch.force, 0, &source.force, offset, size);
        }
    }
}

/// Copy the chunk's rows of a `[rows][row_len]` buffer to the start of `dst`
fn copy_rows(
    encoder: &mut CommandEncoder,
    src: &Buffer,
    dst: &Buffer,
    chunk: &ForceChunk,
    geom: &ProdForceGeometry,
    row_len: usize,
) {
    let row_bytes = row_len as u64 * ELEM_BYTES;
    let size = chunk.rows() as u64 * row_bytes;
    if size > 0 {
        let offset = chunk.row_start(geom) as u64 * row_bytes;
        encoder.copy_buffer_to_buffer(src, offset, dst, 0, size);
    }
}

fn force_range(chunk: &ForceChunk, geom: &ProdForceGeometry) -> (u64, u64) {
    let frame_bytes = geom.force_frame_len() as u64 * ELEM_BYTES;
    (
        chunk.frame_start as u64 * frame_bytes,
        chunk.frame_count as u64 * frame_bytes,
    )
}

fn encoder(client: &WgpuClient, label: &str) -> CommandEncoder {
    client
        .wgpu_device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
}

/// Run the range check on the device and report the first bad entry.
fn validate_nlist(
    client: &WgpuClient,
    binding: &Binding<'_>,
    chunks: &[(ForceChunk, ProdForceParams, Buffer)],
    geom: &ProdForceGeometry,
) -> Result<()> {
    let status = client.create_storage_buffer_init("nlist_status", &[0u32, u32::MAX]);
    for (chunk, params, params_buffer) in chunks {
        let mut encoder = encoder(client, "prod_force_validate");
        binding.stage_nlist(&mut encoder, chunk, geom);
        encode_validate_nlist(
            client.pipeline_cache(),
            &mut encoder,
            &binding.bound().nlist,
            &status,
            params_buffer,
            params,
        );
        client.wgpu_queue().submit(std::iter::once(encoder.finish()));
    }

    let mut result = [0u32; 2];
    client.read_buffer(&status, 0, &mut result)?;
    let [count, first] = result;
    if count == 0 {
        return Ok(());
    }

    let (frame, atom, slot) = geom.slot_coords(first as usize);
    let offset = frame * geom.nlist_frame_len() + geom.nlist_offset(atom, slot);
    let mut index = [0i32; 1];
    let nlist = match binding {
        Binding::Direct(source) | Binding::Staged { source, .. } => &source.nlist,
    };
    client.read_buffer(nlist, offset as u64 * ELEM_BYTES, &mut index)?;

    Err(Error::NeighborOutOfRange {
        index: index[0] as i64,
        nall: geom.nall,
        frame: Some(frame),
        atom: Some(atom),
        slot: Some(slot),
        count: count as usize,
    })
}

/// Force reduction with every storage binding capped at `max_binding_bytes`
pub(crate) fn prod_force_se_a_chunked(
    client: &WgpuClient,
    net_deriv: &Tensor<WgpuRuntime>,
    in_deriv: &Tensor<WgpuRuntime>,
    nlist: &Tensor<WgpuRuntime>,
    natoms: &[i32],
    attrs: &ProdForceSeA,
    max_binding_bytes: u64,
) -> Result<Tensor<WgpuRuntime>> {
    let geom = ProdForceGeometry::from_tensors(
        &client.device_id,
        net_deriv,
        in_deriv,
        nlist,
        natoms,
        attrs,
    )?;
    let dtype = net_deriv.dtype();
    if dtype != DType::F32 {
        return Err(Error::unsupported_dtype(dtype, "prod_force_se_a (wgpu)"));
    }

    let out = Tensor::<WgpuRuntime>::try_zeros(&geom.output_shape(), dtype, client.device())?;
    // Fresh buffers are zero-filled, so with no slots the result is final
    if geom.slot_count() == 0 {
        return Ok(out);
    }

    let chunks = plan_chunks(&geom, max_binding_bytes)?
        .into_iter()
        .map(|chunk| {
            let params = ProdForceParams::for_chunk(&geom, &chunk)?;
            let buffer = client.create_params_buffer("prod_force_params", &params);
            Ok((chunk, params, buffer))
        })
        .collect::<Result<Vec<_>>>()?;

    let operands = Operands {
        net_deriv: buffer_of(net_deriv, "net_deriv")?,
        in_deriv: buffer_of(in_deriv, "in_deriv")?,
        nlist: buffer_of(nlist, "nlist")?,
        force: buffer_of(&out, "force")?,
    };
    let plan: Vec<ForceChunk> = chunks.iter().map(|(chunk, ..)| *chunk).collect();
    let binding = Binding::new(client, &operands, &plan, &geom);

    if attrs.check_neighbors {
        validate_nlist(client, &binding, &chunks, &geom)?;
    }

    log::debug!(
        "wgpu prod_force_se_a: nframes={} nloc={} nall={} nnei={} chunks={}",
        geom.nframes,
        geom.nloc,
        geom.nall,
        geom.nnei,
        chunks.len()
    );

    let bound = binding.bound();
    for (chunk, params, params_buffer) in &chunks {
        let mut encoder = encoder(client, "prod_force_se_a");
        binding.stage_inputs(&mut encoder, chunk, &geom);
        // Later atom runs of a frame continue from the sums already stored
        if binding.is_staged() && chunk.atom_start > 0 {
            binding.load_force(&mut encoder, chunk, &geom);
        } else {
            let cache = client.pipeline_cache();
            encode_zero_force(cache, &mut encoder, &bound.force, params_buffer, params);
        }
        encode_prod_force_se_a(
            client.pipeline_cache(),
            &mut encoder,
            &bound.net_deriv,
            &bound.in_deriv,
            &bound.nlist,
            &bound.force,
            params_buffer,
            params,
        );
        binding.store_force(&mut encoder, chunk, &geom);
        client.wgpu_queue().submit(std::iter::once(encoder.finish()));
    }
    client.synchronize()?;

    Ok(out)
}

impl ForceOps<WgpuRuntime> for WgpuClient {
    fn prod_force_se_a(
        &self,
        net_deriv: &Tensor<WgpuRuntime>,
        in_deriv: &Tensor<WgpuRuntime>,
        nlist: &Tensor<WgpuRuntime>,
        natoms: &[i32],
        attrs: &ProdForceSeA,
    ) -> Result<Tensor<WgpuRuntime>> {
        prod_force_se_a_chunked(
            self,
            net_deriv,
            in_deriv,
            nlist,
            natoms,
            attrs,
            self.max_storage_binding_size(),
        )
    }
}
