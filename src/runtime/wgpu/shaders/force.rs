//! Launchers for the se_a force reduction on WebGPU
//!
//! A single storage binding may not exceed the device's
//! `max_storage_buffer_binding_size`, which large batches easily do. The
//! work is therefore split into [`ForceChunk`]s of contiguous local-atom
//! rows, each of which fits every binding on its own.

use wgpu::{Buffer, CommandEncoder};

use super::force_wgsl::{accumulate_shader, validate_shader, zero_shader};
use super::pipeline::{LayoutKey, PipelineCache, workgroup_grid};
use crate::error::{Error, Result};
use crate::ops::ProdForceGeometry;

/// Bytes per element of every buffer the shaders bind
const ELEM_BYTES: u64 = 4;

/// Uniform parameter block shared by all force shaders
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ProdForceParams {
    nframes: u32,
    nloc: u32,
    atom_start: u32,
    nall: u32,
    nnei: u32,
    ndescrpt: u32,
    n_a_sel: u32,
    total: u32,
    force_len: u32,
    slot_start: u32,
    _pad: [u32; 2],
}

/// Rows `[atom_start, atom_start + atom_count)` of frames
/// `[frame_start, frame_start + frame_count)`
///
/// A chunk spanning several frames always covers whole frames, so its rows
/// are contiguous in every input buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForceChunk {
    /// First frame
    pub frame_start: usize,
    /// Number of frames
    pub frame_count: usize,
    /// First local atom within each frame
    pub atom_start: usize,
    /// Number of local atoms per frame
    pub atom_count: usize,
}

impl ForceChunk {
    /// Index of the first (frame, atom) row in the batch
    pub fn row_start(&self, geom: &ProdForceGeometry) -> usize {
        self.frame_start * geom.nloc + self.atom_start
    }

    /// Number of (frame, atom) rows
    pub fn rows(&self) -> usize {
        self.frame_count * self.atom_count
    }

    /// Whether the chunk covers every row of the batch
    pub fn is_whole(&self, geom: &ProdForceGeometry) -> bool {
        self.frame_start == 0
            && self.frame_count == geom.nframes
            && self.atom_start == 0
            && self.atom_count == geom.nloc
    }
}

/// Split the batch so no bound buffer exceeds `max_binding_bytes`
///
/// Whole frames are grouped when a frame fits, otherwise each frame is cut
/// into runs of local atoms. Fails if a single row of `in_deriv` or a
/// single frame of `force` is larger than the limit.
pub fn plan_chunks(geom: &ProdForceGeometry, max_binding_bytes: u64) -> Result<Vec<ForceChunk>> {
    // in_deriv rows are the widest input: 3 x ndescrpt values
    let row_bytes = (geom.ndescrpt as u64 * 3).max(geom.nnei as u64).max(1) * ELEM_BYTES;
    let force_frame_bytes = geom.force_frame_len() as u64 * ELEM_BYTES;
    if row_bytes > max_binding_bytes || force_frame_bytes > max_binding_bytes {
        return Err(Error::Backend(format!(
            "prod_force_se_a: a single atom row ({row_bytes} bytes) or force frame \
             ({force_frame_bytes} bytes) exceeds the {max_binding_bytes}-byte storage binding limit"
        )));
    }

    let rows_fit = (max_binding_bytes / row_bytes) as usize;
    let frames_fit = (max_binding_bytes / force_frame_bytes) as usize;
    let mut chunks = Vec::new();

    if rows_fit >= geom.nloc {
        let per_chunk = (rows_fit / geom.nloc).min(frames_fit).max(1);
        let mut frame_start = 0;
        while frame_start < geom.nframes {
            let frame_count = per_chunk.min(geom.nframes - frame_start);
            chunks.push(ForceChunk {
                frame_start,
                frame_count,
                atom_start: 0,
                atom_count: geom.nloc,
            });
            frame_start += frame_count;
        }
    } else {
        for frame_start in 0..geom.nframes {
            let mut atom_start = 0;
            while atom_start < geom.nloc {
                let atom_count = rows_fit.min(geom.nloc - atom_start);
                chunks.push(ForceChunk {
                    frame_start,
                    frame_count: 1,
                    atom_start,
                    atom_count,
                });
                atom_start += atom_count;
            }
        }
    }

    Ok(chunks)
}

impl ProdForceParams {
    /// Pack the geometry of one chunk
    ///
    /// Fails if the batch's flat slot index does not fit 32 bits, since the
    /// validation shader reports it batch-wide.
    pub fn for_chunk(geom: &ProdForceGeometry, chunk: &ForceChunk) -> Result<Self> {
        let to_u32 = |value: usize, what: &str| {
            u32::try_from(value).map_err(|_| {
                Error::Backend(format!("{what} ({value}) exceeds the 32-bit WebGPU index range"))
            })
        };
        to_u32(geom.slot_count(), "slot count")?;

        Ok(Self {
            nframes: to_u32(chunk.frame_count, "nframes")?,
            nloc: to_u32(chunk.atom_count, "nloc")?,
            atom_start: to_u32(chunk.atom_start, "atom offset")?,
            nall: to_u32(geom.nall, "nall")?,
            nnei: to_u32(geom.nnei, "nnei")?,
            ndescrpt: to_u32(geom.ndescrpt, "ndescrpt")?,
            n_a_sel: to_u32(geom.n_a_sel, "n_a_sel")?,
            total: to_u32(chunk.rows() * geom.n_a_sel, "chunk slot count")?,
            force_len: to_u32(chunk.frame_count * geom.force_frame_len(), "force length")?,
            slot_start: to_u32(chunk.row_start(geom) * geom.n_a_sel, "slot offset")?,
            _pad: [0; 2],
        })
    }
}

/// Record a pass that clears the bound force frames
pub fn encode_zero_force(
    cache: &PipelineCache,
    encoder: &mut CommandEncoder,
    force: &Buffer,
    params_buffer: &Buffer,
    params: &ProdForceParams,
) {
    if params.force_len == 0 {
        return;
    }

    let module = cache.get_or_create_module("prod_force_zero", &zero_shader());
    let layout = cache.get_or_create_layout(LayoutKey {
        num_readonly_storage: 0,
        num_storage_buffers: 1,
        num_uniform_buffers: 1,
    });
    let pipeline = cache.get_or_create_pipeline("prod_force_zero", "prod_force_zero", &module, &layout);
    let bind_group = cache.create_bind_group(&layout, &[force, params_buffer]);

    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("prod_force_zero"),
        timestamp_writes: None,
    });
    pass.set_pipeline(&pipeline);
    pass.set_bind_group(0, Some(&bind_group), &[]);
    let (x, y) = workgroup_grid(params.force_len as usize);
    pass.dispatch_workgroups(x, y, 1);
}

/// Record the accumulation pass of one chunk
///
/// The force binding must already hold the chunk's starting values.
#[allow(clippy::too_many_arguments)]
pub fn encode_prod_force_se_a(
    cache: &PipelineCache,
    encoder: &mut CommandEncoder,
    net_deriv: &Buffer,
    in_deriv: &Buffer,
    nlist: &Buffer,
    force: &Buffer,
    params_buffer: &Buffer,
    params: &ProdForceParams,
) {
    if params.total == 0 {
        return;
    }

    let module = cache.get_or_create_module("prod_force_se_a", &accumulate_shader());
    let layout = cache.get_or_create_layout(LayoutKey {
        num_readonly_storage: 3,
        num_storage_buffers: 1,
        num_uniform_buffers: 1,
    });
    let pipeline =
        cache.get_or_create_pipeline("prod_force_se_a", "prod_force_se_a_f32", &module, &layout);
    let bind_group = cache.create_bind_group(
        &layout,
        &[net_deriv, in_deriv, nlist, force, params_buffer],
    );

    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("prod_force_se_a_f32"),
        timestamp_writes: None,
    });
    pass.set_pipeline(&pipeline);
    pass.set_bind_group(0, Some(&bind_group), &[]);
    let (x, y) = workgroup_grid(params.total as usize);
    pass.dispatch_workgroups(x, y, 1);
}

/// Record the neighbor range check of one chunk
///
/// `status` must hold two words initialised to `[0, u32::MAX]`.
pub fn encode_validate_nlist(
    cache: &PipelineCache,
    encoder: &mut CommandEncoder,
    nlist: &Buffer,
    status: &Buffer,
    params_buffer: &Buffer,
    params: &ProdForceParams,
) {
    if params.total == 0 {
        return;
    }

    let module = cache.get_or_create_module("prod_force_validate", &validate_shader());
    let layout = cache.get_or_create_layout(LayoutKey {
        num_readonly_storage: 1,
        num_storage_buffers: 1,
        num_uniform_buffers: 1,
    });
    let pipeline = cache.get_or_create_pipeline(
        "prod_force_validate",
        "prod_force_validate_nlist",
        &module,
        &layout,
    );
    let bind_group = cache.create_bind_group(&layout, &[nlist, status, params_buffer]);

    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("prod_force_validate_nlist"),
        timestamp_writes: None,
    });
    pass.set_pipeline(&pipeline);
    pass.set_bind_group(0, Some(&bind_group), &[]);
    let (x, y) = workgroup_grid(params.total as usize);
    pass.dispatch_workgroups(x, y, 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::ProdForceSeA;

    fn geometry(nframes: usize, nloc: usize, nall: usize, n_a_sel: usize) -> ProdForceGeometry {
        let ndescrpt = n_a_sel * 4;
        ProdForceGeometry::from_inputs(
            &[nframes, nloc * ndescrpt],
            &[nframes, nloc * ndescrpt * 3],
            &[nframes, nloc * n_a_sel],
            &[nloc as i32, nall as i32, nloc as i32],
            &ProdForceSeA::new(n_a_sel),
        )
        .unwrap()
    }

    fn covered_rows(chunks: &[ForceChunk], geom: &ProdForceGeometry) -> Vec<usize> {
        chunks
            .iter()
            .flat_map(|c| c.row_start(geom)..c.row_start(geom) + c.rows())
            .collect()
    }

    #[test]
    fn test_params_are_uniform_sized() {
        assert_eq!(std::mem::size_of::<ProdForceParams>(), 48);
    }

    #[test]
    fn test_params_for_whole_batch() {
        let geom = geometry(2, 2, 4, 3);
        let chunks = plan_chunks(&geom, u64::from(u32::MAX)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_whole(&geom));

        let params = ProdForceParams::for_chunk(&geom, &chunks[0]).unwrap();
        assert_eq!(params.nframes, 2);
        assert_eq!(params.nloc, 2);
        assert_eq!(params.nall, 4);
        assert_eq!(params.ndescrpt, 12);
        assert_eq!(params.total, 2 * 2 * 3);
        assert_eq!(params.force_len, 2 * 12);
        assert_eq!((params.atom_start, params.slot_start), (0, 0));
    }

    #[test]
    fn test_plan_groups_whole_frames() {
        // one in_deriv row is 3 * 12 * 4 = 144 bytes, a frame of 2 atoms 288
        let geom = geometry(5, 2, 4, 3);
        let chunks = plan_chunks(&geom, 600).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.frame_count).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        assert!(chunks.iter().all(|c| c.atom_start == 0 && c.atom_count == 2));
        assert_eq!(covered_rows(&chunks, &geom), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_plan_splits_large_frames_by_atom() {
        let geom = geometry(2, 5, 7, 3);
        let chunks = plan_chunks(&geom, 300).unwrap();
        assert!(chunks.iter().all(|c| c.frame_count == 1 && c.atom_count <= 2));
        assert_eq!(chunks.len(), 6);
        assert_eq!(covered_rows(&chunks, &geom), (0..10).collect::<Vec<_>>());

        let last = chunks[5];
        assert_eq!((last.frame_start, last.atom_start, last.atom_count), (1, 4, 1));
        let params = ProdForceParams::for_chunk(&geom, &last).unwrap();
        assert_eq!(params.atom_start, 4);
        assert_eq!(params.slot_start, 9 * 3);
        assert_eq!(params.total, 3);
        assert_eq!(params.force_len, 21);
    }

    #[test]
    fn test_plan_limits_force_frames() {
        // force frames of 3 * 100 * 4 = 1200 bytes dominate the input rows
        let geom = geometry(4, 1, 100, 1);
        let chunks = plan_chunks(&geom, 2500).unwrap();
        assert!(chunks.iter().all(|c| c.frame_count == 2));
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_plan_rejects_oversized_row() {
        let geom = geometry(1, 2, 4, 3);
        let err = plan_chunks(&geom, 100).unwrap_err();
        assert!(matches!(err, Error::Backend(_)), "{err}");
    }
}
