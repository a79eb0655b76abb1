//! Force reduction kernels for the se_a descriptor

use crate::dtype::Float;
use crate::ops::{COORD_DERIV_WIDTH, DESCRIPTOR_WIDTH, ProdForceGeometry};

/// Reduce one frame.
///
/// `force` holds `3 * nall` values and is overwritten. Atoms are visited in
/// ascending order and slots ascending within an atom, so the floating-point
/// summation order (and therefore the result) is fixed. Slots holding a
/// negative index are empty; slots holding an index `>= nall` are skipped.
pub fn prod_force_se_a_frame<T: Float>(
    force: &mut [T],
    net_deriv: &[T],
    in_deriv: &[T],
    nlist: &[i32],
    geom: &ProdForceGeometry,
) {
    debug_assert_eq!(force.len(), geom.force_frame_len());
    debug_assert_eq!(net_deriv.len(), geom.net_deriv_frame_len());
    debug_assert_eq!(in_deriv.len(), geom.in_deriv_frame_len());
    debug_assert_eq!(nlist.len(), geom.nlist_frame_len());

    force.fill(T::zero());

    for i in 0..geom.nloc {
        for j in 0..geom.n_a_sel {
            let k = nlist[geom.nlist_offset(i, j)];
            if k < 0 || k as usize >= geom.nall {
                continue;
            }
            let k = k as usize;

            let g = &net_deriv[geom.net_deriv_offset(i, j)..][..DESCRIPTOR_WIDTH];
            let c = &in_deriv[geom.in_deriv_offset(i, j)..][..COORD_DERIV_WIDTH];

            for x in 0..3 {
                let mut f = T::zero();
                for m in 0..DESCRIPTOR_WIDTH {
                    f += g[m] * c[m * 3 + x];
                }
                force[i * 3 + x] += f;
                force[k * 3 + x] -= f;
            }
        }
    }
}

/// Reduce every frame of a batch.
///
/// With the `rayon` feature, frames are distributed over the current thread
/// pool in groups of at least `min_frames_per_task`.
///
/// # Safety
/// - `force` must be valid for `nframes * 3 * nall` writes
/// - `net_deriv`, `in_deriv`, `nlist` must be valid for `nframes` frames of reads
///   as described by `geom`
/// - `force` must not overlap any input
/// - the inputs may be null only when `geom.slot_count() == 0`
pub unsafe fn prod_force_se_a_kernel<T: Float>(
    force: *mut T,
    net_deriv: *const T,
    in_deriv: *const T,
    nlist: *const i32,
    geom: &ProdForceGeometry,
    min_frames_per_task: usize,
) {
    let nframes = geom.nframes;
    if nframes == 0 {
        return;
    }

    let force = std::slice::from_raw_parts_mut(force, nframes * geom.force_frame_len());
    if geom.slot_count() == 0 {
        // No angular slots: the inputs are empty and may be null.
        force.fill(T::zero());
        return;
    }
    let net_deriv = std::slice::from_raw_parts(net_deriv, nframes * geom.net_deriv_frame_len());
    let in_deriv = std::slice::from_raw_parts(in_deriv, nframes * geom.in_deriv_frame_len());
    let nlist = std::slice::from_raw_parts(nlist, nframes * geom.nlist_frame_len());

    let run = |(frame, out): (usize, &mut [T])| {
        prod_force_se_a_frame(
            out,
            &net_deriv[frame * geom.net_deriv_frame_len()..][..geom.net_deriv_frame_len()],
            &in_deriv[frame * geom.in_deriv_frame_len()..][..geom.in_deriv_frame_len()],
            &nlist[frame * geom.nlist_frame_len()..][..geom.nlist_frame_len()],
            geom,
        );
    };

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;

        if nframes > 1 {
            force
                .par_chunks_mut(geom.force_frame_len())
                .enumerate()
                .with_min_len(min_frames_per_task.max(1))
                .for_each(run);
            return;
        }
    }

    #[cfg(not(feature = "rayon"))]
    let _ = min_frames_per_task;

    force
        .chunks_mut(geom.force_frame_len())
        .enumerate()
        .for_each(run);
}
