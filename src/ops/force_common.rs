//! Geometry, attributes and boundary validation shared by every force backend.
//!
//! Memory layout, per frame:
//!
//! ```text
//! net_deriv  [nloc][nnei][4]       d E / d descriptor
//! in_deriv   [nloc][nnei][4][3]    d descriptor / d coordinate
//! nlist      [nloc][nnei]          index into [0, nall), negative = empty
//! force      [nall][3]
//! ```

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::runtime::{Device, Runtime};
use crate::tensor::Tensor;

/// Descriptor components per neighbor slot
pub const DESCRIPTOR_WIDTH: usize = 4;

/// Coordinate-gradient values per neighbor slot (one 3-vector per component)
pub const COORD_DERIV_WIDTH: usize = DESCRIPTOR_WIDTH * 3;

/// Attributes of the `ProdForceSeA` operator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProdForceSeA {
    /// Number of angular neighbor slots per atom
    pub n_a_sel: usize,
    /// Number of radial-only neighbor slots per atom; must be 0
    pub n_r_sel: usize,
    /// Reject neighbor indices `>= nall` before accumulating
    pub check_neighbors: bool,
}

impl ProdForceSeA {
    /// All-angular attributes with `n_a_sel` slots per atom
    pub fn new(n_a_sel: usize) -> Self {
        Self {
            n_a_sel,
            n_r_sel: 0,
            check_neighbors: true,
        }
    }

    /// Attributes with an explicit radial-only partition
    ///
    /// Accepted here so callers can forward attributes verbatim; a non-zero
    /// `n_r_sel` is rejected when the operation runs.
    pub fn with_radial(n_a_sel: usize, n_r_sel: usize) -> Self {
        Self {
            n_r_sel,
            ..Self::new(n_a_sel)
        }
    }

    /// Enable or disable the neighbor bounds check
    pub fn check_neighbors(mut self, enabled: bool) -> Self {
        self.check_neighbors = enabled;
        self
    }

    /// Offset of the first radial-only descriptor entry of an atom
    #[inline]
    pub fn n_a_shift(&self) -> usize {
        self.n_a_sel * DESCRIPTOR_WIDTH
    }
}

/// Validated dimensions of one `prod_force_se_a` invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProdForceGeometry {
    /// Number of frames
    pub nframes: usize,
    /// Local atoms per frame
    pub nloc: usize,
    /// Local plus ghost atoms per frame
    pub nall: usize,
    /// Neighbor slots per atom
    pub nnei: usize,
    /// Descriptor length per atom (`4 * nnei`)
    pub ndescrpt: usize,
    /// Angular neighbor slots per atom
    pub n_a_sel: usize,
    /// `4 * n_a_sel`
    pub n_a_shift: usize,
}

impl ProdForceGeometry {
    /// Validate input shapes and attributes and derive the geometry.
    ///
    /// Checks run in a fixed order so callers always see the first problem:
    /// ranks, `natoms`, frame counts, descriptor widths, neighbor counts,
    /// then the radial partition.
    pub fn from_inputs(
        net_deriv_shape: &[usize],
        in_deriv_shape: &[usize],
        nlist_shape: &[usize],
        natoms: &[i32],
        attrs: &ProdForceSeA,
    ) -> Result<Self> {
        require_rank("net_deriv", net_deriv_shape, "Dim of net deriv should be 2")?;
        require_rank("in_deriv", in_deriv_shape, "Dim of input deriv should be 2")?;
        require_rank("nlist", nlist_shape, "Dim of nlist should be 2")?;

        if natoms.len() < 3 {
            return Err(Error::InsufficientAtoms { got: natoms.len() });
        }
        let nloc = usize::try_from(natoms[0])
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                Error::invalid_argument(
                    "natoms",
                    format!("number of local atoms must be positive, got {}", natoms[0]),
                )
            })?;
        let nall = usize::try_from(natoms[1])
            .ok()
            .filter(|&n| n >= nloc)
            .ok_or_else(|| {
                Error::invalid_argument(
                    "natoms",
                    format!(
                        "number of all atoms ({}) must be at least the number of local atoms ({nloc})",
                        natoms[1]
                    ),
                )
            })?;

        let nframes = net_deriv_shape[0];
        let ndescrpt = net_deriv_shape[1] / nloc;
        let nnei = nlist_shape[1] / nloc;

        if in_deriv_shape[0] != nframes {
            return Err(Error::invalid_argument(
                "in_deriv",
                "number of samples should match",
            ));
        }
        if nlist_shape[0] != nframes {
            return Err(Error::invalid_argument(
                "nlist",
                "number of samples should match",
            ));
        }

        if nloc * ndescrpt != net_deriv_shape[1] {
            return Err(Error::invalid_argument(
                "net_deriv",
                format!(
                    "width {} is not a multiple of nloc ({nloc})",
                    net_deriv_shape[1]
                ),
            ));
        }
        if nloc * ndescrpt * 3 != in_deriv_shape[1] {
            return Err(Error::invalid_argument(
                "in_deriv",
                "number of descriptors should match",
            ));
        }
        if nloc * nnei != nlist_shape[1] {
            return Err(Error::invalid_argument(
                "nlist",
                format!("width {} is not a multiple of nloc ({nloc})", nlist_shape[1]),
            ));
        }
        if nnei != attrs.n_a_sel + attrs.n_r_sel {
            return Err(Error::invalid_argument(
                "nlist",
                "number of neighbors should match",
            ));
        }
        if attrs.n_r_sel != 0 {
            return Err(Error::UnsupportedConfig {
                reason: "Rotational free only support all-angular information".to_string(),
            });
        }
        if nnei * DESCRIPTOR_WIDTH != ndescrpt {
            return Err(Error::invalid_argument(
                "net_deriv",
                format!(
                    "descriptor length {ndescrpt} should be {DESCRIPTOR_WIDTH} x {nnei} neighbors"
                ),
            ));
        }

        Ok(Self {
            nframes,
            nloc,
            nall,
            nnei,
            ndescrpt,
            n_a_sel: attrs.n_a_sel,
            n_a_shift: attrs.n_a_shift(),
        })
    }

    /// Validate tensors (dtypes, device, shapes) and derive the geometry.
    ///
    /// Every input must live on `device`, the device of the client that runs
    /// the kernel.
    pub fn from_tensors<R: Runtime>(
        device: &R::Device,
        net_deriv: &Tensor<R>,
        in_deriv: &Tensor<R>,
        nlist: &Tensor<R>,
        natoms: &[i32],
        attrs: &ProdForceSeA,
    ) -> Result<Self> {
        let dtype = net_deriv.dtype();
        if !dtype.is_float() {
            return Err(Error::unsupported_dtype(dtype, "prod_force_se_a"));
        }
        if in_deriv.dtype() != dtype {
            return Err(Error::DTypeMismatch {
                lhs: dtype,
                rhs: in_deriv.dtype(),
            });
        }
        if nlist.dtype() != DType::I32 {
            return Err(Error::unsupported_dtype(
                nlist.dtype(),
                "prod_force_se_a (nlist)",
            ));
        }
        require_device(device, &[net_deriv.device(), in_deriv.device(), nlist.device()])?;

        Self::from_inputs(
            net_deriv.shape(),
            in_deriv.shape(),
            nlist.shape(),
            natoms,
            attrs,
        )
    }

    /// `net_deriv` elements per frame
    #[inline]
    pub fn net_deriv_frame_len(&self) -> usize {
        self.nloc * self.ndescrpt
    }

    /// `in_deriv` elements per frame
    #[inline]
    pub fn in_deriv_frame_len(&self) -> usize {
        self.nloc * self.ndescrpt * 3
    }

    /// `nlist` elements per frame
    #[inline]
    pub fn nlist_frame_len(&self) -> usize {
        self.nloc * self.nnei
    }

    /// `force` elements per frame
    #[inline]
    pub fn force_frame_len(&self) -> usize {
        self.nall * 3
    }

    /// Shape of the output force tensor
    #[inline]
    pub fn output_shape(&self) -> [usize; 2] {
        [self.nframes, self.force_frame_len()]
    }

    /// Total number of (frame, atom, angular slot) work items
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.nframes * self.nloc * self.n_a_sel
    }

    /// Offset of the 4-component descriptor block of atom `i`, slot `j`
    #[inline]
    pub fn net_deriv_offset(&self, i: usize, j: usize) -> usize {
        i * self.ndescrpt + j * DESCRIPTOR_WIDTH
    }

    /// Offset of the 12-value coordinate-gradient block of atom `i`, slot `j`
    #[inline]
    pub fn in_deriv_offset(&self, i: usize, j: usize) -> usize {
        i * self.ndescrpt * 3 + j * COORD_DERIV_WIDTH
    }

    /// Offset of the neighbor index of atom `i`, slot `j`
    #[inline]
    pub fn nlist_offset(&self, i: usize, j: usize) -> usize {
        i * self.nnei + j
    }

    /// Split a flat work item index into `(frame, atom, slot)`
    ///
    /// Work items are ordered frame-major, then by atom, then by slot.
    #[inline]
    pub fn slot_coords(&self, flat: usize) -> (usize, usize, usize) {
        let per_frame = self.nloc * self.n_a_sel;
        let rem = flat % per_frame;
        (flat / per_frame, rem / self.n_a_sel, rem % self.n_a_sel)
    }
}

/// Check that every angular neighbor entry is empty (negative) or `< nall`.
///
/// `nlist` holds all frames back to back. Reports the first offending entry
/// and the total count of bad entries.
pub fn check_neighbor_indices(nlist: &[i32], geom: &ProdForceGeometry) -> Result<()> {
    let frame_len = geom.nlist_frame_len();
    let mut first = None;
    let mut count = 0usize;

    for (frame, row) in nlist.chunks_exact(frame_len.max(1)).enumerate() {
        for atom in 0..geom.nloc {
            for slot in 0..geom.n_a_sel {
                let k = row[geom.nlist_offset(atom, slot)];
                if k >= 0 && k as usize >= geom.nall {
                    count += 1;
                    first.get_or_insert((frame, atom, slot, k));
                }
            }
        }
    }

    match first {
        None => Ok(()),
        Some((frame, atom, slot, index)) => Err(Error::NeighborOutOfRange {
            index: index as i64,
            nall: geom.nall,
            frame: Some(frame),
            atom: Some(atom),
            slot: Some(slot),
            count,
        }),
    }
}

fn require_device<D: Device>(expected: &D, devices: &[&D]) -> Result<()> {
    if devices.iter().all(|d| d.is_same(expected)) {
        Ok(())
    } else {
        Err(Error::DeviceMismatch)
    }
}

fn require_rank(arg: &'static str, shape: &[usize], reason: &str) -> Result<()> {
    if shape.len() != 2 {
        return Err(Error::invalid_argument(
            arg,
            format!("{reason}, got rank {}", shape.len()),
        ));
    }
    Ok(())
}
