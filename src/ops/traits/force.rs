//! Force reduction operations trait.

use crate::error::Result;
use crate::ops::ProdForceSeA;
use crate::runtime::Runtime;
use crate::tensor::Tensor;

/// Force reduction operations
pub trait ForceOps<R: Runtime> {
    /// Reduce descriptor derivatives to per-atom forces (se_a descriptor).
    ///
    /// For every frame, local atom `i` and angular neighbor slot `j` holding
    /// atom `k = nlist[i * nnei + j] >= 0`, computes
    /// `f[x] = sum_m net_deriv[i, j, m] * in_deriv[i, j, m, x]` and adds `f`
    /// to atom `i` while subtracting it from atom `k`. Empty slots (negative
    /// index) contribute nothing.
    ///
    /// # Arguments
    ///
    /// * `net_deriv` - `[nframes, nloc * ndescrpt]` energy gradient w.r.t. descriptors (F32 or F64)
    /// * `in_deriv` - `[nframes, nloc * ndescrpt * 3]` descriptor gradient w.r.t. coordinates
    /// * `nlist` - `[nframes, nloc * nnei]` I32 neighbor list, negative for empty slots
    /// * `natoms` - host array, `natoms[0] = nloc`, `natoms[1] = nall`, at least 3 entries
    /// * `attrs` - neighbor-slot partition and kernel options
    ///
    /// # Returns
    ///
    /// Freshly allocated `[nframes, 3 * nall]` force tensor with the dtype of `net_deriv`.
    ///
    /// # Errors
    ///
    /// Every error is raised before the kernel starts: rank and dimension
    /// mismatches, `n_r_sel != 0`, short `natoms`, dtype problems, and (when
    /// `attrs.check_neighbors` is set) neighbor indices `>= nall`.
    fn prod_force_se_a(
        &self,
        net_deriv: &Tensor<R>,
        in_deriv: &Tensor<R>,
        nlist: &Tensor<R>,
        natoms: &[i32],
        attrs: &ProdForceSeA,
    ) -> Result<Tensor<R>>;
}
