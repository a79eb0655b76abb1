//! Force operations
//!
//! Operations are defined as traits implemented by each runtime's client,
//! so the choice of runtime type selects the kernel at compile time.
//!
//! ```text
//! RuntimeClient<R>
//!   └── implements ForceOps<R>
//!         └── prod_force_se_a   (chain-rule force reduction, se_a descriptor)
//! ```
//!
//! Every implementation shares one boundary check,
//! [`ProdForceGeometry::from_inputs`], which rejects inconsistent shapes and
//! attributes before any kernel runs.

mod dispatch;
mod force_common;
pub(crate) mod traits;

pub(crate) mod cpu;

#[cfg(feature = "cuda")]
pub(crate) mod cuda;

#[cfg(feature = "wgpu")]
pub(crate) mod wgpu;

pub use force_common::{
    COORD_DERIV_WIDTH, DESCRIPTOR_WIDTH, ProdForceGeometry, ProdForceSeA, check_neighbor_indices,
};
pub use traits::ForceOps;
