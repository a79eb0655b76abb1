//! Operation traits

mod force;

pub use force::ForceOps;
