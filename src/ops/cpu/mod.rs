//! CPU implementation of force operations.

pub mod force;
