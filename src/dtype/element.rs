//! Element trait mapping Rust types to DType

use super::DType;
use bytemuck::{Pod, Zeroable};
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// Trait for types that can be stored in a tensor
///
/// Bridges compile-time Rust types and the runtime [`DType`] tag, so typed
/// transfers (`Tensor::from_slice`, `Tensor::to_vec`) can check what they
/// are given against what a buffer holds.
pub trait Element: Copy + Send + Sync + Debug + Pod + Zeroable + PartialEq + 'static {
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Zero value
    fn zero() -> Self;
}

/// Floating point element that a force kernel accumulates in
///
/// Accumulation runs in the element type itself, with no widening.
pub trait Float:
    Element
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + AddAssign
    + SubAssign
    + PartialOrd
{
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    #[inline]
    fn zero() -> Self {
        0.0
    }
}

impl Float for f64 {}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn zero() -> Self {
        0.0
    }
}

impl Float for f32 {}

impl Element for i32 {
    const DTYPE: DType = DType::I32;

    #[inline]
    fn zero() -> Self {
        0
    }
}
