//! Data type system for dpforce tensors
//!
//! Force reduction works on a small, closed set of element types: the two
//! IEEE float widths for derivative and force tensors, and 32-bit signed
//! integers for neighbor lists.

mod element;

pub use element::{Element, Float};

use std::fmt;

/// Element type of a tensor, determined at runtime
///
/// The discriminant values match the tensor-library convention
/// (floats 0-9, signed ints 10-19) and never change.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    F64 = 0,
    /// 32-bit floating point
    F32 = 1,
    /// 32-bit signed integer (neighbor indices)
    I32 = 11,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::F64 => 8,
            Self::F32 | Self::I32 => 4,
        }
    }

    /// Returns true if this is a floating point type
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F64 | Self::F32)
    }

    /// Returns true if this is an integer type
    #[inline]
    pub const fn is_int(self) -> bool {
        matches!(self, Self::I32)
    }

    /// Short name used in kernel names and log lines
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::I32 => "i32",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
