//! Layout: shape of a contiguous row-major tensor

use smallvec::SmallVec;
use std::fmt;

/// Stack allocation threshold for dimensions
const STACK_DIMS: usize = 4;

/// Shape type: dimensions of a tensor
pub type Shape = SmallVec<[usize; STACK_DIMS]>;

/// Layout of a contiguous (row-major/C-order) tensor
///
/// Force kernels address their inputs with flat per-frame offsets, so every
/// tensor in this crate is dense and starts at element 0 of its storage.
#[derive(Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
}

impl Layout {
    /// Create a contiguous layout from a shape
    ///
    /// # Example
    /// ```
    /// use dpforce::tensor::Layout;
    /// let layout = Layout::contiguous(&[2, 12]);
    /// assert_eq!(layout.shape(), &[2, 12]);
    /// assert_eq!(layout.elem_count(), 24);
    /// ```
    pub fn contiguous(shape: &[usize]) -> Self {
        Self {
            shape: shape.iter().copied().collect(),
        }
    }

    /// Shape of the layout
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Size of dimension `dim`, if it exists
    #[inline]
    pub fn dim(&self, dim: usize) -> Option<usize> {
        self.shape.get(dim).copied()
    }

    /// Total number of elements
    #[inline]
    pub fn elem_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Row-major strides, in elements
    pub fn strides(&self) -> SmallVec<[usize; STACK_DIMS]> {
        let mut strides: SmallVec<[usize; STACK_DIMS]> = SmallVec::from_elem(1, self.shape.len());
        for i in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.shape[i + 1];
        }
        strides
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Layout(shape={:?})", self.shape.as_slice())
    }
}
