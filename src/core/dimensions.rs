//! Array shape descriptor.
//!
//! An [`ArrayDim`] describes a stack of `n` volumes of `x * y * z`
//! elements. Images are volumes with `z == 1`.

use std::fmt;

/// Dimensions `(x, y, z, n)` of an array.
///
/// `x` varies fastest. The default is `(0, 1, 1, 1)`, an empty array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArrayDim {
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub n: usize,
}

impl Default for ArrayDim {
    fn default() -> Self {
        Self { x: 0, y: 1, z: 1, n: 1 }
    }
}

impl ArrayDim {
    pub const fn new(x: usize, y: usize, z: usize, n: usize) -> Self {
        Self { x, y, z, n }
    }

    /// Total number of elements; zero when `x == 0`.
    #[inline]
    pub fn size(&self) -> usize {
        if self.x == 0 {
            0
        } else {
            self.item_size() * self.n
        }
    }

    /// Number of elements in one item of the stack (`x * y * z`).
    #[inline]
    pub fn item_size(&self) -> usize {
        self.x * self.y * self.z
    }

    /// [`size`](Self::size), or `None` when the product overflows.
    pub fn checked_size(&self) -> Option<usize> {
        if self.x == 0 {
            return Some(0);
        }
        self.checked_item_size()?.checked_mul(self.n)
    }

    /// [`item_size`](Self::item_size), or `None` when the product overflows.
    pub fn checked_item_size(&self) -> Option<usize> {
        self.x.checked_mul(self.y)?.checked_mul(self.z)
    }

    /// Number of elements in one `z` slice (`x * y`).
    #[inline]
    pub fn slice_size(&self) -> usize {
        self.x * self.y
    }

    /// Rank of one item: 3 for volumes, 2 for images, 1 for lines.
    pub fn rank(&self) -> usize {
        if self.z > 1 {
            3
        } else if self.y > 1 {
            2
        } else {
            1
        }
    }

    /// True when the shape holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Check coordinates; `n` is 1-based like image locations.
    pub fn is_valid_index(&self, x: usize, y: usize, z: usize, n: usize) -> bool {
        x < self.x && y < self.y && z < self.z && n >= 1 && n <= self.n
    }

    /// Same shape with the stack collapsed to one item.
    pub fn item_dim(&self) -> Self {
        Self { n: 1, ..*self }
    }

    /// Linear element offset of `(x, y, z, n)`, `n` 0-based.
    #[inline]
    pub(crate) fn offset(&self, x: usize, y: usize, z: usize, n: usize) -> usize {
        ((n * self.z + z) * self.y + y) * self.x + x
    }
}

impl From<(usize, usize)> for ArrayDim {
    fn from((x, y): (usize, usize)) -> Self {
        Self::new(x, y, 1, 1)
    }
}

impl From<(usize, usize, usize)> for ArrayDim {
    fn from((x, y, z): (usize, usize, usize)) -> Self {
        Self::new(x, y, z, 1)
    }
}

impl From<(usize, usize, usize, usize)> for ArrayDim {
    fn from((x, y, z, n): (usize, usize, usize, usize)) -> Self {
        Self::new(x, y, z, n)
    }
}

impl fmt::Display for ArrayDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} x {} x {} x {})", self.x, self.y, self.z, self.n)
    }
}
