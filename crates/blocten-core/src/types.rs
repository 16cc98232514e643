//! Core type definitions for Blocten block tensors.
//!
//! This module defines the fundamental aliases used throughout the Blocten
//! stack:
//!
//! - Type aliases for axis positions and ranks ([`Axis`], [`Rank`])
//! - Element shape type ([`Shape`]) backed by `SmallVec`
//! - Block-index tuple type ([`BlockIndex`]) backed by `SmallVec`

use smallvec::SmallVec;

/// Type alias for a tensor axis position.
///
/// Zero-indexed (0 is the first, slowest-varying axis).
pub type Axis = usize;

/// Type alias for tensor order (number of axes).
pub type Rank = usize;

/// Per-axis element extents, using `SmallVec` to avoid heap allocation for
/// common cases.
///
/// Optimized for tensors of up to 6 axes; higher orders fall back to the
/// heap automatically.
pub type Shape = SmallVec<[usize; 6]>;

/// A tuple of per-axis block indices.
///
/// Block indices are coarser than element indices: they address one block
/// along each axis of a block space.
pub type BlockIndex = SmallVec<[usize; 4]>;

/// Build a [`Shape`] from a slice.
pub fn shape_from(dims: &[usize]) -> Shape {
    Shape::from_slice(dims)
}

/// Build a [`BlockIndex`] from a slice.
pub fn block_index_from(idx: &[usize]) -> BlockIndex {
    BlockIndex::from_slice(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_from_slice() {
        let s = shape_from(&[2, 3, 4]);
        assert_eq!(&s[..], &[2, 3, 4]);
    }

    #[test]
    fn test_block_index_from_slice() {
        let b = block_index_from(&[0, 1]);
        assert_eq!(&b[..], &[0, 1]);
    }
}
