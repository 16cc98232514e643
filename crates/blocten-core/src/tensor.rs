//! Block-major tensor storage with a checkout discipline.
//!
//! A [`BlockTensor`] stores one element buffer laid out block-by-block in
//! the canonical enumeration order of its [`BlockSpace`]. Absent blocks
//! occupy no storage.
//!
//! Direct access to the buffer goes through *checkouts*: any number of
//! concurrent read checkouts may coexist, a write checkout is exclusive,
//! and an incompatible request fails immediately instead of blocking —
//! a conflicting checkout is a programming-contract violation, not a
//! resource wait.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use num_traits::Num;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{CoreError, CoreResult};
use crate::reserve::MemoryReserve;
use crate::space::BlockSpace;

/// Read checkout of a tensor's block-major storage.
#[derive(Debug)]
pub struct BlockReadGuard<'a, T>(RwLockReadGuard<'a, Vec<T>>);

impl<T> Deref for BlockReadGuard<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

/// Exclusive write checkout of a tensor's block-major storage.
#[derive(Debug)]
pub struct BlockWriteGuard<'a, T>(RwLockWriteGuard<'a, Vec<T>>);

impl<T> Deref for BlockWriteGuard<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T> DerefMut for BlockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.0
    }
}

/// A block-sparse tensor over a [`BlockSpace`].
///
/// # Examples
///
/// ```
/// use blocten_core::{BlockSpace, BlockTensor, Subspace};
///
/// let space = BlockSpace::dense(vec![
///     Subspace::with_block_sizes(&[2, 2]).unwrap(),
///     Subspace::with_block_sizes(&[3]).unwrap(),
/// ]);
/// let t = BlockTensor::<f64>::zeros(space);
/// assert_eq!(t.nnz(), 12);
/// assert!(t.read().is_ok());
/// ```
#[derive(Debug)]
pub struct BlockTensor<T> {
    space: BlockSpace,
    data: RwLock<Vec<T>>,
    reserve: Option<Arc<MemoryReserve>>,
}

impl<T> BlockTensor<T>
where
    T: Copy + Num,
{
    /// Create a zero-filled tensor over `space`.
    pub fn zeros(space: BlockSpace) -> Self {
        let data = vec![T::zero(); space.nnz()];
        Self {
            space,
            data: RwLock::new(data),
            reserve: None,
        }
    }

    /// Create a tensor from existing block-major storage.
    ///
    /// `data` must hold exactly `space.nnz()` elements in canonical block
    /// enumeration order.
    pub fn from_blocks(space: BlockSpace, data: Vec<T>) -> CoreResult<Self> {
        if data.len() != space.nnz() {
            return Err(CoreError::StorageLengthMismatch {
                expected: space.nnz(),
                got: data.len(),
            });
        }
        Ok(Self {
            space,
            data: RwLock::new(data),
            reserve: None,
        })
    }

    /// Create a tensor by scattering a row-major dense buffer into blocks.
    ///
    /// Elements falling into absent blocks are dropped; they are
    /// structural zeros of the space.
    pub fn from_dense(space: BlockSpace, dense: &[T]) -> CoreResult<Self> {
        if dense.len() != space.dense_len() {
            return Err(CoreError::DenseLengthMismatch {
                expected: space.dense_len(),
                got: dense.len(),
            });
        }
        let strides = dense_strides(&space.dims());
        let mut data = vec![T::zero(); space.nnz()];
        for entry in space.entries() {
            let dims = space.block_dims(&entry.tuple);
            let offs = space.block_axis_offsets(&entry.tuple);
            let block = &mut data[entry.offset..entry.offset + entry.size];
            for_each_block_element(&dims, &offs, &strides, |block_linear, dense_linear| {
                block[block_linear] = dense[dense_linear];
            });
        }
        Ok(Self {
            space,
            data: RwLock::new(data),
            reserve: None,
        })
    }

    /// Gather the tensor back into a row-major dense buffer.
    ///
    /// Absent blocks read as zero. Fails if a write checkout is
    /// outstanding.
    pub fn to_dense(&self) -> CoreResult<Vec<T>> {
        let guard = self.read()?;
        let strides = dense_strides(&self.space.dims());
        let mut dense = vec![T::zero(); self.space.dense_len()];
        for entry in self.space.entries() {
            let dims = self.space.block_dims(&entry.tuple);
            let offs = self.space.block_axis_offsets(&entry.tuple);
            let block = &guard[entry.offset..entry.offset + entry.size];
            for_each_block_element(&dims, &offs, &strides, |block_linear, dense_linear| {
                dense[dense_linear] = block[block_linear];
            });
        }
        Ok(dense)
    }

    /// Compare stored elements with another tensor.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NnzMismatch`] if the tensors store different
    /// element counts, and a checkout error if either tensor has a write
    /// checkout outstanding.
    pub fn equals(&self, other: &BlockTensor<T>) -> CoreResult<bool>
    where
        T: PartialEq,
    {
        if self.nnz() != other.nnz() {
            return Err(CoreError::NnzMismatch {
                lhs: self.nnz(),
                rhs: other.nnz(),
            });
        }
        let a = self.read()?;
        let b = other.read()?;
        Ok(*a == *b)
    }
}

impl<T> BlockTensor<T> {
    /// The block space describing this tensor.
    pub fn space(&self) -> &BlockSpace {
        &self.space
    }

    /// Number of stored elements.
    pub fn nnz(&self) -> usize {
        self.space.nnz()
    }

    /// Bytes of element storage, as accounted against a memory reserve.
    pub fn size_bytes(&self) -> usize {
        self.space.nnz() * std::mem::size_of::<T>()
    }

    /// Take a read checkout.
    ///
    /// Any number of read checkouts may coexist. Fails immediately if a
    /// write checkout is outstanding.
    pub fn read(&self) -> CoreResult<BlockReadGuard<'_, T>> {
        self.data
            .try_read()
            .map(BlockReadGuard)
            .ok_or(CoreError::ReadCheckoutConflict)
    }

    /// Take an exclusive write checkout.
    ///
    /// Fails immediately if any checkout is outstanding.
    pub fn write(&self) -> CoreResult<BlockWriteGuard<'_, T>> {
        self.data
            .try_write()
            .map(BlockWriteGuard)
            .ok_or(CoreError::WriteCheckoutConflict)
    }

    /// Attach this tensor's footprint to a memory reserve.
    ///
    /// A previously attached reserve is released first. If the reserve
    /// cannot accommodate the footprint the error is returned and the
    /// tensor is left unattached; the caller may still proceed with an
    /// unbounded budget.
    pub fn attach_reserve(&mut self, reserve: &Arc<MemoryReserve>) -> CoreResult<()> {
        self.detach_reserve();
        reserve.add_tensor(self.size_bytes())?;
        self.reserve = Some(Arc::clone(reserve));
        Ok(())
    }

    /// Release this tensor's footprint from its reserve, if attached.
    pub fn detach_reserve(&mut self) {
        if let Some(reserve) = self.reserve.take() {
            reserve.remove_tensor(self.size_bytes());
        }
    }

    /// The reserve this tensor is attached to, if any.
    pub fn reserve(&self) -> Option<&Arc<MemoryReserve>> {
        self.reserve.as_ref()
    }
}

impl<T> Drop for BlockTensor<T> {
    fn drop(&mut self) {
        if let Some(reserve) = self.reserve.take() {
            reserve.remove_tensor(self.space.nnz() * std::mem::size_of::<T>());
        }
    }
}

/// Row-major element strides for the given extents.
pub fn dense_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; dims.len()];
    for ax in (0..dims.len().saturating_sub(1)).rev() {
        strides[ax] = strides[ax + 1] * dims[ax + 1];
    }
    strides
}

/// Visit every element of a block, pairing its block-linear position with
/// its position in a row-major dense buffer.
fn for_each_block_element(
    dims: &[usize],
    axis_offsets: &[usize],
    dense_strides: &[usize],
    mut f: impl FnMut(usize, usize),
) {
    let size: usize = dims.iter().product();
    let rank = dims.len();
    let mut idx = vec![0usize; rank];
    let mut dense: usize = axis_offsets
        .iter()
        .zip(dense_strides)
        .map(|(&o, &s)| o * s)
        .sum();
    for block_linear in 0..size {
        f(block_linear, dense);
        for ax in (0..rank).rev() {
            idx[ax] += 1;
            if idx[ax] < dims[ax] {
                dense += dense_strides[ax];
                break;
            }
            dense -= (dims[ax] - 1) * dense_strides[ax];
            idx[ax] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparsity::SparsityMap;
    use crate::space::SparseGroup;
    use crate::subspace::Subspace;

    fn space_2x2_blocks() -> BlockSpace {
        BlockSpace::dense(vec![
            Subspace::with_block_sizes(&[1, 2]).unwrap(),
            Subspace::with_block_sizes(&[2, 1]).unwrap(),
        ])
    }

    #[test]
    fn test_dense_roundtrip() {
        let space = space_2x2_blocks();
        let dense: Vec<f64> = (0..9).map(|x| x as f64).collect();
        let t = BlockTensor::from_dense(space, &dense).unwrap();
        assert_eq!(t.to_dense().unwrap(), dense);
    }

    #[test]
    fn test_block_major_layout() {
        // 3x3 elements in blocks [1,2]x[2,1]; row-major input:
        //   0 1 2
        //   3 4 5
        //   6 7 8
        let space = space_2x2_blocks();
        let dense: Vec<f64> = (0..9).map(|x| x as f64).collect();
        let t = BlockTensor::from_dense(space, &dense).unwrap();
        let guard = t.read().unwrap();
        // Blocks in canonical order: (0,0)=[0,1], (0,1)=[2], (1,0)=[3,4,6,7], (1,1)=[5,8]
        assert_eq!(
            &guard[..],
            &[0.0, 1.0, 2.0, 3.0, 4.0, 6.0, 7.0, 5.0, 8.0]
        );
    }

    #[test]
    fn test_sparse_roundtrip_zeroes_absent_blocks() {
        let map = SparsityMap::new(2, vec![vec![0, 0], vec![1, 1]]).unwrap();
        let space = BlockSpace::new(
            vec![
                Subspace::with_block_sizes(&[1, 2]).unwrap(),
                Subspace::with_block_sizes(&[2, 1]).unwrap(),
            ],
            vec![SparseGroup::new(0, map)],
        )
        .unwrap();
        let dense: Vec<f64> = (1..=9).map(|x| x as f64).collect();
        let t = BlockTensor::from_dense(space, &dense).unwrap();
        let back = t.to_dense().unwrap();
        // Only blocks (0,0) and (1,1) survive.
        assert_eq!(back, vec![1.0, 2.0, 0.0, 0.0, 0.0, 6.0, 0.0, 0.0, 9.0]);
    }

    #[test]
    fn test_checkout_discipline() {
        let t = BlockTensor::<f64>::zeros(space_2x2_blocks());

        // Concurrent reads are fine.
        let r1 = t.read().unwrap();
        let r2 = t.read().unwrap();
        assert_eq!(r1.len(), r2.len());

        // Write while reads are outstanding fails immediately.
        assert_eq!(t.write().unwrap_err(), CoreError::WriteCheckoutConflict);
        drop(r1);
        drop(r2);

        // Exclusive write blocks both flavors.
        let w = t.write().unwrap();
        assert_eq!(t.read().unwrap_err(), CoreError::ReadCheckoutConflict);
        assert_eq!(t.write().unwrap_err(), CoreError::WriteCheckoutConflict);
        drop(w);
        assert!(t.read().is_ok());
    }

    #[test]
    fn test_reserve_attach_detach() {
        let reserve = Arc::new(MemoryReserve::new(1024));
        let mut t = BlockTensor::<f64>::zeros(space_2x2_blocks());
        t.attach_reserve(&reserve).unwrap();
        assert_eq!(reserve.committed(), 9 * 8);
        drop(t);
        assert_eq!(reserve.committed(), 0);
    }

    #[test]
    fn test_reserve_attach_failure_leaves_unattached() {
        let reserve = Arc::new(MemoryReserve::new(8));
        let mut t = BlockTensor::<f64>::zeros(space_2x2_blocks());
        assert!(t.attach_reserve(&reserve).is_err());
        assert!(t.reserve().is_none());
        assert_eq!(reserve.committed(), 0);
    }

    #[test]
    fn test_equals() {
        let a = BlockTensor::from_dense(space_2x2_blocks(), &[1.0; 9]).unwrap();
        let b = BlockTensor::from_dense(space_2x2_blocks(), &[1.0; 9]).unwrap();
        let c = BlockTensor::from_dense(space_2x2_blocks(), &[2.0; 9]).unwrap();
        assert!(a.equals(&b).unwrap());
        assert!(!a.equals(&c).unwrap());

        let small = BlockTensor::<f64>::zeros(BlockSpace::dense(vec![
            Subspace::dense(2).unwrap(),
        ]));
        assert!(matches!(
            a.equals(&small),
            Err(CoreError::NnzMismatch { .. })
        ));
    }

    #[test]
    fn test_from_blocks_length_checked() {
        let err = BlockTensor::from_blocks(space_2x2_blocks(), vec![0.0; 5]).unwrap_err();
        assert!(matches!(err, CoreError::StorageLengthMismatch { .. }));
    }
}
