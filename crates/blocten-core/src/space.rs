//! Block spaces: the block structure of a whole tensor.
//!
//! A [`BlockSpace`] is an ordered sequence of [`Subspace`]s plus zero or
//! more sparse groups: contiguous runs of subspaces whose block-index
//! tuples are restricted by a [`SparsityMap`]. Ungrouped subspaces are
//! fully dense.
//!
//! The space also fixes the physical layout of any tensor built over it:
//! valid block tuples are enumerated in canonical order (row-major over
//! the axes, with each sparse group advancing through its map's
//! enumeration order), and each tuple is assigned a contiguous run of
//! elements in block-major storage. [`BlockSpace::block_entry`] resolves a
//! tuple to its flat offset and extent in O(1).

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::sparsity::SparsityMap;
use crate::subspace::Subspace;
use crate::types::{BlockIndex, Shape};

/// A contiguous run of subspaces governed by one sparsity map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseGroup {
    /// Index of the first subspace in the run.
    offset: usize,
    /// Allowed block-index tuples within the run.
    map: SparsityMap,
}

impl SparseGroup {
    /// Create a sparse group starting at subspace `offset`.
    pub fn new(offset: usize, map: SparsityMap) -> Self {
        Self { offset, map }
    }

    /// Index of the first subspace the group covers.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of subspaces the group covers.
    pub fn order(&self) -> usize {
        self.map.order()
    }

    /// The group's sparsity map.
    pub fn map(&self) -> &SparsityMap {
        &self.map
    }

    /// Whether the group covers subspace `sub`.
    pub fn covers(&self, sub: usize) -> bool {
        sub >= self.offset && sub < self.offset + self.order()
    }
}

/// One stored block: its tuple, flat element offset, and element count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    /// Per-axis block indices.
    pub tuple: BlockIndex,
    /// Offset of the block's first element in block-major storage.
    pub offset: usize,
    /// Number of elements in the block.
    pub size: usize,
}

/// Traversal plan: each axis run is either one dense subspace or a group.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Dense(usize),
    Group(usize),
}

/// The block structure of a whole tensor.
///
/// # Examples
///
/// ```
/// use blocten_core::{BlockSpace, SparseGroup, SparsityMap, Subspace};
///
/// // A dense 2-axis space: 10×8 elements in 3×2 blocks.
/// let space = BlockSpace::dense(vec![
///     Subspace::with_block_sizes(&[4, 3, 3]).unwrap(),
///     Subspace::with_block_sizes(&[5, 3]).unwrap(),
/// ]);
/// assert_eq!(space.n_block_tuples(), 6);
/// assert_eq!(space.nnz(), 80);
///
/// // The same axes with only 2 of the 6 block pairs present.
/// let map = SparsityMap::new(2, vec![vec![0, 0], vec![2, 1]]).unwrap();
/// let sparse = BlockSpace::new(space.subspaces().to_vec(), vec![SparseGroup::new(0, map)])
///     .unwrap();
/// assert_eq!(sparse.n_block_tuples(), 2);
/// assert_eq!(sparse.nnz(), 4 * 5 + 3 * 3);
/// ```
#[derive(Debug, Clone)]
pub struct BlockSpace {
    subspaces: Vec<Subspace>,
    groups: Vec<SparseGroup>,
    slots: Vec<Slot>,
    entries: Vec<BlockEntry>,
    index: HashMap<BlockIndex, usize>,
    nnz: usize,
}

impl PartialEq for BlockSpace {
    fn eq(&self, other: &Self) -> bool {
        // Layout is derived; structure alone decides equality.
        self.subspaces == other.subspaces && self.groups == other.groups
    }
}

impl Eq for BlockSpace {}

impl BlockSpace {
    /// Create a fully dense block space (no sparse groups).
    pub fn dense(subspaces: Vec<Subspace>) -> Self {
        // Cannot fail: no groups to validate.
        Self::new(subspaces, Vec::new()).unwrap_or_else(|_| unreachable!())
    }

    /// Create a block space with the given sparse groups.
    ///
    /// # Errors
    ///
    /// Returns an error if a group reaches past the last subspace, two
    /// groups overlap, or a map tuple indexes a block that does not exist
    /// in the corresponding subspace.
    pub fn new(subspaces: Vec<Subspace>, mut groups: Vec<SparseGroup>) -> CoreResult<Self> {
        let order = subspaces.len();
        groups.sort_by_key(|g| g.offset());

        let mut covered_until = 0usize;
        for g in &groups {
            if g.offset() + g.order() > order {
                return Err(CoreError::GroupOutOfRange {
                    offset: g.offset(),
                    order: g.order(),
                    space_order: order,
                });
            }
            if g.offset() < covered_until {
                return Err(CoreError::GroupOverlap {
                    subspace: g.offset(),
                });
            }
            covered_until = g.offset() + g.order();

            for tuple in g.map().iter() {
                for (c, &b) in tuple.iter().enumerate() {
                    let sub = g.offset() + c;
                    let n_blocks = subspaces[sub].n_blocks();
                    if b >= n_blocks {
                        return Err(CoreError::TupleOutOfBounds {
                            tuple: tuple.to_vec(),
                            component: c,
                            subspace: sub,
                            n_blocks,
                        });
                    }
                }
            }
        }

        let slots = Self::build_slots(order, &groups);
        let mut space = Self {
            subspaces,
            groups,
            slots,
            entries: Vec::new(),
            index: HashMap::new(),
            nnz: 0,
        };
        space.build_layout();
        Ok(space)
    }

    fn build_slots(order: usize, groups: &[SparseGroup]) -> Vec<Slot> {
        let mut slots = Vec::new();
        let mut sub = 0;
        let mut gi = 0;
        while sub < order {
            if gi < groups.len() && groups[gi].offset() == sub {
                slots.push(Slot::Group(gi));
                sub += groups[gi].order();
                gi += 1;
            } else {
                slots.push(Slot::Dense(sub));
                sub += 1;
            }
        }
        slots
    }

    /// Enumerate valid block tuples in canonical order and assign offsets.
    fn build_layout(&mut self) {
        let mut tuple = BlockIndex::new();
        let mut offset = 0usize;
        let mut entries = Vec::new();
        self.visit_slots(0, &mut tuple, &mut offset, &mut entries);
        self.index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.tuple.clone(), i))
            .collect();
        self.nnz = offset;
        self.entries = entries;
    }

    fn visit_slots(
        &self,
        slot: usize,
        tuple: &mut BlockIndex,
        offset: &mut usize,
        entries: &mut Vec<BlockEntry>,
    ) {
        if slot == self.slots.len() {
            let size: usize = tuple
                .iter()
                .enumerate()
                .map(|(axis, &b)| self.subspaces[axis].block_size(b))
                .product();
            entries.push(BlockEntry {
                tuple: tuple.clone(),
                offset: *offset,
                size,
            });
            *offset += size;
            return;
        }
        match self.slots[slot] {
            Slot::Dense(sub) => {
                for b in 0..self.subspaces[sub].n_blocks() {
                    tuple.push(b);
                    self.visit_slots(slot + 1, tuple, offset, entries);
                    tuple.pop();
                }
            }
            Slot::Group(gi) => {
                let before = tuple.len();
                for t in self.groups[gi].map().iter() {
                    tuple.extend_from_slice(t);
                    self.visit_slots(slot + 1, tuple, offset, entries);
                    tuple.truncate(before);
                }
            }
        }
    }

    /// Number of subspaces (tensor order).
    pub fn order(&self) -> usize {
        self.subspaces.len()
    }

    /// The subspace at axis position `i`.
    pub fn subspace(&self, i: usize) -> &Subspace {
        &self.subspaces[i]
    }

    /// All subspaces in axis order.
    pub fn subspaces(&self) -> &[Subspace] {
        &self.subspaces
    }

    /// Per-axis element extents.
    pub fn dims(&self) -> Shape {
        self.subspaces.iter().map(|s| s.dim()).collect()
    }

    /// Full dense element count of the space, ignoring sparsity.
    pub fn dense_len(&self) -> usize {
        self.subspaces.iter().map(|s| s.dim()).product()
    }

    /// Number of sparse groups.
    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    /// The sparse group at position `gi`.
    pub fn group(&self, gi: usize) -> &SparseGroup {
        &self.groups[gi]
    }

    /// The group covering subspace `sub`, if any.
    pub fn group_containing(&self, sub: usize) -> Option<usize> {
        self.groups.iter().position(|g| g.covers(sub))
    }

    /// Whether subspace `sub` belongs to a sparse group.
    pub fn is_grouped(&self, sub: usize) -> bool {
        self.group_containing(sub).is_some()
    }

    /// Total stored elements (sum of valid block volumes).
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    /// Number of valid block tuples.
    pub fn n_block_tuples(&self) -> usize {
        self.entries.len()
    }

    /// The `i`-th stored block in canonical enumeration order.
    pub fn entry(&self, i: usize) -> &BlockEntry {
        &self.entries[i]
    }

    /// Iterate over stored blocks in canonical enumeration order.
    pub fn entries(&self) -> impl Iterator<Item = &BlockEntry> {
        self.entries.iter()
    }

    /// Resolve a block tuple to its storage entry, or `None` if absent.
    pub fn block_entry(&self, tuple: &[usize]) -> Option<&BlockEntry> {
        self.index
            .get(&BlockIndex::from_slice(tuple))
            .map(|&i| &self.entries[i])
    }

    /// Per-axis element extents of the block at `tuple`.
    ///
    /// Valid for any in-range tuple, present or absent.
    pub fn block_dims(&self, tuple: &[usize]) -> Shape {
        tuple
            .iter()
            .enumerate()
            .map(|(axis, &b)| self.subspaces[axis].block_size(b))
            .collect()
    }

    /// Per-axis element offsets of the block at `tuple`.
    pub fn block_axis_offsets(&self, tuple: &[usize]) -> Shape {
        tuple
            .iter()
            .enumerate()
            .map(|(axis, &b)| self.subspaces[axis].block_offset(b))
            .collect()
    }

    /// Restrict subspace `sub` to the block-index range `[start, end)`.
    ///
    /// The result is the batch-local space: the restricted subspace keeps
    /// only the selected blocks (renumbered from zero), and any sparse
    /// group covering it keeps only the tuples whose component falls in
    /// the range, shifted accordingly. Used by the batching layer to size
    /// and address one batch of a direct tensor.
    ///
    /// # Panics
    ///
    /// Panics if `sub` is out of range or the block range is empty or out
    /// of bounds.
    pub fn restrict(&self, sub: usize, start: usize, end: usize) -> Self {
        assert!(sub < self.order(), "subspace {} out of range", sub);
        let n_blocks = self.subspaces[sub].n_blocks();
        assert!(start < end && end <= n_blocks, "bad block range");

        let mut subspaces = self.subspaces.clone();
        let sizes: Vec<usize> = (start..end)
            .map(|b| self.subspaces[sub].block_size(b))
            .collect();
        subspaces[sub] = Subspace::with_block_sizes(&sizes)
            .unwrap_or_else(|_| unreachable!("block sizes of a valid subspace are nonzero"));

        let groups = self
            .groups
            .iter()
            .map(|g| {
                if !g.covers(sub) {
                    return g.clone();
                }
                let c = sub - g.offset();
                let kept: Vec<Vec<usize>> = g
                    .map()
                    .iter()
                    .filter(|t| t[c] >= start && t[c] < end)
                    .map(|t| {
                        let mut t = t.to_vec();
                        t[c] -= start;
                        t
                    })
                    .collect();
                let map = SparsityMap::new(g.order(), kept)
                    .unwrap_or_else(|_| unreachable!("filtering preserves map validity"));
                SparseGroup::new(g.offset(), map)
            })
            .collect();

        Self::new(subspaces, groups)
            .unwrap_or_else(|_| unreachable!("restriction preserves space validity"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_axis_dense() -> BlockSpace {
        BlockSpace::dense(vec![
            Subspace::with_block_sizes(&[2, 3]).unwrap(),
            Subspace::with_block_sizes(&[1, 2]).unwrap(),
        ])
    }

    #[test]
    fn test_dense_layout() {
        let space = two_axis_dense();
        assert_eq!(space.n_block_tuples(), 4);
        assert_eq!(space.nnz(), 5 * 3);

        // Canonical order is row-major over block indices.
        let tuples: Vec<Vec<usize>> =
            space.entries().map(|e| e.tuple.to_vec()).collect();
        assert_eq!(
            tuples,
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]
        );

        // Offsets accumulate block volumes in that order.
        let e = space.block_entry(&[1, 0]).unwrap();
        assert_eq!(e.offset, 2 * 1 + 2 * 2);
        assert_eq!(e.size, 3 * 1);
    }

    #[test]
    fn test_sparse_layout_skips_absent_blocks() {
        let map = SparsityMap::new(2, vec![vec![0, 1], vec![1, 0]]).unwrap();
        let space = BlockSpace::new(
            vec![
                Subspace::with_block_sizes(&[2, 3]).unwrap(),
                Subspace::with_block_sizes(&[1, 2]).unwrap(),
            ],
            vec![SparseGroup::new(0, map)],
        )
        .unwrap();

        assert_eq!(space.n_block_tuples(), 2);
        assert_eq!(space.nnz(), 2 * 2 + 3 * 1);
        assert!(space.block_entry(&[0, 0]).is_none());
        assert_eq!(space.block_entry(&[0, 1]).unwrap().offset, 0);
        assert_eq!(space.block_entry(&[1, 0]).unwrap().offset, 4);
    }

    #[test]
    fn test_group_between_dense_axes() {
        // axis 0 dense, axes 1-2 grouped
        let map = SparsityMap::new(2, vec![vec![0, 0], vec![1, 1]]).unwrap();
        let space = BlockSpace::new(
            vec![
                Subspace::with_block_sizes(&[1, 1]).unwrap(),
                Subspace::with_block_sizes(&[2, 2]).unwrap(),
                Subspace::with_block_sizes(&[3, 3]).unwrap(),
            ],
            vec![SparseGroup::new(1, map)],
        )
        .unwrap();

        // 2 dense blocks × 2 map entries
        assert_eq!(space.n_block_tuples(), 4);
        let tuples: Vec<Vec<usize>> =
            space.entries().map(|e| e.tuple.to_vec()).collect();
        assert_eq!(
            tuples,
            vec![
                vec![0, 0, 0],
                vec![0, 1, 1],
                vec![1, 0, 0],
                vec![1, 1, 1]
            ]
        );
        assert_eq!(space.group_containing(2), Some(0));
        assert_eq!(space.group_containing(0), None);
    }

    #[test]
    fn test_group_validation() {
        let map = SparsityMap::new(2, vec![vec![0, 0]]).unwrap();
        // Reaches past the last subspace
        let err = BlockSpace::new(
            vec![Subspace::dense(4).unwrap()],
            vec![SparseGroup::new(0, map.clone())],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::GroupOutOfRange { .. }));

        // Overlapping groups
        let subs = vec![
            Subspace::with_block_sizes(&[1, 1]).unwrap(),
            Subspace::with_block_sizes(&[1, 1]).unwrap(),
            Subspace::with_block_sizes(&[1, 1]).unwrap(),
        ];
        let err = BlockSpace::new(
            subs.clone(),
            vec![
                SparseGroup::new(0, map.clone()),
                SparseGroup::new(1, map.clone()),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::GroupOverlap { .. }));

        // Tuple indexes a nonexistent block
        let bad = SparsityMap::new(2, vec![vec![0, 5]]).unwrap();
        let err = BlockSpace::new(subs, vec![SparseGroup::new(0, bad)]).unwrap_err();
        assert!(matches!(err, CoreError::TupleOutOfBounds { .. }));
    }

    #[test]
    fn test_block_dims_and_offsets() {
        let space = two_axis_dense();
        assert_eq!(&space.block_dims(&[1, 1])[..], &[3, 2]);
        assert_eq!(&space.block_axis_offsets(&[1, 1])[..], &[2, 1]);
    }

    #[test]
    fn test_space_equality_ignores_layout() {
        let a = two_axis_dense();
        let b = two_axis_dense();
        assert_eq!(a, b);
    }

    #[test]
    fn test_restrict_dense() {
        let space = two_axis_dense();
        let restricted = space.restrict(0, 1, 2);
        assert_eq!(restricted.subspace(0).n_blocks(), 1);
        assert_eq!(restricted.subspace(0).dim(), 3);
        assert_eq!(restricted.nnz(), 3 * 3);
        // Block indices renumber from zero.
        assert!(restricted.block_entry(&[0, 0]).is_some());
        assert!(restricted.block_entry(&[1, 0]).is_none());
    }

    #[test]
    fn test_restrict_filters_and_shifts_group() {
        let map =
            SparsityMap::new(2, vec![vec![0, 0], vec![1, 1], vec![2, 0]]).unwrap();
        let space = BlockSpace::new(
            vec![
                Subspace::with_block_sizes(&[1, 2, 3]).unwrap(),
                Subspace::with_block_sizes(&[2, 2]).unwrap(),
            ],
            vec![SparseGroup::new(0, map)],
        )
        .unwrap();

        let restricted = space.restrict(0, 1, 3);
        assert_eq!(restricted.subspace(0).n_blocks(), 2);
        // Tuples (1,1) and (2,0) survive, shifted to (0,1) and (1,0).
        assert_eq!(restricted.n_block_tuples(), 2);
        assert!(restricted.block_entry(&[0, 1]).is_some());
        assert!(restricted.block_entry(&[1, 0]).is_some());
        assert_eq!(restricted.nnz(), 2 * 2 + 3 * 2);
    }
}
