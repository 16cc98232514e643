//! Batch list construction.
//!
//! Given groups of direct (not-yet-materialized) block spaces and an
//! element budget, [`BatchListBuilder`] chops the batched axis's block
//! domain into sequential ranges so that at most one batch's worth of
//! each group's intermediates is resident at a time.
//!
//! The budget is advisory for sizing, not a hard constraint: a block
//! index whose footprint alone exceeds the budget is still emitted as a
//! degenerate one-index batch rather than failing.

use anyhow::{anyhow, Result};
use blocten_core::BlockSpace;

/// A half-open range of block indices of the batched axis.
pub type IdxRange = (usize, usize);

/// One group of direct spaces that are resident together.
#[derive(Debug, Clone)]
pub struct BatchGroup {
    spaces: Vec<BlockSpace>,
    batched: Vec<usize>,
}

impl BatchGroup {
    /// Create a group from direct spaces and, per space, the subspace
    /// that is batched.
    ///
    /// # Errors
    ///
    /// Fails if the designations don't pair up with the spaces, a
    /// designated subspace is out of range, or the batched subspaces
    /// disagree on block count.
    pub fn new(spaces: Vec<BlockSpace>, batched: Vec<usize>) -> Result<Self> {
        if spaces.len() != batched.len() {
            return Err(anyhow!(
                "group has {} spaces but {} batched-subspace designations",
                spaces.len(),
                batched.len()
            ));
        }
        if spaces.is_empty() {
            return Err(anyhow!("a batch group needs at least one space"));
        }
        let mut domain = None;
        for (space, &sub) in spaces.iter().zip(&batched) {
            if sub >= space.order() {
                return Err(anyhow!(
                    "batched subspace {} out of range for space of order {}",
                    sub,
                    space.order()
                ));
            }
            let n = space.subspace(sub).n_blocks();
            match domain {
                None => domain = Some(n),
                Some(d) if d != n => {
                    return Err(anyhow!(
                        "batched subspaces disagree on block count: {} vs {}",
                        d,
                        n
                    ))
                }
                _ => {}
            }
        }
        Ok(Self { spaces, batched })
    }

    /// Number of block indices of the batched axis.
    pub fn domain(&self) -> usize {
        self.spaces[0].subspace(self.batched[0]).n_blocks()
    }

    /// The spaces in this group.
    pub fn spaces(&self) -> &[BlockSpace] {
        &self.spaces
    }

    /// Stored elements of each space, per batched block index.
    fn footprints(&self) -> Vec<Vec<usize>> {
        self.spaces
            .iter()
            .zip(&self.batched)
            .map(|(space, &sub)| {
                let mut per_index = vec![0usize; self.domain()];
                for entry in space.entries() {
                    per_index[entry.tuple[sub]] += entry.size;
                }
                per_index
            })
            .collect()
    }
}

/// Splits the batched block domain into memory-bounded ranges.
///
/// # Examples
///
/// ```
/// use blocten_batch::{BatchGroup, BatchListBuilder};
/// use blocten_core::{BlockSpace, Subspace};
///
/// // One direct intermediate: 4 row blocks of 6 elements each.
/// let space = BlockSpace::dense(vec![
///     Subspace::with_block_sizes(&[2, 2, 2, 2]).unwrap(),
///     Subspace::with_block_sizes(&[3]).unwrap(),
/// ]);
/// let group = BatchGroup::new(vec![space], vec![0]).unwrap();
/// let builder = BatchListBuilder::new(vec![group]).unwrap();
///
/// // Budget of 12 elements: two row blocks per batch.
/// assert_eq!(builder.batch_list(12), vec![(0, 2), (2, 4)]);
/// // A budget too small for even one block still yields batches.
/// assert_eq!(
///     builder.batch_list(1),
///     vec![(0, 1), (1, 2), (2, 3), (3, 4)]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct BatchListBuilder {
    domain: usize,
    /// Per group, per space, per block index: stored elements.
    footprints: Vec<Vec<Vec<usize>>>,
}

impl BatchListBuilder {
    /// Create a builder from the direct groups.
    ///
    /// # Errors
    ///
    /// Fails if no group is given or the groups disagree on the batched
    /// axis's block count.
    pub fn new(groups: Vec<BatchGroup>) -> Result<Self> {
        let domain = groups
            .first()
            .map(|g| g.domain())
            .ok_or_else(|| anyhow!("batch list needs at least one group"))?;
        for g in &groups {
            if g.domain() != domain {
                return Err(anyhow!(
                    "groups disagree on batched block count: {} vs {}",
                    domain,
                    g.domain()
                ));
            }
        }
        let footprints = groups.iter().map(|g| g.footprints()).collect();
        Ok(Self { domain, footprints })
    }

    /// Number of block indices of the batched axis.
    pub fn domain(&self) -> usize {
        self.domain
    }

    /// Greedily split the domain into ranges whose resident footprint
    /// stays within `available_elements` for every group.
    ///
    /// The returned ranges cover the full domain in order, without gaps
    /// or overlaps, and are never empty.
    pub fn batch_list(&self, available_elements: usize) -> Vec<IdxRange> {
        let group_sums: Vec<Vec<usize>> = self
            .footprints
            .iter()
            .map(|spaces| {
                (0..self.domain)
                    .map(|idx| spaces.iter().map(|f| f[idx]).sum())
                    .collect()
            })
            .collect();

        let mut list = Vec::new();
        let mut start = 0usize;
        let mut resident = vec![0usize; group_sums.len()];
        let mut idx = 0usize;
        while idx < self.domain {
            let fits = group_sums
                .iter()
                .zip(&resident)
                .all(|(sums, &r)| r + sums[idx] <= available_elements);
            if fits {
                for (g, sums) in group_sums.iter().enumerate() {
                    resident[g] += sums[idx];
                }
                idx += 1;
            } else if start == idx {
                // A single index over budget still becomes a batch.
                list.push((idx, idx + 1));
                idx += 1;
                start = idx;
                resident.iter_mut().for_each(|r| *r = 0);
            } else {
                list.push((start, idx));
                start = idx;
                resident.iter_mut().for_each(|r| *r = 0);
            }
        }
        if start < self.domain {
            list.push((start, self.domain));
        }
        list
    }

    /// Per group, per space: the element count of the largest batch.
    ///
    /// Used to preallocate buffers once for the worst-case batch rather
    /// than reallocating per batch.
    pub fn batch_array_sizes(&self, batch_list: &[IdxRange]) -> Vec<Vec<usize>> {
        self.footprints
            .iter()
            .map(|spaces| {
                spaces
                    .iter()
                    .map(|per_index| {
                        batch_list
                            .iter()
                            .map(|&(s, e)| per_index[s..e].iter().sum::<usize>())
                            .max()
                            .unwrap_or(0)
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocten_core::{SparseGroup, SparsityMap, Subspace};

    fn sub(sizes: &[usize]) -> Subspace {
        Subspace::with_block_sizes(sizes).unwrap()
    }

    fn row_space(row_blocks: &[usize], cols: usize) -> BlockSpace {
        BlockSpace::dense(vec![sub(row_blocks), sub(&[cols])])
    }

    #[test]
    fn test_batch_list_covers_domain() {
        let group =
            BatchGroup::new(vec![row_space(&[2, 2, 2, 2], 3)], vec![0]).unwrap();
        let builder = BatchListBuilder::new(vec![group]).unwrap();

        for budget in [1usize, 6, 12, 100] {
            let list = builder.batch_list(budget);
            assert_eq!(list.first().unwrap().0, 0);
            assert_eq!(list.last().unwrap().1, 4);
            for w in list.windows(2) {
                assert_eq!(w[0].1, w[1].0);
            }
            for &(s, e) in &list {
                assert!(s < e);
            }
        }
    }

    #[test]
    fn test_greedy_packing() {
        // Row footprints: 6, 6, 6, 6 elements.
        let group =
            BatchGroup::new(vec![row_space(&[2, 2, 2, 2], 3)], vec![0]).unwrap();
        let builder = BatchListBuilder::new(vec![group]).unwrap();

        assert_eq!(builder.batch_list(24), vec![(0, 4)]);
        assert_eq!(builder.batch_list(12), vec![(0, 2), (2, 4)]);
        assert_eq!(builder.batch_list(17), vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn test_degenerate_batch_on_tiny_budget() {
        // Scenario: a budget one element short of a full batch still
        // yields at least one nonempty batch and never fails.
        let group = BatchGroup::new(vec![row_space(&[2, 2], 3)], vec![0]).unwrap();
        let builder = BatchListBuilder::new(vec![group]).unwrap();

        let full: usize = 12;
        let list = builder.batch_list(full - 1);
        assert!(!list.is_empty());
        assert!(list.iter().all(|&(s, e)| s < e));

        // Even a zero budget produces (degenerate) batches.
        let list = builder.batch_list(0);
        assert_eq!(list, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_uneven_footprints() {
        // Row blocks of 1, 4, and 2 rows of 2 columns: 2, 8, 4 elements.
        let group =
            BatchGroup::new(vec![row_space(&[1, 4, 2], 2)], vec![0]).unwrap();
        let builder = BatchListBuilder::new(vec![group]).unwrap();

        assert_eq!(builder.batch_list(8), vec![(0, 1), (1, 2), (2, 3)]);
        assert_eq!(builder.batch_list(10), vec![(0, 2), (2, 3)]);
        assert_eq!(builder.batch_list(14), vec![(0, 3)]);
    }

    #[test]
    fn test_sparse_footprints_skip_absent_blocks() {
        // Only (0,0) and (2,1) exist: indices 0 and 2 carry elements,
        // index 1 is free.
        let map = SparsityMap::new(2, vec![vec![0, 0], vec![2, 1]]).unwrap();
        let space = BlockSpace::new(
            vec![sub(&[2, 2, 2]), sub(&[3, 3])],
            vec![SparseGroup::new(0, map)],
        )
        .unwrap();
        let group = BatchGroup::new(vec![space], vec![0]).unwrap();
        let builder = BatchListBuilder::new(vec![group]).unwrap();

        // Footprints: 6, 0, 6.
        assert_eq!(builder.batch_list(6), vec![(0, 2), (2, 3)]);
        assert_eq!(builder.batch_list(12), vec![(0, 3)]);
    }

    #[test]
    fn test_batch_array_sizes() {
        let group =
            BatchGroup::new(vec![row_space(&[1, 4, 2], 2)], vec![0]).unwrap();
        let builder = BatchListBuilder::new(vec![group]).unwrap();

        let list = builder.batch_list(10);
        assert_eq!(list, vec![(0, 2), (2, 3)]);
        let sizes = builder.batch_array_sizes(&list);
        assert_eq!(sizes, vec![vec![10]]);
    }

    #[test]
    fn test_two_groups_constrained_together() {
        // Group 0 footprints per index: 6 each; group 1: 2 each.
        let g0 = BatchGroup::new(vec![row_space(&[2, 2, 2], 3)], vec![0]).unwrap();
        let g1 = BatchGroup::new(vec![row_space(&[1, 1, 1], 2)], vec![0]).unwrap();
        let builder = BatchListBuilder::new(vec![g0, g1]).unwrap();

        // Group 0 is the binding constraint.
        assert_eq!(builder.batch_list(6), vec![(0, 1), (1, 2), (2, 3)]);
        assert_eq!(builder.batch_list(12), vec![(0, 2), (2, 3)]);
    }

    #[test]
    fn test_group_validation() {
        assert!(BatchGroup::new(vec![], vec![]).is_err());
        assert!(BatchGroup::new(vec![row_space(&[2], 3)], vec![5]).is_err());
        assert!(BatchGroup::new(
            vec![row_space(&[2, 2], 3), row_space(&[2, 2, 2], 3)],
            vec![0, 0]
        )
        .is_err());
        assert!(BatchListBuilder::new(vec![]).is_err());
    }
}
