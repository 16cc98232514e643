//! Loop lists: a complete iteration plan over block-structured tensors.
//!
//! A [`LoopList`] is an ordered sequence of [`BlockLoop`]s together with
//! the [`BlockSpace`]s they iterate over. Construction checks the
//! coverage invariant — every subspace of every participating space is
//! driven by exactly one loop — and the sparse-binding invariants.
//!
//! [`LoopList::run`] enumerates the full outer product of block indices
//! in loop order (outermost first), skips combinations excluded by
//! sparsity, and invokes a [`BlockKernel`] once per valid combination
//! with per-tensor block slices, axis offsets, and extents. This is the
//! only place numeric kernels are reached from.

use blocten_core::{BlockIndex, BlockSpace, Shape};
use blocten_kernels::{BlockArg, BlockData, BlockKernel};
use smallvec::smallvec;

use crate::block_loop::BlockLoop;
use crate::error::{LoopError, LoopResult};

/// An ordered sequence of block loops over a set of block spaces.
pub struct LoopList {
    loops: Vec<BlockLoop>,
    spaces: Vec<BlockSpace>,
}

impl LoopList {
    /// Create a loop list, validating the coverage invariant.
    ///
    /// # Errors
    ///
    /// Fails if the list is empty, a loop binds nothing, a binding is out
    /// of range or disagrees with its tensor's blocking, a subspace is
    /// covered zero or two times, a dense loop binds a grouped subspace,
    /// or a sparse loop covers a group only partially or enumerates
    /// tuples absent from a tensor's map.
    pub fn new(loops: Vec<BlockLoop>, spaces: Vec<BlockSpace>) -> LoopResult<Self> {
        if loops.is_empty() {
            return Err(LoopError::EmptyList);
        }

        let mut covered: Vec<Vec<usize>> = spaces
            .iter()
            .map(|s| Vec::with_capacity(s.order()))
            .collect();

        for (loop_idx, lp) in loops.iter().enumerate() {
            if lp.bindings().is_empty() {
                return Err(LoopError::EmptyLoop { loop_idx });
            }
            for b in lp.bindings() {
                if b.tensor >= spaces.len() {
                    return Err(LoopError::TensorOutOfRange {
                        tensor: b.tensor,
                        n_tensors: spaces.len(),
                    });
                }
                let space = &spaces[b.tensor];
                if b.subspace >= space.order() {
                    return Err(LoopError::SubspaceOutOfRange {
                        tensor: b.tensor,
                        subspace: b.subspace,
                        order: space.order(),
                    });
                }
                if !space.subspace(b.subspace).same_blocking(b.blocking()) {
                    return Err(LoopError::BlockingMismatch {
                        tensor: b.tensor,
                        subspace: b.subspace,
                    });
                }
                if covered[b.tensor].contains(&b.subspace) {
                    return Err(LoopError::DoubleCoverage {
                        tensor: b.tensor,
                        subspace: b.subspace,
                    });
                }
                covered[b.tensor].push(b.subspace);
            }
            Self::check_group_bindings(lp, &spaces)?;
        }

        for (tensor, space) in spaces.iter().enumerate() {
            for subspace in 0..space.order() {
                if !covered[tensor].contains(&subspace) {
                    return Err(LoopError::CoverageGap { tensor, subspace });
                }
            }
        }

        Ok(Self { loops, spaces })
    }

    /// Per-tensor sparse-binding invariants for one loop.
    fn check_group_bindings(lp: &BlockLoop, spaces: &[BlockSpace]) -> LoopResult<()> {
        for tensor in 0..spaces.len() {
            if !lp.binds_tensor(tensor) {
                continue;
            }
            let space = &spaces[tensor];
            let grouped: Vec<usize> = lp
                .bindings_for(tensor)
                .map(|b| b.subspace)
                .filter(|&s| space.is_grouped(s))
                .collect();
            if grouped.is_empty() {
                continue;
            }

            if !lp.is_sparse() {
                return Err(LoopError::MixedBinding {
                    tensor,
                    subspace: grouped[0],
                });
            }

            // Every touched group must be covered whole.
            let mut groups: Vec<usize> = grouped
                .iter()
                .map(|&s| {
                    space
                        .group_containing(s)
                        .unwrap_or_else(|| unreachable!("filtered on is_grouped"))
                })
                .collect();
            groups.sort_unstable();
            groups.dedup();
            let shifted = lp.bindings_for(tensor).any(|b| b.shift != 0);

            for &group in &groups {
                let grp = space.group(group);
                for s in grp.offset()..grp.offset() + grp.order() {
                    if !grouped.contains(&s) {
                        return Err(LoopError::PartialGroup { tensor, group });
                    }
                }

                // With unshifted bindings the loop's enumeration must
                // stay inside the tensor's map. Shifted (batch-local)
                // bindings are screened by the runner's presence check
                // instead.
                if shifted {
                    continue;
                }
                let comp_of: Vec<usize> = (grp.offset()..grp.offset() + grp.order())
                    .map(|s| {
                        lp.bindings_for(tensor)
                            .find(|b| b.subspace == s)
                            .map(|b| b.component)
                            .unwrap_or_else(|| unreachable!("group coverage checked above"))
                    })
                    .collect();
                if let Some(map) = lp.map() {
                    for tuple in map.iter() {
                        let proj: Vec<usize> = comp_of.iter().map(|&c| tuple[c]).collect();
                        if !grp.map().contains(&proj) {
                            return Err(LoopError::EnumerationOutsideMap {
                                tensor,
                                group,
                                tuple: proj,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Number of loops.
    pub fn n_loops(&self) -> usize {
        self.loops.len()
    }

    /// The loops in nesting order.
    pub fn loops(&self) -> &[BlockLoop] {
        &self.loops
    }

    /// Mutable access to the loops, for batching windows.
    pub fn loops_mut(&mut self) -> &mut [BlockLoop] {
        &mut self.loops
    }

    /// The participating block spaces, in tensor order.
    pub fn spaces(&self) -> &[BlockSpace] {
        &self.spaces
    }

    /// Number of participating tensors.
    pub fn n_tensors(&self) -> usize {
        self.spaces.len()
    }

    /// Indices of loops driving any subspace of `tensor`.
    pub fn loops_touching(&self, tensor: usize) -> LoopResult<Vec<usize>> {
        if tensor >= self.spaces.len() {
            return Err(LoopError::TensorOutOfRange {
                tensor,
                n_tensors: self.spaces.len(),
            });
        }
        Ok((0..self.loops.len())
            .filter(|&i| self.loops[i].binds_tensor(tensor))
            .collect())
    }

    /// Indices of loops driving any subspace inside group `group` of
    /// `tensor`.
    ///
    /// The batching layer restricts these loops together when the group
    /// is batched.
    pub fn loops_touching_group(&self, tensor: usize, group: usize) -> LoopResult<Vec<usize>> {
        let touching = self.loops_touching(tensor)?;
        let space = &self.spaces[tensor];
        if group >= space.n_groups() {
            return Err(LoopError::GroupOutOfRange {
                tensor,
                group,
                n_groups: space.n_groups(),
            });
        }
        let grp = space.group(group);
        Ok(touching
            .into_iter()
            .filter(|&i| {
                self.loops[i]
                    .bindings_for(tensor)
                    .any(|b| grp.covers(b.subspace))
            })
            .collect())
    }

    /// Enumerate every valid block-index combination, invoking `f` with
    /// the per-tensor block tuples.
    ///
    /// Combinations a sparse loop never produces are skipped; presence of
    /// the tuples in each tensor's space is not checked here.
    pub fn for_each_combination<F>(&mut self, mut f: F) -> LoopResult<()>
    where
        F: FnMut(&[BlockIndex]) -> LoopResult<()>,
    {
        let mut tuples: Vec<BlockIndex> = self
            .spaces
            .iter()
            .map(|s| smallvec![0usize; s.order()])
            .collect();
        drive(&mut self.loops, &mut tuples, &mut |t| f(t))
    }

    /// Run `kernel` over every valid block combination.
    ///
    /// `data` carries one buffer per tensor, in space order; lengths must
    /// match each space's stored-element count. Combinations where any
    /// tensor's block is structurally absent are skipped.
    pub fn run<T, K>(&mut self, kernel: &mut K, data: &mut [BlockData<'_, T>]) -> LoopResult<()>
    where
        K: BlockKernel<T>,
    {
        self.run_filtered(kernel, data, |_| true)
    }

    /// Run `kernel` over every valid block combination that passes
    /// `filter`.
    ///
    /// The filter receives the per-tensor block tuples and acts as a
    /// further, orthogonal sparsity predicate — a degeneracy filter from
    /// a symmetry layer, for example. [`LoopList::run`] is this with an
    /// always-true filter.
    pub fn run_filtered<T, K, F>(
        &mut self,
        kernel: &mut K,
        data: &mut [BlockData<'_, T>],
        mut filter: F,
    ) -> LoopResult<()>
    where
        K: BlockKernel<T>,
        F: FnMut(&[BlockIndex]) -> bool,
    {
        if data.len() != self.spaces.len() {
            return Err(LoopError::DataCount {
                expected: self.spaces.len(),
                got: data.len(),
            });
        }
        for (tensor, (space, buf)) in self.spaces.iter().zip(data.iter()).enumerate() {
            if buf.as_slice().len() != space.nnz() {
                return Err(LoopError::DataLength {
                    tensor,
                    expected: space.nnz(),
                    got: buf.as_slice().len(),
                });
            }
        }

        let spaces = &self.spaces;
        let mut tuples: Vec<BlockIndex> = spaces
            .iter()
            .map(|s| smallvec![0usize; s.order()])
            .collect();
        drive(&mut self.loops, &mut tuples, &mut |tuples| {
            if !filter(tuples) {
                return Ok(());
            }
            invoke_kernel(spaces, tuples, kernel, data)
        })
    }
}

/// Nested enumeration in loop order, outermost first.
fn drive<F>(loops: &mut [BlockLoop], tuples: &mut [BlockIndex], f: &mut F) -> LoopResult<()>
where
    F: FnMut(&[BlockIndex]) -> LoopResult<()>,
{
    match loops.split_first_mut() {
        None => f(tuples),
        Some((head, rest)) => {
            head.reset();
            while !head.done() {
                for b in head.bindings() {
                    tuples[b.tensor][b.subspace] = head.value(b.component) + b.shift;
                }
                drive(rest, tuples, f)?;
                head.advance();
            }
            Ok(())
        }
    }
}

/// Invoke the kernel for one block combination, or skip it if any
/// tensor's block is absent.
fn invoke_kernel<T, K>(
    spaces: &[BlockSpace],
    tuples: &[BlockIndex],
    kernel: &mut K,
    data: &mut [BlockData<'_, T>],
) -> LoopResult<()>
where
    K: BlockKernel<T>,
{
    let mut entries = Vec::with_capacity(spaces.len());
    for (space, tuple) in spaces.iter().zip(tuples) {
        match space.block_entry(tuple) {
            Some(e) => entries.push(e),
            None => return Ok(()),
        }
    }

    let dims: Vec<Shape> = spaces
        .iter()
        .zip(tuples)
        .map(|(s, t)| s.block_dims(t))
        .collect();
    let offs: Vec<Shape> = spaces
        .iter()
        .zip(tuples)
        .map(|(s, t)| s.block_axis_offsets(t))
        .collect();

    let mut args: Vec<BlockArg<'_, T>> = Vec::with_capacity(spaces.len());
    for (i, buf) in data.iter_mut().enumerate() {
        let e = entries[i];
        let block = match buf {
            BlockData::In(s) => BlockData::In(&s[e.offset..e.offset + e.size]),
            BlockData::Out(s) => BlockData::Out(&mut s[e.offset..e.offset + e.size]),
        };
        args.push(BlockArg {
            data: block,
            axis_offsets: &offs[i],
            dims: &dims[i],
        });
    }
    kernel.apply(&mut args)?;
    Ok(())
}
