//! Batched evaluation of direct intermediates.
//!
//! A *direct* tensor is described by a contraction but never fully
//! materialized. [`contract_chain_batched`] evaluates the two-stage
//! chain `d = contr2(t, e)` with `t = contr1(a, b)` direct: the batched
//! subspace of `t` is split into memory-bounded ranges, and for each
//! range only that batch of `t` is resident — computed into a
//! batch-local buffer, consumed by the second stage, and dropped.

use std::ops::AddAssign;

use anyhow::Result;
use num_traits::Num;

use blocten_contract::Contraction;
use blocten_core::{BlockSpace, BlockTensor, MemoryReserve};
use blocten_kernels::BlockData;
use blocten_loops::{
    builder::{contraction_loops, contraction_loops_batched},
    ContractKernel,
};

use crate::batch_list::{BatchGroup, BatchListBuilder};
use crate::provider::BatchProvider;

/// Evaluate `d = contr2(contr1(a, b), e)` without materializing the
/// full intermediate.
///
/// `space_t` describes the intermediate `t = contr1(a, b)`; it is the
/// first operand of `contr2`. `batch_subspace` names the subspace of
/// `t` that is split into batches; it must not lie inside a sparse
/// group. The memory budget comes from `reserve` (unbounded if absent):
/// each batch of `t` holds at most the reserve's available elements,
/// except that a single block over budget still forms a degenerate
/// batch.
///
/// Batched and unbatched execution produce identical results; the
/// result tensor `d` is fully populated with the sum of all batches'
/// contributions, or zeroed if any batch fails.
#[allow(clippy::too_many_arguments)]
pub fn contract_chain_batched<T>(
    contr1: &Contraction,
    a: &BlockTensor<T>,
    b: &BlockTensor<T>,
    space_t: &BlockSpace,
    batch_subspace: usize,
    contr2: &Contraction,
    e: &BlockTensor<T>,
    d: &BlockTensor<T>,
    reserve: Option<&MemoryReserve>,
) -> Result<()>
where
    T: Copy + Num + AddAssign,
{
    let elem = std::mem::size_of::<T>().max(1);
    let available_elements = match reserve {
        Some(r) => r.mem_avail() / elem,
        None => usize::MAX,
    };

    let group = BatchGroup::new(vec![space_t.clone()], vec![batch_subspace])?;
    let builder = BatchListBuilder::new(vec![group])?;
    let batch_list = builder.batch_list(available_elements);
    let sizes = builder.batch_array_sizes(&batch_list);

    // Validate both stages against the full spaces, plus the first
    // batch's windowed lists, before the result's write checkout: a bad
    // specification fails here, deterministically, with the result
    // untouched.
    contraction_loops(contr1, a.space(), b.space(), space_t)?;
    contraction_loops(contr2, space_t, e.space(), d.space())?;
    let (s0, e0) = batch_list[0];
    let probe = space_t.restrict(batch_subspace, s0, e0);
    contraction_loops_batched(contr1, a.space(), b.space(), &probe, 2, batch_subspace, s0)?;
    contraction_loops_batched(contr2, &probe, e.space(), d.space(), 0, batch_subspace, s0)?;

    let ra = a.read()?;
    let rb = b.read()?;
    let re = e.read()?;
    let mut wd = d.write()?;

    let mut provider = BatchProvider::new(batch_list);
    provider.get_batch(&mut wd[..], |result, (start, end)| {
        let t_space = space_t.restrict(batch_subspace, start, end);
        debug_assert!(t_space.nnz() <= sizes[0][0]);
        let mut t_buf = vec![T::zero(); t_space.nnz()];

        // Stage 1: materialize this batch of the intermediate.
        let mut list1 = contraction_loops_batched(
            contr1,
            a.space(),
            b.space(),
            &t_space,
            2,
            batch_subspace,
            start,
        )?;
        let mut kernel1 = ContractKernel::new(contr1.clone(), T::one());
        let mut data1 = [
            BlockData::In(&ra[..]),
            BlockData::In(&rb[..]),
            BlockData::Out(&mut t_buf[..]),
        ];
        list1.run(&mut kernel1, &mut data1)?;

        // Stage 2: fold the batch into the result.
        let mut list2 = contraction_loops_batched(
            contr2,
            &t_space,
            e.space(),
            d.space(),
            0,
            batch_subspace,
            start,
        )?;
        let mut kernel2 = ContractKernel::new(contr2.clone(), T::one());
        let mut data2 = [
            BlockData::In(&t_buf[..]),
            BlockData::In(&re[..]),
            BlockData::Out(result),
        ];
        list2.run(&mut kernel2, &mut data2)?;
        Ok(())
    })
}
