//! Integration tests for blocten-batch
//!
//! These tests verify the batch-list properties end to end: full
//! coverage of the batched domain, exact agreement between batched and
//! unbatched execution, and reserve-driven budgets.

use blocten_batch::{
    contract_chain_batched, BatchGroup, BatchListBuilder, MemoryReserve,
};
use blocten_contract::Contraction;
use blocten_core::{BlockSpace, BlockTensor, SparseGroup, SparsityMap, Subspace};
use blocten_loops::ops;
use proptest::prelude::*;

fn sub(sizes: &[usize]) -> Subspace {
    Subspace::with_block_sizes(sizes).unwrap()
}

#[test]
fn test_reserve_budget_shrinks_with_attached_tensors() {
    let reserve = std::sync::Arc::new(MemoryReserve::new(1024));
    let space = BlockSpace::dense(vec![sub(&[4, 4]), sub(&[8])]);
    let mut held = BlockTensor::<f64>::zeros(space);
    held.attach_reserve(&reserve).unwrap();

    // 64 elements of f64 committed; 512 bytes remain.
    assert_eq!(reserve.mem_avail(), 1024 - 64 * 8);
}

#[test]
fn test_chain_with_sparse_operand() {
    // Operand a carries a sparse group over its own axes; the batched
    // axis of the intermediate (the mid axis) stays dense, and batching
    // must agree with the unbatched run.
    let rows = sub(&[1, 1, 1]);
    let inner = sub(&[2, 2]);
    let mid = sub(&[2, 2]);
    let cols = sub(&[3]);

    let map = SparsityMap::new(2, vec![vec![0, 0], vec![1, 1], vec![2, 0]]).unwrap();
    let space_a = BlockSpace::new(
        vec![rows.clone(), inner.clone()],
        vec![SparseGroup::new(0, map)],
    )
    .unwrap();
    let space_b = BlockSpace::dense(vec![inner, mid.clone()]);
    let space_t = BlockSpace::dense(vec![rows.clone(), mid.clone()]);
    let space_e = BlockSpace::dense(vec![mid, cols.clone()]);
    let space_d = BlockSpace::dense(vec![rows, cols]);

    let mut contr1 = Contraction::plain(1, 1, 1);
    contr1.contract(1, 0).unwrap();
    let mut contr2 = Contraction::plain(1, 1, 1);
    contr2.contract(1, 0).unwrap();

    let da: Vec<f64> = (0..space_a.dense_len()).map(|x| (x % 7) as f64).collect();
    let db: Vec<f64> = (0..space_b.dense_len()).map(|x| (x % 5) as f64).collect();
    let de: Vec<f64> = (0..space_e.dense_len()).map(|x| (x % 4) as f64).collect();
    let a = BlockTensor::from_dense(space_a, &da).unwrap();
    let b = BlockTensor::from_dense(space_b, &db).unwrap();
    let e = BlockTensor::from_dense(space_e, &de).unwrap();

    // Unbatched reference.
    let t = BlockTensor::<f64>::zeros(space_t.clone());
    let d_ref = BlockTensor::<f64>::zeros(space_d.clone());
    ops::contract(&contr1, &a, &b, &t).unwrap();
    ops::contract(&contr2, &t, &e, &d_ref).unwrap();

    let reserve = MemoryReserve::new(4 * std::mem::size_of::<f64>());
    let d = BlockTensor::<f64>::zeros(space_d);
    contract_chain_batched(
        &contr1,
        &a,
        &b,
        &space_t,
        1,
        &contr2,
        &e,
        &d,
        Some(&reserve),
    )
    .unwrap();
    assert_eq!(d.to_dense().unwrap(), d_ref.to_dense().unwrap());
}

proptest! {
    /// Batch lists cover the domain exactly, for any budget and any
    /// blocking.
    #[test]
    fn prop_batch_list_partitions_domain(
        seed in any::<u64>(),
        budget in 0usize..200,
    ) {
        let mut x = seed;
        let mut next = move || {
            x = x
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (x >> 59) as usize
        };
        let n_blocks = next() % 5 + 1;
        let row_sizes: Vec<usize> = (0..n_blocks).map(|_| next() % 4 + 1).collect();
        let cols = next() % 6 + 1;

        let space = BlockSpace::dense(vec![sub(&row_sizes), sub(&[cols])]);
        let group = BatchGroup::new(vec![space], vec![0]).unwrap();
        let builder = BatchListBuilder::new(vec![group]).unwrap();

        let list = builder.batch_list(budget);
        prop_assert!(!list.is_empty());
        prop_assert_eq!(list[0].0, 0);
        prop_assert_eq!(list[list.len() - 1].1, n_blocks);
        for w in list.windows(2) {
            prop_assert_eq!(w[0].1, w[1].0);
        }
        for &(s, e) in &list {
            prop_assert!(s < e);
        }

        // Worst-case sizes bound every batch.
        let sizes = builder.batch_array_sizes(&list);
        for &(s, e) in &list {
            let footprint: usize =
                (s..e).map(|b| row_sizes[b] * cols).sum();
            prop_assert!(footprint <= sizes[0][0]);
        }
    }
}
