//! # Blocten - Block-Sparse Tensor Contraction Stack
//!
//! Blocten computes contractions between multi-dimensional,
//! block-structured tensors whose blocks may be absent according to
//! per-axis sparsity maps, under a caller-supplied memory budget.
//!
//! This is the **meta crate** that re-exports all Blocten components for
//! convenient access.
//!
//! ## Components
//!
//! ### Block Space Model ([`core`])
//!
//! Subspaces with non-uniform block boundaries, sparsity maps, block
//! spaces, block-major tensor storage with a checkout discipline, and
//! the shared memory reserve.
//!
//! ```
//! use blocten::core::{BlockSpace, BlockTensor, Subspace};
//!
//! let space = BlockSpace::dense(vec![
//!     Subspace::with_block_sizes(&[2, 2]).unwrap(),
//!     Subspace::with_block_sizes(&[3]).unwrap(),
//! ]);
//! let tensor = BlockTensor::<f64>::zeros(space);
//! assert_eq!(tensor.nnz(), 12);
//! ```
//!
//! ### Index Connectivity Algebra ([`contract`])
//!
//! Contraction specifications: the connectivity table, loop fusion, node
//! weights and linear strides.
//!
//! ```
//! use blocten::contract::Contraction;
//!
//! let mut contr = Contraction::plain(1, 1, 1);
//! contr.contract(1, 0).unwrap();
//! assert_eq!(contr.node_count().unwrap(), 3);
//! ```
//!
//! ### Dense Kernels ([`kernels`])
//!
//! Rank-generic strided contraction and elementwise kernels; the block
//! kernel contract invoked by the runner.
//!
//! ### Loop Lists ([`loops`])
//!
//! Block loops, validated loop lists, the runner, and the block tensor
//! operations built on them.
//!
//! ```
//! use blocten::contract::Contraction;
//! use blocten::core::{BlockSpace, BlockTensor, Subspace};
//! use blocten::loops::ops;
//!
//! let mut contr = Contraction::plain(1, 1, 1);
//! contr.contract(1, 0).unwrap();
//!
//! let rows = Subspace::with_block_sizes(&[1, 2]).unwrap();
//! let inner = Subspace::with_block_sizes(&[2]).unwrap();
//! let cols = Subspace::with_block_sizes(&[2]).unwrap();
//! let a = BlockTensor::from_dense(
//!     BlockSpace::dense(vec![rows.clone(), inner.clone()]),
//!     &[1.0; 6],
//! )
//! .unwrap();
//! let b = BlockTensor::from_dense(BlockSpace::dense(vec![inner, cols.clone()]), &[1.0; 4])
//!     .unwrap();
//! let c = BlockTensor::<f64>::zeros(BlockSpace::dense(vec![rows, cols]));
//! ops::contract(&contr, &a, &b, &c).unwrap();
//! assert_eq!(c.to_dense().unwrap(), vec![2.0; 6]);
//! ```
//!
//! ### Memory-Bounded Batching ([`batch`])
//!
//! Batch list construction against a memory reserve and sequential batch
//! execution for direct (unmaterialized) intermediates.
//!
//! ## Features
//!
//! - `parallel` - rayon-based parallel elementwise kernels

#![deny(warnings)]

/// Block space model and block tensor storage (re-export of
/// `blocten-core`).
pub mod core {
    pub use blocten_core::*;
}

/// Index connectivity algebra (re-export of `blocten-contract`).
pub mod contract {
    pub use blocten_contract::*;
}

/// Dense strided kernels (re-export of `blocten-kernels`).
pub mod kernels {
    pub use blocten_kernels::*;
}

/// Block loops, loop lists, and operations (re-export of
/// `blocten-loops`).
pub mod loops {
    pub use blocten_loops::*;
}

/// Memory-bounded batching (re-export of `blocten-batch`).
pub mod batch {
    pub use blocten_batch::*;
}

/// Commonly used types, re-exported flat.
pub mod prelude {
    pub use blocten_batch::{
        contract_chain_batched, BatchGroup, BatchListBuilder, BatchProvider,
    };
    pub use blocten_contract::{Contraction, Permutation};
    pub use blocten_core::{
        BlockSpace, BlockTensor, MemoryReserve, SparseGroup, SparsityMap, Subspace,
    };
    pub use blocten_loops::ops::{add_into, contract, contract_scaled, mul_pointwise_into};
    pub use blocten_loops::{BlockLoop, LoopList};
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn test_prelude_pipeline() {
        // End to end through the prelude: sparse operand, contraction,
        // accumulation.
        let rows = Subspace::with_block_sizes(&[1, 1]).unwrap();
        let inner = Subspace::with_block_sizes(&[2, 2]).unwrap();
        let cols = Subspace::with_block_sizes(&[2]).unwrap();

        let map = SparsityMap::new(2, vec![vec![0, 0], vec![1, 1]]).unwrap();
        let space_a = BlockSpace::new(
            vec![rows.clone(), inner.clone()],
            vec![SparseGroup::new(0, map)],
        )
        .unwrap();

        let mut contr = Contraction::plain(1, 1, 1);
        contr.contract(1, 0).unwrap();

        let da: Vec<f64> = (1..=8).map(|x| x as f64).collect();
        let a = BlockTensor::from_dense(space_a, &da).unwrap();
        let b = BlockTensor::from_dense(
            BlockSpace::dense(vec![inner, cols.clone()]),
            &[1.0; 8],
        )
        .unwrap();
        let c = BlockTensor::<f64>::zeros(BlockSpace::dense(vec![rows, cols]));

        contract(&contr, &a, &b, &c).unwrap();
        // Row 0 sees only inner block 0 (values 1, 2); row 1 only inner
        // block 1 (values 7, 8).
        assert_eq!(c.to_dense().unwrap(), vec![3.0, 3.0, 15.0, 15.0]);
    }
}
