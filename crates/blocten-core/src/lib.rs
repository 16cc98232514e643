//! # blocten-core
//!
//! Block space model and block tensor storage for the Blocten stack.
//!
//! This crate provides the foundational building blocks for block-sparse
//! tensor computing:
//!
//! - **Subspaces** ([`Subspace`]) — non-uniform block boundaries for one axis
//! - **Sparsity maps** ([`SparsityMap`]) — ordered sets of allowed
//!   block-index tuples with a first-class enumeration order
//! - **Block spaces** ([`BlockSpace`]) — per-tensor axis sequences with
//!   sparse groups and a precomputed block-major layout
//! - **Block tensors** ([`BlockTensor`]) — flat block-major storage with a
//!   non-blocking read/write checkout discipline
//! - **Memory reserve** ([`MemoryReserve`]) — a shared bytes ledger that
//!   parameterizes memory-bounded execution
//!
//! ## Memory Layout
//!
//! Tensors store their present blocks back to back, each block row-major
//! internally, in the canonical enumeration order fixed by the space.
//! Absent blocks occupy no storage and read as structural zeros.
//!
//! ## Quick Start
//!
//! ```
//! use blocten_core::{BlockSpace, BlockTensor, Subspace};
//!
//! let space = BlockSpace::dense(vec![
//!     Subspace::with_block_sizes(&[2, 2]).unwrap(),
//!     Subspace::with_block_sizes(&[3, 1]).unwrap(),
//! ]);
//! let tensor = BlockTensor::<f64>::zeros(space);
//! assert_eq!(tensor.nnz(), 16);
//! ```

#![deny(warnings)]

pub mod error;
pub mod reserve;
pub mod space;
pub mod sparsity;
pub mod subspace;
pub mod tensor;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use reserve::MemoryReserve;
pub use space::{BlockEntry, BlockSpace, SparseGroup};
pub use sparsity::SparsityMap;
pub use subspace::Subspace;
pub use tensor::{dense_strides, BlockReadGuard, BlockTensor, BlockWriteGuard};
pub use types::{block_index_from, shape_from, Axis, BlockIndex, Rank, Shape};
