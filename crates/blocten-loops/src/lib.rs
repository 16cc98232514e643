//! # blocten-loops
//!
//! Block loops, loop lists, and the loop-list runner for the Blocten
//! stack.
//!
//! This crate materializes a symbolic contraction into iteration over
//! block-structured, possibly sparse tensors:
//!
//! - **Block loops** ([`BlockLoop`]) — one loop variable over one or more
//!   tensors' subspaces, with sparsity-aware enumeration and batching
//!   windows
//! - **Loop lists** ([`LoopList`]) — validated, complete iteration plans
//!   with a runner that invokes a block kernel per valid combination
//! - **Builders** ([`contraction_loops`], [`tensor_loops`]) — construct
//!   loop lists from a connectivity table and concrete block spaces,
//!   merging variables that fall inside sparse groups
//! - **Operations** ([`ops`]) — the full contraction pipeline plus
//!   add/scale/pointwise and dense load/store
//!
//! ## Quick Start
//!
//! ```
//! use blocten_contract::Contraction;
//! use blocten_core::{BlockSpace, BlockTensor, Subspace};
//! use blocten_loops::ops;
//!
//! // c_ik = sum_j a_ij b_jk over blocked axes.
//! let mut contr = Contraction::plain(1, 1, 1);
//! contr.contract(1, 0).unwrap();
//!
//! let rows = Subspace::with_block_sizes(&[2, 1]).unwrap();
//! let inner = Subspace::with_block_sizes(&[2, 2]).unwrap();
//! let cols = Subspace::with_block_sizes(&[3]).unwrap();
//!
//! let a = BlockTensor::from_dense(
//!     BlockSpace::dense(vec![rows.clone(), inner.clone()]),
//!     &[1.0; 12],
//! )
//! .unwrap();
//! let b = BlockTensor::from_dense(
//!     BlockSpace::dense(vec![inner, cols.clone()]),
//!     &[2.0; 12],
//! )
//! .unwrap();
//! let c = BlockTensor::<f64>::zeros(BlockSpace::dense(vec![rows, cols]));
//!
//! ops::contract(&contr, &a, &b, &c).unwrap();
//! assert_eq!(c.to_dense().unwrap(), vec![8.0; 9]);
//! ```

#![deny(warnings)]

pub mod block_loop;
pub mod builder;
pub mod error;
pub mod loop_list;
pub mod ops;


pub use block_loop::{BlockLoop, LoopBinding};
pub use builder::{contraction_loops, tensor_loops};
pub use error::{LoopError, LoopResult};
pub use loop_list::LoopList;
pub use ops::ContractKernel;
