//! # blocten-batch
//!
//! Memory-bounded batching for the Blocten stack.
//!
//! When the working set of a contraction chain's direct intermediates
//! exceeds the available memory budget, this crate splits one loop axis
//! into sequential batches so that at most one batch's worth of each
//! intermediate is resident at a time:
//!
//! - **Memory reserve** ([`MemoryReserve`], re-exported from
//!   `blocten-core`) — the shared bytes ledger supplying the budget
//! - **Batch list builder** ([`BatchListBuilder`]) — greedy splitting of
//!   the batched axis's block domain against the budget
//! - **Batch provider** ([`BatchProvider`]) — strictly sequential batch
//!   execution with all-or-nothing result semantics
//! - **Direct evaluation** ([`contract_chain_batched`]) — a two-stage
//!   contraction chain whose intermediate is never fully materialized
//!
//! ## Quick Start
//!
//! ```
//! use blocten_batch::{BatchGroup, BatchListBuilder};
//! use blocten_core::{BlockSpace, Subspace};
//!
//! let space = BlockSpace::dense(vec![
//!     Subspace::with_block_sizes(&[2, 2, 2]).unwrap(),
//!     Subspace::with_block_sizes(&[4]).unwrap(),
//! ]);
//! let group = BatchGroup::new(vec![space], vec![0]).unwrap();
//! let builder = BatchListBuilder::new(vec![group]).unwrap();
//! assert_eq!(builder.batch_list(8), vec![(0, 1), (1, 2), (2, 3)]);
//! ```

#![deny(warnings)]

pub mod batch_list;
pub mod direct;
pub mod provider;

pub use batch_list::{BatchGroup, BatchListBuilder, IdxRange};
pub use blocten_core::MemoryReserve;
pub use direct::contract_chain_batched;
pub use provider::BatchProvider;
