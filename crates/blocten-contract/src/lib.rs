//! # blocten-contract
//!
//! Index connectivity algebra for pairwise tensor contractions.
//!
//! Given a symbolic contraction — operand orders N+K and M+K, K contracted
//! index pairs, and an output permutation — this crate builds the
//! connectivity table mapping every axis slot to its partner, fuses
//! physically adjacent, stride-compatible axes into combined loop nodes,
//! and answers the queries the execution layers need: node weights, linear
//! strides per operand, and derived result dimensions.
//!
//! The table is dynamically sized and bounds-checked; operand orders are
//! plain runtime values.
//!
//! ## Quick Start
//!
//! ```
//! use blocten_contract::{Contraction, Permutation};
//!
//! // c_ik = sum_j a_ij * b_jk
//! let mut contr = Contraction::new(1, 1, 1, Permutation::identity(2)).unwrap();
//! contr.contract(1, 0).unwrap();
//!
//! let program = contr.fused_program(&[3, 4], &[4, 5]).unwrap();
//! assert_eq!(program.len(), 3);
//! ```

#![deny(warnings)]

pub mod connectivity;
pub mod error;
pub mod permutation;

#[cfg(test)]
mod property_tests;

pub use connectivity::{Contraction, LoopSpec};
pub use error::{ContractError, ContractResult, Operand};
pub use permutation::Permutation;
