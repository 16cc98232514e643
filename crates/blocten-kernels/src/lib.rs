//! # blocten-kernels
//!
//! Dense numeric kernels for the Blocten stack.
//!
//! This crate is the only place element values are read or written. It
//! provides:
//!
//! - **Strided kernels** — a rank-generic contraction microkernel
//!   ([`contract_blocks`]) driven by a fused loop program, plus strided
//!   and contiguous elementwise kernels (accumulate, scale, pointwise
//!   multiply/divide)
//! - **Block kernels** — the [`BlockKernel`] trait the loop-list runner
//!   invokes per valid block combination, with load/store/fill
//!   implementations
//!
//! Kernels are parameterized by rank and operation rather than
//! specialized per index shape: the caller supplies base slices, strides,
//! and extents, and the kernels run plain loop nests over them.
//!
//! ## Features
//!
//! - `parallel` - rayon-based parallel elementwise kernels with serial
//!   semantics

#![deny(warnings)]

pub mod block;
pub mod error;
pub mod strided;
pub mod utils;

pub use block::{BlockArg, BlockData, BlockKernel, FillKernel, LoadKernel, StoreKernel};
pub use error::{KernelError, KernelResult};
#[cfg(feature = "parallel")]
pub use strided::accumulate_parallel;
pub use strided::{
    accumulate, contract_blocks, div_pointwise, mul_pointwise, scale, StridedLoop,
};
pub use utils::{for_each_dense_position, row_major_strides};
