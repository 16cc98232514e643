//! The runner-facing block kernel contract.
//!
//! The loop-list runner invokes a [`BlockKernel`] once per valid block
//! combination, passing one [`BlockArg`] per participating tensor: the
//! block's element slice (read-only or writable), its per-axis element
//! offsets within the full tensor, and its per-axis extents. Kernels see
//! nothing of spaces or sparsity; they work on plain slices.

use crate::error::{KernelError, KernelResult};
use crate::utils::for_each_dense_position;

/// A block's element data, read-only or writable.
pub enum BlockData<'a, T> {
    /// Read-only block of an input tensor.
    In(&'a [T]),
    /// Writable block of an output tensor.
    Out(&'a mut [T]),
}

impl<'a, T> BlockData<'a, T> {
    /// The block's elements, regardless of writability.
    pub fn as_slice(&self) -> &[T] {
        match self {
            BlockData::In(s) => s,
            BlockData::Out(s) => s,
        }
    }

    /// The block's elements for writing.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::NotWritable`] for a read-only block.
    pub fn as_mut_slice(&mut self, operation: &str, argument: usize) -> KernelResult<&mut [T]> {
        match self {
            BlockData::In(_) => Err(KernelError::not_writable(operation, argument)),
            BlockData::Out(s) => Ok(s),
        }
    }
}

/// One tensor's view of the current block combination.
pub struct BlockArg<'a, T> {
    /// The block's elements in row-major order.
    pub data: BlockData<'a, T>,
    /// Per-axis element offsets of the block within the full tensor.
    pub axis_offsets: &'a [usize],
    /// Per-axis element extents of the block.
    pub dims: &'a [usize],
}

/// A computation invoked once per valid block combination.
pub trait BlockKernel<T> {
    /// Apply the kernel to the current block combination.
    ///
    /// Arguments arrive in the runner's tensor order.
    fn apply(&mut self, args: &mut [BlockArg<'_, T>]) -> KernelResult<()>;
}

/// Fills every writable block with a constant.
pub struct FillKernel<T> {
    value: T,
}

impl<T: Copy> FillKernel<T> {
    /// Create a fill kernel.
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Copy> BlockKernel<T> for FillKernel<T> {
    fn apply(&mut self, args: &mut [BlockArg<'_, T>]) -> KernelResult<()> {
        for (i, arg) in args.iter_mut().enumerate() {
            let dst = arg.data.as_mut_slice("fill", i)?;
            dst.fill(self.value);
        }
        Ok(())
    }
}

/// Scatters a row-major dense buffer into block-major storage, one block
/// per invocation.
///
/// Expects exactly one writable block argument per call.
pub struct LoadKernel<'s, T> {
    source: &'s [T],
    strides: Vec<usize>,
}

impl<'s, T: Copy> LoadKernel<'s, T> {
    /// Create a load kernel reading from `source` with the full tensor's
    /// row-major `strides`.
    pub fn new(source: &'s [T], strides: Vec<usize>) -> Self {
        Self { source, strides }
    }
}

impl<T: Copy> BlockKernel<T> for LoadKernel<'_, T> {
    fn apply(&mut self, args: &mut [BlockArg<'_, T>]) -> KernelResult<()> {
        if args.len() != 1 {
            return Err(KernelError::arg_count("load", 1, args.len()));
        }
        let arg = &mut args[0];
        let dims = arg.dims;
        let offs = arg.axis_offsets;
        let block = arg.data.as_mut_slice("load", 0)?;
        for_each_dense_position(dims, offs, &self.strides, |bl, dense| {
            block[bl] = self.source[dense];
        });
        Ok(())
    }
}

/// Gathers block-major storage back into a row-major dense buffer, one
/// block per invocation.
///
/// Expects exactly one read-only block argument per call.
pub struct StoreKernel<'s, T> {
    dest: &'s mut [T],
    strides: Vec<usize>,
}

impl<'s, T: Copy> StoreKernel<'s, T> {
    /// Create a store kernel writing into `dest` with the full tensor's
    /// row-major `strides`.
    pub fn new(dest: &'s mut [T], strides: Vec<usize>) -> Self {
        Self { dest, strides }
    }
}

impl<T: Copy> BlockKernel<T> for StoreKernel<'_, T> {
    fn apply(&mut self, args: &mut [BlockArg<'_, T>]) -> KernelResult<()> {
        if args.len() != 1 {
            return Err(KernelError::arg_count("store", 1, args.len()));
        }
        let arg = &args[0];
        let block = arg.data.as_slice();
        for_each_dense_position(arg.dims, arg.axis_offsets, &self.strides, |bl, dense| {
            self.dest[dense] = block[bl];
        });
        Ok(())
    }
}
