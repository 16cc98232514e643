//! Block tensor operations built on loop lists.
//!
//! These entry points compose the full pipeline: connectivity algebra →
//! loop-list construction → checkout → loop-list execution with a dense
//! kernel. Every fallible step runs before the result's write checkout is
//! taken, so a failed operation never leaves a partially written result
//! behind.

use std::ops::AddAssign;

use num_traits::Num;

use blocten_contract::Contraction;
use blocten_core::{BlockTensor, CoreError};
use blocten_kernels::{
    accumulate, contract_blocks, div_pointwise, mul_pointwise, row_major_strides, scale,
    BlockArg, BlockData, BlockKernel, KernelError, KernelResult, LoadKernel, StoreKernel,
    StridedLoop,
};

use crate::builder::{contraction_loops, tensor_loops};
use crate::error::{LoopError, LoopResult};

/// The contraction block kernel: for each block combination, instantiates
/// the fused loop program with the current block dims and runs the
/// strided contraction microkernel.
pub struct ContractKernel<T> {
    contr: Contraction,
    alpha: T,
}

impl<T> ContractKernel<T> {
    /// Create a contraction kernel computing `c += alpha * a * b`.
    pub fn new(contr: Contraction, alpha: T) -> Self {
        Self { contr, alpha }
    }
}

impl<T> BlockKernel<T> for ContractKernel<T>
where
    T: Copy + Num + AddAssign,
{
    fn apply(&mut self, args: &mut [BlockArg<'_, T>]) -> KernelResult<()> {
        if args.len() != 3 {
            return Err(KernelError::arg_count("contract", 3, args.len()));
        }
        let program: Vec<StridedLoop> = self
            .contr
            .fused_program(args[0].dims, args[1].dims)
            .map_err(|e| KernelError::operation_error("contract", e.to_string()))?
            .into_iter()
            .map(|l| StridedLoop {
                len: l.len,
                step_a: l.step_a,
                step_b: l.step_b,
                step_c: l.step_c,
            })
            .collect();

        let (ab, c) = args.split_at_mut(2);
        let a = ab[0].data.as_slice();
        let b = ab[1].data.as_slice();
        let c = c[0].data.as_mut_slice("contract", 2)?;
        contract_blocks(&program, a, b, c, self.alpha)
    }
}

/// Contract two block tensors: `c = sum(a * b)` over the contraction's
/// designated pairs.
///
/// The result tensor is zeroed and fully populated; operands are read
/// checkouts for the duration of the call.
pub fn contract<T>(
    contr: &Contraction,
    a: &BlockTensor<T>,
    b: &BlockTensor<T>,
    c: &BlockTensor<T>,
) -> LoopResult<()>
where
    T: Copy + Num + AddAssign,
{
    contract_scaled(contr, T::one(), a, b, c)
}

/// Contract two block tensors with a scalar factor:
/// `c = alpha * sum(a * b)`.
pub fn contract_scaled<T>(
    contr: &Contraction,
    alpha: T,
    a: &BlockTensor<T>,
    b: &BlockTensor<T>,
    c: &BlockTensor<T>,
) -> LoopResult<()>
where
    T: Copy + Num + AddAssign,
{
    // All validation happens before the write checkout of c.
    let mut list = contraction_loops(contr, a.space(), b.space(), c.space())?;
    let ra = a.read()?;
    let rb = b.read()?;
    let mut wc = c.write()?;

    wc.fill(T::zero());
    let mut kernel = ContractKernel::new(contr.clone(), alpha);
    let mut data = [
        BlockData::In(&ra[..]),
        BlockData::In(&rb[..]),
        BlockData::Out(&mut wc[..]),
    ];
    let outcome = list.run(&mut kernel, &mut data);
    if outcome.is_err() {
        // A mid-run failure is fatal to the whole contraction; never
        // leave a partially summed result observable.
        wc.fill(T::zero());
    }
    outcome
}

/// Accumulate one tensor into another: `c += alpha * a`.
///
/// Both tensors must share the same block space.
pub fn add_into<T>(c: &BlockTensor<T>, a: &BlockTensor<T>, alpha: T) -> LoopResult<()>
where
    T: Copy + Num + AddAssign,
{
    check_same_space(c, a, "add")?;
    let ra = a.read()?;
    let mut wc = c.write()?;
    accumulate(&mut wc[..], &ra[..], alpha)?;
    Ok(())
}

/// Pointwise product: `c = a .* b` over identical block spaces.
pub fn mul_pointwise_into<T>(
    c: &BlockTensor<T>,
    a: &BlockTensor<T>,
    b: &BlockTensor<T>,
) -> LoopResult<()>
where
    T: Copy + Num,
{
    check_same_space(c, a, "mul_pointwise")?;
    check_same_space(c, b, "mul_pointwise")?;
    let ra = a.read()?;
    let rb = b.read()?;
    let mut wc = c.write()?;
    mul_pointwise(&mut wc[..], &ra[..], &rb[..])?;
    Ok(())
}

/// Pointwise quotient: `c = a ./ b` over identical block spaces.
pub fn div_pointwise_into<T>(
    c: &BlockTensor<T>,
    a: &BlockTensor<T>,
    b: &BlockTensor<T>,
) -> LoopResult<()>
where
    T: Copy + Num,
{
    check_same_space(c, a, "div_pointwise")?;
    check_same_space(c, b, "div_pointwise")?;
    let ra = a.read()?;
    let rb = b.read()?;
    let mut wc = c.write()?;
    div_pointwise(&mut wc[..], &ra[..], &rb[..])?;
    Ok(())
}

/// Scale a tensor in place: `c *= alpha`.
pub fn scale_in_place<T>(c: &BlockTensor<T>, alpha: T) -> LoopResult<()>
where
    T: Copy + Num,
{
    let mut wc = c.write()?;
    scale(&mut wc[..], alpha);
    Ok(())
}

/// Scatter a row-major dense buffer into a block tensor through the
/// loop-list engine.
pub fn load_dense<T>(t: &BlockTensor<T>, dense: &[T]) -> LoopResult<()>
where
    T: Copy + Num,
{
    if dense.len() != t.space().dense_len() {
        return Err(CoreError::DenseLengthMismatch {
            expected: t.space().dense_len(),
            got: dense.len(),
        }
        .into());
    }
    let mut list = tensor_loops(t.space())?;
    let strides = row_major_strides(&t.space().dims());
    let mut kernel = LoadKernel::new(dense, strides);
    let mut wt = t.write()?;
    let mut data = [BlockData::Out(&mut wt[..])];
    list.run(&mut kernel, &mut data)
}

/// Gather a block tensor into a row-major dense buffer through the
/// loop-list engine; absent blocks read as zero.
pub fn store_dense<T>(t: &BlockTensor<T>) -> LoopResult<Vec<T>>
where
    T: Copy + Num,
{
    let mut list = tensor_loops(t.space())?;
    let strides = row_major_strides(&t.space().dims());
    let mut dense = vec![T::zero(); t.space().dense_len()];
    let rt = t.read()?;
    {
        let mut kernel = StoreKernel::new(&mut dense, strides);
        let mut data = [BlockData::In(&rt[..])];
        list.run(&mut kernel, &mut data)?;
    }
    Ok(dense)
}

fn check_same_space<T>(
    c: &BlockTensor<T>,
    other: &BlockTensor<T>,
    op: &str,
) -> LoopResult<()> {
    if c.space() != other.space() {
        return Err(LoopError::SpaceMismatch {
            context: format!("{}: operand spaces differ", op),
        });
    }
    Ok(())
}
