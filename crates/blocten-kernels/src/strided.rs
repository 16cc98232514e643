//! Strided dense kernels.
//!
//! These kernels are the only code that touches tensor element values.
//! They are rank-generic: a loop program — one [`StridedLoop`] per fused
//! loop level — replaces per-shape specializations. The caller (the
//! loop-list runner) supplies correct base slices, strides, and extents;
//! the kernels validate buffer coverage and run plain loop nests.

use num_traits::Num;
use std::ops::AddAssign;

use crate::error::{KernelError, KernelResult};

/// One level of a strided contraction loop nest.
///
/// A step of zero means the loop variable does not move through that
/// array: contracted loops carry `step_c == 0`, and a result loop steps
/// exactly one operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StridedLoop {
    /// Number of iterations.
    pub len: usize,
    /// Element stride in operand a.
    pub step_a: usize,
    /// Element stride in operand b.
    pub step_b: usize,
    /// Element stride in the result c.
    pub step_c: usize,
}

/// Elements a loop program reaches in one array, given a step selector.
fn required_len(program: &[StridedLoop], step: impl Fn(&StridedLoop) -> usize) -> usize {
    if program.iter().any(|l| l.len == 0) {
        return 0;
    }
    program.iter().map(|l| (l.len - 1) * step(l)).sum::<usize>() + 1
}

/// Generalized contraction over a fused loop program:
/// `c += alpha * sum(a * b)` with the summation structure encoded in the
/// program's zero strides.
///
/// # Errors
///
/// Returns [`KernelError::StrideOverrun`] if the program would step past
/// the end of any buffer.
///
/// # Examples
///
/// ```
/// use blocten_kernels::{contract_blocks, StridedLoop};
///
/// // 2x3 times 3x2 matrix product as a three-loop program.
/// let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
/// let b = [1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
/// let mut c = [0.0; 4];
/// let program = [
///     StridedLoop { len: 2, step_a: 3, step_b: 0, step_c: 2 },
///     StridedLoop { len: 2, step_a: 0, step_b: 1, step_c: 1 },
///     StridedLoop { len: 3, step_a: 1, step_b: 2, step_c: 0 },
/// ];
/// contract_blocks(&program, &a, &b, &mut c, 1.0).unwrap();
/// assert_eq!(c, [4.0, 5.0, 10.0, 11.0]);
/// ```
pub fn contract_blocks<T>(
    program: &[StridedLoop],
    a: &[T],
    b: &[T],
    c: &mut [T],
    alpha: T,
) -> KernelResult<()>
where
    T: Copy + Num + AddAssign,
{
    let need_a = required_len(program, |l| l.step_a);
    let need_b = required_len(program, |l| l.step_b);
    let need_c = required_len(program, |l| l.step_c);
    if need_a > a.len() {
        return Err(KernelError::stride_overrun(
            "contract_blocks",
            "a",
            need_a,
            a.len(),
        ));
    }
    if need_b > b.len() {
        return Err(KernelError::stride_overrun(
            "contract_blocks",
            "b",
            need_b,
            b.len(),
        ));
    }
    if need_c > c.len() {
        return Err(KernelError::stride_overrun(
            "contract_blocks",
            "c",
            need_c,
            c.len(),
        ));
    }
    if need_a == 0 || need_b == 0 || need_c == 0 {
        return Ok(());
    }
    contract_rec(program, a, b, c, alpha, 0, 0, 0);
    Ok(())
}

fn contract_rec<T>(
    program: &[StridedLoop],
    a: &[T],
    b: &[T],
    c: &mut [T],
    alpha: T,
    ia: usize,
    ib: usize,
    ic: usize,
) where
    T: Copy + Num + AddAssign,
{
    match program.split_first() {
        None => c[ic] += alpha * a[ia] * b[ib],
        Some((level, rest)) => {
            let (mut ia, mut ib, mut ic) = (ia, ib, ic);
            for _ in 0..level.len {
                contract_rec(rest, a, b, c, alpha, ia, ib, ic);
                ia += level.step_a;
                ib += level.step_b;
                ic += level.step_c;
            }
        }
    }
}

/// `dst += alpha * src` over equal-length contiguous buffers.
pub fn accumulate<T>(dst: &mut [T], src: &[T], alpha: T) -> KernelResult<()>
where
    T: Copy + Num + AddAssign,
{
    if dst.len() != src.len() {
        return Err(KernelError::length_mismatch(
            "accumulate",
            dst.len(),
            src.len(),
        ));
    }
    for (d, &s) in dst.iter_mut().zip(src) {
        *d += alpha * s;
    }
    Ok(())
}

/// `dst *= alpha` in place.
pub fn scale<T>(dst: &mut [T], alpha: T)
where
    T: Copy + Num,
{
    for d in dst.iter_mut() {
        *d = *d * alpha;
    }
}

/// `dst = a .* b` pointwise over equal-length contiguous buffers.
pub fn mul_pointwise<T>(dst: &mut [T], a: &[T], b: &[T]) -> KernelResult<()>
where
    T: Copy + Num,
{
    if a.len() != b.len() {
        return Err(KernelError::length_mismatch("mul_pointwise", a.len(), b.len()));
    }
    if dst.len() != a.len() {
        return Err(KernelError::length_mismatch(
            "mul_pointwise",
            dst.len(),
            a.len(),
        ));
    }
    for ((d, &x), &y) in dst.iter_mut().zip(a).zip(b) {
        *d = x * y;
    }
    Ok(())
}

/// `dst = a ./ b` pointwise over equal-length contiguous buffers.
///
/// Division by a zero element is the caller's responsibility, exactly as
/// with scalar division.
pub fn div_pointwise<T>(dst: &mut [T], a: &[T], b: &[T]) -> KernelResult<()>
where
    T: Copy + Num,
{
    if a.len() != b.len() {
        return Err(KernelError::length_mismatch("div_pointwise", a.len(), b.len()));
    }
    if dst.len() != a.len() {
        return Err(KernelError::length_mismatch(
            "div_pointwise",
            dst.len(),
            a.len(),
        ));
    }
    for ((d, &x), &y) in dst.iter_mut().zip(a).zip(b) {
        *d = x / y;
    }
    Ok(())
}

/// Parallel `dst += alpha * src` over equal-length contiguous buffers.
///
/// Semantics are identical to [`accumulate`]; only the iteration is
/// parallel.
#[cfg(feature = "parallel")]
pub fn accumulate_parallel<T>(dst: &mut [T], src: &[T], alpha: T) -> KernelResult<()>
where
    T: Copy + Num + AddAssign + Send + Sync,
{
    use rayon::prelude::*;

    if dst.len() != src.len() {
        return Err(KernelError::length_mismatch(
            "accumulate_parallel",
            dst.len(),
            src.len(),
        ));
    }
    dst.par_iter_mut()
        .zip(src.par_iter())
        .for_each(|(d, &s)| *d += alpha * s);
    Ok(())
}
