//! Shared kernel utilities.

/// Row-major element strides for the given extents.
pub fn row_major_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; dims.len()];
    for ax in (0..dims.len().saturating_sub(1)).rev() {
        strides[ax] = strides[ax + 1] * dims[ax + 1];
    }
    strides
}

/// Walk every element of a block, pairing its block-linear position with
/// its position in an enclosing row-major buffer.
///
/// `dims` are the block extents, `axis_offsets` the block's element
/// offsets per axis, and `outer_strides` the row-major strides of the
/// enclosing buffer.
pub fn for_each_dense_position(
    dims: &[usize],
    axis_offsets: &[usize],
    outer_strides: &[usize],
    mut f: impl FnMut(usize, usize),
) {
    let size: usize = dims.iter().product();
    if size == 0 {
        return;
    }
    let rank = dims.len();
    let mut idx = vec![0usize; rank];
    let mut dense: usize = axis_offsets
        .iter()
        .zip(outer_strides)
        .map(|(&o, &s)| o * s)
        .sum();
    for block_linear in 0..size {
        f(block_linear, dense);
        for ax in (0..rank).rev() {
            idx[ax] += 1;
            if idx[ax] < dims[ax] {
                dense += outer_strides[ax];
                break;
            }
            dense -= (dims[ax] - 1) * outer_strides[ax];
            idx[ax] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_strides() {
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(row_major_strides(&[5]), vec![1]);
        assert!(row_major_strides(&[]).is_empty());
    }

    #[test]
    fn test_walk_positions() {
        // 2x2 block at offsets (1, 1) inside a 3x4 buffer.
        let mut pairs = Vec::new();
        for_each_dense_position(&[2, 2], &[1, 1], &[4, 1], |bl, d| pairs.push((bl, d)));
        assert_eq!(pairs, vec![(0, 5), (1, 6), (2, 9), (3, 10)]);
    }

    #[test]
    fn test_walk_scalar() {
        let mut pairs = Vec::new();
        for_each_dense_position(&[], &[], &[], |bl, d| pairs.push((bl, d)));
        assert_eq!(pairs, vec![(0, 0)]);
    }
}
