//! Property-based tests for the connectivity algebra.
//!
//! These tests use `proptest` to generate random contractions and verify
//! the fusion invariants across a wide range of operand orders,
//! designation orders, and dimensions.

#[cfg(test)]
mod tests {
    use crate::{Contraction, Permutation};
    use proptest::prelude::*;

    /// Deterministic shuffle of `0..len` driven by a seed.
    fn shuffled(len: usize, mut seed: u64) -> Vec<usize> {
        let mut v: Vec<usize> = (0..len).collect();
        for i in (1..len).rev() {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (seed >> 33) as usize % (i + 1);
            v.swap(i, j);
        }
        v
    }

    /// Small pseudo-random extent in 1..=5.
    fn extent(seed: u64, salt: u64) -> usize {
        let x = seed
            .wrapping_mul(salt.wrapping_add(0x9e3779b97f4a7c15))
            .wrapping_mul(6364136223846793005);
        (x >> 60) as usize % 5 + 1
    }

    proptest! {
        /// Fusing never changes the total enumerated volume, for any
        /// operand orders, designation order, and dimensions.
        #[test]
        fn prop_fusion_preserves_volume(
            n in 0usize..=3,
            m in 0usize..=3,
            k in 0usize..=3,
            seed in any::<u64>(),
        ) {
            prop_assume!(n + m + k > 0);

            let axes_a = shuffled(n + k, seed);
            let axes_b = shuffled(m + k, seed.rotate_left(17));

            let dims_a: Vec<usize> =
                (0..n + k).map(|i| extent(seed, i as u64)).collect();
            let dims_b: Vec<usize> = {
                let mut d: Vec<usize> =
                    (0..m + k).map(|i| extent(seed, 100 + i as u64)).collect();
                // Contracted axes must agree on extent.
                for i in 0..k {
                    d[axes_b[i]] = dims_a[axes_a[i]];
                }
                d
            };

            let mut contr = Contraction::plain(n, m, k);
            for i in 0..k {
                contr.contract(axes_a[i], axes_b[i]).unwrap();
            }
            prop_assert!(contr.is_complete());

            let n_nodes = contr.node_count().unwrap();
            prop_assert!(n_nodes <= n + m + k);
            prop_assert!(n_nodes >= 1);

            let fused: usize = (0..n_nodes)
                .map(|i| contr.node_weight(i, &dims_a, &dims_b).unwrap())
                .product();
            let dims_c = contr.result_dims(&dims_a, &dims_b).unwrap();
            let contracted: usize = contr
                .contracted_pairs()
                .unwrap()
                .iter()
                .map(|&(ia, _)| dims_a[ia])
                .product();
            prop_assert_eq!(fused, dims_c.iter().product::<usize>() * contracted);
        }

        /// Every fused node carries consistent strides: contracted nodes
        /// step both operands, result nodes step the result and exactly
        /// one operand.
        #[test]
        fn prop_node_strides_consistent(
            n in 0usize..=3,
            m in 0usize..=3,
            k in 0usize..=3,
            seed in any::<u64>(),
        ) {
            prop_assume!(n + m + k > 0);

            let axes_a = shuffled(n + k, seed);
            let axes_b = shuffled(m + k, seed.rotate_left(29));
            let dims_a: Vec<usize> = vec![2; n + k];
            let dims_b: Vec<usize> = vec![2; m + k];

            let mut contr = Contraction::plain(n, m, k);
            for i in 0..k {
                contr.contract(axes_a[i], axes_b[i]).unwrap();
            }

            for spec in contr.fused_program(&dims_a, &dims_b).unwrap() {
                prop_assert!(spec.len >= 1);
                if spec.step_c == 0 {
                    // Contracted loop: steps both operands.
                    prop_assert!(spec.step_a >= 1 && spec.step_b >= 1);
                } else {
                    // Result loop: sourced from exactly one operand.
                    prop_assert!((spec.step_a >= 1) != (spec.step_b >= 1));
                }
            }
        }

        /// A permutation applied to both operands leaves the contracted
        /// extent check and result dimensions consistent.
        #[test]
        fn prop_operand_permutation_consistent(
            k in 1usize..=3,
            seed in any::<u64>(),
        ) {
            let n = 1usize;
            let m = 1usize;
            let axes_a = shuffled(n + k, seed);
            let axes_b = shuffled(m + k, seed.rotate_left(7));
            let dims_a: Vec<usize> =
                (0..n + k).map(|i| extent(seed, 7 + i as u64)).collect();
            let mut dims_b: Vec<usize> =
                (0..m + k).map(|i| extent(seed, 300 + i as u64)).collect();
            for i in 0..k {
                dims_b[axes_b[i]] = dims_a[axes_a[i]];
            }

            let mut contr = Contraction::plain(n, m, k);
            for i in 0..k {
                contr.contract(axes_a[i], axes_b[i]).unwrap();
            }
            let dims_c = contr.result_dims(&dims_a, &dims_b).unwrap();

            // Deliver operand a reversed in memory.
            let perm_a =
                Permutation::new((0..n + k).rev().collect::<Vec<_>>()).unwrap();
            let perm_b = Permutation::identity(m + k);
            contr.permute_operands(&perm_a, &perm_b).unwrap();

            let dims_a_rev: Vec<usize> = dims_a.iter().rev().copied().collect();
            let dims_c_perm = contr.result_dims(&dims_a_rev, &dims_b).unwrap();
            prop_assert_eq!(dims_c, dims_c_perm);
        }
    }
}
