//! Error types for contraction specifications.

use thiserror::Error;

/// Which operand of a pairwise contraction an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// The first operand.
    A,
    /// The second operand.
    B,
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::A => write!(f, "a"),
            Operand::B => write!(f, "b"),
        }
    }
}

/// Result type alias using [`ContractError`].
pub type ContractResult<T> = Result<T, ContractError>;

/// Errors raised while building or querying a contraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    /// An axis index exceeds the operand's order.
    #[error("axis {axis} of operand {operand} out of range (order {order})")]
    AxisOutOfRange {
        operand: Operand,
        axis: usize,
        order: usize,
    },

    /// The same operand axis was designated twice.
    #[error("axis {axis} of operand {operand} is already contracted")]
    AxisAlreadyContracted { operand: Operand, axis: usize },

    /// All contracted pairs are already designated.
    #[error("contraction is complete; no further pairs may be designated")]
    AlreadyComplete,

    /// A query or permutation was issued before all pairs were designated.
    #[error("contraction is incomplete: {designated} of {required} pairs designated")]
    Incomplete { designated: usize, required: usize },

    /// A fused-node query addressed a nonexistent node.
    #[error("node {node} out of range ({n_nodes} fused nodes)")]
    NodeOutOfRange { node: usize, n_nodes: usize },

    /// Supplied dimensions disagree with an operand's declared order.
    #[error("operand {operand} has order {expected}, got {got} dimensions")]
    OperandOrderMismatch {
        operand: Operand,
        expected: usize,
        got: usize,
    },

    /// Contracted axes disagree on extent.
    #[error("contracted extent mismatch: a[{axis_a}] = {dim_a}, b[{axis_b}] = {dim_b}")]
    ContractedExtentMismatch {
        axis_a: usize,
        axis_b: usize,
        dim_a: usize,
        dim_b: usize,
    },

    /// A permutation's entries are not a bijection over 0..order.
    #[error("invalid permutation {perm:?}: not a bijection over 0..{order}")]
    InvalidPermutation { perm: Vec<usize>, order: usize },

    /// A permutation's order disagrees with the sequence it is applied to.
    #[error("permutation order mismatch: expected {expected}, got {got}")]
    PermutationOrderMismatch { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_operand() {
        let err = ContractError::AxisOutOfRange {
            operand: Operand::B,
            axis: 4,
            order: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("operand b"));
        assert!(msg.contains("axis 4"));
    }
}
