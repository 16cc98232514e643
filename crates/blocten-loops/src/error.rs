//! Error types for block loops and loop lists.

use blocten_contract::ContractError;
use blocten_core::CoreError;
use blocten_kernels::KernelError;
use thiserror::Error;

/// Result type alias using [`LoopError`].
pub type LoopResult<T> = Result<T, LoopError>;

/// Errors raised while constructing or running loop lists.
#[derive(Error, Debug)]
pub enum LoopError {
    /// A loop list must contain at least one loop.
    #[error("a loop list may not be empty")]
    EmptyList,

    /// A loop must bind at least one subspace.
    #[error("loop {loop_idx} binds no subspace of any tensor")]
    EmptyLoop { loop_idx: usize },

    /// A binding addressed a tensor the list does not know.
    #[error("binding addresses tensor {tensor}, list has {n_tensors}")]
    TensorOutOfRange { tensor: usize, n_tensors: usize },

    /// A binding addressed a subspace outside its tensor's order.
    #[error("binding addresses subspace {subspace} of tensor {tensor} (order {order})")]
    SubspaceOutOfRange {
        tensor: usize,
        subspace: usize,
        order: usize,
    },

    /// A binding addressed a loop component that does not exist.
    #[error("component {component} out of range ({components} loop components)")]
    ComponentOutOfRange { component: usize, components: usize },

    /// Two loops claim the same subspace of the same tensor.
    #[error("subspace {subspace} of tensor {tensor} is covered by two loops")]
    DoubleCoverage { tensor: usize, subspace: usize },

    /// A subspace is covered by no loop.
    #[error("subspace {subspace} of tensor {tensor} is covered by no loop")]
    CoverageGap { tensor: usize, subspace: usize },

    /// A bound subspace's blocking disagrees with the loop variable.
    #[error("subspace {subspace} of tensor {tensor} does not match the loop's blocking")]
    BlockingMismatch { tensor: usize, subspace: usize },

    /// A dense loop bound a subspace inside a sparse group.
    #[error("dense loop binds grouped subspace {subspace} of tensor {tensor}")]
    MixedBinding { tensor: usize, subspace: usize },

    /// A sparse loop bound part of a group but not all of it.
    #[error("sparse loop covers group {group} of tensor {tensor} only partially")]
    PartialGroup { tensor: usize, group: usize },

    /// A sparse loop would enumerate a tuple absent from a tensor's map.
    #[error("loop enumeration visits tuple {tuple:?}, absent from group {group} of tensor {tensor}")]
    EnumerationOutsideMap {
        tensor: usize,
        group: usize,
        tuple: Vec<usize>,
    },

    /// A sparse loop's map indexes blocks beyond its template.
    #[error("map component {component} reaches block {max}, template has {n_blocks} blocks")]
    MapOutsideTemplate {
        component: usize,
        max: usize,
        n_blocks: usize,
    },

    /// A group query addressed a nonexistent group.
    #[error("group {group} of tensor {tensor} out of range ({n_groups} groups)")]
    GroupOutOfRange {
        tensor: usize,
        group: usize,
        n_groups: usize,
    },

    /// A batching window is empty or exceeds the loop domain.
    #[error("window [{start}, {end}) invalid for domain of {domain} block indices")]
    InvalidWindow {
        start: usize,
        end: usize,
        domain: usize,
    },

    /// The runner was handed the wrong number of data buffers.
    #[error("loop list spans {expected} tensors, got {got} data buffers")]
    DataCount { expected: usize, got: usize },

    /// A data buffer's length disagrees with its tensor's storage.
    #[error("data buffer {tensor} holds {got} elements, space stores {expected}")]
    DataLength {
        tensor: usize,
        expected: usize,
        got: usize,
    },

    /// Operand or result spaces disagree with the contraction.
    #[error("space mismatch: {context}")]
    SpaceMismatch { context: String },

    /// An error bubbled up from the connectivity algebra.
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// An error bubbled up from the block space model.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An error bubbled up from a kernel.
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = LoopError::DoubleCoverage {
            tensor: 1,
            subspace: 2,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("tensor 1"));
        assert!(msg.contains("subspace 2"));
    }

    #[test]
    fn test_kernel_error_transparent() {
        let err: LoopError = KernelError::length_mismatch("accumulate", 4, 2).into();
        assert!(format!("{}", err).contains("accumulate"));
    }
}
