//! Block loops: one loop variable over one or more tensors' subspaces.
//!
//! A [`BlockLoop`] enumerates the valid block indices of a loop variable.
//! The dense flavor runs a single component over `0..n_blocks`; the sparse
//! flavor enumerates the tuples of a [`SparsityMap`], one component per
//! subspace of the group, skipping absent combinations entirely.
//!
//! Bindings attach the loop's components to `(tensor, subspace)` pairs.
//! A binding may carry a block-index shift, which the batching layer uses
//! to address full tensors from a batch-local loop domain.

use blocten_core::{Shape, SparsityMap, Subspace};

use crate::error::{LoopError, LoopResult};

/// One (tensor, subspace) pair driven by a loop component.
#[derive(Debug, Clone)]
pub struct LoopBinding {
    /// Position of the tensor in the loop list's tensor order.
    pub tensor: usize,
    /// Axis position of the bound subspace within that tensor.
    pub subspace: usize,
    /// Which loop component drives this subspace.
    pub component: usize,
    /// Added to the loop value to obtain the tensor's block index.
    pub shift: usize,
    /// The bound subspace's blocking, as declared at bind time.
    blocking: Subspace,
}

impl LoopBinding {
    /// The bound subspace's blocking.
    pub fn blocking(&self) -> &Subspace {
        &self.blocking
    }
}

/// The loop's enumeration domain.
#[derive(Debug, Clone)]
enum LoopDomain {
    /// A single component over `0..template.n_blocks()`.
    Dense { template: Subspace },
    /// Tuples of a sparsity map, one component per template subspace.
    Sparse {
        map: SparsityMap,
        templates: Vec<Subspace>,
    },
}

/// A loop over the valid block indices of one loop variable.
///
/// # Examples
///
/// ```
/// use blocten_core::Subspace;
/// use blocten_loops::BlockLoop;
///
/// let sub = Subspace::with_block_sizes(&[2, 3, 4]).unwrap();
/// let mut lp = BlockLoop::dense(&sub);
/// lp.bind(0, 0, &sub).unwrap();
///
/// let mut visited = Vec::new();
/// lp.reset();
/// while !lp.done() {
///     visited.push(lp.value(0));
///     lp.advance();
/// }
/// assert_eq!(visited, vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct BlockLoop {
    domain: LoopDomain,
    bindings: Vec<LoopBinding>,
    window: Option<(usize, usize, usize)>,
    pos: usize,
}

impl BlockLoop {
    /// Create a dense loop over the blocks of `template`.
    pub fn dense(template: &Subspace) -> Self {
        let mut lp = Self {
            domain: LoopDomain::Dense {
                template: template.clone(),
            },
            bindings: Vec::new(),
            window: None,
            pos: 0,
        };
        lp.reset();
        lp
    }

    /// Create a sparse loop over the tuples of `map`, with one component
    /// per template subspace.
    ///
    /// # Errors
    ///
    /// Fails if the template count disagrees with the map order or a map
    /// tuple indexes a block outside its template.
    pub fn sparse(map: SparsityMap, templates: Vec<Subspace>) -> LoopResult<Self> {
        if templates.len() != map.order() {
            return Err(LoopError::ComponentOutOfRange {
                component: templates.len(),
                components: map.order(),
            });
        }
        for (c, template) in templates.iter().enumerate() {
            if let Some(max) = map.max_component(c) {
                if max >= template.n_blocks() {
                    return Err(LoopError::MapOutsideTemplate {
                        component: c,
                        max,
                        n_blocks: template.n_blocks(),
                    });
                }
            }
        }
        let mut lp = Self {
            domain: LoopDomain::Sparse { map, templates },
            bindings: Vec::new(),
            window: None,
            pos: 0,
        };
        lp.reset();
        Ok(lp)
    }

    /// Number of loop components (1 for dense loops).
    pub fn components(&self) -> usize {
        match &self.domain {
            LoopDomain::Dense { .. } => 1,
            LoopDomain::Sparse { map, .. } => map.order(),
        }
    }

    /// Whether this loop enumerates a sparsity map.
    pub fn is_sparse(&self) -> bool {
        matches!(self.domain, LoopDomain::Sparse { .. })
    }

    /// The sparsity map of a sparse loop.
    pub fn map(&self) -> Option<&SparsityMap> {
        match &self.domain {
            LoopDomain::Dense { .. } => None,
            LoopDomain::Sparse { map, .. } => Some(map),
        }
    }

    /// The blocking template of component `c`.
    pub fn template(&self, c: usize) -> &Subspace {
        match &self.domain {
            LoopDomain::Dense { template } => template,
            LoopDomain::Sparse { templates, .. } => &templates[c],
        }
    }

    /// Bind component 0 to subspace `subspace` of tensor `tensor`.
    ///
    /// `sub` is the tensor's actual blocking for that subspace.
    pub fn bind(&mut self, tensor: usize, subspace: usize, sub: &Subspace) -> LoopResult<()> {
        self.bind_component(tensor, subspace, sub, 0, 0)
    }

    /// Bind a component to a subspace, with a block-index shift.
    ///
    /// The bound subspace must carry the template's block sizes across the
    /// loop's domain, offset by `shift`.
    pub fn bind_component(
        &mut self,
        tensor: usize,
        subspace: usize,
        sub: &Subspace,
        component: usize,
        shift: usize,
    ) -> LoopResult<()> {
        if component >= self.components() {
            return Err(LoopError::ComponentOutOfRange {
                component,
                components: self.components(),
            });
        }
        let template = self.template(component);
        if shift + template.n_blocks() > sub.n_blocks() {
            return Err(LoopError::BlockingMismatch { tensor, subspace });
        }
        for v in 0..template.n_blocks() {
            if sub.block_size(v + shift) != template.block_size(v) {
                return Err(LoopError::BlockingMismatch { tensor, subspace });
            }
        }
        self.bindings.push(LoopBinding {
            tensor,
            subspace,
            component,
            shift,
            blocking: sub.clone(),
        });
        Ok(())
    }

    /// All bindings, in bind order.
    pub fn bindings(&self) -> &[LoopBinding] {
        &self.bindings
    }

    /// Whether this loop drives any subspace of `tensor`.
    pub fn binds_tensor(&self, tensor: usize) -> bool {
        self.bindings.iter().any(|b| b.tensor == tensor)
    }

    /// Bindings of `tensor`, in bind order.
    pub fn bindings_for(&self, tensor: usize) -> impl Iterator<Item = &LoopBinding> {
        self.bindings.iter().filter(move |b| b.tensor == tensor)
    }

    /// Restrict enumeration of `component` to block indices in
    /// `[start, end)`.
    ///
    /// Used by the batching layer; resets the loop.
    pub fn restrict(&mut self, component: usize, start: usize, end: usize) -> LoopResult<()> {
        if component >= self.components() {
            return Err(LoopError::ComponentOutOfRange {
                component,
                components: self.components(),
            });
        }
        let domain = self.template(component).n_blocks();
        if start >= end || end > domain {
            return Err(LoopError::InvalidWindow { start, end, domain });
        }
        self.window = Some((component, start, end));
        self.reset();
        Ok(())
    }

    /// Drop any batching window and reset.
    pub fn clear_restriction(&mut self) {
        self.window = None;
        self.reset();
    }

    /// The active window, if any: `(component, start, end)`.
    pub fn window(&self) -> Option<(usize, usize, usize)> {
        self.window
    }

    /// Number of enumeration positions ignoring any window.
    pub fn domain_len(&self) -> usize {
        match &self.domain {
            LoopDomain::Dense { template } => template.n_blocks(),
            LoopDomain::Sparse { map, .. } => map.len(),
        }
    }

    fn matches_window(&self, pos: usize) -> bool {
        match (&self.domain, self.window) {
            (_, None) => true,
            (LoopDomain::Dense { .. }, Some((_, start, end))) => pos >= start && pos < end,
            (LoopDomain::Sparse { map, .. }, Some((c, start, end))) => {
                let v = map.tuple(pos)[c];
                v >= start && v < end
            }
        }
    }

    /// Rewind to the first valid block-index value.
    pub fn reset(&mut self) {
        self.pos = 0;
        while self.pos < self.domain_len() && !self.matches_window(self.pos) {
            self.pos += 1;
        }
    }

    /// Move to the next valid block-index value.
    ///
    /// For sparse loops this is the next entry of the map's enumeration,
    /// never a plain increment; absent blocks are never visited.
    pub fn advance(&mut self) {
        if self.pos >= self.domain_len() {
            return;
        }
        self.pos += 1;
        while self.pos < self.domain_len() && !self.matches_window(self.pos) {
            self.pos += 1;
        }
    }

    /// Whether enumeration is exhausted.
    pub fn done(&self) -> bool {
        self.pos >= self.domain_len()
    }

    /// The current block index of `component`.
    ///
    /// Only meaningful while `!done()`.
    ///
    /// # Panics
    ///
    /// Panics if the loop is exhausted or the component is out of range.
    pub fn value(&self, component: usize) -> usize {
        assert!(!self.done(), "loop is exhausted");
        match &self.domain {
            LoopDomain::Dense { .. } => {
                assert!(component == 0, "dense loop has a single component");
                self.pos
            }
            LoopDomain::Sparse { map, .. } => map.tuple(self.pos)[component],
        }
    }

    /// Per-axis element offsets of the current block in `tensor`'s bound
    /// subspaces, in bind order.
    pub fn current_offsets(&self, tensor: usize) -> Shape {
        self.bindings_for(tensor)
            .map(|b| b.blocking.block_offset(self.value(b.component) + b.shift))
            .collect()
    }

    /// Per-axis element extents of the current block in `tensor`'s bound
    /// subspaces, in bind order.
    pub fn current_dims(&self, tensor: usize) -> Shape {
        self.bindings_for(tensor)
            .map(|b| b.blocking.block_size(self.value(b.component) + b.shift))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub_3() -> Subspace {
        Subspace::with_block_sizes(&[2, 3, 4]).unwrap()
    }

    #[test]
    fn test_dense_enumeration() {
        let sub = sub_3();
        let mut lp = BlockLoop::dense(&sub);
        lp.bind(0, 0, &sub).unwrap();

        let mut visited = Vec::new();
        lp.reset();
        while !lp.done() {
            visited.push(lp.value(0));
            lp.advance();
        }
        assert_eq!(visited, vec![0, 1, 2]);

        // reset rewinds for nested reuse
        lp.reset();
        assert!(!lp.done());
        assert_eq!(lp.value(0), 0);
    }

    #[test]
    fn test_sparse_enumeration_visits_map_order() {
        // 4 of 9 pairs, enumerated in map order, each exactly once.
        let map = SparsityMap::new(
            2,
            vec![vec![0, 0], vec![0, 2], vec![1, 1], vec![2, 0]],
        )
        .unwrap();
        let t = Subspace::with_block_sizes(&[1, 1, 1]).unwrap();
        let mut lp = BlockLoop::sparse(map.clone(), vec![t.clone(), t.clone()]).unwrap();
        lp.bind_component(0, 0, &t, 0, 0).unwrap();
        lp.bind_component(0, 1, &t, 1, 0).unwrap();

        let mut visited = Vec::new();
        lp.reset();
        while !lp.done() {
            visited.push(vec![lp.value(0), lp.value(1)]);
            lp.advance();
        }
        let expected: Vec<Vec<usize>> = map.iter().map(|t| t.to_vec()).collect();
        assert_eq!(visited, expected);
    }

    #[test]
    fn test_window_restriction_dense() {
        let sub = sub_3();
        let mut lp = BlockLoop::dense(&sub);
        lp.bind(0, 0, &sub).unwrap();
        lp.restrict(0, 1, 3).unwrap();

        let mut visited = Vec::new();
        while !lp.done() {
            visited.push(lp.value(0));
            lp.advance();
        }
        assert_eq!(visited, vec![1, 2]);

        lp.clear_restriction();
        let mut visited = Vec::new();
        while !lp.done() {
            visited.push(lp.value(0));
            lp.advance();
        }
        assert_eq!(visited, vec![0, 1, 2]);
    }

    #[test]
    fn test_window_restriction_sparse_component() {
        let map = SparsityMap::new(
            2,
            vec![vec![0, 0], vec![0, 2], vec![1, 1], vec![2, 0]],
        )
        .unwrap();
        let t = Subspace::with_block_sizes(&[1, 1, 1]).unwrap();
        let mut lp = BlockLoop::sparse(map, vec![t.clone(), t.clone()]).unwrap();
        lp.bind_component(0, 0, &t, 0, 0).unwrap();
        lp.bind_component(0, 1, &t, 1, 0).unwrap();

        // Keep only tuples whose second component is 0.
        lp.restrict(1, 0, 1).unwrap();
        let mut visited = Vec::new();
        while !lp.done() {
            visited.push(vec![lp.value(0), lp.value(1)]);
            lp.advance();
        }
        assert_eq!(visited, vec![vec![0, 0], vec![2, 0]]);
    }

    #[test]
    fn test_invalid_window() {
        let sub = sub_3();
        let mut lp = BlockLoop::dense(&sub);
        assert!(matches!(
            lp.restrict(0, 2, 2),
            Err(LoopError::InvalidWindow { .. })
        ));
        assert!(matches!(
            lp.restrict(0, 0, 4),
            Err(LoopError::InvalidWindow { .. })
        ));
        assert!(matches!(
            lp.restrict(1, 0, 1),
            Err(LoopError::ComponentOutOfRange { .. })
        ));
    }

    #[test]
    fn test_shifted_binding_offsets() {
        // Loop over a 2-block batch window of a 4-block axis.
        let full = Subspace::with_block_sizes(&[2, 3, 4, 5]).unwrap();
        let local = Subspace::with_block_sizes(&[3, 4]).unwrap();
        let mut lp = BlockLoop::dense(&local);
        lp.bind_component(0, 0, &full, 0, 1).unwrap();

        lp.reset();
        assert_eq!(&lp.current_offsets(0)[..], &[2]);
        assert_eq!(&lp.current_dims(0)[..], &[3]);
        lp.advance();
        assert_eq!(&lp.current_offsets(0)[..], &[5]);
        assert_eq!(&lp.current_dims(0)[..], &[4]);
    }

    #[test]
    fn test_blocking_mismatch_rejected() {
        let sub = sub_3();
        let other = Subspace::with_block_sizes(&[3, 2, 4]).unwrap();
        let mut lp = BlockLoop::dense(&sub);
        assert!(matches!(
            lp.bind(0, 0, &other),
            Err(LoopError::BlockingMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_map_is_immediately_done() {
        let map = SparsityMap::new(1, Vec::<Vec<usize>>::new()).unwrap();
        let t = Subspace::dense(4).unwrap();
        let lp = BlockLoop::sparse(map, vec![t]).unwrap();
        assert!(lp.done());
    }
}
