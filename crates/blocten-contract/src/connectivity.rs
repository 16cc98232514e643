//! The index connectivity table of a pairwise contraction.
//!
//! A contraction of operand `a` (order N+K) with operand `b` (order M+K)
//! into a result `c` (order N+M) is described by a symmetric table over
//! `2·(N+M+K)` slots — one per axis of `c`, `a`, and `b`, in that order —
//! mapping every slot to its partner: the axis it is contracted with, or
//! the result position it survives into.
//!
//! The table is built incrementally: [`Contraction::contract`] designates
//! one contracted pair at a time, and on the K-th pair the remaining free
//! axes are assigned result positions through the caller's output
//! permutation. Completion triggers the fusion pass, which collapses
//! maximal runs of slots whose partners are also consecutive (and in the
//! same tensor) into single loop nodes. Fusion only reduces the number of
//! physical loops; the enumerated volume never changes.

use crate::error::{ContractError, ContractResult, Operand};
use crate::permutation::Permutation;

/// One fused loop node: a maximal run of connectivity slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FusedNode {
    /// First slot of the run (a result slot, or an operand-a slot for
    /// contracted nodes).
    first: usize,
    /// Number of elementary axes collapsed into this node.
    len: usize,
}

/// A loop of the fused element program for one block or tensor:
/// iteration count plus the linear stride in each participating array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSpec {
    /// Number of iterations (the fused node weight).
    pub len: usize,
    /// Linear element stride in operand a, or 0 if absent.
    pub step_a: usize,
    /// Linear element stride in operand b, or 0 if absent.
    pub step_b: usize,
    /// Linear element stride in the result, or 0 for contracted loops.
    pub step_c: usize,
}

/// Which tensor a connectivity slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    C,
    A,
    B,
}

/// Specifies how two tensors are contracted.
///
/// # Examples
///
/// ```
/// use blocten_contract::{Contraction, Permutation};
///
/// // c_ik = sum_j a_ij * b_jk
/// let mut contr = Contraction::new(1, 1, 1, Permutation::identity(2)).unwrap();
/// contr.contract(1, 0).unwrap();
/// assert!(contr.is_complete());
/// assert_eq!(contr.node_count().unwrap(), 3);
///
/// let dims_a = [3, 4];
/// let dims_b = [4, 5];
/// assert_eq!(contr.result_dims(&dims_a, &dims_b).unwrap(), vec![3, 5]);
/// let volume: usize = (0..3)
///     .map(|n| contr.node_weight(n, &dims_a, &dims_b).unwrap())
///     .product();
/// assert_eq!(volume, 3 * 5 * 4);
/// ```
#[derive(Debug, Clone)]
pub struct Contraction {
    n: usize,
    m: usize,
    k: usize,
    perm_c: Permutation,
    designated: usize,
    conn: Vec<Option<usize>>,
    nodes: Vec<FusedNode>,
}

impl Contraction {
    /// Create a contraction of operand orders N+K and M+K with K
    /// contracted index pairs and the given output permutation.
    ///
    /// Result axis `i` receives the `perm_c[i]`-th free axis, counted in
    /// operand order (free axes of `a` first, then of `b`).
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::PermutationOrderMismatch`] if the
    /// permutation order is not N+M.
    pub fn new(n: usize, m: usize, k: usize, perm_c: Permutation) -> ContractResult<Self> {
        if perm_c.order() != n + m {
            return Err(ContractError::PermutationOrderMismatch {
                expected: n + m,
                got: perm_c.order(),
            });
        }
        let mut contr = Self {
            n,
            m,
            k,
            perm_c,
            designated: 0,
            conn: vec![None; 2 * (n + m + k)],
            nodes: Vec::new(),
        };
        // A direct product has no pairs to designate; it is complete at
        // construction.
        if k == 0 {
            contr.close();
        }
        Ok(contr)
    }

    /// Create a contraction with the identity output permutation.
    pub fn plain(n: usize, m: usize, k: usize) -> Self {
        Self::new(n, m, k, Permutation::identity(n + m))
            .unwrap_or_else(|_| unreachable!("identity permutation always has order n + m"))
    }

    /// Order of operand a (N+K).
    pub fn order_a(&self) -> usize {
        self.n + self.k
    }

    /// Order of operand b (M+K).
    pub fn order_b(&self) -> usize {
        self.m + self.k
    }

    /// Order of the result (N+M).
    pub fn order_c(&self) -> usize {
        self.n + self.m
    }

    /// Contraction degree K.
    pub fn degree(&self) -> usize {
        self.k
    }

    /// Whether all K contracted pairs have been designated.
    pub fn is_complete(&self) -> bool {
        self.designated == self.k
    }

    // Slot layout: result slots, then operand-a slots, then operand-b
    // slots.
    fn nm(&self) -> usize {
        self.n + self.m
    }

    fn a_end(&self) -> usize {
        self.nm() + self.n + self.k
    }

    fn section(&self, slot: usize) -> Section {
        if slot < self.nm() {
            Section::C
        } else if slot < self.a_end() {
            Section::A
        } else {
            Section::B
        }
    }

    fn partner(&self, slot: usize) -> usize {
        self.conn[slot].unwrap_or_else(|| unreachable!("queried before completion"))
    }

    fn require_complete(&self) -> ContractResult<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(ContractError::Incomplete {
                designated: self.designated,
                required: self.k,
            })
        }
    }

    fn check_operand_orders(&self, dims_a: &[usize], dims_b: &[usize]) -> ContractResult<()> {
        if dims_a.len() != self.order_a() {
            return Err(ContractError::OperandOrderMismatch {
                operand: Operand::A,
                expected: self.order_a(),
                got: dims_a.len(),
            });
        }
        if dims_b.len() != self.order_b() {
            return Err(ContractError::OperandOrderMismatch {
                operand: Operand::B,
                expected: self.order_b(),
                got: dims_b.len(),
            });
        }
        Ok(())
    }

    /// Designate axis `ia` of operand a as contracted against axis `ib`
    /// of operand b.
    ///
    /// On the K-th successful call the remaining free axes are assigned
    /// result positions through the output permutation and the fusion
    /// pass runs.
    ///
    /// # Errors
    ///
    /// Fails if either axis is out of range, either axis is already
    /// contracted, or the contraction is already complete.
    pub fn contract(&mut self, ia: usize, ib: usize) -> ContractResult<()> {
        if self.is_complete() {
            return Err(ContractError::AlreadyComplete);
        }
        if ia >= self.order_a() {
            return Err(ContractError::AxisOutOfRange {
                operand: Operand::A,
                axis: ia,
                order: self.order_a(),
            });
        }
        if ib >= self.order_b() {
            return Err(ContractError::AxisOutOfRange {
                operand: Operand::B,
                axis: ib,
                order: self.order_b(),
            });
        }

        let ja = self.nm() + ia;
        let jb = self.a_end() + ib;
        if self.conn[ja].is_some() {
            return Err(ContractError::AxisAlreadyContracted {
                operand: Operand::A,
                axis: ia,
            });
        }
        if self.conn[jb].is_some() {
            return Err(ContractError::AxisAlreadyContracted {
                operand: Operand::B,
                axis: ib,
            });
        }

        self.conn[ja] = Some(jb);
        self.conn[jb] = Some(ja);
        self.designated += 1;
        if self.designated == self.k {
            self.close();
        }
        Ok(())
    }

    /// Assign result positions to the remaining free axes and fuse.
    fn close(&mut self) {
        let nm = self.nm();
        let free: Vec<usize> = (nm..self.conn.len())
            .filter(|&i| self.conn[i].is_none())
            .collect();
        let ordered = self
            .perm_c
            .apply(&free)
            .unwrap_or_else(|_| unreachable!("permutation order checked at construction"));
        for (i, &slot) in ordered.iter().enumerate() {
            self.conn[i] = Some(slot);
            self.conn[slot] = Some(i);
        }
        self.fuse();
    }

    /// Re-express the table for operands that arrive pre-permuted.
    ///
    /// `perm_a` and `perm_b` map new axis positions to the original ones:
    /// the permuted operand's axis `p` is the original axis `perm[p]`.
    ///
    /// # Errors
    ///
    /// Fails if the contraction is incomplete or either permutation's
    /// order disagrees with its operand.
    pub fn permute_operands(
        &mut self,
        perm_a: &Permutation,
        perm_b: &Permutation,
    ) -> ContractResult<()> {
        self.require_complete()?;
        if perm_a.order() != self.order_a() {
            return Err(ContractError::PermutationOrderMismatch {
                expected: self.order_a(),
                got: perm_a.order(),
            });
        }
        if perm_b.order() != self.order_b() {
            return Err(ContractError::PermutationOrderMismatch {
                expected: self.order_b(),
                got: perm_b.order(),
            });
        }

        let nm = self.nm();
        let a_end = self.a_end();
        let inv_a = perm_a.inverse();
        let inv_b = perm_b.inverse();
        let map_slot = |slot: usize| -> usize {
            if slot < nm {
                slot
            } else if slot < a_end {
                nm + inv_a.index(slot - nm)
            } else {
                a_end + inv_b.index(slot - a_end)
            }
        };

        let mut conn = vec![None; self.conn.len()];
        for slot in 0..self.conn.len() {
            conn[map_slot(slot)] = Some(map_slot(self.partner(slot)));
        }
        self.conn = conn;
        self.fuse();
        Ok(())
    }

    /// Fuse runs of slots whose partners are also consecutive.
    ///
    /// Nodes are discovered in a single left-to-right scan: result slots
    /// first, then operand-a-ordered contracted slots. This fixes node
    /// order deterministically; stride computations depend on it.
    fn fuse(&mut self) {
        self.nodes.clear();
        let nm = self.nm();
        let a_end = self.a_end();

        let mut i = 0;
        while i < nm {
            let mut len = 1;
            while i + len < nm
                && self.partner(i + len) == self.partner(i) + len
                && self.section(self.partner(i)) == self.section(self.partner(i) + len)
            {
                len += 1;
            }
            self.nodes.push(FusedNode { first: i, len });
            i += len;
        }

        while i < a_end {
            let mut len = 1;
            if self.partner(i) > i {
                while i + len < a_end && self.partner(i + len) == self.partner(i) + len {
                    len += 1;
                }
                self.nodes.push(FusedNode { first: i, len });
            }
            i += len;
        }
    }

    /// Number of fused loop nodes.
    ///
    /// # Errors
    ///
    /// Fails if the contraction is incomplete.
    pub fn node_count(&self) -> ContractResult<usize> {
        self.require_complete()?;
        Ok(self.nodes.len())
    }

    fn get_node(&self, node: usize) -> ContractResult<FusedNode> {
        self.require_complete()?;
        self.nodes
            .get(node)
            .copied()
            .ok_or(ContractError::NodeOutOfRange {
                node,
                n_nodes: self.nodes.len(),
            })
    }

    /// The node's axis run in operand a, if it touches a.
    fn node_axes_a(&self, node: FusedNode) -> Option<std::ops::Range<usize>> {
        let nm = self.nm();
        let slot = if node.first < nm {
            self.partner(node.first)
        } else {
            node.first
        };
        match self.section(slot) {
            Section::A => Some(slot - nm..slot - nm + node.len),
            _ => None,
        }
    }

    /// The node's axis run in operand b, if it touches b.
    ///
    /// Both result nodes sourced from b and contracted nodes reach b
    /// through the partner of their first slot.
    fn node_axes_b(&self, node: FusedNode) -> Option<std::ops::Range<usize>> {
        let a_end = self.a_end();
        let slot = self.partner(node.first);
        match self.section(slot) {
            Section::B => Some(slot - a_end..slot - a_end + node.len),
            _ => None,
        }
    }

    /// The node's axis run in the result, if it is a result node.
    fn node_axes_c(&self, node: FusedNode) -> Option<std::ops::Range<usize>> {
        if node.first < self.nm() {
            Some(node.first..node.first + node.len)
        } else {
            None
        }
    }

    /// The weight of a fused node: the product of its elementary axis
    /// extents.
    ///
    /// # Errors
    ///
    /// Fails if the contraction is incomplete, the node index is out of
    /// range, or the dimension slices disagree with the operand orders.
    pub fn node_weight(
        &self,
        node: usize,
        dims_a: &[usize],
        dims_b: &[usize],
    ) -> ContractResult<usize> {
        self.check_operand_orders(dims_a, dims_b)?;
        let node = self.get_node(node)?;
        if let Some(axes) = self.node_axes_a(node) {
            Ok(dims_a[axes].iter().product())
        } else if let Some(axes) = self.node_axes_b(node) {
            Ok(dims_b[axes].iter().product())
        } else {
            unreachable!("every node touches at least one operand")
        }
    }

    /// Linear element stride of a fused node in operand a (0 if absent).
    pub fn linear_increment_a(
        &self,
        node: usize,
        dims_a: &[usize],
        dims_b: &[usize],
    ) -> ContractResult<usize> {
        self.check_operand_orders(dims_a, dims_b)?;
        let node = self.get_node(node)?;
        Ok(match self.node_axes_a(node) {
            Some(axes) => dims_a[axes.end..].iter().product(),
            None => 0,
        })
    }

    /// Linear element stride of a fused node in operand b (0 if absent).
    pub fn linear_increment_b(
        &self,
        node: usize,
        dims_a: &[usize],
        dims_b: &[usize],
    ) -> ContractResult<usize> {
        self.check_operand_orders(dims_a, dims_b)?;
        let node = self.get_node(node)?;
        Ok(match self.node_axes_b(node) {
            Some(axes) => dims_b[axes.end..].iter().product(),
            None => 0,
        })
    }

    /// Linear element stride of a fused node in the result (0 for
    /// contracted nodes).
    pub fn linear_increment_c(
        &self,
        node: usize,
        dims_a: &[usize],
        dims_b: &[usize],
    ) -> ContractResult<usize> {
        let dims_c = self.result_dims(dims_a, dims_b)?;
        let node = self.get_node(node)?;
        Ok(match self.node_axes_c(node) {
            Some(axes) => dims_c[axes.end..].iter().product(),
            None => 0,
        })
    }

    /// Dimensions of the result, derived through the connectivity table.
    ///
    /// # Errors
    ///
    /// Fails if incomplete, if the dimension slices disagree with the
    /// operand orders, or if contracted axes disagree on extent.
    pub fn result_dims(&self, dims_a: &[usize], dims_b: &[usize]) -> ContractResult<Vec<usize>> {
        self.require_complete()?;
        self.check_operand_orders(dims_a, dims_b)?;
        self.check_contracted_extents(dims_a, dims_b)?;
        let nm = self.nm();
        let a_end = self.a_end();
        Ok((0..nm)
            .map(|i| {
                let j = self.partner(i);
                if j < a_end {
                    dims_a[j - nm]
                } else {
                    dims_b[j - a_end]
                }
            })
            .collect())
    }

    /// Verify that contracted axes of a and b agree on extent.
    pub fn check_contracted_extents(
        &self,
        dims_a: &[usize],
        dims_b: &[usize],
    ) -> ContractResult<()> {
        self.require_complete()?;
        self.check_operand_orders(dims_a, dims_b)?;
        let nm = self.nm();
        let a_end = self.a_end();
        for slot in nm..a_end {
            let j = self.partner(slot);
            if j >= a_end {
                let (axis_a, axis_b) = (slot - nm, j - a_end);
                if dims_a[axis_a] != dims_b[axis_b] {
                    return Err(ContractError::ContractedExtentMismatch {
                        axis_a,
                        axis_b,
                        dim_a: dims_a[axis_a],
                        dim_b: dims_b[axis_b],
                    });
                }
            }
        }
        Ok(())
    }

    /// Contracted axis pairs `(axis_a, axis_b)` in operand-a order.
    pub fn contracted_pairs(&self) -> ContractResult<Vec<(usize, usize)>> {
        self.require_complete()?;
        let nm = self.nm();
        let a_end = self.a_end();
        Ok((nm..a_end)
            .filter_map(|slot| {
                let j = self.partner(slot);
                (j >= a_end).then(|| (slot - nm, j - a_end))
            })
            .collect())
    }

    /// For each result axis, the operand axis it comes from.
    pub fn result_sources(&self) -> ContractResult<Vec<(Operand, usize)>> {
        self.require_complete()?;
        let nm = self.nm();
        let a_end = self.a_end();
        Ok((0..nm)
            .map(|i| {
                let j = self.partner(i);
                if j < a_end {
                    (Operand::A, j - nm)
                } else {
                    (Operand::B, j - a_end)
                }
            })
            .collect())
    }

    /// The complete fused element program for the given operand
    /// dimensions: one [`LoopSpec`] per node, in node order.
    pub fn fused_program(
        &self,
        dims_a: &[usize],
        dims_b: &[usize],
    ) -> ContractResult<Vec<LoopSpec>> {
        self.check_contracted_extents(dims_a, dims_b)?;
        (0..self.node_count()?)
            .map(|node| {
                Ok(LoopSpec {
                    len: self.node_weight(node, dims_a, dims_b)?,
                    step_a: self.linear_increment_a(node, dims_a, dims_b)?,
                    step_b: self.linear_increment_b(node, dims_a, dims_b)?,
                    step_c: self.linear_increment_c(node, dims_a, dims_b)?,
                })
            })
            .collect()
    }
}
