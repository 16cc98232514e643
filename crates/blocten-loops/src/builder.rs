//! Loop-list construction.
//!
//! Turns a completed [`Contraction`] plus concrete [`BlockSpace`]s into a
//! [`LoopList`]: one loop per connectivity variable, with variables that
//! fall inside a sparse group merged into a single sparse loop. When the
//! merged variables span groups of several tensors, the loop enumerates
//! the join of their maps, so absent combinations are never visited.
//!
//! [`contraction_loops_batched`] builds the same list against one
//! batch-local tensor: the batched variable's domain comes from the
//! batch-local subspace, and bindings to the full tensors carry the batch
//! start as a block-index shift.

use std::collections::HashMap;

use blocten_contract::{Contraction, Operand};
use blocten_core::{BlockSpace, SparsityMap, Subspace};

use crate::block_loop::BlockLoop;
use crate::error::{LoopError, LoopResult};
use crate::loop_list::LoopList;

/// A (tensor, subspace, shift) member of one variable.
type Member = (usize, usize, usize);

/// One loop variable: its members and an optional explicit domain
/// template (defaults to the first member's subspace).
struct VarSpec {
    members: Vec<Member>,
    template: Option<Subspace>,
}

/// Build the loop list of a pairwise contraction over tensors
/// `[a, b, c]`.
///
/// Dimension checking happens here, once, against the connectivity
/// table: contracted subspaces of a and b must agree in blocking, and
/// each result subspace of c must match its source operand subspace.
pub fn contraction_loops(
    contr: &Contraction,
    space_a: &BlockSpace,
    space_b: &BlockSpace,
    space_c: &BlockSpace,
) -> LoopResult<LoopList> {
    build_contraction_list(contr, space_a, space_b, space_c, None)
}

/// Build the loop list of a contraction in which one tensor is
/// batch-local along one subspace.
///
/// `local_tensor`/`local_subspace` name the batch-local axis (tensor 0,
/// 1, 2 = a, b, c); its space covers only the block range starting at
/// block `start` of the full axis. The variable driving that axis
/// iterates the batch-local domain, and its bindings to the other
/// (full) tensors carry `start` as a shift. The batched axis may not lie
/// inside a sparse group of any tensor it touches.
pub fn contraction_loops_batched(
    contr: &Contraction,
    space_a: &BlockSpace,
    space_b: &BlockSpace,
    space_c: &BlockSpace,
    local_tensor: usize,
    local_subspace: usize,
    start: usize,
) -> LoopResult<LoopList> {
    build_contraction_list(
        contr,
        space_a,
        space_b,
        space_c,
        Some((local_tensor, local_subspace, start)),
    )
}

fn build_contraction_list(
    contr: &Contraction,
    space_a: &BlockSpace,
    space_b: &BlockSpace,
    space_c: &BlockSpace,
    batch: Option<(usize, usize, usize)>,
) -> LoopResult<LoopList> {
    let sources = contr.result_sources()?;
    let pairs = contr.contracted_pairs()?;
    let spaces = [space_a, space_b, space_c];

    if space_a.order() != contr.order_a() {
        return Err(space_order_mismatch("operand a", space_a.order(), contr.order_a()));
    }
    if space_b.order() != contr.order_b() {
        return Err(space_order_mismatch("operand b", space_b.order(), contr.order_b()));
    }
    if space_c.order() != contr.order_c() {
        return Err(space_order_mismatch("result", space_c.order(), contr.order_c()));
    }

    // One variable per result axis, then one per contracted pair.
    let mut variables: Vec<Vec<(usize, usize)>> = Vec::new();
    for (i, &(op, ax)) in sources.iter().enumerate() {
        let t = match op {
            Operand::A => 0,
            Operand::B => 1,
        };
        variables.push(vec![(t, ax), (2, i)]);
    }
    for &(ia, ib) in &pairs {
        variables.push(vec![(0, ia), (1, ib)]);
    }

    // The variable holding the batch-local axis, if any.
    let batched_var = match batch {
        None => None,
        Some((t, s, _)) => {
            let v = variables
                .iter()
                .position(|members| members.contains(&(t, s)))
                .ok_or_else(|| LoopError::SpaceMismatch {
                    context: format!("batched axis ({}, {}) not part of the contraction", t, s),
                })?;
            for &(mt, ms) in &variables[v] {
                if spaces[mt].is_grouped(ms) {
                    return Err(LoopError::SpaceMismatch {
                        context: format!(
                            "batched axis touches sparse group via subspace {} of tensor {}",
                            ms, mt
                        ),
                    });
                }
            }
            Some(v)
        }
    };

    // Blocking checks against the connectivity table, once. The batched
    // variable is checked by the shifted binds instead.
    for (i, &(op, ax)) in sources.iter().enumerate() {
        if batched_var == Some(i) {
            continue;
        }
        let src = match op {
            Operand::A => space_a.subspace(ax),
            Operand::B => space_b.subspace(ax),
        };
        if !space_c.subspace(i).same_blocking(src) {
            return Err(LoopError::SpaceMismatch {
                context: format!(
                    "result subspace {} does not match operand {} subspace {}",
                    i, op, ax
                ),
            });
        }
    }
    for (p, &(ia, ib)) in pairs.iter().enumerate() {
        if batched_var == Some(sources.len() + p) {
            continue;
        }
        if !space_a.subspace(ia).same_blocking(space_b.subspace(ib)) {
            return Err(LoopError::SpaceMismatch {
                context: format!(
                    "contracted subspaces a[{}] and b[{}] disagree in blocking",
                    ia, ib
                ),
            });
        }
    }

    let specs: Vec<VarSpec> = variables
        .into_iter()
        .enumerate()
        .map(|(v, members)| match batch {
            Some((bt, bs, start)) if batched_var == Some(v) => VarSpec {
                template: Some(spaces[bt].subspace(bs).clone()),
                members: members
                    .into_iter()
                    .map(|(t, s)| {
                        let shift = if (t, s) == (bt, bs) { 0 } else { start };
                        (t, s, shift)
                    })
                    .collect(),
            },
            _ => VarSpec {
                template: None,
                members: members.into_iter().map(|(t, s)| (t, s, 0)).collect(),
            },
        })
        .collect();

    let owned = vec![space_a.clone(), space_b.clone(), space_c.clone()];
    let loops = build_loops(&owned, &specs)?;
    LoopList::new(loops, owned)
}

fn space_order_mismatch(what: &str, got: usize, expected: usize) -> LoopError {
    LoopError::SpaceMismatch {
        context: format!("{} has order {}, contraction expects {}", what, got, expected),
    }
}

/// Build the loop list iterating a single tensor, one variable per
/// subspace.
///
/// Used by load/store/fill style operations.
pub fn tensor_loops(space: &BlockSpace) -> LoopResult<LoopList> {
    let specs: Vec<VarSpec> = (0..space.order())
        .map(|s| VarSpec {
            members: vec![(0, s, 0)],
            template: None,
        })
        .collect();
    let spaces = vec![space.clone()];
    let loops = build_loops(&spaces, &specs)?;
    LoopList::new(loops, spaces)
}

/// Build loops from explicit variables, merging variables that fall in
/// sparse groups.
fn build_loops(spaces: &[BlockSpace], variables: &[VarSpec]) -> LoopResult<Vec<BlockLoop>> {
    let mut var_of: HashMap<(usize, usize), usize> = HashMap::new();
    for (v, spec) in variables.iter().enumerate() {
        for &(t, s, _) in &spec.members {
            var_of.insert((t, s), v);
        }
    }

    // Union-find over variables; groups merge the variables they span.
    let mut parent: Vec<usize> = (0..variables.len()).collect();
    fn find(parent: &mut Vec<usize>, v: usize) -> usize {
        if parent[v] != v {
            let root = find(parent, parent[v]);
            parent[v] = root;
        }
        parent[v]
    }

    let mut involved: Vec<(usize, usize)> = Vec::new();
    for (t, space) in spaces.iter().enumerate() {
        for g in 0..space.n_groups() {
            let grp = space.group(g);
            let mut vars = Vec::with_capacity(grp.order());
            for s in grp.offset()..grp.offset() + grp.order() {
                match var_of.get(&(t, s)) {
                    Some(&v) => vars.push(v),
                    None => {
                        return Err(LoopError::CoverageGap {
                            tensor: t,
                            subspace: s,
                        })
                    }
                }
            }
            for w in vars.windows(2) {
                let (r0, r1) = (find(&mut parent, w[0]), find(&mut parent, w[1]));
                if r0 != r1 {
                    parent[r1] = r0;
                }
            }
            involved.push((t, g));
        }
    }

    // Collect clusters in deterministic order: by smallest variable.
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut cluster_of_root: HashMap<usize, usize> = HashMap::new();
    for v in 0..variables.len() {
        let root = find(&mut parent, v);
        match cluster_of_root.get(&root) {
            Some(&c) => clusters[c].push(v),
            None => {
                cluster_of_root.insert(root, clusters.len());
                clusters.push(vec![v]);
            }
        }
    }
    let cluster_groups: Vec<Vec<(usize, usize)>> = clusters
        .iter()
        .map(|cluster| {
            involved
                .iter()
                .filter(|&&(t, g)| {
                    let grp = spaces[t].group(g);
                    let v = var_of[&(t, grp.offset())];
                    cluster.contains(&v)
                })
                .copied()
                .collect()
        })
        .collect();

    let mut loops = Vec::with_capacity(clusters.len());
    for (cluster, groups) in clusters.iter().zip(&cluster_groups) {
        let templates: Vec<Subspace> = cluster
            .iter()
            .map(|&v| match &variables[v].template {
                Some(t) => t.clone(),
                None => {
                    let (t, s, _) = variables[v].members[0];
                    spaces[t].subspace(s).clone()
                }
            })
            .collect();

        let mut lp = if groups.is_empty() {
            BlockLoop::dense(&templates[0])
        } else {
            let map = join_maps(spaces, variables, cluster, groups, &templates)?;
            BlockLoop::sparse(map, templates)?
        };

        for (comp, &v) in cluster.iter().enumerate() {
            for &(t, s, shift) in &variables[v].members {
                lp.bind_component(t, s, spaces[t].subspace(s), comp, shift)?;
            }
        }
        loops.push(lp);
    }

    Ok(loops)
}

/// Enumerate the join of the involved groups' maps over the cluster's
/// components: the tuples every spanned tensor's map allows.
fn join_maps(
    spaces: &[BlockSpace],
    variables: &[VarSpec],
    cluster: &[usize],
    groups: &[(usize, usize)],
    templates: &[Subspace],
) -> LoopResult<SparsityMap> {
    // For each involved group, the cluster component of each of its
    // subspaces.
    let comp_of = |t: usize, s: usize| -> usize {
        let v = variables
            .iter()
            .position(|spec| spec.members.iter().any(|&(mt, ms, _)| (mt, ms) == (t, s)))
            .unwrap_or_else(|| unreachable!("group coverage established by caller"));
        cluster
            .iter()
            .position(|&cv| cv == v)
            .unwrap_or_else(|| unreachable!("cluster merge established by caller"))
    };

    let projections: Vec<(usize, usize, Vec<usize>)> = groups
        .iter()
        .map(|&(t, g)| {
            let grp = spaces[t].group(g);
            let comps = (grp.offset()..grp.offset() + grp.order())
                .map(|s| comp_of(t, s))
                .collect();
            (t, g, comps)
        })
        .collect();

    let mut tuples: Vec<Vec<usize>> = Vec::new();
    let mut current = vec![0usize; cluster.len()];
    enumerate_join(
        spaces,
        &projections,
        templates,
        0,
        &mut current,
        &mut tuples,
    );
    Ok(SparsityMap::new(cluster.len(), tuples)?)
}

fn enumerate_join(
    spaces: &[BlockSpace],
    projections: &[(usize, usize, Vec<usize>)],
    templates: &[Subspace],
    comp: usize,
    current: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    if comp == templates.len() {
        let allowed = projections.iter().all(|(t, g, comps)| {
            let grp = spaces[*t].group(*g);
            let proj: Vec<usize> = comps.iter().map(|&c| current[c]).collect();
            grp.map().contains(&proj)
        });
        if allowed {
            out.push(current.clone());
        }
        return;
    }
    for b in 0..templates[comp].n_blocks() {
        current[comp] = b;
        enumerate_join(spaces, projections, templates, comp + 1, current, out);
    }
}
