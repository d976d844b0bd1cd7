//! Graph layout for diagram views (C7)
//!
//! Two algorithms over the same scaffolding: a dagre-style layered layout
//! and a sugiyama-style hierarchical layout for dense graphs. Both operate
//! on the visuals of one view, respect nesting (children are laid out in
//! their parent's interior and the parent is resized to fit), and mutate
//! geometry only.

mod dagre;
mod sugiyama;

use std::collections::HashMap;

use archihub_core_model::Model;
use archihub_core_types::{Bounds, HubError, HubResult, ViewId, VisualId};
use petgraph::algo::{condensation, toposort};
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};

/// Interior padding when sizing a parent around its children
const NEST_PADDING: f64 = 24.0;
/// Extra headroom at the top of a container for its label
const NEST_HEADER: f64 = 16.0;
/// Offset of the whole arrangement from the view origin
const CANVAS_MARGIN: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RankDir {
    #[default]
    TB,
    BT,
    LR,
    RL,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Dagre,
    Sugiyama,
}

/// Layout request parameters; distances are pixels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutParams {
    pub algorithm: Algorithm,
    pub rankdir: RankDir,
    pub nodesep: f64,
    pub ranksep: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            rankdir: RankDir::default(),
            nodesep: 50.0,
            ranksep: 80.0,
        }
    }
}

/// Node handed to an arrangement pass: just a box to place
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeBox {
    pub width: f64,
    pub height: f64,
}

/// Lay out every visual of `view_id` in place; returns how many visuals
/// were repositioned.
pub fn layout_view(
    model: &mut Model,
    view_id: &ViewId,
    params: &LayoutParams,
) -> HubResult<usize> {
    let view = model
        .get_view(view_id)
        .ok_or_else(|| HubError::NotFound(format!("view {view_id}")))?;

    // Children grouped by parent; None is the view root
    let mut children: HashMap<Option<VisualId>, Vec<VisualId>> = HashMap::new();
    for object in view.objects.values() {
        children
            .entry(object.parent.clone())
            .or_default()
            .push(object.id.clone());
    }
    let sizes: HashMap<VisualId, Bounds> = view
        .objects
        .iter()
        .map(|(id, o)| (id.clone(), o.bounds))
        .collect();
    let edges: Vec<(VisualId, VisualId)> = view
        .connections
        .values()
        .map(|c| (c.source_visual.clone(), c.target_visual.clone()))
        .collect();

    let mut placed: Vec<(VisualId, Bounds)> = Vec::new();
    arrange_container(&None, &children, &sizes, &edges, params, &mut placed);

    let mut moved = 0usize;
    for (visual_id, bounds) in placed {
        let current = sizes.get(&visual_id).copied();
        if current != Some(bounds) {
            model.set_visual_bounds(view_id, &visual_id, bounds)?;
            moved += 1;
        }
    }
    tracing::debug!(view = %view_id, moved, "layout applied");
    Ok(moved)
}

/// Recursively arrange the children of one container. Returns the
/// container's required interior size. Positions are pushed into `placed`
/// in parent-relative coordinates.
fn arrange_container(
    container: &Option<VisualId>,
    children: &HashMap<Option<VisualId>, Vec<VisualId>>,
    sizes: &HashMap<VisualId, Bounds>,
    edges: &[(VisualId, VisualId)],
    params: &LayoutParams,
    placed: &mut Vec<(VisualId, Bounds)>,
) -> (f64, f64) {
    let Some(members) = children.get(container) else {
        return (0.0, 0.0);
    };

    // Depth-first: size nested containers before arranging this level
    let mut boxes: Vec<NodeBox> = Vec::with_capacity(members.len());
    let mut nested_sizes: HashMap<VisualId, (f64, f64)> = HashMap::new();
    for member in members {
        if children.contains_key(&Some(member.clone())) {
            let interior = arrange_container(
                &Some(member.clone()),
                children,
                sizes,
                edges,
                params,
                placed,
            );
            let size = (
                interior.0 + 2.0 * NEST_PADDING,
                interior.1 + 2.0 * NEST_PADDING + NEST_HEADER,
            );
            nested_sizes.insert(member.clone(), size);
            boxes.push(NodeBox { width: size.0, height: size.1 });
        } else {
            let bounds = sizes.get(member).copied().unwrap_or_default();
            boxes.push(NodeBox { width: bounds.width, height: bounds.height });
        }
    }

    // Project connections onto this sibling group: an edge counts when the
    // two endpoints resolve to different members via their ancestor chains
    let member_index: HashMap<&VisualId, usize> =
        members.iter().enumerate().map(|(i, m)| (m, i)).collect();
    fn ancestor_of<'a>(
        mut id: &'a VisualId,
        member_index: &HashMap<&VisualId, usize>,
        children: &'a HashMap<Option<VisualId>, Vec<VisualId>>,
    ) -> Option<usize> {
        loop {
            if let Some(&i) = member_index.get(id) {
                return Some(i);
            }
            id = parent_of(id, children)?;
        }
    }
    let mut local_edges: Vec<(usize, usize)> = Vec::new();
    for (source, target) in edges {
        if let (Some(s), Some(t)) = (
            ancestor_of(source, &member_index, children),
            ancestor_of(target, &member_index, children),
        ) {
            if s != t && !local_edges.contains(&(s, t)) {
                local_edges.push((s, t));
            }
        }
    }

    let positions = match params.algorithm {
        Algorithm::Dagre => dagre::arrange(&boxes, &local_edges, params),
        Algorithm::Sugiyama => sugiyama::arrange(&boxes, &local_edges, params),
    };

    let origin = if container.is_some() {
        (NEST_PADDING, NEST_PADDING + NEST_HEADER)
    } else {
        (CANVAS_MARGIN, CANVAS_MARGIN)
    };
    let mut extent = (0.0f64, 0.0f64);
    for ((member, position), node) in members.iter().zip(&positions).zip(&boxes) {
        let (width, height) = nested_sizes
            .get(member)
            .copied()
            .unwrap_or((node.width, node.height));
        placed.push((
            member.clone(),
            Bounds::new(origin.0 + position.0, origin.1 + position.1, width, height),
        ));
        extent.0 = extent.0.max(position.0 + width);
        extent.1 = extent.1.max(position.1 + height);
    }
    extent
}

fn parent_of<'a>(
    id: &VisualId,
    children: &'a HashMap<Option<VisualId>, Vec<VisualId>>,
) -> Option<&'a VisualId> {
    for (parent, members) in children {
        if members.contains(id) {
            return parent.as_ref();
        }
    }
    None
}

/// Longest-path ranks over a possibly cyclic digraph.
///
/// Cycles are collapsed via strongly connected components; every node of an
/// SCC shares the component's rank, which keeps the pass total and
/// deterministic.
pub(crate) fn longest_path_ranks(node_count: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<_> = (0..node_count).map(|i| graph.add_node(i)).collect();
    for &(s, t) in edges {
        graph.add_edge(nodes[s], nodes[t], ());
    }

    let dag = condensation(graph, true);
    let order = toposort(&dag, None).expect("condensation is acyclic");

    let mut component_rank = vec![0usize; dag.node_count()];
    for &component in &order {
        let rank = dag
            .neighbors_directed(component, petgraph::Direction::Incoming)
            .map(|p| component_rank[p.index()] + 1)
            .max()
            .unwrap_or(0);
        component_rank[component.index()] = rank;
    }

    let mut ranks = vec![0usize; node_count];
    for component in dag.node_indices() {
        for &member in &dag[component] {
            ranks[member] = component_rank[component.index()];
        }
    }
    ranks
}

/// Group node indices by rank, ranks ascending, stable within a rank
pub(crate) fn rank_layers(ranks: &[usize]) -> Vec<Vec<usize>> {
    let max_rank = ranks.iter().copied().max().unwrap_or(0);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); max_rank + 1];
    for (node, &rank) in ranks.iter().enumerate() {
        layers[rank].push(node);
    }
    layers
}

/// Transform layered coordinates into the requested rank direction.
///
/// Layer offsets run along the primary axis, in-layer offsets along the
/// cross axis; `extent` is the total primary-axis span.
pub(crate) fn apply_rankdir(
    rankdir: RankDir,
    primary: f64,
    cross: f64,
    extent: f64,
    size: NodeBox,
) -> (f64, f64) {
    match rankdir {
        RankDir::TB => (cross, primary),
        RankDir::BT => (cross, extent - primary - size.height),
        RankDir::LR => (primary, cross),
        RankDir::RL => (extent - primary - size.width, cross),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_gets_increasing_ranks() {
        let ranks = longest_path_ranks(3, &[(0, 1), (1, 2)]);
        assert_eq!(ranks, vec![0, 1, 2]);
    }

    #[test]
    fn cycle_members_share_a_rank() {
        let ranks = longest_path_ranks(3, &[(0, 1), (1, 0), (1, 2)]);
        assert_eq!(ranks[0], ranks[1]);
        assert_eq!(ranks[2], ranks[1] + 1);
    }

    #[test]
    fn diamond_ranks_by_longest_path() {
        // 0 → 1 → 3, 0 → 2 → 3 plus 1 → 2 stretches 2 and 3
        let ranks = longest_path_ranks(4, &[(0, 1), (0, 2), (1, 2), (1, 3), (2, 3)]);
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }
}
