//! Sugiyama-style hierarchical layout
//!
//! Same layering as the dagre pass but with median ordering, more sweeps
//! and a neighbor-aligning compaction step. Holds up better on
//! relationship-dense graphs where plain barycenter ordering oscillates.

use std::collections::HashMap;

use super::{LayoutParams, NodeBox, RankDir, apply_rankdir, longest_path_ranks, rank_layers};

const ORDERING_SWEEPS: usize = 8;

pub(crate) fn arrange(
    boxes: &[NodeBox],
    edges: &[(usize, usize)],
    params: &LayoutParams,
) -> Vec<(f64, f64)> {
    if boxes.is_empty() {
        return Vec::new();
    }
    let ranks = longest_path_ranks(boxes.len(), edges);
    let mut layers = rank_layers(&ranks);
    order_by_median(&mut layers, edges, ORDERING_SWEEPS);
    assign_compacted_coordinates(&layers, boxes, edges, params)
}

/// Median-of-neighbors ordering; medians are less sensitive to outlier
/// neighbors than barycenters on dense layers.
fn order_by_median(layers: &mut [Vec<usize>], edges: &[(usize, usize)], sweeps: usize) {
    for sweep in 0..sweeps {
        let down = sweep % 2 == 0;
        let indices: Vec<usize> = if down {
            (1..layers.len()).collect()
        } else {
            (0..layers.len().saturating_sub(1)).rev().collect()
        };
        for layer_index in indices {
            let reference = if down { layer_index - 1 } else { layer_index + 1 };
            let reference_pos: HashMap<usize, usize> = layers[reference]
                .iter()
                .enumerate()
                .map(|(i, &n)| (n, i))
                .collect();
            let mut keyed: Vec<(f64, usize)> = layers[layer_index]
                .iter()
                .enumerate()
                .map(|(current, &node)| {
                    let mut neighbor_positions: Vec<usize> = edges
                        .iter()
                        .filter_map(|&(s, t)| {
                            if down {
                                (t == node).then(|| reference_pos.get(&s))
                            } else {
                                (s == node).then(|| reference_pos.get(&t))
                            }
                            .flatten()
                            .copied()
                        })
                        .collect();
                    neighbor_positions.sort_unstable();
                    let key = if neighbor_positions.is_empty() {
                        current as f64
                    } else {
                        neighbor_positions[neighbor_positions.len() / 2] as f64
                    };
                    (key, node)
                })
                .collect();
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
            layers[layer_index] = keyed.into_iter().map(|(_, n)| n).collect();
        }
    }
}

/// Coordinate assignment with a compaction pass: each node pulls toward
/// the mean center of its neighbors while keeping nodesep separation
/// within its layer.
fn assign_compacted_coordinates(
    layers: &[Vec<usize>],
    boxes: &[NodeBox],
    edges: &[(usize, usize)],
    params: &LayoutParams,
) -> Vec<(f64, f64)> {
    let vertical = matches!(params.rankdir, RankDir::TB | RankDir::BT);
    let primary_size = |b: &NodeBox| if vertical { b.height } else { b.width };
    let cross_size = |b: &NodeBox| if vertical { b.width } else { b.height };

    // Initial sequential cross offsets
    let mut cross: Vec<f64> = vec![0.0; boxes.len()];
    for layer in layers {
        let mut offset = 0.0;
        for &node in layer {
            cross[node] = offset;
            offset += cross_size(&boxes[node]) + params.nodesep;
        }
    }

    // Pull nodes toward their neighbors' centers, two rounds, preserving
    // in-layer order and minimum separation left-to-right
    for _ in 0..2 {
        for layer in layers {
            let desired: Vec<f64> = layer
                .iter()
                .map(|&node| {
                    let centers: Vec<f64> = edges
                        .iter()
                        .filter_map(|&(s, t)| {
                            let other = if s == node {
                                Some(t)
                            } else if t == node {
                                Some(s)
                            } else {
                                None
                            }?;
                            Some(cross[other] + cross_size(&boxes[other]) / 2.0)
                        })
                        .collect();
                    if centers.is_empty() {
                        cross[node] + cross_size(&boxes[node]) / 2.0
                    } else {
                        centers.iter().sum::<f64>() / centers.len() as f64
                    }
                })
                .collect();
            let mut floor = f64::NEG_INFINITY;
            for (&node, &center) in layer.iter().zip(&desired) {
                let half = cross_size(&boxes[node]) / 2.0;
                let target = (center - half).max(floor);
                cross[node] = target;
                floor = target + cross_size(&boxes[node]) + params.nodesep;
            }
        }
    }

    // Normalize so the leftmost node sits at 0
    let min_cross = cross
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
        .min(0.0);
    for value in &mut cross {
        *value -= min_cross;
    }

    let mut primary_offsets = Vec::with_capacity(layers.len());
    let mut offset = 0.0;
    for layer in layers {
        primary_offsets.push(offset);
        let depth = layer
            .iter()
            .map(|&n| primary_size(&boxes[n]))
            .fold(0.0, f64::max);
        offset += depth + params.ranksep;
    }
    let extent = (offset - params.ranksep).max(0.0);

    let mut positions = vec![(0.0, 0.0); boxes.len()];
    for (layer_index, layer) in layers.iter().enumerate() {
        for &node in layer {
            positions[node] = apply_rankdir(
                params.rankdir,
                primary_offsets[layer_index],
                cross[node],
                extent,
                boxes[node],
            );
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Algorithm;

    fn square(n: usize) -> Vec<NodeBox> {
        vec![NodeBox { width: 100.0, height: 50.0 }; n]
    }

    fn params() -> LayoutParams {
        LayoutParams {
            algorithm: Algorithm::Sugiyama,
            ..Default::default()
        }
    }

    #[test]
    fn layers_keep_rank_separation() {
        let positions = arrange(&square(3), &[(0, 1), (1, 2)], &params());
        assert!(positions[1].1 - positions[0].1 >= 50.0);
        assert!(positions[2].1 - positions[1].1 >= 50.0);
    }

    #[test]
    fn in_layer_separation_is_kept_after_compaction() {
        // Two parents sharing two children: compaction pulls everyone to
        // the middle, separation must survive
        let positions = arrange(
            &square(4),
            &[(0, 2), (0, 3), (1, 2), (1, 3)],
            &params(),
        );
        let gap = (positions[2].0 - positions[3].0).abs();
        assert!(gap >= 100.0 + LayoutParams::default().nodesep);
    }

    #[test]
    fn child_centers_under_its_parents() {
        let positions = arrange(&square(3), &[(0, 2), (1, 2)], &params());
        let parent_span = (positions[0].0 + 50.0, positions[1].0 + 50.0);
        let mid = (parent_span.0 + parent_span.1) / 2.0;
        let child_center = positions[2].0 + 50.0;
        assert!((child_center - mid).abs() < 60.0);
    }
}
