//! Dagre-style layered layout
//!
//! Longest-path ranking, barycenter ordering sweeps, then simple
//! center-aligned coordinate assignment per rank.

use super::{LayoutParams, NodeBox, apply_rankdir, longest_path_ranks, rank_layers, RankDir};

const ORDERING_SWEEPS: usize = 4;

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
    order_by_barycenter(&mut layers, edges, ORDERING_SWEEPS);
    assign_coordinates(&layers, boxes, params)
}

/// Reduce crossings: order each layer by the mean position of its
/// neighbors in the adjacent layer, sweeping down then up.
pub(super) fn order_by_barycenter(
    layers: &mut [Vec<usize>],
    edges: &[(usize, usize)],
    sweeps: usize,
) {
    for sweep in 0..sweeps {
        let down = sweep % 2 == 0;
        let indices: Vec<usize> = if down {
            (1..layers.len()).collect()
        } else {
            (0..layers.len().saturating_sub(1)).rev().collect()
        };
        for layer_index in indices {
            let reference = if down { layer_index - 1 } else { layer_index + 1 };
            let reference_pos: std::collections::HashMap<usize, usize> = layers[reference]
                .iter()
                .enumerate()
                .map(|(i, &n)| (n, i))
                .collect();
            let mut keyed: Vec<(f64, usize)> = layers[layer_index]
                .iter()
                .map(|&node| {
                    let neighbor_positions: Vec<f64> = edges
                        .iter()
                        .filter_map(|&(s, t)| {
                            if down {
                                (t == node).then(|| reference_pos.get(&s))
                            } else {
                                (s == node).then(|| reference_pos.get(&t))
                            }
                            .flatten()
                            .map(|&p| p as f64)
                        })
                        .collect();
                    let key = if neighbor_positions.is_empty() {
                        // Keep unconnected nodes where they are
                        layers[layer_index].iter().position(|&n| n == node).unwrap() as f64
                    } else {
                        neighbor_positions.iter().sum::<f64>() / neighbor_positions.len() as f64
                    };
                    (key, node)
                })
                .collect();
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
            layers[layer_index] = keyed.into_iter().map(|(_, n)| n).collect();
        }
    }
}

fn assign_coordinates(
    layers: &[Vec<usize>],
    boxes: &[NodeBox],
    params: &LayoutParams,
) -> Vec<(f64, f64)> {
    let vertical = matches!(params.rankdir, RankDir::TB | RankDir::BT);
    let primary_size = |b: &NodeBox| if vertical { b.height } else { b.width };
    let cross_size = |b: &NodeBox| if vertical { b.width } else { b.height };

    // Cross-axis span of each layer; layers center on the widest
    let spans: Vec<f64> = layers
        .iter()
        .map(|layer| {
            let total: f64 = layer.iter().map(|&n| cross_size(&boxes[n])).sum();
            total + params.nodesep * layer.len().saturating_sub(1) as f64
        })
        .collect();
    let total_cross = spans.iter().copied().fold(0.0, f64::max);

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
        let mut cross = (total_cross - spans[layer_index]) / 2.0;
        for &node in layer {
            positions[node] = apply_rankdir(
                params.rankdir,
                primary_offsets[layer_index],
                cross,
                extent,
                boxes[node],
            );
            cross += cross_size(&boxes[node]) + params.nodesep;
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(n: usize) -> Vec<NodeBox> {
        vec![NodeBox { width: 100.0, height: 50.0 }; n]
    }

    #[test]
    fn chain_stacks_along_the_primary_axis() {
        let positions = arrange(&square(3), &[(0, 1), (1, 2)], &LayoutParams::default());
        // TB: ranks grow downward, same column
        assert!(positions[1].1 > positions[0].1);
        assert!(positions[2].1 > positions[1].1);
        assert_eq!(positions[0].0, positions[1].0);
    }

    #[test]
    fn siblings_are_separated_by_nodesep() {
        let params = LayoutParams::default();
        let positions = arrange(&square(3), &[(0, 1), (0, 2)], &params);
        let (a, b) = (positions[1], positions[2]);
        assert_eq!(a.1, b.1);
        assert!((a.0 - b.0).abs() >= 100.0 + params.nodesep);
    }

    #[test]
    fn lr_swaps_axes() {
        let params = LayoutParams {
            rankdir: RankDir::LR,
            ..Default::default()
        };
        let positions = arrange(&square(2), &[(0, 1)], &params);
        assert!(positions[1].0 > positions[0].0);
        assert_eq!(positions[0].1, positions[1].1);
    }

    #[test]
    fn bt_reverses_the_vertical_order() {
        let params = LayoutParams {
            rankdir: RankDir::BT,
            ..Default::default()
        };
        let positions = arrange(&square(2), &[(0, 1)], &params);
        assert!(positions[1].1 < positions[0].1);
    }
}
