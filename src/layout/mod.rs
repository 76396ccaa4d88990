pub mod bitmap;
pub mod error;
pub mod label_placement;
pub mod sankey;
mod text;

pub use bitmap::{CellRange, OccupancyBitmap, Region};
pub use error::{Error, Result};
pub use label_placement::{
    Anchor, AvoidMark, Baseline, BoundsScope, LabelCollisionOptions, LabelCollisionOutcome,
    LabelItem, LabelPlacement, MarkBounds, MarkShape, PlacementStatus, TextAnchor,
    resolve_label_collision,
};
pub use sankey::{
    Alignment, Extent, NodeId, NodeOrder, SankeyGraph, SankeyLayout, SankeyLink, SankeyNode,
};

use serde::Serialize;

use crate::config::{Config, LabelConfig, Orientation};
use crate::ir::FlowGraph;

/// A laid out chart: the flow graph plus its node labels, in canvas
/// coordinates. The chart extent sits inside the canvas, inset by the
/// render padding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub width: f64,
    pub height: f64,
    pub orientation: Orientation,
    pub extent: Extent,
    pub graph: SankeyGraph,
    pub labels: Vec<NodeLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLabel {
    pub node: usize,
    pub text: String,
    pub font_size: f64,
    pub placement: LabelPlacement,
}

pub fn compute_layout(graph: &FlowGraph, config: &Config) -> Result<Layout> {
    let padding = config.render.padding.max(0.0);
    let width = config.sankey.width + 2.0 * padding;
    let height = config.sankey.height + 2.0 * padding;
    let extent = Extent::new(
        padding,
        padding,
        padding + config.sankey.width,
        padding + config.sankey.height,
    );
    let layout_extent = match config.sankey.orientation {
        Orientation::Horizontal => extent,
        Orientation::Vertical => Extent::new(extent.y0, extent.x0, extent.y1, extent.x1),
    };
    let sankey = SankeyLayout::new(config.sankey.clone())
        .node_id(NodeId::Key)
        .extent(layout_extent)
        .compute(graph)?;
    let labels = if config.labels.enabled {
        place_node_labels(&sankey, config, width, height)?
    } else {
        Vec::new()
    };
    Ok(Layout {
        width,
        height,
        orientation: config.sankey.orientation,
        extent,
        graph: sankey,
        labels,
    })
}

fn node_mark_key(index: usize) -> String {
    format!("node-{index}")
}

/// Labels sit beside their node on the side facing the centre of the chart.
/// Both halves share one bitmap so the second pass sees the first's labels.
fn place_node_labels(
    graph: &SankeyGraph,
    config: &Config,
    width: f64,
    height: f64,
) -> Result<Vec<NodeLabel>> {
    let vertical = config.sankey.orientation == Orientation::Vertical;
    let marks = vec![
        graph
            .nodes
            .iter()
            .map(|node| {
                AvoidMark::rect(node.x0, node.y0, node.x1 - node.x0, node.y1 - node.y0)
                    .with_key(node_mark_key(node.index))
                    .filled()
            })
            .collect::<Vec<_>>(),
    ];
    let (leading, trailing): (Vec<&SankeyNode>, Vec<&SankeyNode>) =
        graph.nodes.iter().partition(|node| {
            let (cx, cy) = node.center();
            if vertical { cy < height / 2.0 } else { cx < width / 2.0 }
        });
    let (near, far) = if vertical {
        ([Anchor::Bottom, Anchor::Top], [Anchor::Top, Anchor::Bottom])
    } else {
        ([Anchor::Right, Anchor::Left], [Anchor::Left, Anchor::Right])
    };

    let label_config = &config.labels;
    let hide_only = label_config.hide_only;
    let items = |nodes: &[&SankeyNode], side: Anchor| -> Vec<LabelItem> {
        nodes
            .iter()
            .map(|node| {
                let item = if hide_only {
                    label_beside(node, side, label_config)
                } else {
                    let (cx, cy) = node.center();
                    LabelItem::new(node.label.clone(), cx, cy, label_config.font_size)
                };
                item.with_key(node_mark_key(node.index))
            })
            .collect()
    };
    // Hide-only passes test the label where it already sits.
    let options = |preferred: [Anchor; 2], suppress_mark_draw: bool| {
        let positions = if hide_only {
            vec![Anchor::Middle]
        } else {
            preferred.to_vec()
        };
        LabelCollisionOptions {
            offsets: vec![label_config.offset; positions.len()],
            positions,
            size: [width, height],
            padding: label_config.collision_padding,
            hide_only,
            remove_only: false,
            suppress_mark_draw,
            font_family: config.theme.font_family.clone(),
            fast_text_metrics: label_config.fast_text_metrics,
        }
    };

    let first = resolve_label_collision(
        &items(&leading[..], near[0]),
        &marks,
        None,
        &options(near, false),
    )?;
    let second = resolve_label_collision(
        &items(&trailing[..], far[0]),
        &marks,
        Some(first.bitmap),
        &options(far, true),
    )?;

    let mut labels: Vec<NodeLabel> = leading
        .iter()
        .zip(first.placements)
        .chain(trailing.iter().zip(second.placements))
        .map(|(node, placement)| NodeLabel {
            node: node.index,
            text: node.label.clone(),
            font_size: label_config.font_size,
            placement,
        })
        .collect();
    labels.sort_by_key(|label| label.node);
    Ok(labels)
}

/// Label anchored `offset` px off the `side` of its node, text box facing away.
fn label_beside(node: &SankeyNode, side: Anchor, labels: &LabelConfig) -> LabelItem {
    let (cx, cy) = node.center();
    let gap = labels.offset;
    let height = text::text_height(labels.font_size);
    let (x, y, text_anchor) = match side {
        Anchor::Right => (node.x1 + gap, cy + height / 2.0, TextAnchor::Start),
        Anchor::Left => (node.x0 - gap, cy + height / 2.0, TextAnchor::End),
        Anchor::Bottom => (cx, node.y1 + gap + height, TextAnchor::Middle),
        _ => (cx, node.y0 - gap, TextAnchor::Middle),
    };
    LabelItem {
        text_anchor,
        ..LabelItem::new(node.label.clone(), x, y, labels.font_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FlowNode;

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.labels.fast_text_metrics = true;
        config
    }

    fn energy_graph() -> FlowGraph {
        let mut graph = FlowGraph::new();
        for id in ["Coal", "Gas", "Power", "Homes", "Industry"] {
            graph.add_node(FlowNode::new(id));
        }
        graph.add_link("Coal", "Power", 30.0);
        graph.add_link("Gas", "Power", 20.0);
        graph.add_link("Power", "Homes", 22.0);
        graph.add_link("Power", "Industry", 28.0);
        graph
    }

    #[test]
    fn chart_is_inset_by_render_padding() {
        let config = fast_config();
        let layout = compute_layout(&energy_graph(), &config).unwrap();
        assert_eq!(layout.width, 750.0);
        assert_eq!(layout.height, 400.0);
        for node in &layout.graph.nodes {
            assert!(node.x0 >= 50.0 - 1e-6 && node.x1 <= 700.0 + 1e-6);
            assert!(node.y0 >= 50.0 - 1e-6 && node.y1 <= 350.0 + 1e-6);
        }
    }

    #[test]
    fn every_node_gets_a_label_facing_inwards() {
        let layout = compute_layout(&energy_graph(), &fast_config()).unwrap();
        assert_eq!(layout.labels.len(), 5);
        for label in &layout.labels {
            let node = &layout.graph.nodes[label.node];
            assert_eq!(label.text, node.label);
            assert_eq!(label.placement.status, PlacementStatus::Placed, "{}", label.text);
            if node.x1 < layout.width / 2.0 {
                assert_eq!(label.placement.anchor, Some(Anchor::Right));
                assert!(label.placement.x >= node.x1);
            } else {
                assert_eq!(label.placement.anchor, Some(Anchor::Left));
                assert!(label.placement.x <= node.x0);
            }
        }
    }

    #[test]
    fn hide_only_labels_are_drawn_where_they_were_tested() {
        for orientation in [Orientation::Horizontal, Orientation::Vertical] {
            let mut config = fast_config();
            config.labels.hide_only = true;
            config.sankey.orientation = orientation;
            let layout = compute_layout(&energy_graph(), &config).unwrap();
            let placed: Vec<_> = layout
                .labels
                .iter()
                .filter(|l| l.placement.status == PlacementStatus::Placed)
                .collect();
            assert!(!placed.is_empty(), "{orientation:?}");
            for label in placed {
                assert!(label.placement.visible);
                let region = label.placement.region();
                for node in &layout.graph.nodes {
                    let disjoint = region.x2 <= node.x0
                        || node.x1 <= region.x1
                        || region.y2 <= node.y0
                        || node.y1 <= region.y1;
                    assert!(disjoint, "{} covers node {}", label.text, node.label);
                }
            }
        }
    }

    #[test]
    fn vertical_chart_stays_on_canvas() {
        let mut config = fast_config();
        config.sankey.orientation = Orientation::Vertical;
        let layout = compute_layout(&energy_graph(), &config).unwrap();
        for node in &layout.graph.nodes {
            assert!(node.x0 >= 50.0 - 1e-6 && node.x1 <= 700.0 + 1e-6, "{node:?}");
            assert!(node.y0 >= 50.0 - 1e-6 && node.y1 <= 350.0 + 1e-6, "{node:?}");
        }
        let sinks = layout.graph.nodes.iter().filter(|n| n.height == 0);
        for sink in sinks {
            assert!((sink.y1 - 350.0).abs() < 1e-6, "sinks sit on the bottom edge");
        }
    }

    #[test]
    fn labels_can_be_disabled() {
        let mut config = fast_config();
        config.labels.enabled = false;
        let layout = compute_layout(&energy_graph(), &config).unwrap();
        assert!(layout.labels.is_empty());
    }

    #[test]
    fn layout_errors_propagate() {
        let mut graph = energy_graph();
        graph.add_link("Homes", "Coal", 1.0);
        assert_eq!(
            compute_layout(&graph, &fast_config()).unwrap_err(),
            Error::CircularLink
        );
    }
}
