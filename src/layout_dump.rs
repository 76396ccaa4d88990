use crate::config::Orientation;
use crate::layout::{Anchor, Layout, PlacementStatus};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Flat, renderer-independent view of a computed layout.
#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub orientation: Orientation,
    pub width: f64,
    pub height: f64,
    pub extent: [f64; 4],
    pub nodes: Vec<NodeDump>,
    pub links: Vec<LinkDump>,
    pub labels: Vec<LabelDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub label: String,
    pub value: f64,
    pub depth: usize,
    pub height: usize,
    pub layer: usize,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

#[derive(Debug, Serialize)]
pub struct LinkDump {
    pub source: String,
    pub target: String,
    pub value: f64,
    pub group: Option<String>,
    pub width: f64,
    pub y0: f64,
    pub y1: f64,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct LabelDump {
    pub node: String,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub visible: bool,
    pub status: PlacementStatus,
    pub anchor: Option<Anchor>,
}

impl LayoutDump {
    pub fn from_layout(layout: &Layout) -> Self {
        let graph = &layout.graph;
        let node_id = |index: usize| {
            graph
                .nodes
                .get(index)
                .map(|node| node.key.to_string())
                .unwrap_or_default()
        };

        let nodes = graph
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.key.to_string(),
                label: node.label.clone(),
                value: node.value,
                depth: node.depth,
                height: node.height,
                layer: node.layer,
                x0: node.x0,
                y0: node.y0,
                x1: node.x1,
                y1: node.y1,
            })
            .collect();

        let links = graph
            .links
            .iter()
            .map(|link| LinkDump {
                source: node_id(link.source),
                target: node_id(link.target),
                value: link.value,
                group: link.group.clone(),
                width: link.width,
                y0: link.y0,
                y1: link.y1,
                path: link.path(layout.orientation),
            })
            .collect();

        let labels = layout
            .labels
            .iter()
            .map(|label| LabelDump {
                node: node_id(label.node),
                text: label.text.clone(),
                x: label.placement.x,
                y: label.placement.y,
                visible: label.placement.visible,
                status: label.placement.status,
                anchor: label.placement.anchor,
            })
            .collect();

        let extent = layout.extent;
        LayoutDump {
            orientation: layout.orientation,
            width: layout.width,
            height: layout.height,
            extent: [extent.x0, extent.y0, extent.x1, extent.y1],
            nodes,
            links,
            labels,
        }
    }
}

pub fn to_json_string(layout: &Layout) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&LayoutDump::from_layout(layout))
}

pub fn write_layout_dump(path: &Path, layout: &Layout) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::FlowGraph;
    use crate::layout::compute_layout;

    #[test]
    fn dump_names_link_endpoints_by_node_id() {
        let mut graph = FlowGraph::new();
        graph.connect("a", "b", 2.0);
        graph.connect("b", "c", 2.0);
        let mut config = Config::default();
        config.labels.fast_text_metrics = true;
        let layout = compute_layout(&graph, &config).unwrap();

        let dump = LayoutDump::from_layout(&layout);
        assert_eq!(dump.nodes.len(), 3);
        assert_eq!(dump.links[1].source, "b");
        assert_eq!(dump.links[1].target, "c");
        assert_eq!(dump.labels.len(), 3);
        assert_eq!(dump.extent, [50.0, 50.0, 700.0, 350.0]);

        let json: serde_json::Value =
            serde_json::from_str(&to_json_string(&layout).unwrap()).unwrap();
        assert_eq!(json["orientation"], "horizontal");
        assert_eq!(json["nodes"][0]["id"], "a");
        assert!(json["links"][0]["path"].as_str().unwrap().starts_with('M'));
    }
}
