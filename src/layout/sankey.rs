// Nodes are layered into columns by distance from the sources, sized by the
// flow through them, then relaxed vertically to straighten links.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{NodeAlign, Orientation, SankeyConfig};
use crate::ir::{FlowGraph, FlowNode, NodeKey};

use super::error::{Error, Result};

const RELAX_DECAY: f64 = 0.99;
const COLLISION_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SankeyNode {
    pub index: usize,
    pub key: NodeKey,
    pub label: String,
    pub fixed_value: Option<f64>,
    /// Outgoing link indices, in link-sort order.
    pub source_links: Vec<usize>,
    /// Incoming link indices, in link-sort order.
    pub target_links: Vec<usize>,
    pub value: f64,
    pub depth: usize,
    pub height: usize,
    pub layer: usize,
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

impl SankeyNode {
    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }
}

/// A laid out link.
///
/// `(x0, y0)` is where the band leaves its source and `(x1, y1)` where it
/// enters its target, measured at the centre of the band.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SankeyLink {
    pub index: usize,
    pub source: usize,
    pub target: usize,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub width: f64,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl SankeyLink {
    /// Cubic ribbon centre line, stroked with `width` to draw the band.
    pub fn path(&self, orientation: Orientation) -> String {
        match orientation {
            Orientation::Horizontal => {
                let mx = (self.x0 + self.x1) / 2.0;
                format!(
                    "M{:.3},{:.3}C{:.3},{:.3},{:.3},{:.3},{:.3},{:.3}",
                    self.x0, self.y0, mx, self.y0, mx, self.y1, self.x1, self.y1
                )
            }
            Orientation::Vertical => {
                let my = (self.y0 + self.y1) / 2.0;
                format!(
                    "M{:.3},{:.3}C{:.3},{:.3},{:.3},{:.3},{:.3},{:.3}",
                    self.x0, self.y0, self.x0, my, self.x1, my, self.x1, self.y1
                )
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SankeyGraph {
    pub nodes: Vec<SankeyNode>,
    pub links: Vec<SankeyLink>,
}

impl SankeyGraph {
    pub fn node(&self, key: &NodeKey) -> Option<&SankeyNode> {
        self.nodes.iter().find(|node| &node.key == key)
    }

    pub fn column_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| node.layer + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Layout bounds `[[x0, y0], [x1, y1]]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Extent {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::from_size(1.0, 1.0)
    }
}

pub type NodeIdFn = fn(&FlowNode, usize, &[FlowNode]) -> NodeKey;
pub type AlignFn = fn(&SankeyNode, usize) -> i64;
pub type NodeCompare = fn(&SankeyNode, &SankeyNode) -> Ordering;
pub type LinkCompare = fn(&SankeyLink, &SankeyLink) -> Ordering;

/// How link endpoints are matched against nodes.
#[derive(Clone, Copy, Default)]
pub enum NodeId {
    /// Position in the node list.
    #[default]
    Index,
    /// The node's `id`, falling back to its position when it has none.
    Key,
    Custom(NodeIdFn),
}

impl NodeId {
    fn key(&self, node: &FlowNode, index: usize, nodes: &[FlowNode]) -> NodeKey {
        match self {
            Self::Index => NodeKey::Index(index),
            Self::Key => node
                .id
                .clone()
                .map(NodeKey::Name)
                .unwrap_or(NodeKey::Index(index)),
            Self::Custom(id) => id(node, index, nodes),
        }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => f.write_str("Index"),
            Self::Key => f.write_str("Key"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Order of the nodes within a column.
#[derive(Clone, Copy, Default)]
pub enum NodeOrder {
    /// Re-sorted by breadth after every relaxation sweep.
    #[default]
    Breadth,
    /// Input order, kept through relaxation.
    Input,
    /// Sorted once by the comparator, then kept.
    Custom(NodeCompare),
}

impl fmt::Debug for NodeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Breadth => f.write_str("Breadth"),
            Self::Input => f.write_str("Input"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Clone, Copy)]
pub enum Alignment {
    Named(NodeAlign),
    Custom(AlignFn),
}

impl fmt::Debug for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(align) => f.debug_tuple("Named").field(align).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<NodeAlign> for Alignment {
    fn from(align: NodeAlign) -> Self {
        Self::Named(align)
    }
}

/// Configured flow layout. Building one is cheap; `compute` can be called
/// any number of times and never touches its input.
#[derive(Clone)]
pub struct SankeyLayout {
    config: SankeyConfig,
    extent: Extent,
    id: NodeId,
    align: Alignment,
    order: NodeOrder,
    link_sort: Option<LinkCompare>,
}

impl fmt::Debug for SankeyLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SankeyLayout")
            .field("config", &self.config)
            .field("extent", &self.extent)
            .field("id", &self.id)
            .field("align", &self.align)
            .field("order", &self.order)
            .field("link_sort", &self.link_sort.is_some())
            .finish()
    }
}

impl Default for SankeyLayout {
    fn default() -> Self {
        Self::new(SankeyConfig::default())
    }
}

impl SankeyLayout {
    pub fn new(config: SankeyConfig) -> Self {
        let order = if config.keep_node_order {
            NodeOrder::Input
        } else {
            NodeOrder::Breadth
        };
        Self {
            extent: Extent::from_size(config.width, config.height),
            align: Alignment::Named(config.node_align),
            config,
            id: NodeId::default(),
            order,
            link_sort: None,
        }
    }

    pub fn config(&self) -> &SankeyConfig {
        &self.config
    }

    pub fn extent_bounds(&self) -> Extent {
        self.extent
    }

    pub fn node_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    pub fn align(mut self, align: impl Into<Alignment>) -> Self {
        self.align = align.into();
        self
    }

    pub fn node_sort(mut self, order: NodeOrder) -> Self {
        self.order = order;
        self
    }

    pub fn link_sort(mut self, sort: Option<LinkCompare>) -> Self {
        self.link_sort = sort;
        self
    }

    pub fn node_width(mut self, width: f64) -> Self {
        self.config.node_width = width;
        self
    }

    pub fn node_padding(mut self, padding: f64) -> Self {
        self.config.node_padding = padding;
        self
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    pub fn show_links(mut self, show: bool) -> Self {
        self.config.show_links = show;
        self
    }

    pub fn compare_nodes(mut self, compare: bool) -> Self {
        self.config.compare_nodes = compare;
        self
    }

    /// Vertical layouts are computed left to right and then transposed, so
    /// the extent is read with its axes swapped.
    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.config.orientation = orientation;
        self
    }

    pub fn extent(mut self, extent: Extent) -> Self {
        self.extent = extent;
        self
    }

    pub fn size(self, width: f64, height: f64) -> Self {
        self.extent(Extent::from_size(width, height))
    }

    pub fn compute(&self, input: &FlowGraph) -> Result<SankeyGraph> {
        let mut graph = self.compute_node_links(input)?;
        compute_node_values(&mut graph)?;
        assign_ranks(&mut graph, Rank::Depth)?;
        assign_ranks(&mut graph, Rank::Height)?;
        if graph.nodes.is_empty() {
            return Ok(graph);
        }
        let columns = self.compute_node_layers(&mut graph);
        tracing::trace!(columns = columns.len(), "assigned node layers");
        self.compute_node_breadths(&mut graph, columns);
        if self.config.orientation == Orientation::Vertical {
            flip_nodes_vertical(&mut graph);
        }
        self.update(&mut graph);
        tracing::debug!(
            nodes = graph.nodes.len(),
            links = graph.links.len(),
            "computed sankey layout"
        );
        Ok(graph)
    }

    /// Recomputes link endpoints after node positions changed.
    pub fn update(&self, graph: &mut SankeyGraph) {
        match self.config.orientation {
            Orientation::Horizontal => compute_link_breadths(graph),
            Orientation::Vertical => compute_link_breadths_vertical(graph),
        }
    }

    fn compute_node_links(&self, input: &FlowGraph) -> Result<SankeyGraph> {
        let mut nodes: Vec<SankeyNode> = input
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let key = self.id.key(node, index, &input.nodes);
                let label = node
                    .label
                    .clone()
                    .or_else(|| node.id.clone())
                    .unwrap_or_else(|| key.to_string());
                SankeyNode {
                    index,
                    key,
                    label,
                    fixed_value: node.fixed_value,
                    source_links: Vec::new(),
                    target_links: Vec::new(),
                    value: 0.0,
                    depth: 0,
                    height: 0,
                    layer: 0,
                    x0: 0.0,
                    x1: 0.0,
                    y0: 0.0,
                    y1: 0.0,
                }
            })
            .collect();
        // Later duplicates win, matching a map built in node order.
        let node_by_key: HashMap<NodeKey, usize> = nodes
            .iter()
            .map(|node| (node.key.clone(), node.index))
            .collect();
        let find = |key: &NodeKey| {
            node_by_key
                .get(key)
                .copied()
                .ok_or_else(|| Error::MissingNode(key.to_string()))
        };

        let mut links = Vec::with_capacity(input.links.len());
        for (index, link) in input.links.iter().enumerate() {
            let source = find(&link.source)?;
            let target = find(&link.target)?;
            if !link.value.is_finite() || link.value < 0.0 {
                return Err(Error::InvalidLinkValue {
                    index,
                    value: link.value,
                });
            }
            nodes[source].source_links.push(index);
            nodes[target].target_links.push(index);
            links.push(SankeyLink {
                index,
                source,
                target,
                value: link.value,
                group: link.group.clone(),
                width: 0.0,
                x0: 0.0,
                y0: 0.0,
                x1: 0.0,
                y1: 0.0,
            });
        }
        if let Some(compare) = self.link_sort {
            for node in &mut nodes {
                node.source_links
                    .sort_by(|&a, &b| compare(&links[a], &links[b]));
                node.target_links
                    .sort_by(|&a, &b| compare(&links[a], &links[b]));
            }
        }
        Ok(SankeyGraph { nodes, links })
    }

    fn compute_node_layers(&self, graph: &mut SankeyGraph) -> Vec<Vec<usize>> {
        let max_depth = graph.nodes.iter().map(|n| n.depth).max().unwrap_or(0);
        let column_count = max_depth + 1;
        let dx = self.config.node_width;
        let view: &SankeyGraph = graph;
        let layers: Vec<usize> = view
            .nodes
            .iter()
            .map(|node| self.column_for(node, column_count, view))
            .collect();

        let mut columns: Vec<Vec<usize>> = vec![Vec::new(); column_count];
        if self.config.show_links {
            let kx = if column_count > 1 {
                (self.extent.width() - dx) / (column_count - 1) as f64
            } else {
                0.0
            };
            for (node, &layer) in graph.nodes.iter_mut().zip(&layers) {
                node.layer = layer;
                node.x0 = self.extent.x0 + layer as f64 * kx;
                node.x1 = node.x0 + dx;
                columns[layer].push(node.index);
            }
        } else {
            // Without links the columns are packed two node widths apart and centred.
            let span = max_depth as f64 * 2.0 * dx;
            let left = self.extent.x0 + (self.extent.width() - span) / 2.0;
            for (node, &layer) in graph.nodes.iter_mut().zip(&layers) {
                node.layer = layer;
                node.x0 = left + layer as f64 * 2.0 * dx;
                node.x1 = node.x0 + dx;
                columns[layer].push(node.index);
            }
        }
        if let NodeOrder::Custom(compare) = self.order {
            for column in &mut columns {
                column.sort_by(|&a, &b| compare(&graph.nodes[a], &graph.nodes[b]));
            }
        }
        columns
    }

    fn column_for(&self, node: &SankeyNode, columns: usize, graph: &SankeyGraph) -> usize {
        let raw = match self.align {
            Alignment::Named(align) => named_column(align, node, columns, graph),
            Alignment::Custom(align) => align(node, columns),
        };
        raw.clamp(0, columns as i64 - 1) as usize
    }

    fn compute_node_breadths(&self, graph: &mut SankeyGraph, mut columns: Vec<Vec<usize>>) {
        let max_len = columns.iter().map(Vec::len).max().unwrap_or(0);
        let py = if max_len > 1 {
            self.config
                .node_padding
                .min(self.extent.height() / (max_len - 1) as f64)
        } else {
            self.config.node_padding
        };
        let mut relax = Relaxation {
            nodes: &mut graph.nodes,
            links: &mut graph.links,
            extent: self.extent,
            py,
            resort_links: self.link_sort.is_none(),
            resort_columns: matches!(self.order, NodeOrder::Breadth),
        };
        if self.config.compare_nodes {
            relax.align_to_baselines(&columns);
            return;
        }
        relax.initialize(&columns);
        let iterations = self.config.iterations;
        for i in 0..iterations {
            let alpha = RELAX_DECAY.powi(i as i32);
            let beta = (1.0 - alpha).max((i + 1) as f64 / iterations as f64);
            relax.right_to_left(&mut columns, alpha, beta);
            relax.left_to_right(&mut columns, alpha, beta);
        }
    }
}

fn named_column(align: NodeAlign, node: &SankeyNode, columns: usize, graph: &SankeyGraph) -> i64 {
    let last = columns as i64 - 1;
    match align {
        NodeAlign::Left => node.depth as i64,
        NodeAlign::Right => last - node.height as i64,
        NodeAlign::Justify => {
            if node.source_links.is_empty() {
                last
            } else {
                node.depth as i64
            }
        }
        NodeAlign::Center => {
            if !node.target_links.is_empty() {
                node.depth as i64
            } else if !node.source_links.is_empty() {
                node.source_links
                    .iter()
                    .map(|&l| graph.nodes[graph.links[l].target].depth as i64)
                    .min()
                    .unwrap_or(1)
                    - 1
            } else {
                0
            }
        }
    }
}

fn compute_node_values(graph: &mut SankeyGraph) -> Result<()> {
    let SankeyGraph { nodes, links } = graph;
    for node in nodes.iter_mut() {
        node.value = match node.fixed_value {
            Some(value) if !value.is_finite() || value < 0.0 => {
                return Err(Error::InvalidNodeValue {
                    index: node.index,
                    value,
                });
            }
            Some(value) => value,
            None => {
                let outgoing: f64 = node.source_links.iter().map(|&l| links[l].value).sum();
                let incoming: f64 = node.target_links.iter().map(|&l| links[l].value).sum();
                outgoing.max(incoming)
            }
        };
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Rank {
    Depth,
    Height,
}

/// Breadth-first layering: depth walks links forward, height backward.
fn assign_ranks(graph: &mut SankeyGraph, rank: Rank) -> Result<()> {
    let SankeyGraph { nodes, links } = graph;
    let n = nodes.len();
    let mut current: Vec<usize> = (0..n).collect();
    let mut x = 0;
    while !current.is_empty() {
        let mut queued = vec![false; n];
        let mut next = Vec::new();
        for &index in &current {
            let node = &mut nodes[index];
            let neighbours = match rank {
                Rank::Depth => {
                    node.depth = x;
                    &node.source_links
                }
                Rank::Height => {
                    node.height = x;
                    &node.target_links
                }
            };
            for &l in neighbours {
                let other = match rank {
                    Rank::Depth => links[l].target,
                    Rank::Height => links[l].source,
                };
                if !queued[other] {
                    queued[other] = true;
                    next.push(other);
                }
            }
        }
        x += 1;
        if x > n {
            return Err(Error::CircularLink);
        }
        current = next;
    }
    Ok(())
}

/// Mutable view over the graph while node breadths are being solved.
struct Relaxation<'a> {
    nodes: &'a mut [SankeyNode],
    links: &'a mut [SankeyLink],
    extent: Extent,
    py: f64,
    resort_links: bool,
    resort_columns: bool,
}

impl Relaxation<'_> {
    fn align_to_baselines(&mut self, columns: &[Vec<usize>]) {
        let rows = columns.iter().map(Vec::len).max().unwrap_or(0);
        let row_max: Vec<f64> = (0..rows)
            .map(|row| {
                columns
                    .iter()
                    .filter_map(|column| column.get(row))
                    .map(|&n| self.nodes[n].value)
                    .fold(0.0, |max, value| if value > max { value } else { max })
            })
            .collect();
        let total: f64 = row_max.iter().sum();
        let free = self.extent.height() - rows.saturating_sub(1) as f64 * self.py;
        let ky = if total > 0.0 { free / total } else { 0.0 };
        for column in columns {
            let mut y = self.extent.y0;
            for (row, &n) in column.iter().enumerate() {
                let node = &mut self.nodes[n];
                node.y1 = y + row_max[row] * ky;
                node.y0 = node.y1 - node.value * ky;
                y = node.y1 + self.py;
                for &l in &self.nodes[n].source_links {
                    self.links[l].width = self.links[l].value * ky;
                }
            }
        }
    }

    fn initialize(&mut self, columns: &[Vec<usize>]) {
        let ky = columns
            .iter()
            .filter_map(|column| {
                let total: f64 = column.iter().map(|&n| self.nodes[n].value).sum();
                (total > 0.0).then(|| {
                    (self.extent.height() - (column.len() as f64 - 1.0) * self.py) / total
                })
            })
            .fold(f64::INFINITY, f64::min);
        let ky = if ky.is_finite() { ky } else { 0.0 };

        for column in columns {
            let mut y = self.extent.y0;
            for &n in column {
                let node = &mut self.nodes[n];
                node.y0 = y;
                node.y1 = y + node.value * ky;
                y = node.y1 + self.py;
                for &l in &self.nodes[n].source_links {
                    self.links[l].width = self.links[l].value * ky;
                }
            }
            let spacing = (self.extent.y1 - y + self.py) / (column.len() + 1) as f64;
            for (i, &n) in column.iter().enumerate() {
                let shift = spacing * (i + 1) as f64;
                self.nodes[n].y0 += shift;
                self.nodes[n].y1 += shift;
            }
            self.reorder_links(column);
        }
    }

    /// Pulls each node towards the weighted centre of its incoming links.
    fn left_to_right(&mut self, columns: &mut [Vec<usize>], alpha: f64, beta: f64) {
        for column in columns.iter_mut().skip(1) {
            for &target in column.iter() {
                let mut y = 0.0;
                let mut w = 0.0;
                for &l in &self.nodes[target].target_links {
                    let link = &self.links[l];
                    let v = link.value
                        * (self.nodes[target].layer as f64 - self.nodes[link.source].layer as f64);
                    y += self.target_top(link.source, target) * v;
                    w += v;
                }
                if !(w > 0.0) {
                    continue;
                }
                let dy = (y / w - self.nodes[target].y0) * alpha;
                self.nodes[target].y0 += dy;
                self.nodes[target].y1 += dy;
                self.reorder_node_links(target);
            }
            if self.resort_columns {
                self.sort_by_breadth(column);
            }
            self.resolve_collisions(column, beta);
        }
    }

    /// Pulls each node towards the weighted centre of its outgoing links.
    fn right_to_left(&mut self, columns: &mut [Vec<usize>], alpha: f64, beta: f64) {
        let count = columns.len();
        for column in columns.iter_mut().take(count.saturating_sub(1)).rev() {
            for &source in column.iter() {
                let mut y = 0.0;
                let mut w = 0.0;
                for &l in &self.nodes[source].source_links {
                    let link = &self.links[l];
                    let v = link.value
                        * (self.nodes[link.target].layer as f64 - self.nodes[source].layer as f64);
                    y += self.source_top(source, link.target) * v;
                    w += v;
                }
                if !(w > 0.0) {
                    continue;
                }
                let dy = (y / w - self.nodes[source].y0) * alpha;
                self.nodes[source].y0 += dy;
                self.nodes[source].y1 += dy;
                self.reorder_node_links(source);
            }
            if self.resort_columns {
                self.sort_by_breadth(column);
            }
            self.resolve_collisions(column, beta);
        }
    }

    fn sort_by_breadth(&self, column: &mut [usize]) {
        column.sort_by(|&a, &b| cmp_f64(self.nodes[a].y0, self.nodes[b].y0));
    }

    fn resolve_collisions(&mut self, column: &[usize], alpha: f64) {
        if column.is_empty() {
            return;
        }
        let mid = column.len() >> 1;
        let subject = &self.nodes[column[mid]];
        let (above, below) = (subject.y0 - self.py, subject.y1 + self.py);
        self.push_up(&column[..mid], above, alpha);
        self.push_down(&column[mid + 1..], below, alpha);
        self.push_up(column, self.extent.y1, alpha);
        self.push_down(column, self.extent.y0, alpha);
    }

    /// Walks `nodes` top to bottom, pushing each below `y`.
    fn push_down(&mut self, nodes: &[usize], mut y: f64, alpha: f64) {
        for &n in nodes {
            let node = &mut self.nodes[n];
            let dy = (y - node.y0) * alpha;
            if dy > COLLISION_EPSILON {
                node.y0 += dy;
                node.y1 += dy;
            }
            y = node.y1 + self.py;
        }
    }

    /// Walks `nodes` bottom to top, pushing each above `y`.
    fn push_up(&mut self, nodes: &[usize], mut y: f64, alpha: f64) {
        for &n in nodes.iter().rev() {
            let node = &mut self.nodes[n];
            let dy = (node.y1 - y) * alpha;
            if dy > COLLISION_EPSILON {
                node.y0 -= dy;
                node.y1 -= dy;
            }
            y = node.y0 - self.py;
        }
    }

    /// Where the band from `source` would enter `target` if the target's
    /// incoming links were stacked from the source's outgoing order.
    fn target_top(&self, source: usize, target: usize) -> f64 {
        let src = &self.nodes[source];
        let mut y = src.y0 - (src.source_links.len() as f64 - 1.0) * self.py / 2.0;
        for &l in &src.source_links {
            let link = &self.links[l];
            if link.target == target {
                break;
            }
            y += link.width + self.py;
        }
        for &l in &self.nodes[target].target_links {
            let link = &self.links[l];
            if link.source == source {
                break;
            }
            y -= link.width;
        }
        y
    }

    fn source_top(&self, source: usize, target: usize) -> f64 {
        let tgt = &self.nodes[target];
        let mut y = tgt.y0 - (tgt.target_links.len() as f64 - 1.0) * self.py / 2.0;
        for &l in &tgt.target_links {
            let link = &self.links[l];
            if link.source == source {
                break;
            }
            y += link.width + self.py;
        }
        for &l in &self.nodes[source].source_links {
            let link = &self.links[l];
            if link.target == target {
                break;
            }
            y -= link.width;
        }
        y
    }

    fn reorder_node_links(&mut self, node: usize) {
        if !self.resort_links {
            return;
        }
        let sources: Vec<usize> = self.nodes[node]
            .target_links
            .iter()
            .map(|&l| self.links[l].source)
            .collect();
        for source in sources {
            self.sort_outgoing(source);
        }
        let targets: Vec<usize> = self.nodes[node]
            .source_links
            .iter()
            .map(|&l| self.links[l].target)
            .collect();
        for target in targets {
            self.sort_incoming(target);
        }
    }

    fn reorder_links(&mut self, column: &[usize]) {
        if !self.resort_links {
            return;
        }
        for &node in column {
            self.sort_outgoing(node);
            self.sort_incoming(node);
        }
    }

    fn sort_outgoing(&mut self, node: usize) {
        let mut order = std::mem::take(&mut self.nodes[node].source_links);
        order.sort_by(|&a, &b| {
            let (a, b) = (&self.links[a], &self.links[b]);
            cmp_f64(self.nodes[a.target].y0, self.nodes[b.target].y0)
                .then(a.index.cmp(&b.index))
        });
        self.nodes[node].source_links = order;
    }

    fn sort_incoming(&mut self, node: usize) {
        let mut order = std::mem::take(&mut self.nodes[node].target_links);
        order.sort_by(|&a, &b| {
            let (a, b) = (&self.links[a], &self.links[b]);
            cmp_f64(self.nodes[a.source].y0, self.nodes[b.source].y0)
                .then(a.index.cmp(&b.index))
        });
        self.nodes[node].target_links = order;
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn flip_nodes_vertical(graph: &mut SankeyGraph) {
    for node in &mut graph.nodes {
        std::mem::swap(&mut node.x0, &mut node.y0);
        std::mem::swap(&mut node.x1, &mut node.y1);
    }
}

fn compute_link_breadths(graph: &mut SankeyGraph) {
    let SankeyGraph { nodes, links } = graph;
    for node in nodes.iter() {
        let mut y0 = node.y0;
        for &l in &node.source_links {
            let link = &mut links[l];
            link.x0 = node.x1;
            link.y0 = y0 + link.width / 2.0;
            y0 += link.width;
        }
        let mut y1 = node.y0;
        for &l in &node.target_links {
            let link = &mut links[l];
            link.x1 = node.x0;
            link.y1 = y1 + link.width / 2.0;
            y1 += link.width;
        }
    }
}

fn compute_link_breadths_vertical(graph: &mut SankeyGraph) {
    let SankeyGraph { nodes, links } = graph;
    for node in nodes.iter() {
        let mut x0 = node.x0;
        for &l in &node.source_links {
            let link = &mut links[l];
            link.y0 = node.y1;
            link.x0 = x0 + link.width / 2.0;
            x0 += link.width;
        }
        let mut x1 = node.x0;
        for &l in &node.target_links {
            let link = &mut links[l];
            link.y1 = node.y0;
            link.x1 = x1 + link.width / 2.0;
            x1 += link.width;
        }
    }
}
