#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod render;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LabelConfig, NodeAlign, Orientation, RenderConfig, SankeyConfig};
pub use ir::{FlowGraph, FlowLink, FlowNode, NodeKey, RecordAccessors};
pub use layout::{Layout, compute_layout};
pub use theme::Theme;

/// Lays out `graph` and renders it to an SVG document.
pub fn render_with_config(graph: &FlowGraph, config: &Config) -> layout::Result<String> {
    let layout = compute_layout(graph, config)?;
    Ok(render::render_svg(&layout, &config.theme))
}
