#[cfg(feature = "png")]
use crate::config::RenderConfig;
use crate::layout::{Layout, NodeLabel};
use crate::theme::Theme;
use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

pub fn render_svg(layout: &Layout, theme: &Theme) -> String {
    let mut svg = String::new();
    let width = layout.width;
    let height = layout.height;

    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    );
    let _ = write!(
        svg,
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    );

    svg.push_str("<g class=\"links\" fill=\"none\">");
    for link in &layout.graph.links {
        if link.width <= 0.0 {
            continue;
        }
        let _ = write!(
            svg,
            "<path d=\"{}\" stroke=\"{}\" stroke-opacity=\"{}\" stroke-width=\"{:.3}\"/>",
            link.path(layout.orientation),
            theme.node_color(link.source),
            theme.link_opacity,
            link.width
        );
    }
    svg.push_str("</g>");

    svg.push_str("<g class=\"nodes\">");
    for node in &layout.graph.nodes {
        let _ = write!(
            svg,
            "<rect x=\"{:.3}\" y=\"{:.3}\" width=\"{:.3}\" height=\"{:.3}\" fill=\"{}\"",
            node.x0,
            node.y0,
            node.x1 - node.x0,
            node.y1 - node.y0,
            theme.node_color(node.index)
        );
        if theme.node_stroke_width > 0.0 {
            let _ = write!(
                svg,
                " stroke=\"{}\" stroke-width=\"{}\"",
                theme.node_stroke, theme.node_stroke_width
            );
        }
        let _ = write!(svg, "><title>{}</title></rect>", escape_xml(&node.label));
    }
    svg.push_str("</g>");

    svg.push_str("<g class=\"labels\">");
    for label in layout.labels.iter().filter(|l| l.placement.visible) {
        svg.push_str(&label_svg(label, theme));
    }
    svg.push_str("</g>");

    svg.push_str("</svg>");
    svg
}

fn label_svg(label: &NodeLabel, theme: &Theme) -> String {
    let placement = &label.placement;
    format!(
        "<text x=\"{:.3}\" y=\"{:.3}\" text-anchor=\"{}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
        placement.x,
        placement.text_y(),
        placement.text_anchor.as_str(),
        escape_xml(&theme.font_family),
        label.font_size,
        theme.label_color,
        escape_xml(&label.text)
    )
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(
    svg: &str,
    output: &Path,
    render_cfg: &RenderConfig,
    theme: &Theme,
) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme
        .font_family
        .split(',')
        .next()
        .map(|family| family.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| "sans-serif".to_string());
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;
    if let Some(color) = parse_background(&render_cfg.background) {
        pixmap.fill(color);
    }

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(feature = "png")]
fn parse_background(value: &str) -> Option<resvg::tiny_skia::Color> {
    let value = value.trim();
    match value.to_ascii_lowercase().as_str() {
        "white" => return Some(resvg::tiny_skia::Color::WHITE),
        "black" => return Some(resvg::tiny_skia::Color::BLACK),
        "transparent" | "none" => return None,
        _ => {}
    }
    let hex = value.strip_prefix('#')?;
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        6 => Some(resvg::tiny_skia::Color::from_rgba8(
            channel(0)?,
            channel(2)?,
            channel(4)?,
            255,
        )),
        8 => Some(resvg::tiny_skia::Color::from_rgba8(
            channel(0)?,
            channel(2)?,
            channel(4)?,
            channel(6)?,
        )),
        _ => None,
    }
}

pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::FlowGraph;
    use crate::layout::compute_layout;

    fn sample_layout() -> Layout {
        let mut graph = FlowGraph::new();
        graph.connect("Wind & Solar", "Grid", 5.0);
        graph.connect("Grid", "Homes", 3.0);
        graph.connect("Grid", "Losses", 0.0);
        let mut config = Config::default();
        config.labels.fast_text_metrics = true;
        compute_layout(&graph, &config).unwrap()
    }

    #[test]
    fn render_svg_basic() {
        let layout = sample_layout();
        let svg = render_svg(&layout, &Theme::modern());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<rect x=").count(), layout.graph.nodes.len());
        assert!(svg.contains("Wind &amp; Solar"));
        assert!(svg.contains("stroke-opacity=\"0.3\""));
    }

    #[test]
    fn zero_width_links_are_skipped() {
        let layout = sample_layout();
        let svg = render_svg(&layout, &Theme::modern());
        assert_eq!(svg.matches("<path ").count(), 2);
    }

    #[test]
    fn hidden_labels_are_not_drawn() {
        let mut layout = sample_layout();
        let visible = layout.labels.iter().filter(|l| l.placement.visible).count();
        let svg = render_svg(&layout, &Theme::modern());
        assert_eq!(svg.matches("<text ").count(), visible);
        for label in &mut layout.labels {
            label.placement.visible = false;
        }
        let svg = render_svg(&layout, &Theme::modern());
        assert_eq!(svg.matches("<text ").count(), 0);
    }

    #[test]
    fn classic_theme_strokes_nodes() {
        let svg = render_svg(&sample_layout(), &Theme::classic());
        assert!(svg.contains("stroke=\"#333333\""));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("<a & 'b'>"), "&lt;a &amp; &apos;b&apos;&gt;");
    }
}
