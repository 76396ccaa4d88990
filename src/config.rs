use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Column alignment policy for the flow layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeAlign {
    #[default]
    Left,
    Right,
    Center,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SankeyConfig {
    pub node_width: f64,
    pub node_padding: f64,
    pub node_align: NodeAlign,
    pub iterations: usize,
    pub show_links: bool,
    pub compare_nodes: bool,
    /// Keep nodes in input order within their column instead of sorting
    /// them by breadth during relaxation.
    pub keep_node_order: bool,
    pub orientation: Orientation,
    pub width: f64,
    pub height: f64,
}

impl Default for SankeyConfig {
    fn default() -> Self {
        Self {
            node_width: 12.0,
            node_padding: 20.0,
            node_align: NodeAlign::Left,
            iterations: 6,
            show_links: true,
            compare_nodes: false,
            keep_node_order: false,
            orientation: Orientation::Horizontal,
            width: 650.0,
            height: 300.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelConfig {
    pub enabled: bool,
    /// Gap in px between a node and its label.
    pub offset: f64,
    pub hide_only: bool,
    pub collision_padding: f64,
    pub font_size: f64,
    pub fast_text_metrics: bool,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            offset: 4.0,
            hide_only: false,
            collision_padding: 1.0,
            font_size: 12.0,
            fast_text_metrics: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    /// Margin around the chart extent; labels may spill into it.
    pub padding: f64,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            padding: 50.0,
            background: "white".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub theme: Theme,
    pub sankey: SankeyConfig,
    pub labels: LabelConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    node_colors: Option<Vec<String>>,
    node_stroke: Option<String>,
    node_stroke_width: Option<f64>,
    link_opacity: Option<f64>,
    label_color: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SankeyConfigFile {
    node_width: Option<f64>,
    node_padding: Option<f64>,
    node_align: Option<NodeAlign>,
    iterations: Option<usize>,
    show_links: Option<bool>,
    compare_nodes: Option<bool>,
    keep_node_order: Option<bool>,
    orientation: Option<Orientation>,
    width: Option<f64>,
    height: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelConfigFile {
    enabled: Option<bool>,
    offset: Option<f64>,
    hide_only: Option<bool>,
    collision_padding: Option<f64>,
    font_size: Option<f64>,
    fast_text_metrics: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    padding: Option<f64>,
    background: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    sankey: Option<SankeyConfigFile>,
    labels: Option<LabelConfigFile>,
    render: Option<RenderConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Overlays a camelCase JSON config document onto the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    match parsed.theme.as_deref() {
        Some("classic") | Some("default") => config.theme = Theme::classic(),
        Some("modern") | None => {}
        Some(other) => tracing::warn!(theme = other, "unknown theme, keeping default"),
    }

    if let Some(vars) = parsed.theme_variables {
        let theme = &mut config.theme;
        if let Some(v) = vars.font_family {
            theme.font_family = v;
        }
        if let Some(v) = vars.node_colors {
            theme.node_colors = v;
        }
        if let Some(v) = vars.node_stroke {
            theme.node_stroke = v;
        }
        if let Some(v) = vars.node_stroke_width {
            theme.node_stroke_width = v;
        }
        if let Some(v) = vars.link_opacity {
            theme.link_opacity = v;
        }
        if let Some(v) = vars.label_color {
            theme.label_color = v;
        }
        if let Some(v) = vars.background {
            theme.background = v;
        }
    }

    if let Some(file) = parsed.sankey {
        let sankey = &mut config.sankey;
        if let Some(v) = file.node_width {
            sankey.node_width = v;
        }
        if let Some(v) = file.node_padding {
            sankey.node_padding = v;
        }
        if let Some(v) = file.node_align {
            sankey.node_align = v;
        }
        if let Some(v) = file.iterations {
            sankey.iterations = v;
        }
        if let Some(v) = file.show_links {
            sankey.show_links = v;
        }
        if let Some(v) = file.compare_nodes {
            sankey.compare_nodes = v;
        }
        if let Some(v) = file.keep_node_order {
            sankey.keep_node_order = v;
        }
        if let Some(v) = file.orientation {
            sankey.orientation = v;
        }
        if let Some(v) = file.width {
            sankey.width = v;
        }
        if let Some(v) = file.height {
            sankey.height = v;
        }
    }

    if let Some(file) = parsed.labels {
        let labels = &mut config.labels;
        if let Some(v) = file.enabled {
            labels.enabled = v;
        }
        if let Some(v) = file.offset {
            labels.offset = v;
        }
        if let Some(v) = file.hide_only {
            labels.hide_only = v;
        }
        if let Some(v) = file.collision_padding {
            labels.collision_padding = v;
        }
        if let Some(v) = file.font_size {
            labels.font_size = v;
        }
        if let Some(v) = file.fast_text_metrics {
            labels.fast_text_metrics = v;
        }
    }

    if let Some(file) = parsed.render {
        if let Some(v) = file.padding {
            config.render.padding = v;
        }
        if let Some(v) = file.background {
            config.render.background = v;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.sankey.iterations, 6);
        assert_eq!(config.sankey.node_align, NodeAlign::Left);
    }

    #[test]
    fn sections_overlay_defaults() {
        let config = parse_config(
            r#"{
                "theme": "classic",
                "themeVariables": { "linkOpacity": 0.6 },
                "sankey": { "nodeAlign": "justify", "compareNodes": true, "keepNodeOrder": true, "orientation": "vertical" },
                "labels": { "hideOnly": true, "fontSize": 10 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.theme.node_stroke, Theme::classic().node_stroke);
        assert_eq!(config.theme.link_opacity, 0.6);
        assert_eq!(config.sankey.node_align, NodeAlign::Justify);
        assert!(config.sankey.compare_nodes);
        assert!(config.sankey.keep_node_order);
        assert_eq!(config.sankey.orientation, Orientation::Vertical);
        assert_eq!(config.sankey.node_padding, 20.0, "untouched fields keep defaults");
        assert!(config.labels.hide_only);
        assert_eq!(config.labels.font_size, 10.0);
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let path = std::env::temp_dir().join(format!("alluvial-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"sankey": {"width": 900}}"#).unwrap();
        let config = load_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.sankey.width, 900.0);
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(parse_config("{ not json").is_err());
        assert!(parse_config(r#"{"sankey": {"nodeAlign": "diagonal"}}"#).is_err());
    }
}
