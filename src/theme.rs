use serde::{Deserialize, Serialize};

const TABLEAU_PALETTE: [&str; 10] = [
    "#4e79a7", "#f28e2c", "#e15759", "#76b7b2", "#59a14f", "#edc949", "#af7aa1", "#ff9da7",
    "#9c755f", "#bab0ab",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub node_colors: Vec<String>,
    pub node_stroke: String,
    pub node_stroke_width: f64,
    pub link_opacity: f64,
    pub label_color: String,
    pub background: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            node_colors: TABLEAU_PALETTE.iter().map(|c| c.to_string()).collect(),
            node_stroke: "#333333".to_string(),
            node_stroke_width: 1.0,
            link_opacity: 0.5,
            label_color: "#333333".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            node_colors: TABLEAU_PALETTE.iter().map(|c| c.to_string()).collect(),
            node_stroke: "none".to_string(),
            node_stroke_width: 0.0,
            link_opacity: 0.3,
            label_color: "#1C2430".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    /// Palette colour for the node at `index`, cycling through the palette.
    pub fn node_color(&self, index: usize) -> &str {
        if self.node_colors.is_empty() {
            return "#4e79a7";
        }
        &self.node_colors[index % self.node_colors.len()]
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::modern()
    }
}
