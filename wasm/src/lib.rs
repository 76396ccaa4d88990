use alluvial_layout::config::parse_config;
use alluvial_layout::layout_dump::to_json_string;
use alluvial_layout::render::render_svg;
use alluvial_layout::{Config, FlowGraph, Layout, RecordAccessors, compute_layout};
use serde::Deserialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

/// Browser-side switches on top of the regular config document.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WasmOptions {
    fast_text: Option<bool>,
}

fn to_js(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn build_config(options_json: Option<&str>) -> Result<Config, String> {
    let Some(raw) = options_json.filter(|raw| !raw.trim().is_empty()) else {
        let mut config = Config::default();
        config.labels.fast_text_metrics = true;
        return Ok(config);
    };
    let mut config = parse_config(raw).map_err(|error| format!("{error:#}"))?;
    let options: WasmOptions = serde_json::from_str(raw).map_err(|error| error.to_string())?;
    // No system fonts in the browser; fall back to width tables unless asked otherwise.
    config.labels.fast_text_metrics = options.fast_text.unwrap_or(true);
    Ok(config)
}

fn parse_graph(graph_json: &str) -> Result<FlowGraph, String> {
    let value: Value = serde_json::from_str(graph_json).map_err(|error| error.to_string())?;
    match value {
        Value::Array(records) => Ok(FlowGraph::from_records(
            &records,
            &RecordAccessors::default(),
        )),
        other => serde_json::from_value(other).map_err(|error| error.to_string()),
    }
}

fn layout(graph_json: &str, options_json: Option<&str>) -> Result<(Layout, Config), String> {
    let config = build_config(options_json)?;
    let graph = parse_graph(graph_json)?;
    let layout = compute_layout(&graph, &config).map_err(|error| error.to_string())?;
    Ok((layout, config))
}

#[wasm_bindgen]
pub fn layout_alluvial_json(
    graph_json: &str,
    options_json: Option<String>,
) -> Result<String, JsValue> {
    let (layout, _) = layout(graph_json, options_json.as_deref()).map_err(to_js)?;
    to_json_string(&layout).map_err(to_js)
}

#[wasm_bindgen]
pub fn render_alluvial_svg(
    graph_json: &str,
    options_json: Option<String>,
) -> Result<String, JsValue> {
    let (layout, config) = layout(graph_json, options_json.as_deref()).map_err(to_js)?;
    Ok(render_svg(&layout, &config.theme))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENERGY: &str = r#"{
        "nodes": [{"id": "coal"}, {"id": "gas"}, {"id": "power"}, {"id": "homes"}],
        "links": [
            {"source": "coal", "target": "power", "value": 4},
            {"source": "gas", "target": "power", "value": 2},
            {"source": "power", "target": "homes", "value": 6}
        ]
    }"#;

    #[test]
    fn lays_out_node_link_graph() {
        let (layout, config) = layout(ENERGY, None).expect("graph should lay out");
        assert!(config.labels.fast_text_metrics);
        assert_eq!(layout.graph.nodes.len(), 4);
        assert_eq!(layout.labels.len(), 4);
    }

    #[test]
    fn options_overlay_config() {
        let options = r#"{"theme": "classic", "sankey": {"nodeWidth": 20}, "fastText": false}"#;
        let (layout, config) = layout(ENERGY, Some(options)).expect("graph should lay out");
        assert!(!config.labels.fast_text_metrics);
        let node = &layout.graph.nodes[0];
        assert!((node.x1 - node.x0 - 20.0).abs() < 1e-9);
    }

    #[test]
    fn reports_cycles_as_errors() {
        let cyclic = r#"[{"source": "a", "target": "b", "value": 1}, {"source": "b", "target": "a", "value": 1}]"#;
        let error = layout(cyclic, None).unwrap_err();
        assert_eq!(error, "circular link");
    }
}
