use crate::config::{Config, load_config};
use crate::ir::{FlowGraph, RecordAccessors};
use crate::layout::compute_layout;
use crate::layout_dump::write_layout_dump;
#[cfg(feature = "png")]
use crate::render::write_output_png;
use crate::render::{render_svg, write_output_svg};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "alluvial", version, about = "Sankey / alluvial diagram layout and rendering")]
pub struct Args {
    /// Input JSON graph ({nodes, links} or an array of link records), or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Chart width, overriding the config file
    #[arg(short = 'w', long = "width")]
    pub width: Option<f64>,

    /// Chart height, overriding the config file
    #[arg(short = 'H', long = "height")]
    pub height: Option<f64>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Json,
    Png,
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = resolve_config(&args)?;

    let input = read_input(args.input.as_deref())?;
    let graph = parse_graph(&input)?;
    tracing::debug!(
        nodes = graph.nodes.len(),
        links = graph.links.len(),
        "parsed input graph"
    );
    let layout = compute_layout(&graph, &config)?;

    match args.output_format {
        OutputFormat::Svg => {
            let svg = render_svg(&layout, &config.theme);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Json => match args.output.as_deref() {
            Some(path) => write_layout_dump(path, &layout)?,
            None => println!("{}", crate::layout_dump::to_json_string(&layout)?),
        },
        OutputFormat::Png => write_png(&args, &layout, &config)?,
    }
    Ok(())
}

#[cfg(feature = "png")]
fn write_png(args: &Args, layout: &crate::layout::Layout, config: &Config) -> Result<()> {
    let output = ensure_output(&args.output, "png")?;
    let svg = render_svg(layout, &config.theme);
    write_output_png(&svg, &output, &config.render, &config.theme)
}

#[cfg(not(feature = "png"))]
fn write_png(_args: &Args, _layout: &crate::layout::Layout, _config: &Config) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(width) = args.width {
        config.sankey.width = width;
    }
    if let Some(height) = args.height {
        config.sankey.height = height;
    }
    Ok(config)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path.filter(|p| *p != Path::new("-")) {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

#[cfg_attr(not(feature = "png"), allow(dead_code))]
fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

/// A top-level array is read as link records with `source`/`target`/`value`
/// fields; anything else must be a `{nodes, links}` graph.
fn parse_graph(input: &str) -> Result<FlowGraph> {
    let value: Value = serde_json::from_str(input).context("input is not valid JSON")?;
    match value {
        Value::Array(records) => Ok(FlowGraph::from_records(
            &records,
            &RecordAccessors::default(),
        )),
        other => serde_json::from_value(other).context("input is not a {nodes, links} graph"),
    }
}
