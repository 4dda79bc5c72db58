//! `xv`: lay out a DOT graph, fold nodes and export the scene.
//!
//! ```text
//! xv render graph.gv --fold parser --fold lexer -o graph.svg
//! xv nodes graph.gv --engine layered
//! ```

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use xv_core::{DotProcess, GraphSession, LayeredLayout, LayoutEngine};
use xv_render::render_svg;
use xv_view::{GraphView, ViewConfig};

#[derive(Parser)]
#[command(name = "xv")]
#[command(about = "Render Graphviz graphs with foldable nodes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lay out, apply folds and write the scene as SVG
    Render {
        #[command(flatten)]
        input: Input,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List nodes with their fold state and scene bounds
    Nodes {
        #[command(flatten)]
        input: Input,
    },
}

#[derive(Args)]
struct Input {
    /// DOT source file
    file: PathBuf,
    /// Layout algorithm (dot, neato, ...)
    #[arg(long)]
    layout: Option<String>,
    #[arg(long, value_enum, default_value_t = Engine::Dot)]
    engine: Engine,
    /// Fold this node before output; repeatable
    #[arg(long = "fold", value_name = "NAME")]
    folds: Vec<String>,
    /// JSON view configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Engine {
    /// Graphviz command-line tools
    Dot,
    /// Built-in layered layout, no Graphviz needed
    Layered,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Render { input, output } => render(&input, output),
        Command::Nodes { input } => nodes(&input),
    }
}

/// Load the file, lay it out and apply the requested folds.
fn open(input: &Input) -> Result<GraphView> {
    let mut config = match &input.config {
        Some(path) => ViewConfig::load(path)?,
        None => ViewConfig::default(),
    };
    if let Some(layout) = &input.layout {
        config.layout.algorithm = layout.clone();
    }
    // Batch output has nobody to watch a transition.
    config.animation.enabled = false;

    let source = fs::read_to_string(&input.file)
        .with_context(|| format!("reading {}", input.file.display()))?;
    let engine: Box<dyn LayoutEngine> = match input.engine {
        Engine::Dot => Box::new(DotProcess::new(config.layout.dot_binary.clone())),
        Engine::Layered => Box::new(LayeredLayout::default()),
    };
    let session = GraphSession::from_source(&source, engine, config.layout.clone(), &config.fold)
        .with_context(|| format!("parsing {}", input.file.display()))?;

    let mut view = GraphView::new(session, config);
    view.load(&source)
        .with_context(|| format!("laying out {}", input.file.display()))?;
    for name in &input.folds {
        if view.fold(name).with_context(|| format!("folding `{name}`"))?.is_none() {
            log::info!("`{name}` has no successors; nothing to fold");
        }
    }
    Ok(view)
}

fn render(input: &Input, output: Option<PathBuf>) -> Result<()> {
    let view = open(input)?;
    let Some(scene) = view.active_scene() else {
        bail!("no scene was built for {}", input.file.display());
    };
    for warning in scene.warnings() {
        log::warn!("{warning}");
    }
    let svg = render_svg(scene);
    match output {
        Some(path) => fs::write(&path, svg).with_context(|| format!("writing {}", path.display()))?,
        None => print!("{svg}"),
    }
    Ok(())
}

fn nodes(input: &Input) -> Result<()> {
    let view = open(input)?;
    let Some(scene) = view.active_scene() else {
        bail!("no scene was built for {}", input.file.display());
    };
    let graph = view.session().graph();
    for idx in graph.node_indices() {
        let id = graph.node(idx).id;
        let state = if view.session().is_folded(id) { "folded" } else { "expanded" };
        let bounds = match scene.node_by_id(id) {
            Some(c) => {
                let r = c.scene_bounds();
                format!("{:.1},{:.1},{:.1},{:.1}", r.x0, r.y0, r.x1, r.y1)
            }
            None => "-".to_string(),
        };
        println!("{id}\t{state}\t{bounds}");
    }
    Ok(())
}
