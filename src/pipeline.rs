//! Shared plot pipeline
//!
//! The pipeline:
//! 1. Loads the graph descriptor (before any network access)
//! 2. Fetches the street network around the descriptor address
//! 3. Renders the graph over its basemap
//! 4. Hands the figure to the selected backend, or stores it as PNG

use crate::config::PlotConfig;
use crate::descriptor::Descriptor;
use crate::error::{PlotError, Result};
use crate::graph::NodeId;
use crate::osm::{NetworkQuery, NetworkSource, TileSource};
use crate::render::{self, Figure, Scene};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Where a plotted figure goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Open the figure in the system image viewer
    Interactive,
    /// Hand the figure back to the caller
    #[default]
    Raster,
}

/// Result of [`plot`], depending on the backend
#[derive(Debug)]
pub enum PlotOutcome {
    /// Figure was written to this temporary file and opened in a viewer
    Shown(PathBuf),
    Figure(Figure),
}

impl PlotOutcome {
    pub fn into_figure(self) -> Option<Figure> {
        match self {
            PlotOutcome::Figure(figure) => Some(figure),
            PlotOutcome::Shown(_) => None,
        }
    }
}

/// Output location for a descriptor: `<root>/<parent dir stem>/<file stem>.png`
///
/// A descriptor without parent directory lands directly under `root`.
pub fn output_path(root: &Path, input: &Path) -> PathBuf {
    let parent = input
        .parent()
        .and_then(Path::file_stem)
        .map(PathBuf::from)
        .unwrap_or_default();
    let stem = input.file_stem().unwrap_or(input.as_os_str());

    let mut file = stem.to_os_string();
    file.push(".png");
    root.join(parent).join(file)
}

/// Temporary file a shown figure is written to
///
/// Mirrors [`output_path`] under the system temp directory, so showing the
/// same descriptor again replaces the previous file.
pub fn viewer_path(input: &Path) -> PathBuf {
    output_path(&std::env::temp_dir().join("street_graph_plot"), input)
}

/// Plot the graph described by `path`
///
/// With [`Backend::Raster`] the figure is returned; with
/// [`Backend::Interactive`] it is written to a temporary PNG and opened.
pub async fn plot<N: NetworkSource, T: TileSource>(
    path: &Path,
    route: Option<&[NodeId]>,
    backend: Backend,
    config: &PlotConfig,
    network: &N,
    tiles: &T,
) -> Result<PlotOutcome> {
    let figure = build_figure(path, route, config, network, tiles).await?;

    match backend {
        Backend::Raster => Ok(PlotOutcome::Figure(figure)),
        Backend::Interactive => {
            println!("\n[4/4] Opening viewer...");
            let file = viewer_path(path);
            create_parent(&file)?;
            finish(&figure, config).save_png(&file)?;
            open_viewer(&file)?;
            println!("✓ Figure shown from {}", file.display());
            Ok(PlotOutcome::Shown(file))
        }
    }
}

/// Plot the graph described by `path` and save it under the output root
///
/// Returns the written file. Existing output is overwritten.
pub async fn store<N: NetworkSource, T: TileSource>(
    path: &Path,
    route: Option<&[NodeId]>,
    config: &PlotConfig,
    network: &N,
    tiles: &T,
) -> Result<PathBuf> {
    let output = output_path(&config.output_root, path);
    create_parent(&output)?;

    let figure = match plot(path, route, Backend::Raster, config, network, tiles).await? {
        PlotOutcome::Figure(figure) => figure,
        PlotOutcome::Shown(file) => return Ok(file),
    };

    println!("\n[4/4] Saving figure...");
    let figure = finish(&figure, config);
    figure.save_png(&output)?;
    println!("✓ PNG written ({}x{})", figure.width(), figure.height());

    println!("Graph plotted to: {}", output.display());
    Ok(output)
}

fn create_parent(file: &Path) -> Result<()> {
    if let Some(dir) = file.parent() {
        std::fs::create_dir_all(dir).map_err(|source| PlotError::Output {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Load, fetch and render; shared by every backend
async fn build_figure<N: NetworkSource, T: TileSource>(
    path: &Path,
    route: Option<&[NodeId]>,
    config: &PlotConfig,
    network: &N,
    tiles: &T,
) -> Result<Figure> {
    println!("\n[1/4] Loading descriptor...");
    let descriptor = Descriptor::load(path)?;
    println!("  Address: {}", descriptor.address);
    println!("  Distance: {} m", descriptor.distance);
    println!(
        "  Initial: {}  Final: {}",
        descriptor.initial, descriptor.final_node
    );

    println!("\n[2/4] Fetching {} network...", config.network_type.as_str());
    let query = NetworkQuery {
        address: descriptor.address.clone(),
        distance: descriptor.distance,
        network_type: config.network_type,
        buffer: config.network_buffer,
    };
    let graph = network.network(&query).await?;
    if graph.is_empty() {
        return Err(PlotError::EmptyNetwork(descriptor.address));
    }
    println!(
        "✓ {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    println!("\n[3/4] Rendering...");
    if let Some(route) = route {
        println!("  Route: {} node(s)", route.len());
    }
    let scene = Scene {
        graph: &graph,
        initial: descriptor.initial,
        final_node: descriptor.final_node,
        route,
    };
    let figure = render::render(&scene, config, tiles).await?;
    println!("✓ Rendered {}x{}", figure.width(), figure.height());

    Ok(figure)
}

/// Apply output cropping when enabled
fn finish(figure: &Figure, config: &PlotConfig) -> Figure {
    if config.output_crop {
        figure.crop_to_content(config.background)
    } else {
        figure.clone()
    }
}

/// Open a file with the platform's default viewer, without waiting for it
fn open_viewer(file: &Path) -> Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        Command::new("xdg-open")
    };

    command
        .arg(file)
        .spawn()
        .map(|_| ())
        .map_err(|source| PlotError::Viewer {
            path: file.to_path_buf(),
            source,
        })
}
