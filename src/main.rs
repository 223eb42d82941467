//! Street graph plotter - command line entry point
//!
//! Plots the network described by a JSON descriptor and stores it under
//! `figures/`, or opens it in a viewer with `--show`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use street_graph_plot::config::{apply_env_overrides, PlotConfig};
use street_graph_plot::graph::NodeId;
use street_graph_plot::osm::OsmClient;
use street_graph_plot::pipeline::{self, Backend};
use street_graph_plot::properties::PropertyReader;
use tracing_subscriber::EnvFilter;

/// Configuration file picked up from the working directory
const DEFAULT_CONFIG: &str = "plot_config.json";

#[derive(Debug, Parser)]
#[command(name = "street_graph_plot", version, about = "Plot a street network graph")]
struct Cli {
    /// Graph descriptor (JSON with address, distance, initial and final)
    descriptor: PathBuf,

    /// Route to overlay, as comma separated node ids
    #[arg(long, value_delimiter = ',')]
    route: Option<Vec<NodeId>>,

    /// Property file overriding plot defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Open the figure in a viewer instead of storing it
    #[arg(long)]
    show: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize tracing on stderr; `RUST_LOG` wins unless `--verbose` is given
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_properties(config: Option<&Path>) -> Result<PropertyReader> {
    let mut props = match config {
        Some(path) => PropertyReader::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            PropertyReader::from_file(Path::new(DEFAULT_CONFIG))?
        }
        None => PropertyReader::new(),
    };
    apply_env_overrides(&mut props);
    Ok(props)
}

async fn run(cli: Cli) -> Result<()> {
    println!("Street Graph Plot v{}", env!("CARGO_PKG_VERSION"));

    let props = load_properties(cli.config.as_deref())?;
    let config = PlotConfig::from_properties(&props);

    let client = OsmClient::new(config.osm.clone()).context("Failed to set up HTTP client")?;
    let tiles = client.tile_server(&config.basemap_url);
    let route = cli.route.as_deref();

    if cli.show {
        pipeline::plot(
            &cli.descriptor,
            route,
            Backend::Interactive,
            &config,
            &client,
            &tiles,
        )
        .await?;
    } else {
        pipeline::store(&cli.descriptor, route, &config, &client, &tiles).await?;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("\n✗ {:#}", e);
        std::process::exit(1);
    }
}
