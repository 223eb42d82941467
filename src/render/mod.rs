//! Figure rendering
//!
//! Structure:
//! - `basemap.rs`: tile mosaic beneath the graph
//! - `colors.rs`: color names and hex parsing
//! - `fonts.rs`: label font registration
//!
//! Layers are drawn bottom to top: basemap (or background), edges, nodes,
//! initial/final markers, route, node labels.

pub mod basemap;
pub mod colors;
pub mod fonts;

use crate::config::PlotConfig;
use crate::error::{PlotError, Result};
use crate::geo::{auto_zoom, from_mercator, to_mercator, BBox, Projector};
use crate::graph::{Edge, NetworkGraph, NodeId};
use crate::osm::TileSource;
use colors::to_rgb;
use image::{ImageFormat, Rgb, RgbImage};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

/// Smallest extent span in degrees, so a lone node still gets a map around it
const MIN_EXTENT_SPAN: f64 = 0.0005;

/// What to draw
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub graph: &'a NetworkGraph,
    pub initial: NodeId,
    pub final_node: NodeId,
    pub route: Option<&'a [NodeId]>,
}

/// A rendered figure
#[derive(Debug, Clone)]
pub struct Figure {
    image: RgbImage,
    extent: BBox,
}

impl Figure {
    pub fn new(image: RgbImage, extent: BBox) -> Self {
        Self { image, extent }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Geographic area covered by the uncropped image
    pub fn extent(&self) -> &BBox {
        &self.extent
    }

    /// Projector matching this figure's pixels
    pub fn projector(&self) -> Projector {
        Projector::new(&self.extent, self.width(), self.height())
    }

    /// Trim rows and columns at the borders that are entirely `background`
    ///
    /// An image made only of background is returned unchanged.
    pub fn crop_to_content(&self, background: [u8; 3]) -> Figure {
        let bg = Rgb(background);
        let (w, h) = self.image.dimensions();

        let row_is_bg = |y: u32| (0..w).all(|x| *self.image.get_pixel(x, y) == bg);
        let col_is_bg = |x: u32| (0..h).all(|y| *self.image.get_pixel(x, y) == bg);

        let Some(top) = (0..h).find(|&y| !row_is_bg(y)) else {
            return self.clone();
        };
        let bottom = (0..h).rev().find(|&y| !row_is_bg(y)).unwrap_or(top);
        let left = (0..w).find(|&x| !col_is_bg(x)).unwrap_or(0);
        let right = (0..w).rev().find(|&x| !col_is_bg(x)).unwrap_or(left);

        if (left, top, right, bottom) == (0, 0, w - 1, h - 1) {
            return self.clone();
        }

        tracing::debug!(
            "Cropping figure from {}x{} to {}x{}",
            w,
            h,
            right - left + 1,
            bottom - top + 1
        );
        let image =
            image::imageops::crop_imm(&self.image, left, top, right - left + 1, bottom - top + 1)
                .to_image();
        Figure {
            image,
            extent: self.extent,
        }
    }

    /// Encode as PNG
    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

/// Check a route against the graph and pick the edge for each hop
///
/// Every node must be in the graph and each consecutive pair must be joined by
/// an edge; parallel edges resolve to the shortest one.
pub fn route_edges<'g>(graph: &'g NetworkGraph, route: &[NodeId]) -> Result<Vec<&'g Edge>> {
    if let Some(missing) = route.iter().find(|id| !graph.contains(**id)) {
        return Err(PlotError::UnknownRouteNode(*missing));
    }

    route
        .windows(2)
        .map(|pair| {
            graph
                .shortest_edge(pair[0], pair[1])
                .ok_or(PlotError::MissingRouteEdge {
                    from: pair[0],
                    to: pair[1],
                })
        })
        .collect()
}

/// Plot extent for a graph: node bounds plus padding
pub fn plot_extent(graph: &NetworkGraph, padding: f64) -> Option<BBox> {
    graph
        .bounds()
        .map(|bounds| bounds.padded(padding, MIN_EXTENT_SPAN))
}

/// Map area and image size for a graph
///
/// Starts from the padded node bounds at the configured figure size, then
/// grows east and north until every node label fits on the canvas.
pub fn layout(graph: &NetworkGraph, config: &PlotConfig) -> Result<(BBox, u32, u32)> {
    let extent = plot_extent(graph, config.padding)
        .ok_or_else(|| PlotError::Render("network graph has no nodes".to_string()))?;
    let (width, height) = config.resolve_dimensions(&extent);

    if label_font(config).is_none() {
        return Ok((extent, width, height));
    }
    Ok(fit_labels(graph, extent, width, height, config))
}

/// Extend `extent` by the pixels node labels spill past the east and north
/// borders, keeping the scale so nodes stay where they were relative to the
/// south-west corner
fn fit_labels(
    graph: &NetworkGraph,
    extent: BBox,
    width: u32,
    height: u32,
    config: &PlotConfig,
) -> (BBox, u32, u32) {
    let projector = Projector::new(&extent, width, height);
    let font_px = config.points_to_px(config.label_fontsize);
    let font = (fonts::LABEL_FAMILY, font_px).into_font();

    let mut east = 0.0_f64;
    let mut north = 0.0_f64;
    for (id, node) in graph.nodes() {
        let label = id.to_string();
        let text_width = font
            .box_size(&label)
            .map(|(w, _)| f64::from(w))
            .unwrap_or(label.len() as f64 * font_px * 0.6);
        let (x, y) = projector.pixel(
            node.lon + config.label_offset,
            node.lat + config.label_offset,
        );
        // Ink may overhang the advance width and the top of the em box
        east = east.max(f64::from(x) + text_width + 0.25 * font_px - f64::from(width));
        north = north.max(1.25 * font_px - f64::from(y));
    }

    let margin = |overflow: f64| {
        if overflow > 0.0 {
            overflow.ceil() as u32 + 1
        } else {
            0
        }
    };
    let (margin_east, margin_north) = (margin(east), margin(north));
    if margin_east == 0 && margin_north == 0 {
        return (extent, width, height);
    }

    let (x0, y0) = to_mercator(extent.west, extent.north);
    let (x1, y1) = to_mercator(extent.east, extent.south);
    let grown_x1 = x1 + f64::from(margin_east) * (x1 - x0) / f64::from(width);
    let grown_y0 = y0 - f64::from(margin_north) * (y1 - y0) / f64::from(height);
    let (east_lon, _) = from_mercator(grown_x1, y1);
    let (_, north_lat) = from_mercator(x0, grown_y0);

    tracing::debug!(
        "Growing canvas by {}px east and {}px north to fit labels",
        margin_east,
        margin_north
    );
    (
        BBox::new(extent.west, extent.south, east_lon, north_lat),
        width + margin_east,
        height + margin_north,
    )
}

fn label_font(config: &PlotConfig) -> Option<&'static Path> {
    if config.label_show {
        fonts::ensure_label_font(config.label_font.as_deref())
    } else {
        None
    }
}

/// Render a scene into a figure
///
/// The route is validated before any tile is requested.
pub async fn render<T: TileSource>(
    scene: &Scene<'_>,
    config: &PlotConfig,
    tiles: &T,
) -> Result<Figure> {
    let route = match scene.route {
        Some(route) => Some(route_edges(scene.graph, route)?),
        None => None,
    };

    let (extent, width, height) = layout(scene.graph, config)?;

    let mut image = if config.basemap_enabled {
        let zoom = config
            .basemap_zoom
            .unwrap_or_else(|| auto_zoom(&extent, config.basemap_max_zoom));
        basemap::compose(tiles, &extent, zoom, width, height).await?
    } else {
        RgbImage::from_pixel(width, height, Rgb(config.background))
    };

    draw(&mut image, &extent, scene, route.as_deref(), config)?;
    Ok(Figure::new(image, extent))
}

/// Draw the graph layers onto an image covering `extent`
pub fn draw(
    image: &mut RgbImage,
    extent: &BBox,
    scene: &Scene<'_>,
    route: Option<&[&Edge]>,
    config: &PlotConfig,
) -> Result<()> {
    let (width, height) = image.dimensions();
    let projector = Projector::new(extent, width, height);
    let graph = scene.graph;

    let labels = label_font(config).is_some();

    let root = BitMapBackend::with_buffer(image, (width, height)).into_drawing_area();

    if config.edge_linewidth > 0.0 {
        let style = to_rgb(config.edge_color)
            .stroke_width(stroke_px(config, config.edge_linewidth));
        for edge in graph.edges() {
            root.draw(&PathElement::new(polyline(&projector, edge), style))
                .map_err(render_error)?;
        }
    }

    let node_radius = config.marker_radius_px(config.node_size);
    if node_radius > 0 {
        let style = to_rgb(config.node_color).filled();
        for (_, node) in graph.nodes() {
            root.draw(&Circle::new(
                projector.pixel(node.lon, node.lat),
                node_radius,
                style,
            ))
            .map_err(render_error)?;
        }
    }

    let marker_radius = config.marker_radius_px(config.marker_size);
    for (id, color) in [
        (scene.initial, config.initial_color),
        (scene.final_node, config.final_color),
    ] {
        match graph.node(id) {
            Some(node) => root
                .draw(&Circle::new(
                    projector.pixel(node.lon, node.lat),
                    marker_radius,
                    to_rgb(color).filled(),
                ))
                .map_err(render_error)?,
            None => tracing::warn!("Node {} is not in the network graph, not highlighted", id),
        }
    }

    if let Some(edges) = route {
        draw_route(&root, &projector, edges, config)?;
    }

    if labels {
        let label_color = to_rgb(config.label_color);
        let font_px = config.points_to_px(config.label_fontsize);
        let style = TextStyle::from((fonts::LABEL_FAMILY, font_px).into_font())
            .color(&label_color)
            .pos(Pos::new(HPos::Left, VPos::Bottom));
        for (id, node) in graph.nodes() {
            let anchor = projector.pixel(
                node.lon + config.label_offset,
                node.lat + config.label_offset,
            );
            root.draw(&Text::new(id.to_string(), anchor, style.clone()))
                .map_err(render_error)?;
        }
    }

    root.present().map_err(render_error)?;
    Ok(())
}

fn draw_route<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    projector: &Projector,
    edges: &[&Edge],
    config: &PlotConfig,
) -> Result<()> {
    let color = to_rgb(config.route_color).mix(config.route_alpha);

    let mut points: Vec<(i32, i32)> = Vec::new();
    for edge in edges {
        for point in polyline(projector, edge) {
            if points.last() != Some(&point) {
                points.push(point);
            }
        }
    }

    if points.len() > 1 && config.route_linewidth > 0.0 {
        root.draw(&PathElement::new(
            points.clone(),
            color.stroke_width(stroke_px(config, config.route_linewidth)),
        ))
        .map_err(render_error)?;
    }

    let radius = config.marker_radius_px(config.route_endpoint_size);
    let endpoints = [points.first(), points.last()];
    if radius > 0 {
        for point in endpoints.into_iter().flatten() {
            root.draw(&Circle::new(*point, radius, color.filled()))
                .map_err(render_error)?;
        }
    }
    Ok(())
}

/// Edge geometry in whole pixels
fn polyline(projector: &Projector, edge: &Edge) -> Vec<(i32, i32)> {
    edge.geometry
        .iter()
        .map(|&(lon, lat)| projector.pixel(lon, lat))
        .collect()
}

/// Line width in whole pixels, at least one
fn stroke_px(config: &PlotConfig, points: f64) -> u32 {
    (config.points_to_px(points).round() as u32).max(1)
}

fn render_error(e: impl std::fmt::Display) -> PlotError {
    PlotError::Render(e.to_string())
}
