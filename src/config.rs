//! Plot configuration from properties
//!
//! Configuration is loaded from plot properties (defined in plot_properties.json).
//! All default values come from plot_properties.json - no hardcoded fallbacks in
//! this code. Sizes are given in points like a print figure and converted to
//! pixels with `dpi`.

use crate::geo::{mercator_aspect, BBox};
use crate::osm::{NetworkType, OsmSettings};
use crate::properties::{PlotDimension, PropertyReader};
use std::path::PathBuf;
use std::time::Duration;

/// Long side of an auto-sized figure in pixels
const AUTO_SIZE: f64 = 800.0;

#[derive(Debug, Clone)]
pub struct PlotConfig {
    /// Which streets to download
    pub network_type: NetworkType,

    /// Meters downloaded beyond the search box before simplification
    pub network_buffer: f64,

    /// Figure width (pixels or Auto)
    pub plot_width: PlotDimension,

    /// Figure height (pixels or Auto)
    pub plot_height: PlotDimension,

    /// Pixels per inch for point → pixel conversion
    pub dpi: f64,

    /// Fraction of the node extent added on each side
    pub padding: f64,

    /// Figure color without basemap
    pub background: [u8; 3],

    pub node_color: [u8; 3],

    /// Marker area in points²
    pub node_size: f64,

    pub edge_color: [u8; 3],

    /// Edge width in points; 0 hides edges
    pub edge_linewidth: f64,

    pub label_show: bool,
    pub label_color: [u8; 3],

    /// Label size in points
    pub label_fontsize: f64,

    /// Label offset from its node, in degrees on both axes
    pub label_offset: f64,

    /// Explicit font file, None searches system fonts
    pub label_font: Option<PathBuf>,

    pub initial_color: [u8; 3],
    pub final_color: [u8; 3],

    /// Marker area of initial/final nodes in points²
    pub marker_size: f64,

    pub route_color: [u8; 3],
    pub route_linewidth: f64,
    pub route_alpha: f64,
    pub route_endpoint_size: f64,

    pub basemap_enabled: bool,

    /// Tile URL template with {z}/{x}/{y}
    pub basemap_url: String,

    /// Forced zoom level, None = auto
    pub basemap_zoom: Option<u8>,
    pub basemap_max_zoom: u8,

    /// Directory figures are stored under
    pub output_root: PathBuf,

    /// Trim uniform background borders before saving
    pub output_crop: bool,

    /// Service endpoints and HTTP settings
    pub osm: OsmSettings,
}

impl PlotConfig {
    /// Create config from plot properties
    pub fn from_properties(props: &PropertyReader) -> Self {
        let network_type = NetworkType::parse(&props.get_enum("network.type"));

        let plot_width = PlotDimension::from_str(&props.get_string("plot.width"), PlotDimension::Auto);
        let plot_height =
            PlotDimension::from_str(&props.get_string("plot.height"), PlotDimension::Auto);

        let basemap_max_zoom = props.get_f64_in_range("basemap.max.zoom", 0.0, 24.0) as u8;
        let basemap_zoom = parse_zoom(&props.get_string("basemap.zoom"), basemap_max_zoom);

        let cache_folder = if props.get_bool("cache.enabled") {
            props.get_optional_string("cache.folder").map(PathBuf::from)
        } else {
            None
        };

        let osm = OsmSettings {
            nominatim_url: props.get_string("nominatim.url"),
            overpass_url: props.get_string("overpass.url"),
            timeout: Duration::from_secs_f64(props.get_f64_in_range("http.timeout", 1.0, 3600.0)),
            user_agent: props.get_string("http.user.agent"),
            cache_folder,
        };

        Self {
            network_type,
            network_buffer: props.get_f64_in_range("network.buffer", 0.0, 10_000.0),
            plot_width,
            plot_height,
            dpi: props.get_f64_in_range("plot.dpi", 10.0, 1200.0),
            padding: props.get_f64_in_range("plot.padding", 0.0, 1.0),
            background: props.get_color("background.color"),
            node_color: props.get_color("node.color"),
            node_size: props.get_f64_in_range("node.size", 0.0, 10_000.0),
            edge_color: props.get_color("edge.color"),
            edge_linewidth: props.get_f64_in_range("edge.linewidth", 0.0, 100.0),
            label_show: props.get_bool("label.show"),
            label_color: props.get_color("label.color"),
            label_fontsize: props.get_f64_in_range("label.fontsize", 1.0, 200.0),
            label_offset: props.get_f64("label.offset"),
            label_font: props.get_optional_string("label.font").map(PathBuf::from),
            initial_color: props.get_color("initial.color"),
            final_color: props.get_color("final.color"),
            marker_size: props.get_f64_in_range("marker.size", 0.0, 10_000.0),
            route_color: props.get_color("route.color"),
            route_linewidth: props.get_f64_in_range("route.linewidth", 0.0, 100.0),
            route_alpha: props.get_f64_in_range("route.alpha", 0.0, 1.0),
            route_endpoint_size: props.get_f64_in_range("route.endpoint.size", 0.0, 10_000.0),
            basemap_enabled: props.get_bool("basemap.enabled"),
            basemap_url: props.get_string("basemap.url"),
            basemap_zoom,
            basemap_max_zoom,
            output_root: PathBuf::from(props.get_string("output.root")),
            output_crop: props.get_bool("output.crop"),
            osm,
        }
    }

    /// Convert a length in points to pixels
    pub fn points_to_px(&self, points: f64) -> f64 {
        points * self.dpi / 72.0
    }

    /// Marker radius in pixels for a marker area in points²
    pub fn marker_radius_px(&self, area: f64) -> i32 {
        if area <= 0.0 {
            return 0;
        }
        (self.points_to_px(area.sqrt() / 2.0).round() as i32).max(1)
    }

    /// Resolve figure size in pixels for a map extent
    ///
    /// Auto dimensions keep the projected aspect ratio of the extent; with both
    /// on auto the long side gets 800 pixels.
    pub fn resolve_dimensions(&self, extent: &BBox) -> (u32, u32) {
        let aspect = mercator_aspect(extent);
        let aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };
        let px = |v: f64| (v.round() as u32).max(1);

        match (self.plot_width, self.plot_height) {
            (PlotDimension::Pixels(w), PlotDimension::Pixels(h)) => (w, h),
            (PlotDimension::Pixels(w), PlotDimension::Auto) => (w, px(f64::from(w) / aspect)),
            (PlotDimension::Auto, PlotDimension::Pixels(h)) => (px(f64::from(h) * aspect), h),
            (PlotDimension::Auto, PlotDimension::Auto) => {
                if aspect >= 1.0 {
                    (px(AUTO_SIZE), px(AUTO_SIZE / aspect))
                } else {
                    (px(AUTO_SIZE * aspect), px(AUTO_SIZE))
                }
            }
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self::from_properties(&PropertyReader::new())
    }
}

/// Environment variables that override service endpoints
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("NOMINATIM_URL", "nominatim.url"),
    ("OVERPASS_URL", "overpass.url"),
    ("TILE_URL", "basemap.url"),
];

/// Overlay service endpoints from the environment onto `props`
pub fn apply_env_overrides(props: &mut PropertyReader) {
    apply_overrides(props, |var| std::env::var(var).ok());
}

fn apply_overrides(props: &mut PropertyReader, lookup: impl Fn(&str) -> Option<String>) {
    for (var, property) in ENV_OVERRIDES {
        if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("{} set from {}", property, var);
            props.set(property, value);
        }
    }
}

/// "auto" → None, otherwise a zoom level capped at `max_zoom`
fn parse_zoom(value: &str, max_zoom: u8) -> Option<u8> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
        return None;
    }
    match trimmed.parse::<u8>() {
        Ok(zoom) => Some(zoom.min(max_zoom)),
        Err(_) => {
            tracing::warn!("Invalid basemap zoom '{}', using auto", trimmed);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlotConfig::default();
        assert_eq!(config.network_type, NetworkType::Drive);
        assert_eq!(config.node_color, [255, 0, 0]);
        assert_eq!(config.initial_color, [0, 128, 0]);
        assert_eq!(config.final_color, [0, 0, 255]);
        assert_eq!(config.route_color, [255, 255, 0]);
        assert_eq!(config.edge_linewidth, 0.0);
        assert_eq!(config.label_offset, 0.000025);
        assert_eq!(config.basemap_zoom, None);
        assert_eq!(config.output_root, PathBuf::from("figures"));
        assert_eq!(config.osm.cache_folder, Some(PathBuf::from("cache")));
    }

    #[test]
    fn test_cache_disabled() {
        let mut props = PropertyReader::new();
        props.set("cache.enabled", "false");
        let config = PlotConfig::from_properties(&props);
        assert_eq!(config.osm.cache_folder, None);
    }

    #[test]
    fn test_env_overrides() {
        let mut props = PropertyReader::new();
        apply_overrides(&mut props, |var| match var {
            "OVERPASS_URL" => Some("http://localhost:12345/api/interpreter".to_string()),
            "TILE_URL" => Some("  ".to_string()),
            _ => None,
        });
        let config = PlotConfig::from_properties(&props);
        assert_eq!(config.osm.overpass_url, "http://localhost:12345/api/interpreter");
        assert_eq!(config.osm.nominatim_url, "https://nominatim.openstreetmap.org");
        // Blank values are ignored
        assert_eq!(config.basemap_url, "https://tile.openstreetmap.org/{z}/{x}/{y}.png");
    }

    #[test]
    fn test_parse_zoom() {
        assert_eq!(parse_zoom("auto", 19), None);
        assert_eq!(parse_zoom("", 19), None);
        assert_eq!(parse_zoom("15", 19), Some(15));
        assert_eq!(parse_zoom("22", 19), Some(19));
        assert_eq!(parse_zoom("near", 19), None);
    }

    #[test]
    fn test_marker_radius() {
        let config = PlotConfig::default();
        // 36 pt² → 3 pt radius → ~4 px at 100 dpi
        assert_eq!(config.marker_radius_px(36.0), 4);
        assert_eq!(config.marker_radius_px(0.0), 0);
        assert_eq!(config.marker_radius_px(0.01), 1);
    }

    #[test]
    fn test_resolve_dimensions_auto() {
        let config = PlotConfig::default();
        // Square in Mercator terms near the equator
        let extent = BBox::new(0.0, 0.0, 0.01, 0.01);
        let (w, h) = config.resolve_dimensions(&extent);
        assert_eq!(w, 800);
        assert!((799..=800).contains(&h));

        // Twice as wide as tall
        let extent = BBox::new(0.0, 0.0, 0.02, 0.01);
        let (w, h) = config.resolve_dimensions(&extent);
        assert_eq!(w, 800);
        assert!((399..=401).contains(&h));

        // Taller than wide
        let extent = BBox::new(0.0, 0.0, 0.01, 0.02);
        let (w, h) = config.resolve_dimensions(&extent);
        assert_eq!(h, 800);
        assert!((399..=401).contains(&w));
    }

    #[test]
    fn test_resolve_dimensions_fixed() {
        let mut props = PropertyReader::new();
        props.set("plot.width", "1000");
        let config = PlotConfig::from_properties(&props);
        let extent = BBox::new(0.0, 0.0, 0.02, 0.01);
        let (w, h) = config.resolve_dimensions(&extent);
        assert_eq!(w, 1000);
        assert!((499..=501).contains(&h));

        props.set("plot.height", "300");
        let config = PlotConfig::from_properties(&props);
        assert_eq!(config.resolve_dimensions(&extent), (1000, 300));
    }
}
