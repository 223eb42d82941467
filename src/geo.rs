//! Geographic helpers: bounding boxes, great-circle distance and Web Mercator
//!
//! Coordinates are always `(lon, lat)` in degrees (x first, like the plot axes).
//! Mercator positions are normalized to `[0, 1]` on both axes, with `y` growing
//! southwards so they map directly onto tile and image pixel rows.

use std::f64::consts::PI;

/// Earth radius in meters used for distance and bounding box calculations
pub const EARTH_RADIUS_M: f64 = 6_371_009.0;

/// Latitude limit of the Web Mercator projection
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Axis-aligned box in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Box reaching `dist` meters north, south, east and west of a point
    pub fn around_point(lat: f64, lon: f64, dist: f64) -> Self {
        let delta_lat = (dist / EARTH_RADIUS_M).to_degrees();
        let delta_lon = (dist / (EARTH_RADIUS_M * lat.to_radians().cos())).to_degrees();
        Self {
            west: lon - delta_lon,
            south: lat - delta_lat,
            east: lon + delta_lon,
            north: lat + delta_lat,
        }
    }

    /// Smallest box containing every point, `None` for an empty iterator
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut iter = points.into_iter();
        let (lon, lat) = iter.next()?;
        let mut bbox = Self::new(lon, lat, lon, lat);
        for (lon, lat) in iter {
            bbox.west = bbox.west.min(lon);
            bbox.east = bbox.east.max(lon);
            bbox.south = bbox.south.min(lat);
            bbox.north = bbox.north.max(lat);
        }
        Some(bbox)
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Grow each side by `fraction` of the box span
    ///
    /// Degenerate spans are first widened by `min_span` so a single-node
    /// network still produces a drawable extent.
    pub fn padded(&self, fraction: f64, min_span: f64) -> Self {
        let (mut west, mut east) = (self.west, self.east);
        let (mut south, mut north) = (self.south, self.north);
        if east - west < min_span {
            let mid = (west + east) / 2.0;
            west = mid - min_span / 2.0;
            east = mid + min_span / 2.0;
        }
        if north - south < min_span {
            let mid = (south + north) / 2.0;
            south = mid - min_span / 2.0;
            north = mid + min_span / 2.0;
        }
        let dx = (east - west) * fraction;
        let dy = (north - south) * fraction;
        Self::new(west - dx, south - dy, east + dx, north + dy)
    }

    /// Grow each side by `meters`, measured at the box center latitude
    pub fn buffered(&self, meters: f64) -> Self {
        let mid_lat = (self.south + self.north) / 2.0;
        let delta_lat = (meters / EARTH_RADIUS_M).to_degrees();
        let delta_lon = (meters / (EARTH_RADIUS_M * mid_lat.to_radians().cos())).to_degrees();
        Self::new(
            self.west - delta_lon,
            self.south - delta_lat,
            self.east + delta_lon,
            self.north + delta_lat,
        )
    }
}

/// Great-circle distance in meters (haversine)
pub fn great_circle_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lon1, lat1) = (a.0.to_radians(), a.1.to_radians());
    let (lon2, lat2) = (b.0.to_radians(), b.1.to_radians());
    let h = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lon2 - lon1) / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Project `(lon, lat)` to normalized Web Mercator `(x, y)`
pub fn to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (lon + 180.0) / 360.0;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0;
    (x, y)
}

/// Inverse of [`to_mercator`]
pub fn from_mercator(x: f64, y: f64) -> (f64, f64) {
    let lon = x * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    (lon, lat)
}

/// Tile zoom level that shows a box with a handful of tiles
///
/// Takes the coarser of the per-axis zooms so the whole box stays covered,
/// clamped to `[0, max_zoom]`.
pub fn auto_zoom(bbox: &BBox, max_zoom: u8) -> u8 {
    let zoom_for = |span: f64| -> f64 {
        if span <= 0.0 {
            f64::from(max_zoom)
        } else {
            (720.0 / span).log2().ceil()
        }
    };
    let zoom = zoom_for(bbox.width()).min(zoom_for(bbox.height()));
    zoom.clamp(0.0, f64::from(max_zoom)) as u8
}

/// Maps geographic coordinates onto figure pixels
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    /// Mercator x of the left edge
    x0: f64,
    /// Mercator y of the top edge
    y0: f64,
    scale_x: f64,
    scale_y: f64,
}

impl Projector {
    pub fn new(extent: &BBox, width: u32, height: u32) -> Self {
        let (x0, y0) = to_mercator(extent.west, extent.north);
        let (x1, y1) = to_mercator(extent.east, extent.south);
        Self {
            x0,
            y0,
            scale_x: f64::from(width) / (x1 - x0),
            scale_y: f64::from(height) / (y1 - y0),
        }
    }

    /// Fractional pixel position of a coordinate
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y) = to_mercator(lon, lat);
        ((x - self.x0) * self.scale_x, (y - self.y0) * self.scale_y)
    }

    /// Nearest whole pixel, as plotters wants it
    pub fn pixel(&self, lon: f64, lat: f64) -> (i32, i32) {
        let (x, y) = self.project(lon, lat);
        (x.round() as i32, y.round() as i32)
    }
}

/// Width/height ratio of a box once projected
pub fn mercator_aspect(extent: &BBox) -> f64 {
    let (x0, y0) = to_mercator(extent.west, extent.north);
    let (x1, y1) = to_mercator(extent.east, extent.south);
    (x1 - x0) / (y1 - y0)
}
