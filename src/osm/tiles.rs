//! Slippy-map tile addressing
//!
//! Tiles at zoom `z` split the normalized Web Mercator square into a
//! `2^z × 2^z` grid, `x` growing east and `y` growing south.

use super::error::Result;
use crate::geo::{to_mercator, BBox};
use image::RgbImage;
use std::ops::RangeInclusive;

/// Anything that can hand out basemap tiles
#[allow(async_fn_in_trait)]
pub trait TileSource {
    async fn tile(&self, z: u8, x: u32, y: u32) -> Result<RgbImage>;
}

/// Substitute `{z}`, `{x}`, `{y}` (and a fixed `{s}` subdomain) in a URL template
pub fn tile_url(template: &str, z: u8, x: u32, y: u32) -> String {
    template
        .replace("{z}", &z.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
        .replace("{s}", "a")
}

/// Number of tiles along one axis at `zoom`
pub fn tiles_per_axis(zoom: u8) -> u32 {
    1u32 << zoom.min(31)
}

/// Tile columns and rows covering `bbox` at `zoom`
pub fn tile_range(bbox: &BBox, zoom: u8) -> (RangeInclusive<u32>, RangeInclusive<u32>) {
    let n = tiles_per_axis(zoom);
    let index = |v: f64| -> u32 { ((v * f64::from(n)).floor().max(0.0) as u32).min(n - 1) };

    let (x0, y0) = to_mercator(bbox.west, bbox.north);
    let (x1, y1) = to_mercator(bbox.east, bbox.south);

    (index(x0)..=index(x1), index(y0)..=index(y1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_url() {
        assert_eq!(
            tile_url("https://tile.openstreetmap.org/{z}/{x}/{y}.png", 17, 66313, 48963),
            "https://tile.openstreetmap.org/17/66313/48963.png"
        );
        assert_eq!(
            tile_url("https://{s}.tiles.example/{z}/{x}/{y}", 1, 0, 1),
            "https://a.tiles.example/1/0/1"
        );
    }

    #[test]
    fn test_tile_range_world() {
        let world = BBox::new(-180.0, -85.0, 180.0, 85.0);
        let (xs, ys) = tile_range(&world, 1);
        assert_eq!(xs, 0..=1);
        assert_eq!(ys, 0..=1);
        let (xs, ys) = tile_range(&world, 0);
        assert_eq!(xs, 0..=0);
        assert_eq!(ys, 0..=0);
    }

    #[test]
    fn test_tile_range_small_box() {
        // Plaça de Catalunya, Barcelona at zoom 17
        let bbox = BBox::new(2.1695, 41.3865, 2.1705, 41.3875);
        let (xs, ys) = tile_range(&bbox, 17);
        assert_eq!(xs, 66325..=66326);
        assert_eq!(ys, 48954..=48955);
        // North-west corner is the first tile
        let (x, y) = to_mercator(bbox.west, bbox.north);
        assert_eq!(*ys.start(), (y * 131072.0).floor() as u32);
        assert_eq!(*xs.start(), (x * 131072.0).floor() as u32);
    }
}
