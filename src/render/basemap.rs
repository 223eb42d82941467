//! Basemap composition from slippy-map tiles
//!
//! Tiles covering the extent are downloaded (a few at a time, on the calling
//! task), stitched into one mosaic, cut to the extent and resampled to the
//! figure size.

use crate::geo::{to_mercator, BBox};
use crate::osm::tiles::{tile_range, tiles_per_axis};
use crate::osm::{Result, TileSource};
use futures::{stream, StreamExt, TryStreamExt};
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Tiles requested at once
const TILE_CONCURRENCY: usize = 4;

/// Render the basemap for `extent` at `zoom` as a `width × height` image
pub async fn compose<T: TileSource>(
    source: &T,
    extent: &BBox,
    zoom: u8,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    let (xs, ys) = tile_range(extent, zoom);
    let coords: Vec<(u32, u32)> = ys
        .clone()
        .flat_map(|y| xs.clone().map(move |x| (x, y)))
        .collect();

    tracing::debug!(
        "Fetching {} basemap tile(s) at zoom {} (x {:?}, y {:?})",
        coords.len(),
        zoom,
        xs,
        ys
    );

    let tiles: Vec<RgbImage> = stream::iter(coords.iter().copied())
        .map(|(x, y)| source.tile(zoom, x, y))
        .buffered(TILE_CONCURRENCY)
        .try_collect()
        .await?;

    let mosaic = stitch(&tiles, xs.clone().count() as u32);

    let (tile_w, tile_h) = tiles
        .first()
        .map(|t| t.dimensions())
        .unwrap_or((256, 256));
    let n = f64::from(tiles_per_axis(zoom));
    let (mx0, my0) = to_mercator(extent.west, extent.north);
    let (mx1, my1) = to_mercator(extent.east, extent.south);

    // Extent corners in mosaic pixels
    let left = (mx0 * n - f64::from(*xs.start())) * f64::from(tile_w);
    let top = (my0 * n - f64::from(*ys.start())) * f64::from(tile_h);
    let right = (mx1 * n - f64::from(*xs.start())) * f64::from(tile_w);
    let bottom = (my1 * n - f64::from(*ys.start())) * f64::from(tile_h);

    let (x, w) = pixel_span(left, right, mosaic.width());
    let (y, h) = pixel_span(top, bottom, mosaic.height());

    let cropped = imageops::crop_imm(&mosaic, x, y, w, h).to_image();
    Ok(imageops::resize(&cropped, width, height, FilterType::Triangle))
}

/// Place tiles (row-major, `columns` per row) into one image
///
/// Every tile is scaled to the size of the first one.
pub fn stitch(tiles: &[RgbImage], columns: u32) -> RgbImage {
    let Some(first) = tiles.first() else {
        return RgbImage::new(1, 1);
    };
    let (tile_w, tile_h) = first.dimensions();
    let columns = columns.max(1);
    let rows = (tiles.len() as u32).div_ceil(columns);

    let mut mosaic = RgbImage::new(columns * tile_w, rows * tile_h);
    for (i, tile) in tiles.iter().enumerate() {
        let col = i as u32 % columns;
        let row = i as u32 / columns;
        let x = i64::from(col * tile_w);
        let y = i64::from(row * tile_h);
        if tile.dimensions() == (tile_w, tile_h) {
            imageops::replace(&mut mosaic, tile, x, y);
        } else {
            let scaled = imageops::resize(tile, tile_w, tile_h, FilterType::Triangle);
            imageops::replace(&mut mosaic, &scaled, x, y);
        }
    }
    mosaic
}

/// Whole-pixel `(start, length)` covering `[from, to)`, kept inside `limit`
fn pixel_span(from: f64, to: f64, limit: u32) -> (u32, u32) {
    let start = (from.floor().max(0.0) as u32).min(limit.saturating_sub(1));
    let end = (to.ceil().max(0.0) as u32).min(limit);
    (start, end.saturating_sub(start).max(1))
}
