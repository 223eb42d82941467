use super::cache::ResponseCache;
use super::error::{OsmError, Result};
use super::overpass::{self, NetworkType};
use super::tiles::{tile_url, TileSource};
use crate::geo::BBox;
use crate::graph::NetworkGraph;
use image::RgbImage;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Service endpoints and HTTP behavior
#[derive(Debug, Clone)]
pub struct OsmSettings {
    /// Nominatim base URL (the `/search` endpoint is appended)
    pub nominatim_url: String,
    /// Overpass interpreter endpoint
    pub overpass_url: String,
    pub timeout: Duration,
    /// Required by the OpenStreetMap usage policies
    pub user_agent: String,
    /// Response cache folder, None disables caching
    pub cache_folder: Option<PathBuf>,
}

/// What to download: the network of a type around a geocoded address
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkQuery {
    pub address: String,
    /// Meters from the address to the box edges
    pub distance: f64,
    pub network_type: NetworkType,
    /// Extra meters downloaded around the box
    pub buffer: f64,
}

/// Anything that can produce a street network for a query
#[allow(async_fn_in_trait)]
pub trait NetworkSource {
    async fn network(&self, query: &NetworkQuery) -> Result<NetworkGraph>;
}

/// One Nominatim search hit; coordinates come as strings
#[derive(Debug, Deserialize)]
struct GeocodeHit {
    lat: String,
    lon: String,
}

/// Extract `(lat, lon)` from a Nominatim search response
pub fn parse_geocode(value: serde_json::Value, query: &str) -> Result<(f64, f64)> {
    let hits: Vec<GeocodeHit> =
        serde_json::from_value(value).map_err(|e| OsmError::InvalidResponse {
            service: "Nominatim",
            reason: e.to_string(),
        })?;

    let hit = hits
        .into_iter()
        .next()
        .ok_or_else(|| OsmError::Geocode(query.to_string()))?;

    let parse = |v: &str| {
        v.parse::<f64>().map_err(|e| OsmError::InvalidResponse {
            service: "Nominatim",
            reason: format!("invalid coordinate '{}': {}", v, e),
        })
    };

    Ok((parse(&hit.lat)?, parse(&hit.lon)?))
}

/// HTTP client for Nominatim, Overpass and tile servers
pub struct OsmClient {
    http: reqwest::Client,
    settings: OsmSettings,
    cache: Option<ResponseCache>,
}

impl OsmClient {
    pub fn new(settings: OsmSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| OsmError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let cache = settings.cache_folder.clone().map(ResponseCache::new);

        Ok(Self {
            http,
            settings,
            cache,
        })
    }

    pub fn settings(&self) -> &OsmSettings {
        &self.settings
    }

    /// Geocode an address to `(lat, lon)`
    pub async fn geocode(&self, address: &str) -> Result<(f64, f64)> {
        let url = format!("{}/search", self.settings.nominatim_url.trim_end_matches('/'));
        let params = [("q", address), ("format", "json"), ("limit", "1")];

        let request = self.http.get(&url).query(&params);
        let cache_key = format!("{}?{}", url, encode_params(&params));

        let value = self.fetch_json("Nominatim", &url, request, &cache_key).await?;
        let (lat, lon) = parse_geocode(value, address)?;
        tracing::debug!("Geocoded '{}' to ({}, {})", address, lat, lon);
        Ok((lat, lon))
    }

    /// Download the raw Overpass response for a box
    pub async fn overpass(
        &self,
        bbox: &BBox,
        network_type: NetworkType,
    ) -> Result<overpass::OverpassResponse> {
        let query = overpass::build_query(bbox, network_type, self.settings.timeout.as_secs());
        let url = self.settings.overpass_url.clone();

        let request = self.http.post(&url).form(&[("data", query.as_str())]);
        let cache_key = format!("{}?data={}", url, query);

        let value = self.fetch_json("Overpass", &url, request, &cache_key).await?;
        overpass::parse_response(value)
    }

    /// Download one map tile
    pub async fn fetch_tile(&self, template: &str, z: u8, x: u32, y: u32) -> Result<RgbImage> {
        let url = tile_url(template, z, x, y);
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OsmError::Status {
                service: "Tile server",
                status,
                url,
            });
        }

        let bytes = response.bytes().await?;
        decode_tile(&bytes, z, x, y)
    }

    /// Tile source bound to a URL template
    pub fn tile_server<'a>(&'a self, template: &'a str) -> TileServer<'a> {
        TileServer {
            client: self,
            template,
        }
    }

    /// Send a request expecting JSON, going through the cache when enabled
    async fn fetch_json(
        &self,
        service: &'static str,
        url: &str,
        request: reqwest::RequestBuilder,
        cache_key: &str,
    ) -> Result<serde_json::Value> {
        if let Some(value) = self.cache.as_ref().and_then(|c| c.get(cache_key)) {
            return Ok(value);
        }

        tracing::debug!("Requesting {} ({})", service, url);
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OsmError::Status {
                service,
                status,
                url: url.to_string(),
            });
        }

        let value: serde_json::Value = response.json().await?;

        if let Some(cache) = &self.cache {
            cache.put(cache_key, &value)?;
        }

        Ok(value)
    }
}

impl NetworkSource for OsmClient {
    async fn network(&self, query: &NetworkQuery) -> Result<NetworkGraph> {
        let (lat, lon) = self.geocode(&query.address).await?;
        let bbox = BBox::around_point(lat, lon, query.distance);

        let response = self
            .overpass(&bbox.buffered(query.buffer), query.network_type)
            .await?;
        tracing::debug!("Overpass returned {} elements", response.elements.len());

        let graph = overpass::build_graph(&response, query.network_type);
        Ok(overpass::shape_network(graph, &bbox))
    }
}

/// `OsmClient` serving tiles from one URL template
pub struct TileServer<'a> {
    client: &'a OsmClient,
    template: &'a str,
}

impl TileSource for TileServer<'_> {
    async fn tile(&self, z: u8, x: u32, y: u32) -> Result<RgbImage> {
        self.client.fetch_tile(self.template, z, x, y).await
    }
}

/// Stable `k=v&k=v` rendering of request parameters for cache keys
fn encode_params(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Decode a PNG or JPEG tile
fn decode_tile(bytes: &[u8], z: u8, x: u32, y: u32) -> Result<RgbImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|source| OsmError::Tile { z, x, y, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> OsmSettings {
        OsmSettings {
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: "street_graph_plot-tests".to_string(),
            cache_folder: None,
        }
    }

    fn encoded(format: image::ImageFormat) -> Vec<u8> {
        let tile = RgbImage::from_pixel(256, 256, image::Rgb([200, 220, 240]));
        let mut buffer = std::io::Cursor::new(Vec::new());
        tile.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_decode_tile_formats() {
        for format in [image::ImageFormat::Png, image::ImageFormat::Jpeg] {
            let tile = decode_tile(&encoded(format), 16, 1, 2).unwrap();
            assert_eq!(tile.dimensions(), (256, 256));
            // JPEG is lossy, a flat color survives within a few levels
            let pixel = tile.get_pixel(128, 128).0;
            assert!((i16::from(pixel[2]) - 240).abs() <= 3, "{:?}", format);
        }

        let err = decode_tile(b"<html>rate limited</html>", 16, 1, 2).unwrap_err();
        assert!(matches!(err, OsmError::Tile { z: 16, x: 1, y: 2, .. }));
    }

    #[test]
    fn test_parse_geocode() {
        let value = json!([{"lat": "41.3870", "lon": "2.1700", "display_name": "Barcelona"}]);
        assert_eq!(parse_geocode(value, "Barcelona").unwrap(), (41.387, 2.17));
    }

    #[test]
    fn test_parse_geocode_no_hits() {
        let err = parse_geocode(json!([]), "Nowhere at all").unwrap_err();
        assert!(matches!(err, OsmError::Geocode(ref q) if q == "Nowhere at all"));
    }

    #[test]
    fn test_parse_geocode_malformed() {
        assert!(parse_geocode(json!({"error": "x"}), "q").is_err());
        assert!(parse_geocode(json!([{"lat": "north", "lon": "1"}]), "q").is_err());
    }

    #[test]
    fn test_encode_params() {
        assert_eq!(
            encode_params(&[("q", "a b"), ("format", "json")]),
            "q=a b&format=json"
        );
    }

    #[test]
    fn test_client_builds() {
        let client = OsmClient::new(settings()).unwrap();
        assert!(client.settings().cache_folder.is_none());
    }

    #[tokio::test]
    #[ignore = "requires network access to Nominatim"]
    async fn test_geocode_live() {
        let client = OsmClient::new(settings()).unwrap();
        let (lat, lon) = client
            .geocode("Plaça de Catalunya, Barcelona")
            .await
            .unwrap();
        assert!((lat - 41.387).abs() < 0.01);
        assert!((lon - 2.170).abs() < 0.01);
    }

    #[tokio::test]
    #[ignore = "requires network access to Nominatim and Overpass"]
    async fn test_network_live() {
        let client = OsmClient::new(settings()).unwrap();
        let graph = client
            .network(&NetworkQuery {
                address: "Plaça de Catalunya, Barcelona".to_string(),
                distance: 200.0,
                network_type: NetworkType::Drive,
                buffer: 500.0,
            })
            .await
            .unwrap();
        assert!(graph.node_count() > 5);
        assert_eq!(graph.weak_components().len(), 1);
    }
}
