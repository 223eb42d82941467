use thiserror::Error;

/// Errors that can occur when talking to OpenStreetMap services
#[derive(Debug, Error)]
pub enum OsmError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("{service} returned HTTP {status} for {url}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
        url: String,
    },

    /// Nominatim found nothing for the query
    #[error("Nominatim could not geocode query '{0}'")]
    Geocode(String),

    /// Response body did not have the expected shape
    #[error("Invalid {service} response: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },

    /// Map tile could not be decoded
    #[error("Tile {z}/{x}/{y} could not be decoded: {source}")]
    Tile {
        z: u8,
        x: u32,
        y: u32,
        #[source]
        source: image::ImageError,
    },

    /// Configuration error (invalid URLs, client setup, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response cache I/O error
    #[error("Cache error: {0}")]
    Cache(#[from] std::io::Error),
}

/// Type alias for Results using OsmError
pub type Result<T> = std::result::Result<T, OsmError>;
