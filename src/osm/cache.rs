//! On-disk cache for JSON service responses
//!
//! Each request maps to `<folder>/<uuid>.json`, where the UUID is derived
//! (v5, URL namespace) from the request URL and parameters. Unreadable entries
//! count as misses.

use super::error::Result;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ResponseCache {
    folder: PathBuf,
}

impl ResponseCache {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// File holding the response for `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name = Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes());
        self.folder.join(format!("{}.json", name))
    }

    /// Cached response for `key`, if any
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let path = self.path_for(key);
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(value) => {
                tracing::debug!("Cache hit {}", path.display());
                Some(value)
            }
            Err(e) => {
                tracing::warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Store a response, creating the folder if needed
    pub fn put(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        std::fs::create_dir_all(&self.folder)?;
        let path = self.path_for(key);
        std::fs::write(&path, value.to_string())?;
        tracing::debug!("Cached response in {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().join("nested/cache"));

        assert!(cache.get("https://example.org/search?q=a").is_none());
        cache
            .put("https://example.org/search?q=a", &json!([{"lat": "1"}]))
            .unwrap();
        assert_eq!(
            cache.get("https://example.org/search?q=a"),
            Some(json!([{"lat": "1"}]))
        );
        assert!(cache.get("https://example.org/search?q=b").is_none());
    }

    #[test]
    fn test_cache_keys_are_stable() {
        let cache = ResponseCache::new("cache");
        assert_eq!(cache.path_for("k"), cache.path_for("k"));
        assert_ne!(cache.path_for("k"), cache.path_for("l"));
        assert!(cache.path_for("k").starts_with("cache"));
    }

    #[test]
    fn test_cache_corrupt_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path());
        std::fs::write(cache.path_for("k"), "{not json").unwrap();
        assert!(cache.get("k").is_none());
    }
}
