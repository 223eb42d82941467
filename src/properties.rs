//! Plot property definitions with defaults from plot_properties.json
//!
//! plot_properties.json is embedded at compile time and is the single place
//! where defaults live. User values come from a flat JSON object
//! (`plot_config.json`), e.g. `{"node.color": "#FF00FF", "label.show": false}`.
//! Invalid user values are reported and replaced by the default.

use crate::error::{PlotError, Result};
use crate::render::colors::parse_color;
use std::collections::HashMap;
use std::path::Path;

/// plot_properties.json embedded at compile time
const PROPERTIES_JSON: &str = include_str!("../plot_properties.json");

/// Property definition from plot_properties.json
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub kind: PropertyKind,
    pub default_value: String,
    pub description: String,
    /// For EnumeratedProperty, the valid values
    pub valid_values: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    String,
    Enumerated,
    Double,
    Boolean,
}

/// Registry of all plot properties with their defaults
pub struct PropertyRegistry {
    properties: HashMap<String, PropertyDef>,
}

impl PropertyRegistry {
    /// Parse plot_properties.json and build the registry
    ///
    /// Panics if the embedded file is malformed, which the registry tests
    /// catch before a release.
    pub fn from_properties_json() -> Self {
        Self::from_json(PROPERTIES_JSON).expect("plot_properties.json is invalid")
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, String> {
        let json: serde_json::Value =
            serde_json::from_str(json).map_err(|e| format!("invalid JSON: {}", e))?;

        let properties_array = json["properties"]
            .as_array()
            .ok_or("missing 'properties' array")?;

        let mut properties = HashMap::new();

        for prop in properties_array {
            let name = prop["name"]
                .as_str()
                .ok_or("property missing 'name'")?
                .to_string();

            let kind = match prop["kind"].as_str() {
                Some("StringProperty") => PropertyKind::String,
                Some("EnumeratedProperty") => PropertyKind::Enumerated,
                Some("DoubleProperty") => PropertyKind::Double,
                Some("BooleanProperty") => PropertyKind::Boolean,
                other => return Err(format!("unknown kind {:?} for '{}'", other, name)),
            };

            let default_value = prop["defaultValue"].as_str().unwrap_or("").to_string();
            let description = prop["description"].as_str().unwrap_or("").to_string();

            let valid_values = if kind == PropertyKind::Enumerated {
                prop["values"].as_array().map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(|s| s.to_string()))
                        .collect()
                })
            } else {
                None
            };

            properties.insert(
                name.clone(),
                PropertyDef {
                    name,
                    kind,
                    default_value,
                    description,
                    valid_values,
                },
            );
        }

        Ok(Self { properties })
    }

    /// Get the default value for a property
    pub fn get_default(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(|p| p.default_value.as_str())
    }

    /// Get the property definition
    pub fn get_property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.get(name)
    }

    /// All property names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check if a value is valid for an enumerated property
    pub fn is_valid_enum_value(&self, name: &str, value: &str) -> bool {
        self.properties
            .get(name)
            .and_then(|p| p.valid_values.as_ref())
            .map(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value)))
            .unwrap_or(true) // Non-enumerated properties accept any value
    }
}

/// Global registry instance (initialized lazily)
static REGISTRY: std::sync::OnceLock<PropertyRegistry> = std::sync::OnceLock::new();

/// Get the global property registry
pub fn registry() -> &'static PropertyRegistry {
    REGISTRY.get_or_init(PropertyRegistry::from_properties_json)
}

/// Typed property reader
///
/// User values take precedence; anything unset or invalid falls back to the
/// registry default.
#[derive(Debug, Clone, Default)]
pub struct PropertyReader {
    user_values: HashMap<String, String>,
}

impl PropertyReader {
    /// Reader with no user values (all defaults)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a name → value map; empty values count as unset
    pub fn from_values(values: HashMap<String, String>) -> Self {
        let user_values: HashMap<String, String> =
            values.into_iter().filter(|(_, v)| !v.is_empty()).collect();

        for name in user_values.keys() {
            if registry().get_property(name).is_none() {
                tracing::warn!("Unknown property '{}' is ignored", name);
            }
        }

        Self { user_values }
    }

    /// Parse a flat JSON object of property values
    ///
    /// Strings, numbers and booleans are accepted; other values are skipped.
    pub fn from_json(json: &str) -> std::result::Result<Self, String> {
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| e.to_string())?;

        let mut values = HashMap::new();
        for (key, value) in map {
            let value_str = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => {
                    tracing::warn!("Property '{}' has unsupported value {}", key, other);
                    continue;
                }
            };
            values.insert(key, value_str);
        }

        Ok(Self::from_values(values))
    }

    /// Load a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            PlotError::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&json).map_err(|e| {
            PlotError::Config(format!("Failed to parse '{}': {}", path.display(), e))
        })
    }

    /// Override one value (environment or command-line sourced)
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.user_values.remove(name);
        } else {
            self.user_values.insert(name.to_string(), value);
        }
    }

    fn default_of(name: &str) -> &'static str {
        registry().get_default(name).unwrap_or("")
    }

    /// Get string property (user value or default)
    pub fn get_string(&self, name: &str) -> String {
        if let Some(value) = self.user_values.get(name) {
            return value.clone();
        }
        Self::default_of(name).to_string()
    }

    /// Get optional string property (None if empty)
    pub fn get_optional_string(&self, name: &str) -> Option<String> {
        let value = self.get_string(name);
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Get enumerated property with validation, lowercased
    pub fn get_enum(&self, name: &str) -> String {
        let reg = registry();
        let default = Self::default_of(name);

        if let Some(value) = self.user_values.get(name) {
            if reg.is_valid_enum_value(name, value) {
                return value.to_lowercase();
            }
            let valid_values = reg
                .get_property(name)
                .and_then(|p| p.valid_values.as_ref())
                .map(|v| v.join(", "))
                .unwrap_or_default();
            tracing::warn!(
                "Invalid value '{}' for property '{}'. Valid values: [{}]. Using default: '{}'",
                value,
                name,
                valid_values,
                default
            );
        }

        default.to_string()
    }

    /// Get f64 property; unparsable values fall back to the default
    pub fn get_f64(&self, name: &str) -> f64 {
        let default = Self::default_of(name).parse::<f64>().unwrap_or(0.0);

        let Some(value) = self.user_values.get(name) else {
            return default;
        };

        match value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                tracing::warn!(
                    "Invalid numeric value '{}' for property '{}'. Using default: {}",
                    value,
                    name,
                    default
                );
                default
            }
        }
    }

    /// Get f64 property with range validation
    pub fn get_f64_in_range(&self, name: &str, min: f64, max: f64) -> f64 {
        let value = self.get_f64(name);
        let default = Self::default_of(name).parse::<f64>().unwrap_or(0.0);

        if value >= min && value <= max {
            value
        } else {
            tracing::warn!(
                "Value {} for property '{}' out of range [{}, {}]. Using default: {}",
                value,
                name,
                min,
                max,
                default
            );
            default
        }
    }

    /// Get boolean property ("true"/"false", case-insensitive)
    pub fn get_bool(&self, name: &str) -> bool {
        let default = Self::default_of(name).eq_ignore_ascii_case("true");

        match self.user_values.get(name).map(|v| v.to_lowercase()) {
            Some(v) if v == "true" => true,
            Some(v) if v == "false" => false,
            Some(other) => {
                tracing::warn!(
                    "Invalid boolean value '{}' for property '{}'. Using default: {}",
                    other,
                    name,
                    default
                );
                default
            }
            None => default,
        }
    }

    /// Get color property (hex or named)
    pub fn get_color(&self, name: &str) -> [u8; 3] {
        let value = self.get_string(name);
        if let Some(color) = parse_color(&value) {
            return color;
        }

        let default = Self::default_of(name);
        tracing::warn!(
            "Invalid color '{}' for property '{}'. Using default: '{}'",
            value,
            name,
            default
        );
        parse_color(default).unwrap_or([128, 128, 128])
    }
}

/// Plot dimension - either explicit pixels or "auto" (derived from the map extent)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PlotDimension {
    #[default]
    Auto,
    Pixels(u32),
}

impl PlotDimension {
    /// Parse from string property value
    ///
    /// Valid formats:
    /// - "auto" or "" (empty) → Auto
    /// - "1500" → Pixels(1500) if in valid range [100, 10000]
    pub fn from_str(value: &str, default: PlotDimension) -> Self {
        let trimmed = value.trim();

        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
            return PlotDimension::Auto;
        }

        match trimmed.parse::<u32>() {
            Ok(px) if (100..=10000).contains(&px) => PlotDimension::Pixels(px),
            Ok(px) => {
                tracing::warn!(
                    "Plot dimension {} out of valid range [100-10000], using default: {:?}",
                    px,
                    default
                );
                default
            }
            Err(_) => {
                tracing::warn!(
                    "Invalid plot dimension '{}', using default: {:?}",
                    trimmed,
                    default
                );
                default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(pairs: &[(&str, &str)]) -> PropertyReader {
        PropertyReader::from_values(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_registry_loads() {
        let reg = registry();
        assert!(reg.get_property("network.type").is_some());
        assert!(reg.get_property("basemap.url").is_some());
        assert!(reg.get_property("plot.width").is_some());
        assert!(reg.names().len() > 20);
    }

    #[test]
    fn test_registry_defaults() {
        let reg = registry();
        assert_eq!(reg.get_default("network.type"), Some("drive"));
        assert_eq!(reg.get_default("node.color"), Some("red"));
        assert_eq!(reg.get_default("label.offset"), Some("0.000025"));
        assert_eq!(reg.get_default("output.root"), Some("figures"));
    }

    #[test]
    fn test_registry_defaults_are_valid() {
        // Every default must survive its own validation
        let reg = registry();
        for name in reg.names() {
            let def = reg.get_property(name).unwrap();
            match def.kind {
                PropertyKind::Double => {
                    assert!(def.default_value.parse::<f64>().is_ok(), "{}", name)
                }
                PropertyKind::Boolean => {
                    assert!(
                        def.default_value == "true" || def.default_value == "false",
                        "{}",
                        name
                    )
                }
                PropertyKind::Enumerated => {
                    assert!(reg.is_valid_enum_value(name, &def.default_value), "{}", name)
                }
                PropertyKind::String => {}
            }
            if name.ends_with(".color") {
                assert!(parse_color(&def.default_value).is_some(), "{}", name);
            }
        }
    }

    #[test]
    fn test_enum_validation() {
        let reg = registry();
        assert!(reg.is_valid_enum_value("network.type", "walk"));
        assert!(reg.is_valid_enum_value("network.type", "DRIVE"));
        assert!(!reg.is_valid_enum_value("network.type", "boat"));
    }

    #[test]
    fn test_property_reader_defaults() {
        let reader = PropertyReader::new();
        assert_eq!(reader.get_enum("network.type"), "drive");
        assert_eq!(reader.get_f64("node.size"), 20.0);
        assert!(reader.get_bool("basemap.enabled"));
        assert_eq!(reader.get_color("initial.color"), [0, 128, 0]);
        assert_eq!(reader.get_optional_string("label.font"), None);
    }

    #[test]
    fn test_property_reader_user_values() {
        let reader = reader(&[
            ("network.type", "Walk"),
            ("node.size", "12.5"),
            ("basemap.enabled", "FALSE"),
            ("node.color", "#00ff00"),
        ]);
        assert_eq!(reader.get_enum("network.type"), "walk");
        assert_eq!(reader.get_f64("node.size"), 12.5);
        assert!(!reader.get_bool("basemap.enabled"));
        assert_eq!(reader.get_color("node.color"), [0, 255, 0]);
    }

    #[test]
    fn test_property_reader_invalid_values_fall_back() {
        let reader = reader(&[
            ("network.type", "boat"),
            ("node.size", "big"),
            ("basemap.enabled", "maybe"),
            ("node.color", "#GG0000"),
            ("route.alpha", "3"),
        ]);
        assert_eq!(reader.get_enum("network.type"), "drive");
        assert_eq!(reader.get_f64("node.size"), 20.0);
        assert!(reader.get_bool("basemap.enabled"));
        assert_eq!(reader.get_color("node.color"), [255, 0, 0]);
        assert_eq!(reader.get_f64_in_range("route.alpha", 0.0, 1.0), 0.5);
    }

    #[test]
    fn test_property_reader_from_json() {
        let reader = PropertyReader::from_json(
            r#"{"label.show": false, "edge.linewidth": 1, "basemap.url": "", "x": [1]}"#,
        )
        .unwrap();
        assert!(!reader.get_bool("label.show"));
        assert_eq!(reader.get_f64("edge.linewidth"), 1.0);
        // Empty string means unset
        assert_eq!(
            reader.get_string("basemap.url"),
            "https://tile.openstreetmap.org/{z}/{x}/{y}.png"
        );
        assert!(PropertyReader::from_json("[1, 2]").is_err());
    }

    #[test]
    fn test_property_reader_set() {
        let mut reader = PropertyReader::new();
        reader.set("overpass.url", "http://localhost:12345/api/interpreter");
        assert_eq!(
            reader.get_string("overpass.url"),
            "http://localhost:12345/api/interpreter"
        );
        reader.set("overpass.url", "");
        assert_eq!(
            reader.get_string("overpass.url"),
            "https://overpass-api.de/api/interpreter"
        );
    }

    #[test]
    fn test_plot_dimension_auto() {
        assert_eq!(
            PlotDimension::from_str("auto", PlotDimension::Auto),
            PlotDimension::Auto
        );
        assert_eq!(
            PlotDimension::from_str("", PlotDimension::Auto),
            PlotDimension::Auto
        );
    }

    #[test]
    fn test_plot_dimension_pixels() {
        assert_eq!(
            PlotDimension::from_str("1500", PlotDimension::Auto),
            PlotDimension::Pixels(1500)
        );
    }

    #[test]
    fn test_plot_dimension_invalid() {
        assert_eq!(
            PlotDimension::from_str("abc", PlotDimension::Auto),
            PlotDimension::Auto
        );
        assert_eq!(
            PlotDimension::from_str("50", PlotDimension::Pixels(800)),
            PlotDimension::Pixels(800)
        );
    }
}
