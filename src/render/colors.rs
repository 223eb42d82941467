//! Color parsing for plot properties
//!
//! Accepts hex strings and the handful of color names the plot defaults use.
//! Named colors follow the CSS/matplotlib definitions, so "green" is the
//! darker `#008000`, not pure green.

use plotters::style::RGBColor;

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
];

/// Parse a color name or hex string to an RGB array
pub fn parse_color(value: &str) -> Option<[u8; 3]> {
    let value = value.trim();
    NAMED_COLORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(value))
        .map(|(_, rgb)| *rgb)
        .or_else(|| parse_hex_color(value))
}

/// Parse a hex color string to RGB array
///
/// Supports formats:
/// - `#RRGGBB` (6 hex digits)
/// - `#RRGGBBAA` (8 hex digits, alpha ignored)
/// - `RRGGBB` / `RRGGBBAA` (without #)
pub fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.trim_start_matches('#');

    if (hex.len() != 6 && hex.len() != 8) || !hex.is_ascii() {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some([r, g, b])
}

pub fn to_rgb(color: [u8; 3]) -> RGBColor {
    RGBColor(color[0], color[1], color[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF0000"), Some([255, 0, 0]));
        assert_eq!(parse_hex_color("#1F78B4"), Some([31, 120, 180]));
        assert_eq!(parse_hex_color("111111"), Some([17, 17, 17]));
        // Alpha is ignored
        assert_eq!(parse_hex_color("#440154FF"), Some([68, 1, 84]));

        assert_eq!(parse_hex_color("#FFF"), None);
        assert_eq!(parse_hex_color("GGGGGG"), None);
        assert_eq!(parse_hex_color("#ééé"), None);
    }

    #[test]
    fn test_parse_named_color() {
        assert_eq!(parse_color("green"), Some([0, 128, 0]));
        assert_eq!(parse_color(" Blue "), Some([0, 0, 255]));
        assert_eq!(parse_color("yellow"), Some([255, 255, 0]));
        assert_eq!(parse_color("chartreuse"), None);
    }
}
