//! Label font registration
//!
//! Plotters draws text through `ab_glyph` and only knows fonts registered at
//! runtime. The first call registers either the configured font file or the
//! first system font found. A successful registration is remembered for the
//! process.

use ab_glyph::FontRef;
use plotters::style::{register_font, FontStyle};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Family name labels are drawn with
pub const LABEL_FAMILY: &str = "sans-serif";

/// Fonts tried when no font file is configured
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static LABEL_FONT: OnceLock<PathBuf> = OnceLock::new();

/// Make sure a label font is registered
///
/// Returns the registered font file, or `None` when no usable font exists and
/// labels have to be skipped. Only a successful registration is remembered,
/// so a later call with a configured font can still succeed.
pub fn ensure_label_font(configured: Option<&Path>) -> Option<&'static Path> {
    if let Some(path) = LABEL_FONT.get() {
        return Some(path.as_path());
    }
    let path = register_first(configured)?;
    Some(LABEL_FONT.get_or_init(|| path).as_path())
}

fn register_first(configured: Option<&Path>) -> Option<PathBuf> {
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from));

    for path in candidates {
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        if FontRef::try_from_slice(&bytes).is_err() {
            tracing::warn!("Unusable font {}", path.display());
            continue;
        }
        // Plotters keeps the font for the whole process
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        match register_font(LABEL_FAMILY, FontStyle::Normal, bytes) {
            Ok(()) => {
                tracing::debug!("Registered label font {}", path.display());
                return Some(path);
            }
            Err(_) => tracing::warn!("Unusable font {}", path.display()),
        }
    }

    if let Some(path) = configured {
        tracing::warn!("Label font {} could not be loaded", path.display());
    }
    tracing::warn!("No label font found, node labels will be skipped");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_font_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font").unwrap();
        assert!(FontRef::try_from_slice(&std::fs::read(&bogus).unwrap()).is_err());
        // Falls through to the next candidate instead of failing
        let found = register_first(Some(&bogus));
        assert_ne!(found.as_deref(), Some(bogus.as_path()));
    }

    #[test]
    fn test_configured_font_registers() {
        let fixture =
            Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSans.ttf");
        assert!(ensure_label_font(Some(&fixture)).is_some());
        // Remembered for later calls without a configured font
        assert!(ensure_label_font(None).is_some());
    }
}
