//! Centralized rendering/display options with TOML preset support.
//!
//! All client-tweakable scene settings are consolidated here. Options
//! serialize to/from TOML so view presets can be stored on disk and
//! partially overridden.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level options container. All sub-structs use `#[serde(default)]` so
/// partial TOML files (e.g. only overriding `[display]`) work correctly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Options {
    /// Billboard display toggles.
    pub display: DisplayOptions,
}

/// Client-visible display toggles for billboard rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayOptions {
    /// Depth-test billboards against previously drawn scene geometry.
    pub depth_test: bool,
    /// Draw billboard quads as wireframe outlines (diagnostic).
    pub wireframe: bool,
    /// Depth bias in NDC units; positive values pull billboards toward the
    /// viewer to avoid z-fighting with the geometry they annotate.
    pub z_offset: f32,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            depth_test: true,
            wireframe: false,
            z_offset: 0.0,
        }
    }
}

impl Options {
    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns a message when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        toml::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {e}", path.display()))
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// Returns a message when serialization or the filesystem write fails.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize options: {e}"))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                format!("failed to create directory {}: {e}", parent.display())
            })?;
        }
        std::fs::write(path, content)
            .map_err(|e| format!("failed to write {}: {e}", path.display()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::default();
        assert!(options.display.depth_test);
        assert!(!options.display.wireframe);
        assert_eq!(options.display.z_offset, 0.0);
    }

    #[test]
    fn toml_round_trip() {
        let mut options = Options::default();
        options.display.wireframe = true;
        options.display.z_offset = 0.002;
        let text = toml::to_string_pretty(&options).unwrap();
        let parsed: Options = toml::from_str(&text).unwrap();
        assert_eq!(parsed, options);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let parsed: Options =
            toml::from_str("[display]\nz_offset = 0.5\n").unwrap();
        assert!(parsed.display.depth_test);
        assert!(!parsed.display.wireframe);
        assert_eq!(parsed.display.z_offset, 0.5);
    }
}
