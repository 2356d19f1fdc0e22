//! Conversion options file
//!
//! Everything here has a default, so the file is optional and may be
//! partial. Command-line flags override whatever the file sets.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::quilt::{
    FrameAddressing, DEFAULT_LINEAR_TILES, DEFAULT_TILES_HORIZONTAL, DEFAULT_TILES_VERTICAL,
};
use crate::reproject::SamplingOrigin;

/// Per-pixel sampling settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RenderConfig {
    #[serde(default)]
    pub sampling_origin: SamplingOrigin,

    /// Column selection inside frame-set views
    #[serde(default)]
    pub frame_addressing: FrameAddressing,

    /// Worker threads for rendering and decoding (rayon default when unset)
    #[serde(default)]
    pub threads: Option<usize>,
}

/// Quilt geometry defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutConfig {
    #[serde(default = "default_tiles_horizontal")]
    pub tiles_horizontal: u32,

    #[serde(default = "default_tiles_vertical")]
    pub tiles_vertical: u32,

    #[serde(default = "default_linear_tiles")]
    pub linear_tiles: u32,

    /// Accept quilts whose size is not a multiple of the tile grid
    #[serde(default)]
    pub allow_uneven_tiles: bool,
}

fn default_tiles_horizontal() -> u32 { DEFAULT_TILES_HORIZONTAL }
fn default_tiles_vertical() -> u32 { DEFAULT_TILES_VERTICAL }
fn default_linear_tiles() -> u32 { DEFAULT_LINEAR_TILES }

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            tiles_horizontal: DEFAULT_TILES_HORIZONTAL,
            tiles_vertical: DEFAULT_TILES_VERTICAL,
            linear_tiles: DEFAULT_LINEAR_TILES,
            allow_uneven_tiles: false,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub layout: LayoutConfig,
}

impl Config {
    /// Load configuration from a file, or fall back to defaults if it doesn't exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("Config {:?} not found, using defaults", path);
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.render.sampling_origin, SamplingOrigin::PixelCenter);
        assert_eq!(config.render.frame_addressing, FrameAddressing::ChannelColumn);
        assert_eq!(config.render.threads, None);
        assert_eq!(config.layout.tiles_horizontal, 5);
        assert_eq!(config.layout.tiles_vertical, 9);
        assert_eq!(config.layout.linear_tiles, 45);
        assert!(!config.layout.allow_uneven_tiles);
    }

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [render]
            sampling_origin = "pixel-edge"
            threads = 4

            [layout]
            tiles_vertical = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.render.sampling_origin, SamplingOrigin::PixelEdge);
        assert_eq!(config.render.frame_addressing, FrameAddressing::ChannelColumn);
        assert_eq!(config.render.threads, Some(4));
        assert_eq!(config.layout.tiles_horizontal, 5);
        assert_eq!(config.layout.tiles_vertical, 8);
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempfile::tempdir().unwrap();

        let missing = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(missing, Config::default());

        let path = dir.path().join("quilt2native.toml");
        std::fs::write(&path, "[render]\nframe_addressing = \"shared-column\"\n").unwrap();
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.render.frame_addressing, FrameAddressing::SharedColumn);

        std::fs::write(&path, "[render]\nsampling_origin = \"corner\"\n").unwrap();
        assert!(Config::load_or_default(&path).is_err());
    }
}
