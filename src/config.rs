//! Render configuration: defaults, an optional RON file, and CLI overrides,
//! applied in that precedence order (CLI highest), using the `serde` + `ron`
//! config loading convention this crate follows elsewhere; `deny_unknown_fields`
//! catches typos in hand-written scene files instead of silently ignoring them.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenePreset {
    /// A Cornell-box-like enclosure: five walls plus a light rectangle.
    CornellBox,
    /// Three spheres (lambert/metal/dielectric) over a ground plane.
    Spheres,
}

impl Default for ScenePreset {
    fn default() -> Self {
        Self::CornellBox
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RenderConfig {
    pub image_width: u32,
    pub image_height: u32,
    pub samples_per_pixel: u32,
    pub max_bounces: u32,
    pub seed: u64,
    pub output_dir: String,
    pub scene: ScenePreset,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            image_width: 400,
            image_height: 400,
            samples_per_pixel: 32,
            max_bounces: 8,
            seed: 0,
            output_dir: "render".into(),
            scene: ScenePreset::default(),
        }
    }
}

impl RenderConfig {
    /// Loads a config from a RON file, falling back to defaults for every
    /// field the file doesn't mention (RON's `#[serde(default)]` merge,
    /// not a partial-struct trick).
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        ron::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }
}

/// CLI-supplied overrides; `None` means "use the config/default value".
/// Mirrors the `clap` derive usage in `main.rs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderConfigOverrides {
    pub seed: Option<u64>,
    pub samples: Option<u32>,
    pub max_bounces: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl RenderConfigOverrides {
    pub fn apply(&self, mut config: RenderConfig) -> RenderConfig {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(samples) = self.samples {
            config.samples_per_pixel = samples;
        }
        if let Some(max_bounces) = self.max_bounces {
            config.max_bounces = max_bounces;
        }
        if let Some(width) = self.width {
            config.image_width = width;
        }
        if let Some(height) = self.height {
            config.image_height = height;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_well_formed() {
        let config = RenderConfig::default();
        assert!(config.image_width > 0);
        assert!(config.samples_per_pixel > 0);
    }

    #[test]
    fn overrides_only_touch_specified_fields() {
        let base = RenderConfig::default();
        let overrides = RenderConfigOverrides {
            samples: Some(64),
            ..Default::default()
        };
        let updated = overrides.apply(base.clone());
        assert_eq!(updated.samples_per_pixel, 64);
        assert_eq!(updated.image_width, base.image_width);
    }

    #[test]
    fn rejects_unknown_fields() {
        let ron_text = "(image_width: 10, bogus_field: 1)";
        let result: Result<RenderConfig, _> = ron::from_str(ron_text);
        assert!(result.is_err());
    }
}
