//! Renderer settings.
//!
//! Everything here is read-only while a frame renders; the game loop owns the
//! value and hands it to the drawer by reference.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::stereo::StereoMode;

/// How dynamic lights reach the shaders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightMethod {
    /// Light data is streamed into a persistently mapped buffer while drawing.
    #[default]
    Direct,
    /// No persistent mapping: all lights are collected in a pre-pass.
    Deferred,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StereoConfig {
    pub mode: StereoMode,
    /// Distance between the eyes, in meters.
    pub eye_separation: f32,
    pub units_per_meter: f32,
    /// Distance to the virtual screen plane, in meters.
    pub screen_distance: f32,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            mode: StereoMode::Mono,
            eye_separation: 0.062,
            units_per_meter: 41.0,
            screen_distance: 0.80,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Global texturing switch for the opaque pass.
    pub texture: bool,
    pub mask_threshold: f32,
    pub mask_sprite_threshold: f32,
    /// Sort the opaque and masked lists by material before drawing.
    pub sort_textures: bool,
    pub ssao: bool,
    /// How many nested portal views may still get ambient occlusion.
    pub ssao_portals: u32,
    pub max_portal_depth: u32,
    pub light_method: LightMethod,
    pub light_models: bool,
    pub weapon_ofs_y: f32,
    pub weapon_ofs_z: f32,
    /// Vertical stretch of the level's pixels.
    pub pixel_stretch: f32,
    pub stereo: StereoConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            texture: true,
            mask_threshold: 0.5,
            mask_sprite_threshold: 0.5,
            sort_textures: false,
            ssao: false,
            ssao_portals: 1,
            max_portal_depth: 8,
            light_method: LightMethod::Direct,
            light_models: true,
            weapon_ofs_y: 0.0,
            weapon_ofs_z: 0.0,
            pixel_stretch: 1.2,
            stereo: StereoConfig::default(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl RenderConfig {
    /// Load settings from a TOML file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = RenderConfig::from_toml("").unwrap();
        assert_eq!(cfg, RenderConfig::default());
    }

    #[test]
    fn partial_override() {
        let cfg = RenderConfig::from_toml(
            r#"
            mask_threshold = 0.25
            light_method = "deferred"

            [stereo]
            mode = "side_by_side"
            "#,
        )
        .unwrap();
        assert!((cfg.mask_threshold - 0.25).abs() < 1e-6);
        assert_eq!(cfg.light_method, LightMethod::Deferred);
        assert_eq!(cfg.stereo.mode, StereoMode::SideBySide);
        assert!((cfg.stereo.eye_separation - 0.062).abs() < 1e-6);
        assert!(cfg.texture);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = RenderConfig::from_toml("mask_threshold = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
