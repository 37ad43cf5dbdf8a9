//! Virtual-background tuning.
//!
//! [`EffectConfig`] can be deserialized strictly with serde, or read
//! leniently from a loose JSON parameter object with
//! [`EffectConfig::from_json`]. Either way [`EffectConfig::validate`] decides
//! whether the values are usable.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::effects::blur::BlurKind;
use crate::error::EffectError;
use crate::params::Params;

pub const MAX_BLUR_RADIUS: f32 = 64.0;
pub const MAX_DOWNSAMPLE_FACTOR: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EffectConfig {
    /// When false the frame is drawn through unchanged.
    pub enabled: bool,
    /// Background blur radius in downsampled pixels.
    pub blur_radius: f32,
    /// The frame is shrunk by this factor before the background blur.
    pub downsample_factor: u32,
    /// Box-blur radius applied to every mask.
    pub mask_blur_radius: f32,
    pub background_blur: BlurKind,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blur_radius: 16.0,
            downsample_factor: 2,
            mask_blur_radius: 2.0,
            background_blur: BlurKind::Gaussian,
        }
    }
}

impl EffectConfig {
    /// Reads a config from `params`, taking the default for every missing or
    /// mistyped key, then validates it.
    ///
    /// An unrecognised `background_blur` name is an error rather than a
    /// silent fallback.
    pub fn from_json(params: &Value) -> Result<Self, EffectError> {
        let p = Params::new(params);
        let defaults = Self::default();
        let background_blur = match p.str("background_blur") {
            Some(name) => BlurKind::from_name(name).ok_or_else(|| {
                EffectError::InvalidConfig(format!("unknown background_blur {name:?}"))
            })?,
            None => defaults.background_blur,
        };
        let config = Self {
            enabled: p.bool("enabled", defaults.enabled),
            blur_radius: p.f32("blur_radius", defaults.blur_radius),
            downsample_factor: p.u32("downsample_factor", defaults.downsample_factor),
            mask_blur_radius: p.f32("mask_blur_radius", defaults.mask_blur_radius),
            background_blur,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EffectError> {
        check_radius("blur_radius", self.blur_radius)?;
        check_radius("mask_blur_radius", self.mask_blur_radius)?;
        if !(1..=MAX_DOWNSAMPLE_FACTOR).contains(&self.downsample_factor) {
            return Err(EffectError::InvalidConfig(format!(
                "downsample_factor must be in 1..={MAX_DOWNSAMPLE_FACTOR}, got {}",
                self.downsample_factor
            )));
        }
        Ok(())
    }

    /// Size the background blur runs at for a `width` x `height` frame.
    /// Never smaller than 1x1.
    pub fn downsampled_size(&self, width: u32, height: u32) -> (u32, u32) {
        let factor = self.downsample_factor.max(1);
        ((width / factor).max(1), (height / factor).max(1))
    }
}

fn check_radius(name: &str, value: f32) -> Result<(), EffectError> {
    if value.is_finite() && (0.0..=MAX_BLUR_RADIUS).contains(&value) {
        Ok(())
    } else {
        Err(EffectError::InvalidConfig(format!(
            "{name} must be in 0..={MAX_BLUR_RADIUS}, got {value}"
        )))
    }
}
