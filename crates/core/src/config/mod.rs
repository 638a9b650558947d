use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    assets::AssetConfig, capture::CaptureConstraints, landmarks::DetectorOptions,
    overlay::OverlayStyle, record::RecordingSettings, upload::UploadConfig, MaskCamError, Result,
};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub overlay: OverlayConfig,
    pub detector: DetectorOptions,
    pub capture: CaptureConstraints,
    pub recording: RecordingSettings,
    pub upload: UploadConfig,
    pub assets: AssetConfig,
}

impl AppConfig {
    /// Reads a JSON config file. Missing sections fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.overlay.style.scale_multiplier.is_finite()
            && self.overlay.style.scale_multiplier > 0.0)
        {
            return Err(MaskCamError::InvalidInput(
                "overlay.style.scale_multiplier must be a positive number",
            ));
        }
        if !self.overlay.style.vertical_offset.is_finite() {
            return Err(MaskCamError::InvalidInput(
                "overlay.style.vertical_offset must be finite",
            ));
        }
        if self.detector.max_faces != 1 {
            return Err(MaskCamError::InvalidInput(
                "only a single tracked face is supported",
            ));
        }
        self.upload.validate()?;
        if let Some(mask) = &self.overlay.default_mask {
            if !self.assets.mask_keys.iter().any(|key| key == mask) {
                return Err(MaskCamError::msg(format!(
                    "default mask `{mask}` is not one of the configured mask keys"
                )));
            }
        }
        Ok(())
    }
}

/// Overlay defaults applied when the render loop starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub default_mask: Option<String>,
    pub style: OverlayStyle,
}
