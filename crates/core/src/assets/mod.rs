use std::{collections::HashMap, path::PathBuf, sync::Arc};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::{overlay::Dimensions, MaskCamError, Result};

/// Where mask images live and which keys exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub mask_dir: PathBuf,
    pub mask_keys: Vec<String>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            mask_dir: PathBuf::from("masks"),
            mask_keys: ["bear", "cat", "custom1", "custom2"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// A loaded overlay image. Cheap to clone; the pixels are shared and never
/// mutated.
#[derive(Debug, Clone)]
pub struct OverlaySprite {
    key: String,
    image: Arc<RgbaImage>,
}

impl OverlaySprite {
    pub fn from_image(key: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            key: key.into(),
            image: Arc::new(image),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.image.width(), self.image.height())
    }
}

/// Registry of overlay sprites keyed by mask name.
#[derive(Debug, Default)]
pub struct SpriteStore {
    config: AssetConfig,
    sprites: HashMap<String, OverlaySprite>,
}

impl SpriteStore {
    pub fn new(config: AssetConfig) -> Self {
        Self {
            config,
            sprites: HashMap::new(),
        }
    }

    pub fn is_known(&self, key: &str) -> bool {
        self.config.mask_keys.iter().any(|k| k == key) || self.sprites.contains_key(key)
    }

    /// Adds an already-decoded sprite, replacing nothing if the key is taken.
    pub fn insert(&mut self, sprite: OverlaySprite) {
        self.sprites
            .entry(sprite.key.clone())
            .or_insert(sprite);
    }

    /// Loads every configured mask up front.
    pub fn load_all(&mut self) -> Result<()> {
        for key in self.config.mask_keys.clone() {
            self.get_or_load(&key)?;
        }
        Ok(())
    }

    /// Returns the sprite for `key`, decoding it from disk on first use.
    pub fn get_or_load(&mut self, key: &str) -> Result<OverlaySprite> {
        if let Some(sprite) = self.sprites.get(key) {
            return Ok(sprite.clone());
        }
        if !self.is_known(key) {
            return Err(MaskCamError::msg(format!("unknown mask `{key}`")));
        }

        let path = self.config.mask_dir.join(format!("{key}.png"));
        let image = image::open(&path)?.to_rgba8();
        tracing::info!(
            mask = key,
            width = image.width(),
            height = image.height(),
            "loaded mask"
        );
        let sprite = OverlaySprite::from_image(key, image);
        self.sprites.insert(key.to_string(), sprite.clone());
        Ok(sprite)
    }

    pub fn get(&self, key: &str) -> Option<&OverlaySprite> {
        self.sprites.get(key)
    }
}
