mod store;

pub use store::{ConfigProvider, JsonFileConfig, StaticConfig};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Allowed digital zoom range. Zoom shrinks the sampled region of the raw
/// frame around its center; 1.0 samples the full frame.
pub const ZOOM_MIN: f32 = 1.0;
pub const ZOOM_MAX: f32 = 2.5;

/// Clip mask applied to the composited bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BubbleShape {
    Circle,
    RoundedRect,
}

/// Chroma-key parameters. `key_color` is the backdrop color to remove;
/// `threshold` is the RGB Euclidean distance below which a pixel is treated
/// as backdrop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChromaKey {
    pub enabled: bool,
    pub key_color: [u8; 3],
    pub threshold: f32,
}

impl Default for ChromaKey {
    fn default() -> Self {
        Self {
            enabled: false,
            key_color: [255, 255, 255],
            threshold: 50.0,
        }
    }
}

/// One immutable snapshot of the compositing parameters. The render loop
/// re-reads a fresh snapshot from its `ConfigProvider` at the start of every
/// tick; a snapshot is never mutated mid-tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    pub shape: BubbleShape,
    pub output_size: u32,
    pub mirrored: bool,
    pub background: Option<PathBuf>,
    pub blur_radius_px: f32,
    pub subject_opacity: f32,
    pub zoom_factor: f32,
    pub chroma_key: Option<ChromaKey>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            shape: BubbleShape::Circle,
            output_size: 512,
            mirrored: true,
            background: None,
            blur_radius_px: 0.0,
            subject_opacity: 1.0,
            zoom_factor: 1.2,
            chroma_key: None,
        }
    }
}

impl CompositorConfig {
    /// Clamp every numeric field into its documented domain. Providers run
    /// this on every snapshot so the compositor never sees an out-of-range
    /// value, no matter what a hand-edited config file contains.
    pub fn normalized(mut self) -> Self {
        self.output_size = self.output_size.max(1);
        self.zoom_factor = self.zoom_factor.clamp(ZOOM_MIN, ZOOM_MAX);
        self.subject_opacity = self.subject_opacity.clamp(0.0, 1.0);
        self.blur_radius_px = self.blur_radius_px.max(0.0);
        if let Some(key) = self.chroma_key.as_mut() {
            key.threshold = key.threshold.max(0.0);
        }
        self
    }
}
