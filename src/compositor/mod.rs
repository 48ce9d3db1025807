mod chroma;
mod mask;

pub use chroma::{apply_chroma_key, SOFT_EDGE_WIDTH};
pub use mask::{apply_shape_mask, ROUNDED_CORNER_RADIUS};

use crate::config::{CompositorConfig, ZOOM_MAX, ZOOM_MIN};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage, Rgba, RgbaImage};
use std::sync::Arc;

/// Side length of the intermediate subject buffer. The chroma-key pass runs
/// at this resolution regardless of the configured output size, keeping the
/// per-tick pixel cost bounded.
pub const WORKING_SIZE: u32 = 400;

/// Opaque backdrop drawn before anything else, so the output is defined even
/// with no background configured or a background that failed to load.
pub const FALLBACK_FILL: Rgba<u8> = Rgba([15, 23, 42, 255]);

/// Centered square region of the raw frame sampled for the subject layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub side: u32,
}

/// Subject crop for a frame of `frame_width` x `frame_height` at
/// `zoom_factor`: side = min(dim) / zoom, centered on both axes. Always fully
/// contained in the frame.
pub fn subject_crop(frame_width: u32, frame_height: u32, zoom_factor: f32) -> CropRect {
    let zoom = zoom_factor.clamp(ZOOM_MIN, ZOOM_MAX);
    let side = ((frame_width.min(frame_height) as f32 / zoom) as u32).max(1);
    CropRect {
        x: (frame_width - side) / 2,
        y: (frame_height - side) / 2,
        side,
    }
}

struct BackgroundCache {
    // Holding the source keeps its address from being reused, so the
    // identity check below stays sound across background switches.
    source: Arc<RgbaImage>,
    size: u32,
    scaled: RgbaImage,
}

/// The per-tick compositing pipeline. Owns the output back buffer; the same
/// inputs always produce the same pixels.
pub struct Compositor {
    output: RgbaImage,
    bg_cache: Option<BackgroundCache>,
}

impl Compositor {
    pub fn new(output_size: u32) -> Self {
        Self {
            output: RgbaImage::from_pixel(output_size.max(1), output_size.max(1), FALLBACK_FILL),
            bg_cache: None,
        }
    }

    /// The composited frame as of the last completed tick.
    pub fn output(&self) -> &RgbaImage {
        &self.output
    }

    /// Run one tick: composite `frame` under `config` into the output
    /// buffer. Returns `false` without touching the buffer when the frame
    /// has no usable dimensions yet (camera still warming up) — a skip, not
    /// an error.
    pub fn render_tick(
        &mut self,
        frame: &RgbImage,
        config: &CompositorConfig,
        background: Option<&Arc<RgbaImage>>,
    ) -> bool {
        if frame.width() == 0 || frame.height() == 0 {
            return false;
        }

        let size = config.output_size.max(1);
        if self.output.dimensions() != (size, size) {
            self.output = RgbaImage::new(size, size);
        }

        // 1. Defined backdrop, whatever happens later.
        for pixel in self.output.pixels_mut() {
            *pixel = FALLBACK_FILL;
        }

        // 2. Background image, cover-fit. Output is square, so cover-fit is
        // a centered square crop scaled to size.
        if let Some(bg) = background {
            self.draw_background(bg, size);
        }

        // 3-4. Crop, mirror, scale the subject into the working buffer.
        let crop = subject_crop(frame.width(), frame.height(), config.zoom_factor);
        let cropped = imageops::crop_imm(frame, crop.x, crop.y, crop.side, crop.side).to_image();
        let cropped = if config.mirrored {
            imageops::flip_horizontal(&cropped)
        } else {
            cropped
        };
        let scaled = if cropped.dimensions() == (WORKING_SIZE, WORKING_SIZE) {
            cropped
        } else {
            imageops::resize(&cropped, WORKING_SIZE, WORKING_SIZE, FilterType::Lanczos3)
        };
        let mut subject = DynamicImage::ImageRgb8(scaled).into_rgba8();

        // 5. Matte pass, alpha only.
        if let Some(key) = config.chroma_key.as_ref().filter(|key| key.enabled) {
            apply_chroma_key(&mut subject, key.key_color, key.threshold);
        }

        // 6. Composite the subject layer over the backdrop, then clip once.
        let mut layer = if subject.dimensions() == (size, size) {
            subject
        } else {
            imageops::resize(&subject, size, size, FilterType::Lanczos3)
        };
        if config.blur_radius_px > 0.0 {
            layer = imageops::blur(&layer, config.blur_radius_px);
        }
        if config.subject_opacity < 1.0 {
            let opacity = config.subject_opacity.clamp(0.0, 1.0);
            for pixel in layer.pixels_mut() {
                pixel[3] = (pixel[3] as f32 * opacity) as u8;
            }
        }
        imageops::overlay(&mut self.output, &layer, 0, 0);
        apply_shape_mask(&mut self.output, config.shape);

        true
    }

    fn draw_background(&mut self, bg: &Arc<RgbaImage>, size: u32) {
        let (bw, bh) = bg.dimensions();
        if bw == 0 || bh == 0 {
            return;
        }

        let cached = self
            .bg_cache
            .as_ref()
            .is_some_and(|c| Arc::ptr_eq(&c.source, bg) && c.size == size);
        if !cached {
            let side = bw.min(bh);
            let cropped =
                imageops::crop_imm(bg.as_ref(), (bw - side) / 2, (bh - side) / 2, side, side)
                    .to_image();
            let scaled = imageops::resize(&cropped, size, size, FilterType::Lanczos3);
            self.bg_cache = Some(BackgroundCache {
                source: Arc::clone(bg),
                size,
                scaled,
            });
        }
        if let Some(cache) = self.bg_cache.as_ref() {
            imageops::overlay(&mut self.output, &cache.scaled, 0, 0);
        }
    }
}
