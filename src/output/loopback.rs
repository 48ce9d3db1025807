use super::PresentationSink;
use anyhow::{Context, Result};
use image::RgbaImage;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use v4l::video::Output;
use v4l::{Device, Format, FourCC};

/// Presents composited frames on a v4l2loopback device so any application
/// that reads a camera (video call, screen recorder) can show the bubble as
/// a floating feed.
pub struct V4L2Output {
    // Keeps the negotiated format alive for the lifetime of the sink.
    _device: Device,
    file: File,
    width: u32,
    height: u32,
}

impl V4L2Output {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;
        let format = Format::new(width, height, FourCC::new(b"YUYV"));
        let negotiated = device
            .set_format(&format)
            .context("Failed to set YUYV output format")?;
        if negotiated.width != width || negotiated.height != height {
            tracing::warn!(
                "loopback negotiated {}x{} instead of {}x{}",
                negotiated.width,
                negotiated.height,
                width,
                height
            );
        }

        // Frames are written straight to the device file; v4l2loopback
        // accepts raw YUYV data at the negotiated format.
        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open {} for writing", path.display()))?;

        tracing::info!("v4l2loopback device opened successfully");

        Ok(Self {
            _device: device,
            file,
            width: negotiated.width,
            height: negotiated.height,
        })
    }

    /// Convert an RGBA frame to packed YUV422 (YUYV). Alpha is flattened
    /// onto black first: a video feed has no alpha channel, so masked-out
    /// bubble pixels become black.
    fn rgba_to_yuyv(frame: &RgbaImage) -> Vec<u8> {
        let (width, height) = frame.dimensions();
        let mut yuyv = Vec::with_capacity((width * height * 2) as usize);

        for y in 0..height {
            for x in (0..width).step_by(2) {
                let pixel1 = frame.get_pixel(x, y);
                let (r1, g1, b1) = flatten_alpha(pixel1.0);
                let (y1, u1, v1) = rgb_to_yuv(r1, g1, b1);

                if x + 1 < width {
                    let pixel2 = frame.get_pixel(x + 1, y);
                    let (r2, g2, b2) = flatten_alpha(pixel2.0);
                    let (y2, u2, v2) = rgb_to_yuv(r2, g2, b2);

                    // Average U and V for the pixel pair.
                    let u = ((u1 as u16 + u2 as u16) / 2) as u8;
                    let v = ((v1 as u16 + v2 as u16) / 2) as u8;

                    // YUYV layout: Y0 U Y1 V
                    yuyv.push(y1);
                    yuyv.push(u);
                    yuyv.push(y2);
                    yuyv.push(v);
                } else {
                    // Odd width: the trailing macropixel is truncated to two
                    // bytes so each row stays exactly width * 2 bytes.
                    yuyv.push(y1);
                    yuyv.push(u1);
                }
            }
        }

        yuyv
    }
}

fn flatten_alpha(rgba: [u8; 4]) -> (u8, u8, u8) {
    let a = rgba[3] as u16;
    (
        ((rgba[0] as u16 * a) / 255) as u8,
        ((rgba[1] as u16 * a) / 255) as u8,
        ((rgba[2] as u16 * a) / 255) as u8,
    )
}

fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).clamp(0.0, 255.0) as u8;

    (y, u, v)
}

impl PresentationSink for V4L2Output {
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        // Resize frame if needed
        let frame = if frame.dimensions() != (self.width, self.height) {
            image::imageops::resize(
                frame,
                self.width,
                self.height,
                image::imageops::FilterType::Lanczos3,
            )
        } else {
            frame.clone()
        };

        let yuyv_data = Self::rgba_to_yuyv(&frame);

        self.file
            .write_all(&yuyv_data)
            .context("Failed to write frame to v4l2loopback device")?;

        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn yuyv_buffer_has_two_bytes_per_pixel() {
        let frame = RgbaImage::new(8, 4);
        assert_eq!(V4L2Output::rgba_to_yuyv(&frame).len(), 8 * 4 * 2);
    }

    #[test]
    fn odd_width_rows_keep_the_yuyv_stride() {
        let frame = RgbaImage::from_pixel(3, 2, Rgba([255, 255, 255, 255]));
        let yuyv = V4L2Output::rgba_to_yuyv(&frame);
        assert_eq!(yuyv.len(), 3 * 2 * 2);
        // Second row starts at the stride boundary with a luma byte.
        assert!(yuyv[6] >= 254);
    }

    #[test]
    fn white_converts_to_bright_neutral_yuv() {
        let (y, u, v) = rgb_to_yuv(255, 255, 255);
        assert!(y >= 254);
        assert!(u.abs_diff(128) <= 1);
        assert!(v.abs_diff(128) <= 1);
    }

    #[test]
    fn transparent_pixels_flatten_to_black() {
        let frame = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 0]));
        let yuyv = V4L2Output::rgba_to_yuyv(&frame);
        // Luma of black is 0, chroma neutral.
        assert_eq!(yuyv[0], 0);
        assert!(yuyv[1].abs_diff(128) <= 1);
    }

    #[test]
    fn red_has_high_v_component() {
        let (_, _, v) = rgb_to_yuv(255, 0, 0);
        assert!(v > 200);
    }
}
