mod v4l_capture;

pub use v4l_capture::WebcamCapture;

use anyhow::Result;
use image::RgbImage;

/// Source of raw camera frames. The pipeline never opens devices or manages
/// permissions itself; it only pulls the current frame once per tick.
pub trait FrameSource {
    /// Pull the most recent frame. A frame with zero width or height means
    /// the source is not ready yet and the tick is skipped.
    fn capture_frame(&mut self) -> Result<RgbImage>;

    /// Native resolution of captured frames.
    fn resolution(&self) -> (u32, u32);
}
