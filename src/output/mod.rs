mod loopback;
mod shared;

pub use loopback::V4L2Output;
pub use shared::SharedFrame;

use anyhow::Result;
use image::RgbaImage;

/// Destination for composited frames. The sink never mutates the image; it
/// converts and forwards at its own fixed resolution.
pub trait PresentationSink {
    /// Write one composited frame to the output surface.
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()>;

    /// Resolution the sink presents at.
    fn resolution(&self) -> (u32, u32);
}
