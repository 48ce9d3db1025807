use super::FrameSource;
use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

pub struct WebcamCapture {
    camera: Camera,
    width: u32,
    height: u32,
}

impl WebcamCapture {
    pub fn new(device_index: u32, width: u32, height: u32) -> Result<Self> {
        tracing::info!(
            "Initializing webcam {} at {}x{}",
            device_index,
            width,
            height
        );

        let index = CameraIndex::Index(device_index);
        let wanted = CameraFormat::new_from(width, height, FrameFormat::MJPEG, 30);
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted));

        let mut camera = Camera::new(index, requested).context("Failed to open camera")?;

        camera
            .open_stream()
            .context("Failed to open camera stream")?;

        // The driver may have negotiated something other than what we asked
        // for; report the actual format.
        let actual = camera.resolution();
        tracing::info!(
            "Webcam initialized at {}x{}",
            actual.width(),
            actual.height()
        );

        Ok(Self {
            camera,
            width: actual.width(),
            height: actual.height(),
        })
    }
}

impl FrameSource for WebcamCapture {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        let frame = self.camera.frame().context("Failed to capture frame")?;

        let decoded = frame
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        Ok(decoded)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
