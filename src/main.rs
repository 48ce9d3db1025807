mod background;
mod capture;
mod compositor;
mod config;
mod output;

use anyhow::{bail, Context, Result};
use background::BackgroundLoader;
use capture::{FrameSource, WebcamCapture};
use clap::Parser;
use compositor::Compositor;
use config::{
    BubbleShape, ChromaKey, CompositorConfig, ConfigProvider, JsonFileConfig, StaticConfig,
};
use image::RgbaImage;
use output::{PresentationSink, SharedFrame, V4L2Output};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Output v4l2loopback device path (omit to run without a video sink)
    #[arg(short, long)]
    output_device: Option<String>,

    /// Capture resolution width
    #[arg(long, default_value_t = 1280)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 720)]
    capture_height: u32,

    /// Sink resolution width
    #[arg(long, default_value_t = 512)]
    sink_width: u32,

    /// Sink resolution height
    #[arg(long, default_value_t = 512)]
    sink_height: u32,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// JSON config file, re-read live on change; overrides the flags below
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bubble shape
    #[arg(long, value_enum, default_value = "circle")]
    shape: BubbleShape,

    /// Side length of the composited square, in pixels
    #[arg(long, default_value_t = 512)]
    output_size: u32,

    /// Mirror the subject horizontally
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    mirror: bool,

    /// Background image path (omit for a flat fill)
    #[arg(long)]
    background: Option<PathBuf>,

    /// Gaussian blur radius applied to the subject layer, in pixels
    #[arg(long, default_value_t = 0.0)]
    blur: f32,

    /// Subject layer opacity, 0.0 to 1.0
    #[arg(long, default_value_t = 1.0)]
    opacity: f32,

    /// Digital zoom factor, 1.0 to 2.5
    #[arg(long, default_value_t = 1.2)]
    zoom: f32,

    /// Enable chroma keying against --key-color
    #[arg(long)]
    chroma_key: bool,

    /// Chroma key color as RRGGBB hex
    #[arg(long, default_value = "ffffff")]
    key_color: String,

    /// Chroma key distance threshold
    #[arg(long, default_value_t = 50.0)]
    threshold: f32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Bubblecam starting");
    tracing::info!("Capture: {}x{}", args.capture_width, args.capture_height);
    tracing::info!("Target FPS: {}", args.fps);

    // Initialize capture
    let mut capture = WebcamCapture::new(args.input_device, args.capture_width, args.capture_height)
        .context("Failed to initialize webcam capture")?;

    // Initialize the presentation sink. Activation failure is user-visible
    // but recoverable: the pipeline keeps compositing without it.
    let sink: Option<V4L2Output> = match &args.output_device {
        Some(path) => match V4L2Output::new(path, args.sink_width, args.sink_height) {
            Ok(sink) => Some(sink),
            Err(err) => {
                tracing::error!("sink activation failed, continuing without it: {err:#}");
                None
            }
        },
        None => {
            tracing::info!("No output device configured, running preview-only");
            None
        }
    };

    // Configuration source: a live-reloaded JSON file, or a fixed snapshot
    // assembled from the CLI flags.
    let mut provider: Box<dyn ConfigProvider> = match &args.config {
        Some(path) => {
            tracing::info!("Loading config from {}", path.display());
            Box::new(JsonFileConfig::new(path.clone()))
        }
        None => Box::new(StaticConfig::new(config_from_args(&args)?)),
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    run_pipeline(&mut capture, sink, provider.as_mut(), args.fps, &running)?;

    tracing::info!("Bubblecam stopped");
    Ok(())
}

fn config_from_args(args: &Args) -> Result<CompositorConfig> {
    let chroma_key = if args.chroma_key {
        Some(ChromaKey {
            enabled: true,
            key_color: parse_key_color(&args.key_color)?,
            threshold: args.threshold,
        })
    } else {
        None
    };

    Ok(CompositorConfig {
        shape: args.shape,
        output_size: args.output_size,
        mirrored: args.mirror,
        background: args.background.clone(),
        blur_radius_px: args.blur,
        subject_opacity: args.opacity,
        zoom_factor: args.zoom,
        chroma_key,
    })
}

fn parse_key_color(hex: &str) -> Result<[u8; 3]> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("key color must be RRGGBB hex, got {hex:?}");
    }
    Ok([
        u8::from_str_radix(&hex[0..2], 16)?,
        u8::from_str_radix(&hex[2..4], 16)?,
        u8::from_str_radix(&hex[4..6], 16)?,
    ])
}

fn run_pipeline<C, S>(
    capture: &mut C,
    mut sink: Option<S>,
    config_provider: &mut dyn ConfigProvider,
    target_fps: u32,
    running: &AtomicBool,
) -> Result<()>
where
    C: FrameSource,
    S: PresentationSink,
{
    let frame_duration = Duration::from_secs_f32(1.0 / target_fps.max(1) as f32);
    let mut frame_count = 0u64;
    let mut skipped_count = 0u64;
    let mut total_capture_time = Duration::ZERO;
    let mut total_composite_time = Duration::ZERO;
    let mut total_output_time = Duration::ZERO;

    let initial = config_provider.snapshot();
    let mut compositor = Compositor::new(initial.output_size);
    let shared = SharedFrame::new(RgbaImage::new(initial.output_size, initial.output_size));
    let mut backgrounds = BackgroundLoader::new();

    tracing::info!("Starting main pipeline loop");
    tracing::info!("Press Ctrl+C to stop");

    while running.load(Ordering::SeqCst) {
        let loop_start = Instant::now();

        // Fresh snapshot each tick; a mid-session settings edit takes effect
        // on the next frame, never halfway through one.
        let config = config_provider.snapshot();
        backgrounds.update(config.background.as_deref());

        // Capture frame
        let capture_start = Instant::now();
        let frame = capture.capture_frame().context("Failed to capture frame")?;
        total_capture_time += capture_start.elapsed();

        // Composite
        let composite_start = Instant::now();
        let background = backgrounds.current();
        let rendered = compositor.render_tick(&frame, &config, background.as_ref());
        total_composite_time += composite_start.elapsed();

        if rendered {
            shared.publish(compositor.output().clone());

            // Output frame. A sink write failure is reported once and the
            // sink dropped; compositing continues regardless.
            let output_start = Instant::now();
            if let Some(active) = sink.as_mut() {
                let latest = shared.latest();
                if let Err(err) = active.write_frame(&latest) {
                    tracing::error!("presentation sink failed, disabling: {err:#}");
                    sink = None;
                }
            }
            total_output_time += output_start.elapsed();

            frame_count += 1;
        } else {
            skipped_count += 1;
            tracing::debug!("source not ready, tick skipped");
        }

        // Log stats every 30 frames
        if frame_count > 0 && frame_count % 30 == 0 && rendered {
            let avg_capture_ms = total_capture_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let avg_composite_ms =
                total_composite_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let avg_output_ms = total_output_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let total_ms = avg_capture_ms + avg_composite_ms + avg_output_ms;
            let actual_fps = 1000.0 / total_ms;

            tracing::info!(
                "Frame {}: capture={:.1}ms, composite={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}, skipped={}",
                frame_count,
                avg_capture_ms,
                avg_composite_ms,
                avg_output_ms,
                total_ms,
                actual_fps,
                skipped_count
            );
        }

        // Frame rate limiting
        let elapsed = loop_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }

    tracing::info!("Render loop stopped after {} frames", frame_count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    struct ScriptedSource<'a> {
        ticks_left: u32,
        running: &'a AtomicBool,
    }

    impl FrameSource for ScriptedSource<'_> {
        fn capture_frame(&mut self) -> Result<RgbImage> {
            self.ticks_left -= 1;
            if self.ticks_left == 0 {
                self.running.store(false, Ordering::SeqCst);
            }
            // Every other tick delivers a not-ready frame.
            if self.ticks_left % 2 == 0 {
                Ok(RgbImage::new(0, 0))
            } else {
                Ok(RgbImage::from_pixel(64, 48, image::Rgb([80, 80, 80])))
            }
        }

        fn resolution(&self) -> (u32, u32) {
            (64, 48)
        }
    }

    struct RecordingSink {
        wrote: Arc<AtomicBool>,
    }

    impl PresentationSink for RecordingSink {
        fn write_frame(&mut self, frame: &RgbaImage) -> Result<()> {
            assert!(frame.width() > 0);
            self.wrote.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn resolution(&self) -> (u32, u32) {
            (64, 64)
        }
    }

    #[test]
    fn pipeline_skips_not_ready_frames_and_feeds_the_sink() {
        let running = AtomicBool::new(true);
        let mut source = ScriptedSource {
            ticks_left: 6,
            running: &running,
        };
        let wrote = Arc::new(AtomicBool::new(false));
        let sink = RecordingSink {
            wrote: Arc::clone(&wrote),
        };
        let mut provider = StaticConfig::new(CompositorConfig {
            output_size: 64,
            ..CompositorConfig::default()
        });

        run_pipeline(&mut source, Some(sink), &mut provider, 1000, &running).unwrap();
        assert!(wrote.load(Ordering::SeqCst), "sink never received a frame");
    }

    #[test]
    fn parse_key_color_accepts_hex_with_and_without_hash() {
        assert_eq!(parse_key_color("00ff00").unwrap(), [0, 255, 0]);
        assert_eq!(parse_key_color("#A1B2C3").unwrap(), [0xa1, 0xb2, 0xc3]);
    }

    #[test]
    fn parse_key_color_rejects_malformed_input() {
        assert!(parse_key_color("fff").is_err());
        assert!(parse_key_color("zzzzzz").is_err());
        assert!(parse_key_color("00ff001").is_err());
    }
}
