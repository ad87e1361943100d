//! Frame sources
//!
//! Capture hardware lives outside this crate. `FrameSource` is the seam a
//! capture backend plugs into; `TestPattern` is a synthetic source used by the
//! client binary and tests, optionally with a sine tone on the audio side.
//! `load_raw_image` reads uncompressed default media.

use std::path::Path;

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};

use super::frame::{AudioFrame, ImageFrame, PixelFormat};

/// Default display size (width x height)
pub const SCREEN_WIDTH: i32 = 1280 / 2;
pub const SCREEN_HEIGHT: i32 = 720 / 2;

/// PCM sample rate of synthetic audio
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Samples per captured frame at 30 frames per second
pub const SAMPLES_PER_FRAME: usize = (AUDIO_SAMPLE_RATE / 30) as usize;

const TONE_AMPLITUDE: f64 = (i32::MAX / 4) as f64;

/// A producer of captured media
pub trait FrameSource: Send {
    /// Capture the next image.
    ///
    /// Returns an empty image when the device has stopped producing frames.
    fn next_image(&mut self) -> ImageFrame;

    /// Audio captured alongside the last image, if the device has any
    fn next_audio(&mut self) -> Option<AudioFrame> {
        None
    }
}

/// Moving vertical bar over a gradient, BGR24
#[derive(Debug, Clone)]
pub struct TestPattern {
    width: i32,
    height: i32,
    frame_no: u64,
    remaining: Option<u64>,
    tone_hz: Option<u32>,
    sample_no: u64,
    ended: bool,
}

impl TestPattern {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            frame_no: 0,
            remaining: None,
            tone_hz: None,
            sample_no: 0,
            ended: false,
        }
    }

    /// Produce a sine tone of `hz` as audio
    pub fn with_tone(mut self, hz: u32) -> Self {
        self.tone_hz = Some(hz);
        self
    }

    /// Stop after `count` frames, then yield empty images
    pub fn limit(mut self, count: u64) -> Self {
        self.remaining = Some(count);
        self
    }

    /// Parse a device name like `test-pattern` or `test-pattern:320x240`
    pub fn from_device(device: &str) -> Result<Self> {
        let rest = device
            .strip_prefix("test-pattern")
            .ok_or_else(|| Error::Config(format!("unsupported capture device: {}", device)))?;

        if rest.is_empty() {
            return Ok(Self::new(SCREEN_WIDTH, SCREEN_HEIGHT));
        }

        let dims = rest
            .strip_prefix(':')
            .ok_or_else(|| Error::Config(format!("invalid device: {}", device)))?;
        let (w, h) = dims
            .split_once('x')
            .ok_or_else(|| Error::Config(format!("invalid device size: {}", dims)))?;
        let width: i32 = w
            .parse()
            .map_err(|_| Error::Config(format!("invalid width: {}", w)))?;
        let height: i32 = h
            .parse()
            .map_err(|_| Error::Config(format!("invalid height: {}", h)))?;
        if width <= 0 || height <= 0 {
            return Err(Error::Config(format!("invalid device size: {}", dims)));
        }

        Ok(Self::new(width, height))
    }
}

impl FrameSource for TestPattern {
    fn next_image(&mut self) -> ImageFrame {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                self.ended = true;
                return ImageFrame::empty();
            }
            *remaining -= 1;
        }

        let (w, h) = (self.width as usize, self.height as usize);
        let bar = (self.frame_no as usize * 4) % w.max(1);
        let mut buf = BytesMut::with_capacity(w * h * 3);

        for y in 0..h {
            for x in 0..w {
                if x.abs_diff(bar) < 8 {
                    buf.put_slice(&[255, 255, 255]);
                } else {
                    buf.put_u8((x * 255 / w.max(1)) as u8);
                    buf.put_u8((y * 255 / h.max(1)) as u8);
                    buf.put_u8((self.frame_no % 256) as u8);
                }
            }
        }

        self.frame_no += 1;
        ImageFrame::new(self.height, self.width, PixelFormat::Bgr24.tag(), buf.freeze())
    }

    fn next_audio(&mut self) -> Option<AudioFrame> {
        let hz = self.tone_hz?;
        if self.ended {
            return None;
        }

        let step = 2.0 * std::f64::consts::PI * f64::from(hz) / f64::from(AUDIO_SAMPLE_RATE);
        let start = self.sample_no;
        let samples: Vec<i32> = (start..start + SAMPLES_PER_FRAME as u64)
            .map(|n| ((n as f64 * step).sin() * TONE_AMPLITUDE) as i32)
            .collect();
        self.sample_no += SAMPLES_PER_FRAME as u64;

        Some(AudioFrame::new(samples))
    }
}

/// Load an uncompressed image of known size from disk
pub async fn load_raw_image(
    path: impl AsRef<Path>,
    width: i32,
    height: i32,
    format: PixelFormat,
) -> Result<ImageFrame> {
    let path = path.as_ref();
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;

    let image = ImageFrame::new(height, width, format.tag(), data);
    if !image.is_consistent() {
        return Err(Error::Config(format!(
            "{}: expected {} bytes for {}x{}, found {}",
            path.display(),
            image.expected_len().unwrap_or(0),
            width,
            height,
            image.pixels.len()
        )));
    }

    tracing::info!(path = %path.display(), width, height, "Loaded default image");
    Ok(image)
}
