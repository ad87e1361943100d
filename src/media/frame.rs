//! Media frame model
//!
//! A `Frame` is either a raw image (dimensions, pixel format tag, pixel bytes)
//! or a block of audio samples. The relay only looks at the kind and whether a
//! payload is present; pixel interpretation belongs to the display side.

use std::sync::Arc;

use bytes::Bytes;

/// Known pixel format tags (OpenCV `Mat` type codes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit, 1 channel
    Gray8 = 0,
    /// 8-bit, 3 channels (BGR)
    Bgr24 = 16,
    /// 8-bit, 4 channels (BGRA)
    Bgra32 = 24,
}

impl PixelFormat {
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(PixelFormat::Gray8),
            16 => Some(PixelFormat::Bgr24),
            24 => Some(PixelFormat::Bgra32),
            _ => None,
        }
    }

    pub fn tag(&self) -> i32 {
        *self as i32
    }

    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Bgr24 => 3,
            PixelFormat::Bgra32 => 4,
        }
    }
}

/// Raw image frame
///
/// Cheap to clone: pixels are reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    pub height: i32,
    pub width: i32,
    pub format_tag: i32,
    pub pixels: Bytes,
}

impl ImageFrame {
    pub fn new(height: i32, width: i32, format_tag: i32, pixels: impl Into<Bytes>) -> Self {
        Self {
            height,
            width,
            format_tag,
            pixels: pixels.into(),
        }
    }

    /// Image with no pixels, the "capture device closed" marker
    pub fn empty() -> Self {
        Self::new(0, 0, PixelFormat::Bgr24.tag(), Bytes::new())
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Pixel byte length implied by dimensions and format, if the format is known
    pub fn expected_len(&self) -> Option<usize> {
        let format = PixelFormat::from_tag(self.format_tag)?;
        let h = usize::try_from(self.height).ok()?;
        let w = usize::try_from(self.width).ok()?;
        h.checked_mul(w)?.checked_mul(format.bytes_per_pixel())
    }

    /// Whether the pixel length matches the declared dimensions
    pub fn is_consistent(&self) -> bool {
        self.expected_len() == Some(self.pixels.len())
    }
}

/// Block of signed 32-bit audio samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub samples: Arc<[i32]>,
}

impl AudioFrame {
    pub fn new(samples: impl Into<Arc<[i32]>>) -> Self {
        Self {
            samples: samples.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A single media frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Image(ImageFrame),
    Audio(AudioFrame),
}

impl Frame {
    /// Payload size in bytes
    pub fn payload_len(&self) -> usize {
        match self {
            Frame::Image(image) => image.pixels.len(),
            Frame::Audio(audio) => audio.samples.len() * 4,
        }
    }
}

impl From<ImageFrame> for Frame {
    fn from(image: ImageFrame) -> Self {
        Frame::Image(image)
    }
}

impl From<AudioFrame> for Frame {
    fn from(audio: AudioFrame) -> Self {
        Frame::Audio(audio)
    }
}
