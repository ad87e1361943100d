//! Media frames and sources

pub mod frame;
pub mod source;

pub use frame::{AudioFrame, Frame, ImageFrame, PixelFormat};
pub use source::{FrameSource, TestPattern};
