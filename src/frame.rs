//! Frame container.
//!
//! A `Frame` is an owned RGB image plus a monotonically increasing sequence
//! number assigned by the source. The sequence number gives readers a cheap
//! recency check without comparing pixel data.
//!
//! Frames are published to [`crate::state::SharedState`] as complete values:
//! a reader either sees the whole frame or none at all.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ExtendedColorType, RgbImage};

/// JPEG quality used for snapshots and the live feed.
pub const JPEG_QUALITY: u8 = 80;

#[derive(Clone)]
pub struct Frame {
    image: RgbImage,
    seq: u64,
}

impl Frame {
    pub fn new(image: RgbImage, seq: u64) -> Self {
        Self { image, seq }
    }

    /// Build a frame from a raw packed-RGB byte buffer.
    ///
    /// Returns an error if the buffer length does not match the dimensions.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>, seq: u64) -> Result<Self> {
        let image = RgbImage::from_raw(width, height, data)
            .with_context(|| format!("pixel buffer does not match {}x{} RGB", width, height))?;
        Ok(Self { image, seq })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    /// Raw packed-RGB bytes, row-major, no padding.
    pub fn raw_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Return a resized copy. The original frame is untouched.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        let image = imageops::resize(&self.image, width, height, imageops::FilterType::Triangle);
        Self {
            image,
            seq: self.seq,
        }
    }

    /// Encode as JPEG at the given quality.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder
            .encode(
                self.image.as_raw(),
                self.image.width(),
                self.image.height(),
                ExtendedColorType::Rgb8,
            )
            .context("encode frame as JPEG")?;
        Ok(out)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("seq", &self.seq)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, value: u8, seq: u64) -> Frame {
        let data = vec![value; (width * height * 3) as usize];
        Frame::from_raw(width, height, data, seq).expect("valid buffer")
    }

    #[test]
    fn from_raw_rejects_short_buffer() {
        let result = Frame::from_raw(10, 10, vec![0u8; 7], 0);
        assert!(result.is_err());
    }

    #[test]
    fn resized_keeps_sequence_number() {
        let frame = solid_frame(64, 48, 100, 7);
        let small = frame.resized(32, 24);
        assert_eq!(small.width(), 32);
        assert_eq!(small.height(), 24);
        assert_eq!(small.seq(), 7);
    }

    #[test]
    fn encode_jpeg_produces_jpeg_magic() -> Result<()> {
        let frame = solid_frame(16, 16, 128, 0);
        let bytes = frame.encode_jpeg(JPEG_QUALITY)?;
        assert!(bytes.len() > 2);
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        Ok(())
    }
}
