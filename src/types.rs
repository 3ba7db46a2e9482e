// Core pixel types shared by every backend.

use image::{ImageBuffer, Rgb, RgbImage};

use crate::error::Error;

/// One raster frame: 8-bit RGB, interleaved, row-major, no padding.
/// Produced by the caller, consumed by exactly one present call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // length = width * height * 3
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, data }
    }

    /// A frame filled with one color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb.repeat(width as usize * height as usize);
        Self { width, height, data }
    }

    /// Checks that the dimensions are non-zero and agree with the buffer length.
    pub fn validate(&self) -> Result<(), Error> {
        let expected = self.width as usize * self.height as usize * Self::CHANNELS;
        if self.width == 0 || self.height == 0 || self.data.len() != expected {
            return Err(Error::MalformedFrame {
                width: self.width,
                height: self.height,
                len: self.data.len(),
            });
        }
        Ok(())
    }

    /// Borrow the pixels as an `image` buffer without copying.
    pub fn view(&self) -> Result<ImageBuffer<Rgb<u8>, &[u8]>, Error> {
        self.validate()?;
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice()).ok_or(
            Error::MalformedFrame {
                width: self.width,
                height: self.height,
                len: self.data.len(),
            },
        )
    }

    #[cfg(test)]
    fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

impl From<RgbImage> for Frame {
    fn from(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self { width, height, data: img.into_raw() }
    }
}

/// Software canvas for the CPU window: one u32 per pixel, 0x00RRGGBB for minifb.
#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }

    /// Paint everything black.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Reallocate only when the size actually changes.
    pub fn resize(&mut self, width: usize, height: usize) {
        if self.width != width || self.height != height {
            *self = Self::new(width, height);
        }
    }
}

/// Pack an RGB triplet as 0x00RRGGBB.
#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_frame_is_valid() {
        let f = Frame::solid(4, 2, [1, 2, 3]);
        assert!(f.validate().is_ok());
        assert_eq!(f.pixel(3, 1), [1, 2, 3]);
    }

    #[test]
    fn short_buffer_is_malformed() {
        let f = Frame::new(4, 4, vec![0; 10]);
        assert!(matches!(f.validate(), Err(Error::MalformedFrame { len: 10, .. })));
    }

    #[test]
    fn zero_width_is_malformed() {
        let f = Frame::new(0, 4, Vec::new());
        assert!(f.validate().is_err());
    }

    #[test]
    fn pack_rgb_layout() {
        assert_eq!(pack_rgb(0x12, 0x34, 0x56), 0x0012_3456);
    }

    #[test]
    fn frame_buffer_resize_keeps_same_size() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.pixels[0] = 7;
        fb.resize(2, 2);
        assert_eq!(fb.pixels[0], 7);
        fb.resize(3, 1);
        assert_eq!(fb.pixels, vec![0; 3]);
    }
}
