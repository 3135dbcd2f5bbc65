use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::{Result, VisionError};

/// Channel order of a 3-byte-per-pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// OpenCV-style capture order.
    #[default]
    Bgr,
    Rgb,
}

/// One video frame, row-major, 3 bytes per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(VisionError::InvalidFrame {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// All-black frame.
    pub fn blank(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    pub fn from_rgb_image(image: &RgbImage, format: PixelFormat) -> Self {
        let (width, height) = image.dimensions();
        let mut data = image.as_raw().clone();
        if format == PixelFormat::Bgr {
            swap_red_blue(&mut data);
        }
        Self {
            width,
            height,
            format,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// RGB copy for encoders and models.
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut data = self.data.clone();
        if self.format == PixelFormat::Bgr {
            swap_red_blue(&mut data);
        }
        // Length is checked on construction.
        RgbImage::from_raw(self.width, self.height, data)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// Downscale (or upscale) to `width`, keeping the aspect ratio.
    pub fn resize_to_width(&self, width: u32) -> Frame {
        if width == 0 || width == self.width {
            return self.clone();
        }
        let scale = width as f32 / self.width as f32;
        let height = ((self.height as f32 * scale).round() as u32).max(1);

        let resized = imageops::resize(&self.to_rgb_image(), width, height, FilterType::Triangle);
        Frame::from_rgb_image(&resized, self.format)
    }

    /// RGB value at `(x, y)`, if inside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        let i = self.index(x, y)?;
        let px = [self.data[i], self.data[i + 1], self.data[i + 2]];
        Some(match self.format {
            PixelFormat::Rgb => px,
            PixelFormat::Bgr => [px[2], px[1], px[0]],
        })
    }

    /// Write an RGB value at `(x, y)`; out-of-bounds writes are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let Some(i) = self.index(x, y) else {
            return;
        };
        let px = match self.format {
            PixelFormat::Rgb => rgb,
            PixelFormat::Bgr => [rgb[2], rgb[1], rgb[0]],
        };
        self.data[i..i + 3].copy_from_slice(&px);
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 3)
    }
}

fn swap_red_blue(data: &mut [u8]) {
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_short_buffer() {
        let err = Frame::new(4, 4, PixelFormat::Bgr, vec![0; 10]).unwrap_err();
        assert!(matches!(
            err,
            VisionError::InvalidFrame {
                expected: 48,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_bgr_pixel_access_is_rgb() {
        let frame = Frame::new(1, 1, PixelFormat::Bgr, vec![10, 20, 30]).unwrap();
        assert_eq!(frame.pixel(0, 0), Some([30, 20, 10]));
        assert_eq!(frame.to_rgb_image().get_pixel(0, 0).0, [30, 20, 10]);
    }

    #[test]
    fn test_put_pixel_respects_format() {
        let mut frame = Frame::blank(2, 2, PixelFormat::Bgr);
        frame.put_pixel(1, 1, [255, 0, 0]);
        assert_eq!(&frame.data()[9..12], &[0, 0, 255]);

        frame.put_pixel(5, 5, [1, 2, 3]);
        assert_eq!(frame.pixel(5, 5), None);
    }

    #[test]
    fn test_resize_to_width_keeps_aspect() {
        let frame = Frame::blank(640, 480, PixelFormat::Bgr);
        let small = frame.resize_to_width(320);

        assert_eq!((small.width(), small.height()), (320, 240));
        assert_eq!(small.format(), PixelFormat::Bgr);
    }

    #[test]
    fn test_resize_same_width_is_identity() {
        let frame = Frame::blank(320, 240, PixelFormat::Rgb);
        assert_eq!(frame.resize_to_width(320), frame);
    }
}
