use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use proctor_vision::Frame;

use crate::{CaptureError, Result};

const JPEG_QUALITY: u8 = 80;

/// Sink for an encoded video stream.
pub trait FrameWriter: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close. Further writes are an error.
    fn finish(&mut self) -> Result<()>;
}

/// Opens writers for recorders, so the container format can be swapped.
pub trait FrameWriterFactory: Send + Sync {
    fn create(&self, path: &Path, width: u32, height: u32, fps: f64)
        -> Result<Box<dyn FrameWriter>>;

    fn extension(&self) -> &str;
}

/// Motion-JPEG: one baseline JPEG per frame, concatenated.
pub struct MjpegWriter {
    out: Option<BufWriter<File>>,
    width: u32,
    height: u32,
}

impl MjpegWriter {
    pub fn create(path: &Path, width: u32, height: u32) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            out: Some(BufWriter::new(file)),
            width,
            height,
        })
    }
}

impl FrameWriter for MjpegWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(CaptureError::FrameSize {
                width: self.width,
                height: self.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }
        let out = self.out.as_mut().ok_or(CaptureError::NotRecording)?;

        let rgb = frame.to_rgb_image();
        JpegEncoder::new_with_quality(out, JPEG_QUALITY).encode_image(&rgb)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MjpegWriterFactory;

impl FrameWriterFactory for MjpegWriterFactory {
    fn create(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        _fps: f64,
    ) -> Result<Box<dyn FrameWriter>> {
        Ok(Box::new(MjpegWriter::create(path, width, height)?))
    }

    fn extension(&self) -> &str {
        "mjpeg"
    }
}
