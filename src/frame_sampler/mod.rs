//! FrameSampler - live frame to still-image payload
//!
//! Reads whatever frame the bound session shows at call time and encodes it
//! as JPEG at the source's native resolution.

use crate::camera_session::CameraSession;
use crate::error::{Error, Result};
use crate::media_device::VideoFrame;
use crate::models::MediaBlob;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// Default JPEG quality (0.95)
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Still-frame sampler
#[derive(Debug, Clone, Copy)]
pub struct FrameSampler {
    quality: u8,
}

impl FrameSampler {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Sample the current frame of the bound session
    pub fn capture(&self, session: Option<&CameraSession>) -> Result<MediaBlob> {
        let session =
            session.ok_or_else(|| Error::NoActiveFrame("no camera session bound".to_string()))?;
        let frame = session
            .latest_frame()
            .ok_or_else(|| Error::NoActiveFrame("stream has not produced a frame".to_string()))?;

        let data = self.encode(&frame)?;

        tracing::debug!(
            session_id = %session.id(),
            width = frame.width,
            height = frame.height,
            size = data.len(),
            "Frame sampled"
        );

        Ok(MediaBlob::captured_jpeg(data))
    }

    /// Encode a raw frame as JPEG
    pub fn encode(&self, frame: &VideoFrame) -> Result<Vec<u8>> {
        if frame.width == 0 || frame.height == 0 {
            return Err(Error::NoActiveFrame(format!(
                "frame has zero dimensions ({}x{})",
                frame.width, frame.height
            )));
        }
        if frame.data.len() != frame.expected_len() {
            return Err(Error::Encode(format!(
                "frame buffer is {} bytes, expected {} for {}x{} RGB",
                frame.data.len(),
                frame.expected_len(),
                frame.width,
                frame.height
            )));
        }

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality)
            .encode(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8)
            .map_err(|e| Error::Encode(e.to_string()))?;

        Ok(buf)
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}
