// Data structures for camera capture

use image::{ImageBuffer, RgbaImage};

/// A captured or decoded frame
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub timestamp: i64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

/// Pixel format of captured frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    RGBA8,
    BGRA8,
}

impl RawFrame {
    pub fn from_rgba(image: RgbaImage, timestamp: i64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            timestamp,
            width,
            height,
            data: image.into_raw(),
            format: PixelFormat::RGBA8,
        }
    }

    /// Convert to an RGBA buffer; `None` if the data length does not match the dimensions
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        let rgba_data = match self.format {
            PixelFormat::BGRA8 => {
                let mut rgba = Vec::with_capacity(self.data.len());
                for chunk in self.data.chunks_exact(4) {
                    rgba.push(chunk[2]); // R
                    rgba.push(chunk[1]); // G
                    rgba.push(chunk[0]); // B
                    rgba.push(chunk[3]); // A
                }
                rgba
            }
            PixelFormat::RGBA8 => self.data.clone(),
        };

        ImageBuffer::from_raw(self.width, self.height, rgba_data)
    }
}

/// Error types for camera operations
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("No camera available")]
    Unavailable,

    #[error("Capture failed: {0}")]
    CaptureFailed(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
