use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Frame format enumeration supporting different pixel layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Motion JPEG format - compressed JPEG frames
    Mjpeg,
    /// YUV 4:2:2 format - uncompressed YUV data
    Yuyv,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
    /// 8-bit luminance only
    Gray8,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0, // Variable size, compressed
            FrameFormat::Yuyv => 2,
            FrameFormat::Rgb24 => 3,
            FrameFormat::Gray8 => 1,
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// Capture resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Frame data structure containing raw frame data and metadata
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.resolution().pixel_count() * self.format.bytes_per_pixel())
        }
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_size() {
        let gray = FrameData::new(1, SystemTime::now(), vec![0; 12], 4, 3, FrameFormat::Gray8);
        assert_eq!(gray.expected_size(), Some(12));
        assert!(gray.validate_size());

        let rgb = FrameData::new(2, SystemTime::now(), vec![0; 10], 4, 3, FrameFormat::Rgb24);
        assert_eq!(rgb.expected_size(), Some(36));
        assert!(!rgb.validate_size());

        let jpeg = FrameData::new(3, SystemTime::now(), vec![0; 5], 4, 3, FrameFormat::Mjpeg);
        assert_eq!(jpeg.expected_size(), None);
        assert!(jpeg.validate_size());
    }

    #[test]
    fn test_resolution_display() {
        let resolution = Resolution::from((640, 480));
        assert_eq!(resolution.to_string(), "640x480");
        assert_eq!(resolution.pixel_count(), 307_200);
    }
}
