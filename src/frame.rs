use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Rotation options for frame processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    /// Rotate 90 degrees clockwise
    Rotate90,
    /// Rotate 180 degrees
    Rotate180,
    /// Rotate 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl Rotation {
    /// Get rotation angle in degrees
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    /// Rotate an RGB image clockwise by this rotation
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        match self {
            Rotation::Rotate90 => imageops::rotate90(image),
            Rotation::Rotate180 => imageops::rotate180(image),
            Rotation::Rotate270 => imageops::rotate270(image),
        }
    }
}

/// A decoded RGB frame from the camera or an enrollment video
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Frame identifier (capture counter or video frame index)
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Pixel data (shared ownership for cheap clones)
    pub image: Arc<RgbImage>,
}

impl FrameData {
    pub fn new(id: u64, timestamp: SystemTime, image: RgbImage) -> Self {
        Self {
            id,
            timestamp,
            image: Arc::new(image),
        }
    }

    /// Build a frame from a tightly packed or strided RGB24 buffer
    pub fn from_rgb_bytes(
        id: u64,
        timestamp: SystemTime,
        width: u32,
        height: u32,
        stride: usize,
        data: &[u8],
    ) -> Option<Self> {
        let row_bytes = width as usize * 3;
        if stride < row_bytes || data.len() < stride * (height as usize).saturating_sub(1) + row_bytes
        {
            return None;
        }

        let mut packed = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            packed.extend_from_slice(&data[start..start + row_bytes]);
        }

        RgbImage::from_raw(width, height, packed).map(|image| Self::new(id, timestamp, image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Shrink by an integer linear factor; factor 1 returns a copy
    pub fn downscaled(&self, factor: u32) -> RgbImage {
        if factor <= 1 {
            return self.image.as_ref().clone();
        }
        let width = (self.width() / factor).max(1);
        let height = (self.height() / factor).max(1);
        imageops::resize(self.image.as_ref(), width, height, FilterType::Triangle)
    }

    /// Average luminance (BT.601 weights), 0.0 for an empty image
    pub fn mean_luminance(&self) -> f64 {
        mean_luminance(&self.image)
    }
}

/// Average luminance of an RGB image on the 0-255 scale
pub fn mean_luminance(image: &RgbImage) -> f64 {
    let pixel_count = image.width() as u64 * image.height() as u64;
    if pixel_count == 0 {
        return 0.0;
    }

    let total: f64 = image
        .pixels()
        .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
        .sum();

    total / pixel_count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_mean_luminance() {
        let black = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let white = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));

        assert_eq!(mean_luminance(&black), 0.0);
        assert!((mean_luminance(&white) - 255.0).abs() < 0.01);
        assert_eq!(mean_luminance(&RgbImage::new(0, 0)), 0.0);
    }

    #[test]
    fn test_rotation_moves_corner_pixel() {
        let mut image = RgbImage::from_pixel(4, 2, Rgb([0, 0, 0]));
        image.put_pixel(3, 1, Rgb([255, 0, 0]));

        let rotated = Rotation::Rotate180.apply(&image);
        assert_eq!(rotated.get_pixel(0, 0), &Rgb([255, 0, 0]));

        let rotated = Rotation::Rotate90.apply(&image);
        assert_eq!(rotated.dimensions(), (2, 4));
        assert_ne!(rotated.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_downscale() {
        let frame = FrameData::new(1, SystemTime::now(), RgbImage::new(640, 480));
        assert_eq!(frame.downscaled(4).dimensions(), (160, 120));
        assert_eq!(frame.downscaled(1).dimensions(), (640, 480));
    }

    #[test]
    fn test_from_strided_bytes() {
        // 2x2 image with 8-byte stride (2 bytes of padding per row)
        let data = vec![
            1, 1, 1, 2, 2, 2, 0, 0, //
            3, 3, 3, 4, 4, 4, 0, 0,
        ];
        let frame = FrameData::from_rgb_bytes(0, SystemTime::now(), 2, 2, 8, &data).unwrap();
        assert_eq!(frame.image.get_pixel(1, 1), &Rgb([4, 4, 4]));

        assert!(FrameData::from_rgb_bytes(0, SystemTime::now(), 2, 2, 8, &data[..10]).is_none());
    }
}
