//! Video frame types and processing

use image::RgbImage;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp relative to stream start (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Wrap a decoded image
    pub fn from_rgb_image(image: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// Copy the pixels into an `image` buffer, `None` if the data length is wrong
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data.get(idx..idx + 3).map(|p| [p[0], p[1], p[2]])
    }

    /// Mirror the frame left-to-right in place
    pub fn flip_horizontal(&mut self) {
        let row_len = (self.width * 3) as usize;
        if row_len == 0 {
            return;
        }
        for row in self.data.chunks_exact_mut(row_len) {
            let pixels = row.len() / 3;
            for x in 0..pixels / 2 {
                let (a, b) = (x * 3, (pixels - 1 - x) * 3);
                for c in 0..3 {
                    row.swap(a + c, b + c);
                }
            }
        }
    }

    /// Whether the buffer length matches the declared dimensions
    pub fn is_valid(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> VideoFrame {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 7]);
            }
        }
        VideoFrame::new(data, width, height, 0, 0)
    }

    #[test]
    fn test_get_pixel_bounds() {
        let frame = gradient(4, 2);
        assert_eq!(frame.get_pixel(3, 1), Some([3, 1, 7]));
        assert_eq!(frame.get_pixel(4, 0), None);
        assert_eq!(frame.get_pixel(0, 2), None);
    }

    #[test]
    fn test_flip_horizontal() {
        let mut frame = gradient(5, 2);
        frame.flip_horizontal();
        assert_eq!(frame.get_pixel(0, 0), Some([4, 0, 7]));
        assert_eq!(frame.get_pixel(2, 1), Some([2, 1, 7]));
        assert_eq!(frame.get_pixel(4, 1), Some([0, 1, 7]));
    }

    #[test]
    fn test_image_conversion() {
        let image = RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        let frame = VideoFrame::from_rgb_image(image, 42, 7);
        assert!(frame.is_valid());
        assert_eq!(frame.timestamp_ns, 42);
        let back = frame.to_rgb_image().unwrap();
        assert_eq!(back.get_pixel(2, 1).0, [10, 20, 30]);
    }

    #[test]
    fn test_truncated_frame_is_invalid() {
        let frame = VideoFrame::new(vec![0; 5], 2, 1, 0, 0);
        assert!(!frame.is_valid());
        assert!(frame.to_rgb_image().is_none());
    }
}
