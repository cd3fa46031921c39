//! Face frame types and pixel conversions

use crate::{BoundingBox, FrameError};

/// Channel layout of a colour frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    /// Blue, green, red (OpenCV-style capture)
    Bgr,
    /// Red, green, blue (decoded images, browsers)
    Rgb,
}

/// Decoded pixel buffer holding a whole frame or a face crop
#[derive(Debug, Clone)]
pub struct FaceImage {
    /// Interleaved pixel data (width * height * channels)
    data: Vec<u8>,
    /// Frame width
    width: u32,
    /// Frame height
    height: u32,
    /// 1 (gray), 3 (colour) or 4 (colour + alpha)
    channels: u8,
    /// Colour channel order, ignored for single-channel frames
    order: ChannelOrder,
}

impl FaceImage {
    /// Create a frame from raw interleaved pixels
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
        order: ChannelOrder,
    ) -> Result<Self, FrameError> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(FrameError::InvalidInput(format!(
                "unsupported channel count {}",
                channels
            )));
        }

        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(FrameError::InvalidInput(format!(
                "buffer holds {} bytes, {}x{}x{} needs {}",
                data.len(),
                width,
                height,
                channels,
                expected
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            channels,
            order,
        })
    }

    /// Single-channel frame
    pub fn gray(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        Self::new(data, width, height, 1, ChannelOrder::Rgb)
    }

    /// Three-channel RGB frame
    pub fn rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        Self::new(data, width, height, 3, ChannelOrder::Rgb)
    }

    /// Three-channel BGR frame
    pub fn bgr(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        Self::new(data, width, height, 3, ChannelOrder::Bgr)
    }

    /// Decode an encoded image (JPEG, PNG, ...) into an RGB frame
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.is_empty() {
            return Err(FrameError::Decode("empty image payload".into()));
        }

        let img = image::load_from_memory(bytes).map_err(|e| FrameError::Decode(e.to_string()))?;
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        Self::rgb(rgb.into_raw(), width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the frame has no pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Get pixel at (x, y) as RGB, expanding gray to three equal channels
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        Some(self.rgb_at(idx))
    }

    fn rgb_at(&self, idx: usize) -> [u8; 3] {
        match (self.channels, self.order) {
            (1, _) => [self.data[idx]; 3],
            (_, ChannelOrder::Rgb) => [self.data[idx], self.data[idx + 1], self.data[idx + 2]],
            (_, ChannelOrder::Bgr) => [self.data[idx + 2], self.data[idx + 1], self.data[idx]],
        }
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> Vec<u8> {
        if self.channels == 1 {
            return self.data.clone();
        }

        let mut gray = Vec::with_capacity(self.width as usize * self.height as usize);
        for idx in (0..self.data.len()).step_by(self.channels as usize) {
            let [r, g, b] = self.rgb_at(idx);
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (r as f32 * 0.299 + g as f32 * 0.587 + b as f32 * 0.114).round();
            gray.push(y.min(255.0) as u8);
        }
        gray
    }

    /// Convert to interleaved RGB, dropping alpha and reordering BGR
    pub fn to_rgb(&self) -> Vec<u8> {
        if self.channels == 3 && self.order == ChannelOrder::Rgb {
            return self.data.clone();
        }

        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for idx in (0..self.data.len()).step_by(self.channels as usize) {
            rgb.extend_from_slice(&self.rgb_at(idx));
        }
        rgb
    }

    /// Crop a face region, clamping the box to the frame
    ///
    /// Fails with [`FrameError::InvalidInput`] when nothing of the box
    /// remains inside the frame.
    pub fn crop(&self, bbox: &BoundingBox) -> Result<FaceImage, FrameError> {
        let clamped = bbox.clamp(self.width, self.height);
        if clamped.area() == 0 {
            return Err(FrameError::InvalidInput(format!(
                "face box {:?} has zero area inside {}x{} frame",
                bbox, self.width, self.height
            )));
        }

        let (x, y) = (clamped.x1 as usize, clamped.y1 as usize);
        let (w, h) = (clamped.width() as usize, clamped.height() as usize);
        let stride = self.width as usize * self.channels as usize;
        let row_len = w * self.channels as usize;

        let mut cropped = Vec::with_capacity(row_len * h);
        for row in y..(y + h) {
            let start = row * stride + x * self.channels as usize;
            cropped.extend_from_slice(&self.data[start..start + row_len]);
        }

        FaceImage::new(cropped, w as u32, h as u32, self.channels, self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker_bgr() -> FaceImage {
        // 2x2: blue, green / red, white (BGR bytes)
        FaceImage::bgr(
            vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255],
            2,
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_short_buffer() {
        let err = FaceImage::rgb(vec![0; 5], 2, 2).unwrap_err();
        assert!(matches!(err, FrameError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_two_channels() {
        let err = FaceImage::new(vec![0; 8], 2, 2, 2, ChannelOrder::Rgb).unwrap_err();
        assert!(matches!(err, FrameError::InvalidInput(_)));
    }

    #[test]
    fn test_bgr_pixel_is_reported_as_rgb() {
        let frame = checker_bgr();
        assert_eq!(frame.get_pixel(0, 0), Some([0, 0, 255]));
        assert_eq!(frame.get_pixel(0, 1), Some([255, 0, 0]));
        assert_eq!(frame.get_pixel(2, 0), None);
    }

    #[test]
    fn test_grayscale_luminance() {
        let gray = checker_bgr().to_grayscale();
        // blue, green, red, white
        assert_eq!(gray, vec![29, 150, 76, 255]);
    }

    #[test]
    fn test_to_rgb_swaps_and_drops_alpha() {
        let bgra =
            FaceImage::new(vec![1, 2, 3, 9, 4, 5, 6, 9], 2, 1, 4, ChannelOrder::Bgr).unwrap();
        assert_eq!(bgra.to_rgb(), vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = FaceImage::gray((0..16).collect(), 4, 4).unwrap();
        let face = frame.crop(&BoundingBox::new(2, 2, 10, 10)).unwrap();
        assert_eq!((face.width(), face.height()), (2, 2));
        assert_eq!(face.data(), &[10, 11, 14, 15]);
    }

    #[test]
    fn test_crop_outside_frame_is_invalid() {
        let frame = FaceImage::gray(vec![0; 16], 4, 4).unwrap();
        let err = frame.crop(&BoundingBox::new(5, 5, 8, 8)).unwrap_err();
        assert!(matches!(err, FrameError::InvalidInput(_)));
    }

    #[test]
    fn test_decode_png() {
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let frame = FaceImage::decode(&bytes).unwrap();
        assert_eq!((frame.width(), frame.height(), frame.channels()), (3, 2, 3));
        assert_eq!(frame.get_pixel(1, 1), Some([10, 20, 30]));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(FaceImage::decode(b"not an image"), Err(FrameError::Decode(_))));
    }
}
