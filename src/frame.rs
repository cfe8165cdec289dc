//! Frame buffers exchanged between pipeline stages.
//!
//! A `Frame` is a rectangular buffer of pixel samples, either 3-channel color
//! or 1-channel intensity. Frames are produced fresh each loop iteration and
//! owned transiently: each stage either consumes its input to produce a new
//! frame or hands it to a presentation/recording sink. Nothing retains a
//! frame across iterations.

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Pixel geometry of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One captured or processed image.
///
/// Color frames are interleaved RGB; gray frames are single-channel
/// intensity. Operators that reduce color to intensity (edge maps, optional
/// grayscale gradients) return `Gray`; everything else preserves the input
/// channel layout.
#[derive(Clone, Debug)]
pub enum Frame {
    Color(RgbImage),
    Gray(GrayImage),
}

impl Frame {
    pub fn width(&self) -> u32 {
        match self {
            Frame::Color(img) => img.width(),
            Frame::Gray(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Frame::Color(img) => img.height(),
            Frame::Gray(img) => img.height(),
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width(), self.height())
    }

    /// Channel count: 3 for color, 1 for intensity.
    pub fn channels(&self) -> u8 {
        match self {
            Frame::Color(_) => 3,
            Frame::Gray(_) => 1,
        }
    }

    /// Fill a new color frame with a single color. Synthetic sources and
    /// tests use this; the capture layer produces real content.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Frame::Color(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    /// Collapse to single-channel intensity using the standard luma weights.
    /// A gray frame passes through unchanged.
    pub fn into_gray(self) -> Frame {
        match self {
            Frame::Gray(img) => Frame::Gray(img),
            Frame::Color(img) => {
                let mut out = GrayImage::new(img.width(), img.height());
                for (x, y, px) in img.enumerate_pixels() {
                    let l = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                    out.put_pixel(x, y, Luma([l.round().clamp(0.0, 255.0) as u8]));
                }
                Frame::Gray(out)
            }
        }
    }

    /// Intensity copy of this frame, converting from color if needed.
    pub fn to_gray_image(&self) -> GrayImage {
        match self.clone().into_gray() {
            Frame::Gray(img) => img,
            Frame::Color(_) => unreachable!("into_gray always yields Gray"),
        }
    }

    /// RGB sample at (x, y); gray frames replicate intensity across channels.
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        match self {
            Frame::Color(img) => img.get_pixel(x, y).0,
            Frame::Gray(img) => {
                let l = img.get_pixel(x, y)[0];
                [l, l, l]
            }
        }
    }

    /// Raw interleaved bytes, in the frame's native channel layout.
    pub fn raw_bytes(&self) -> &[u8] {
        match self {
            Frame::Color(img) => img.as_raw(),
            Frame::Gray(img) => img.as_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_frame_has_requested_geometry() {
        let frame = Frame::solid(100, 60, [10, 20, 30]);
        assert_eq!(frame.size(), FrameSize::new(100, 60));
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.rgb_at(99, 59), [10, 20, 30]);
    }

    #[test]
    fn grayscale_conversion_uses_luma_weights() {
        let frame = Frame::solid(4, 4, [255, 0, 0]);
        let gray = frame.into_gray();
        assert_eq!(gray.channels(), 1);
        // 0.299 * 255 rounds to 76
        assert_eq!(gray.rgb_at(0, 0), [76, 76, 76]);
    }

    #[test]
    fn gray_frames_pass_through_conversion() {
        let gray = Frame::solid(4, 4, [9, 9, 9]).into_gray();
        let again = gray.clone().into_gray();
        assert_eq!(again.raw_bytes(), gray.raw_bytes());
    }
}
