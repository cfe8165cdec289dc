//! Brightness, contrast, and inversion.
//!
//! Per-sample affine remap: `out = clamp(in * gain + offset)` where the
//! gain is derived from the contrast control as `1 + contrast / 10` and the
//! offset is the brightness control directly. With the invert flag set, a
//! full-range bitwise inversion is applied after scaling. At the control
//! defaults (0/0/0) the operator is the identity.

use image::{GrayImage, RgbImage};

use crate::controls::{ControlPanel, ControlSpec};
use crate::frame::Frame;

pub(super) const BRIGHTNESS: &str = "brightness";
pub(super) const CONTRAST: &str = "contrast";
pub(super) const INVERT: &str = "negative";

pub(super) fn declare_controls(panel: &mut ControlPanel) {
    panel.declare(ControlSpec::new(BRIGHTNESS, 0, 256, 0));
    panel.declare(ControlSpec::new(CONTRAST, 0, 100, 0));
    panel.declare(ControlSpec::new(INVERT, 0, 1, 0));
}

pub(super) fn apply(frame: &Frame, panel: &ControlPanel) -> Frame {
    let gain = 1.0 + panel.read(CONTRAST) as f32 / 10.0;
    let offset = panel.read(BRIGHTNESS) as f32;
    let invert = panel.read(INVERT) != 0;

    let remap = |v: u8| -> u8 {
        let scaled = (v as f32 * gain + offset).round().clamp(0.0, 255.0) as u8;
        if invert {
            !scaled
        } else {
            scaled
        }
    };

    match frame {
        Frame::Color(img) => {
            let data: Vec<u8> = img.as_raw().iter().map(|&v| remap(v)).collect();
            Frame::Color(
                RgbImage::from_raw(img.width(), img.height(), data)
                    .expect("remap preserves buffer length"),
            )
        }
        Frame::Gray(img) => {
            let data: Vec<u8> = img.as_raw().iter().map(|&v| remap(v)).collect();
            Frame::Gray(
                GrayImage::from_raw(img.width(), img.height(), data)
                    .expect("remap preserves buffer length"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> ControlPanel {
        let mut panel = ControlPanel::new();
        declare_controls(&mut panel);
        panel
    }

    #[test]
    fn defaults_are_the_identity() {
        let frame = Frame::solid(10, 10, [13, 130, 250]);
        let out = apply(&frame, &panel());
        assert_eq!(out.raw_bytes(), frame.raw_bytes());
    }

    #[test]
    fn double_inversion_restores_the_original_exactly() {
        let mut img = RgbImage::new(8, 8);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = image::Rgb([(x * 30) as u8, (y * 30) as u8, ((x + y) * 15) as u8]);
        }
        let frame = Frame::Color(img);

        let mut panel = panel();
        panel.set(INVERT, 1);
        let once = apply(&frame, &panel);
        assert_ne!(once.raw_bytes(), frame.raw_bytes());
        let twice = apply(&once, &panel);
        assert_eq!(twice.raw_bytes(), frame.raw_bytes());
    }

    #[test]
    fn contrast_scales_with_saturation() {
        let frame = Frame::solid(4, 4, [100, 100, 100]);
        let mut panel = panel();
        panel.set(CONTRAST, 10);
        // gain = 2.0
        let out = apply(&frame, &panel);
        assert_eq!(out.rgb_at(0, 0), [200, 200, 200]);

        panel.set(CONTRAST, 100);
        // gain = 11.0, saturates
        let out = apply(&frame, &panel);
        assert_eq!(out.rgb_at(0, 0), [255, 255, 255]);
    }

    #[test]
    fn brightness_is_additive_before_inversion() {
        let frame = Frame::solid(4, 4, [10, 10, 10]);
        let mut panel = panel();
        panel.set(BRIGHTNESS, 40);
        let out = apply(&frame, &panel);
        assert_eq!(out.rgb_at(0, 0), [50, 50, 50]);

        panel.set(INVERT, 1);
        let out = apply(&frame, &panel);
        assert_eq!(out.rgb_at(0, 0), [205, 205, 205]);
    }
}
