//! Two-threshold edge map.
//!
//! The classic staged edge operator: optional Gaussian pre-smooth, gradient
//! magnitudes and quantized directions from 3x3 derivative kernels, non-max
//! suppression along the gradient direction, then two-threshold hysteresis.
//! Pixels above the high threshold seed edges; pixels between the
//! thresholds survive only when connected to a seed. Output is a binary
//! intensity map.

use image::GrayImage;

use super::smooth;
use crate::controls::{ControlPanel, ControlSpec, Legality};
use crate::frame::Frame;

pub(super) const LOW_THRESHOLD: &str = "min threshold";
pub(super) const HIGH_THRESHOLD: &str = "max threshold";
pub(super) const PRE_SMOOTH: &str = "gaussian";

pub(super) fn declare_controls(panel: &mut ControlPanel) {
    panel.declare(ControlSpec::new(LOW_THRESHOLD, 0, 500, 100));
    panel.declare(ControlSpec::new(HIGH_THRESHOLD, 0, 500, 100));
    // 0 disables pre-smoothing entirely.
    panel.declare(ControlSpec::new(PRE_SMOOTH, 0, 7, 0).with_legality(Legality::OddOrZero));
}

pub(super) fn apply(frame: &Frame, panel: &ControlPanel) -> Frame {
    let low = panel.read(LOW_THRESHOLD) as f32;
    let high = panel.read(HIGH_THRESHOLD) as f32;
    let presmooth = panel.read(PRE_SMOOTH);

    let working = if presmooth > 0 {
        smooth::blur_frame(frame, presmooth as u32)
    } else {
        frame.clone()
    };
    let gray = working.into_gray().to_gray_image();

    Frame::Gray(edge_map(&gray, low, high))
}

fn edge_map(src: &GrayImage, low: f32, high: f32) -> GrayImage {
    let width = src.width() as usize;
    let height = src.height() as usize;
    if width < 3 || height < 3 {
        return GrayImage::new(src.width(), src.height());
    }

    let (magnitude, direction) = gradients(src);
    let nms = suppress_non_maxima(width, height, &magnitude, &direction);
    let (low, high) = if low <= high { (low, high) } else { (high, low) };
    hysteresis(width, height, &nms, low, high)
}

/// 3x3 derivative magnitudes plus the gradient direction quantized to four
/// sectors (0 = horizontal, 1 = 45 degrees, 2 = vertical, 3 = 135 degrees).
fn gradients(src: &GrayImage) -> (Vec<f32>, Vec<u8>) {
    let width = src.width() as usize;
    let height = src.height() as usize;
    let data = src.as_raw();
    let mut magnitude = vec![0.0f32; width * height];
    let mut direction = vec![0u8; width * height];

    const TAN_22_5: f32 = 0.414_213_56;

    for y in 1..height - 1 {
        let r0 = (y - 1) * width;
        let r1 = y * width;
        let r2 = (y + 1) * width;
        for x in 1..width - 1 {
            let p00 = data[r0 + x - 1] as f32;
            let p01 = data[r0 + x] as f32;
            let p02 = data[r0 + x + 1] as f32;
            let p10 = data[r1 + x - 1] as f32;
            let p12 = data[r1 + x + 1] as f32;
            let p20 = data[r2 + x - 1] as f32;
            let p21 = data[r2 + x] as f32;
            let p22 = data[r2 + x + 1] as f32;

            let gx = -p00 + p02 - 2.0 * p10 + 2.0 * p12 - p20 + p22;
            let gy = -p00 - 2.0 * p01 - p02 + p20 + 2.0 * p21 + p22;

            magnitude[r1 + x] = (gx * gx + gy * gy).sqrt();

            let abs_gx = gx.abs();
            let abs_gy = gy.abs();
            direction[r1 + x] = if abs_gy <= abs_gx * TAN_22_5 {
                0
            } else if abs_gx <= abs_gy * TAN_22_5 {
                2
            } else if gx * gy > 0.0 {
                1
            } else {
                3
            };
        }
    }

    (magnitude, direction)
}

/// Keep a pixel only if its magnitude is the local maximum along its
/// gradient direction.
fn suppress_non_maxima(width: usize, height: usize, mag: &[f32], dir: &[u8]) -> Vec<f32> {
    let mut out = vec![0.0f32; width * height];

    for y in 1..height - 1 {
        let r0 = (y - 1) * width;
        let r1 = y * width;
        let r2 = (y + 1) * width;
        for x in 1..width - 1 {
            let m = mag[r1 + x];
            let (m1, m2) = match dir[r1 + x] {
                0 => (mag[r1 + x - 1], mag[r1 + x + 1]),
                1 => (mag[r0 + x + 1], mag[r2 + x - 1]),
                2 => (mag[r0 + x], mag[r2 + x]),
                _ => (mag[r0 + x - 1], mag[r2 + x + 1]),
            };
            if m >= m1 && m >= m2 {
                out[r1 + x] = m;
            }
        }
    }

    out
}

fn hysteresis(width: usize, height: usize, nms: &[f32], low: f32, high: f32) -> GrayImage {
    const STRONG: u8 = 255;
    const WEAK: u8 = 1;

    let mut state = vec![0u8; width * height];
    let mut stack = Vec::new();

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let idx = y * width + x;
            let v = nms[idx];
            if v >= high && v > 0.0 {
                state[idx] = STRONG;
                stack.push((x, y));
            } else if v >= low && v > 0.0 {
                state[idx] = WEAK;
            }
        }
    }

    // Promote weak pixels reachable from a strong seed.
    while let Some((x, y)) = stack.pop() {
        for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                let nidx = ny * width + nx;
                if state[nidx] == WEAK {
                    state[nidx] = STRONG;
                    stack.push((nx, ny));
                }
            }
        }
    }

    let data: Vec<u8> = state
        .iter()
        .map(|&s| if s == STRONG { 255 } else { 0 })
        .collect();
    GrayImage::from_raw(width as u32, height as u32, data).expect("edge map sizes its buffer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn panel() -> ControlPanel {
        let mut panel = ControlPanel::new();
        declare_controls(&mut panel);
        panel
    }

    #[test]
    fn uniform_frame_has_no_edges() {
        let frame = Frame::solid(32, 32, [120, 120, 120]);
        let out = apply(&frame, &panel());
        assert_eq!(out.channels(), 1);
        assert!(out.raw_bytes().iter().all(|&v| v == 0));
    }

    #[test]
    fn step_edge_is_detected() {
        let mut img = GrayImage::new(32, 32);
        for (x, _, px) in img.enumerate_pixels_mut() {
            *px = Luma([if x < 16 { 0 } else { 255 }]);
        }
        let mut panel = panel();
        panel.set(LOW_THRESHOLD, 50);
        panel.set(HIGH_THRESHOLD, 150);

        let out = apply(&Frame::Gray(img), &panel);
        let edge_pixels = out.raw_bytes().iter().filter(|&&v| v == 255).count();
        assert!(edge_pixels > 0, "a hard vertical step must produce edges");
        // The edge is localized near the step, not smeared across the frame.
        assert!(edge_pixels < 32 * 8, "edge response too wide: {}", edge_pixels);
    }

    #[test]
    fn output_is_binary() {
        let mut img = GrayImage::new(16, 16);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Luma([((x * 16 + y * 3) % 256) as u8]);
        }
        let out = apply(&Frame::Gray(img), &panel());
        assert!(out.raw_bytes().iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn pre_smooth_reduces_noise_response() {
        // High-frequency texture: alternating 2x2 blocks of extremes.
        let mut img = GrayImage::new(24, 24);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Luma([if (x / 2 + y / 2) % 2 == 0 { 0 } else { 255 }]);
        }
        let frame = Frame::Gray(img);

        let noisy = apply(&frame, &panel());
        let mut smoothed_panel = panel();
        smoothed_panel.set(PRE_SMOOTH, 7);
        let smoothed = apply(&frame, &smoothed_panel);

        let count = |f: &Frame| f.raw_bytes().iter().filter(|&&v| v == 255).count();
        assert!(
            count(&smoothed) <= count(&noisy),
            "pre-smoothing must not increase the edge response of noise"
        );
    }
}
