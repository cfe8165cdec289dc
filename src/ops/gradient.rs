//! Directional gradient extraction.
//!
//! Computes the x and y directional derivatives at adjustable orders using
//! 5-tap separable derivative kernels, rectifies each to a displayable
//! magnitude, and combines the two rectified magnitudes with equal
//! weighting. An order of zero removes that direction's contribution
//! entirely; with both orders zero the operator passes the (optionally
//! grayscaled, optionally pre-smoothed) input through unchanged.

use image::{GrayImage, RgbImage};

use super::smooth;
use crate::controls::{ControlPanel, ControlSpec};
use crate::frame::Frame;

pub(super) const X_ORDER: &str = "dx";
pub(super) const Y_ORDER: &str = "dy";
pub(super) const GRAYSCALE: &str = "grayscale";
pub(super) const PRE_SMOOTH: &str = "smooth first";

const APERTURE: usize = 5;

pub(super) fn declare_controls(panel: &mut ControlPanel) {
    panel.declare(ControlSpec::new(X_ORDER, 0, 4, 1));
    panel.declare(ControlSpec::new(Y_ORDER, 0, 4, 0));
    panel.declare(ControlSpec::new(GRAYSCALE, 0, 1, 0));
    // Fixed 3x3 when enabled.
    panel.declare(ControlSpec::new(PRE_SMOOTH, 0, 1, 0));
}

pub(super) fn apply(frame: &Frame, panel: &ControlPanel) -> Frame {
    let dx = panel.read(X_ORDER) as usize;
    let dy = panel.read(Y_ORDER) as usize;

    let mut working = frame.clone();
    if panel.read(GRAYSCALE) != 0 {
        working = working.into_gray();
    }
    if panel.read(PRE_SMOOTH) != 0 {
        working = smooth::blur_frame(&working, 3);
    }
    if dx == 0 && dy == 0 {
        return working;
    }

    let (data, width, height, channels) = match &working {
        Frame::Color(img) => (img.as_raw().as_slice(), img.width(), img.height(), 3u32),
        Frame::Gray(img) => (img.as_raw().as_slice(), img.width(), img.height(), 1u32),
    };

    let len = data.len();
    let zero = || vec![0.0f32; len];
    let gx = if dx > 0 {
        separable_abs(data, width, height, channels, &deriv_kernel(dx), &deriv_kernel(0))
    } else {
        zero()
    };
    let gy = if dy > 0 {
        separable_abs(data, width, height, channels, &deriv_kernel(0), &deriv_kernel(dy))
    } else {
        zero()
    };

    let mut combined = vec![0u8; len];
    for (i, out) in combined.iter_mut().enumerate() {
        *out = (0.5 * gx[i] + 0.5 * gy[i]).round().clamp(0.0, 255.0) as u8;
    }

    match &working {
        Frame::Color(_) => Frame::Color(
            RgbImage::from_raw(width, height, combined).expect("gradient preserves buffer length"),
        ),
        Frame::Gray(_) => Frame::Gray(
            GrayImage::from_raw(width, height, combined).expect("gradient preserves buffer length"),
        ),
    }
}

/// 5-tap separable derivative kernel of the given order. Order 0 yields the
/// binomial smoothing row; higher orders fold in one differencing step per
/// order. Sign convention is irrelevant downstream of rectification.
fn deriv_kernel(order: usize) -> Vec<f32> {
    assert!(order < APERTURE, "derivative order must fit the aperture");
    let mut kernel = vec![1.0f32];
    for _ in 0..APERTURE - 1 - order {
        kernel = convolve_taps(&kernel, &[1.0, 1.0]);
    }
    for _ in 0..order {
        kernel = convolve_taps(&kernel, &[1.0, -1.0]);
    }
    kernel
}

fn convolve_taps(a: &[f32], b: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0f32; a.len() + b.len() - 1];
    for (i, &va) in a.iter().enumerate() {
        for (j, &vb) in b.iter().enumerate() {
            out[i + j] += va * vb;
        }
    }
    out
}

/// Separable convolution over interleaved samples, rectified to absolute
/// magnitude. Borders reflect without repeating the edge sample.
fn separable_abs(
    data: &[u8],
    width: u32,
    height: u32,
    channels: u32,
    kx: &[f32],
    ky: &[f32],
) -> Vec<f32> {
    let w = width as usize;
    let h = height as usize;
    let c = channels as usize;
    let rx = kx.len() as isize / 2;
    let ry = ky.len() as isize / 2;

    let mut horizontal = vec![0.0f32; data.len()];
    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                let mut acc = 0.0f32;
                for (k, weight) in kx.iter().enumerate() {
                    let sx = smooth::reflect_101(x as isize + k as isize - rx, w);
                    acc += weight * data[(y * w + sx) * c + ch] as f32;
                }
                horizontal[(y * w + x) * c + ch] = acc;
            }
        }
    }

    let mut out = vec![0.0f32; data.len()];
    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                let mut acc = 0.0f32;
                for (k, weight) in ky.iter().enumerate() {
                    let sy = smooth::reflect_101(y as isize + k as isize - ry, h);
                    acc += weight * horizontal[(sy * w + x) * c + ch];
                }
                out[(y * w + x) * c + ch] = acc.abs();
            }
        }
    }

    out
}
