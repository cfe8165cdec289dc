//! Gaussian smoothing.
//!
//! Symmetric blur with an adjustable kernel extent, applied separably in
//! both axes. The kernel extent must be odd; the panel's normalization
//! guarantees that before `apply` runs. Kernel size 1 is the identity.

use image::{GrayImage, RgbImage};

use crate::controls::{ControlPanel, ControlSpec, Legality};
use crate::frame::Frame;

pub(super) const KERNEL_SIZE: &str = "kernel size";

pub(super) fn declare_controls(panel: &mut ControlPanel) {
    panel.declare(ControlSpec::new(KERNEL_SIZE, 0, 21, 1).with_legality(Legality::Odd));
}

pub(super) fn apply(frame: &Frame, panel: &ControlPanel) -> Frame {
    let ksize = panel.read(KERNEL_SIZE).max(1) as u32;
    blur_frame(frame, ksize)
}

/// Gaussian blur of a whole frame, preserving its channel layout.
///
/// Shared with the edge and gradient operators for their pre-smoothing
/// stages.
pub(super) fn blur_frame(frame: &Frame, ksize: u32) -> Frame {
    if ksize <= 1 {
        return frame.clone();
    }
    match frame {
        Frame::Color(img) => {
            let blurred = blur_plane(img.as_raw(), img.width(), img.height(), 3, ksize);
            Frame::Color(
                RgbImage::from_raw(img.width(), img.height(), blurred)
                    .expect("blur preserves buffer length"),
            )
        }
        Frame::Gray(img) => {
            let blurred = blur_plane(img.as_raw(), img.width(), img.height(), 1, ksize);
            Frame::Gray(
                GrayImage::from_raw(img.width(), img.height(), blurred)
                    .expect("blur preserves buffer length"),
            )
        }
    }
}

/// Separable convolution of interleaved samples: horizontal pass into an
/// f32 scratch buffer, vertical pass back to u8.
fn blur_plane(data: &[u8], width: u32, height: u32, channels: u32, ksize: u32) -> Vec<u8> {
    let kernel = gaussian_kernel_1d(ksize);
    let radius = (ksize / 2) as isize;
    let w = width as usize;
    let h = height as usize;
    let c = channels as usize;

    let mut horizontal = vec![0.0f32; data.len()];
    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                let mut acc = 0.0f32;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = reflect_101(x as isize + k as isize - radius, w);
                    acc += weight * data[(y * w + sx) * c + ch] as f32;
                }
                horizontal[(y * w + x) * c + ch] = acc;
            }
        }
    }

    let mut out = vec![0u8; data.len()];
    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                let mut acc = 0.0f32;
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = reflect_101(y as isize + k as isize - radius, h);
                    acc += weight * horizontal[(sy * w + x) * c + ch];
                }
                out[(y * w + x) * c + ch] = acc.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}

/// Normalized 1-D Gaussian taps. Sigma follows the usual derivation from
/// the kernel extent when no explicit sigma is given.
fn gaussian_kernel_1d(ksize: u32) -> Vec<f32> {
    assert!(ksize % 2 == 1, "gaussian kernel size must be odd");
    let sigma = 0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let sigma2 = sigma * sigma;
    let center = (ksize / 2) as isize;

    let mut kernel = Vec::with_capacity(ksize as usize);
    let mut sum = 0.0f32;
    for i in 0..ksize as isize {
        let x = (i - center) as f32;
        let v = (-(x * x) / (2.0 * sigma2)).exp();
        kernel.push(v);
        sum += v;
    }
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Border handling: reflect without repeating the edge sample.
pub(super) fn reflect_101(coord: isize, len: usize) -> usize {
    let n = len as isize;
    if n == 1 {
        return 0;
    }
    let period = 2 * n - 2;
    let mut c = coord % period;
    if c < 0 {
        c += period;
    }
    if c >= n {
        c = period - c;
    }
    c as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_taps_sum_to_one() {
        for ksize in [1u32, 3, 5, 21] {
            let sum: f32 = gaussian_kernel_1d(ksize).iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "ksize {} sums to {}", ksize, sum);
        }
    }

    #[test]
    fn even_kernel_sizes_normalize_upward() {
        let mut panel = ControlPanel::new();
        declare_controls(&mut panel);
        panel.set(KERNEL_SIZE, 0);
        assert_eq!(panel.normalize(KERNEL_SIZE), (1, true));
        panel.set(KERNEL_SIZE, 4);
        assert_eq!(panel.normalize(KERNEL_SIZE), (5, true));
        assert_eq!(panel.read(KERNEL_SIZE), 5);
    }

    #[test]
    fn kernel_size_one_is_identity() {
        let frame = Frame::solid(8, 8, [40, 80, 120]);
        let mut panel = ControlPanel::new();
        declare_controls(&mut panel);
        let out = apply(&frame, &panel);
        assert_eq!(out.raw_bytes(), frame.raw_bytes());
    }

    #[test]
    fn uniform_frames_are_fixed_points() {
        let frame = Frame::solid(16, 12, [77, 77, 77]);
        let out = blur_frame(&frame, 7);
        assert_eq!(out.raw_bytes(), frame.raw_bytes());
        assert_eq!(out.size(), frame.size());
    }

    #[test]
    fn blur_spreads_an_impulse() {
        let mut img = image::GrayImage::new(9, 9);
        img.put_pixel(4, 4, image::Luma([255]));
        let out = blur_frame(&Frame::Gray(img), 5);
        let center = out.rgb_at(4, 4)[0];
        let neighbor = out.rgb_at(5, 4)[0];
        assert!(center > neighbor, "peak stays at the impulse");
        assert!(neighbor > 0, "mass spreads to neighbors");
        assert!(center < 255, "peak is attenuated");
    }

    #[test]
    fn reflect_101_maps_out_of_range_coordinates() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(2, 5), 2);
        assert_eq!(reflect_101(-1, 1), 0);
    }
}
