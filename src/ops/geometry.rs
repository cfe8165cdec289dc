//! Fixed geometric transforms: mirror, half-size downscale, quarter-turn
//! rotation.
//!
//! The rotation is expressed as a general affine warp with inverse mapping
//! and bilinear sampling, so the canvas keeps its original dimensions and
//! the corners clip. The downscale derives its output geometry from the
//! input; the session's recording sink is sized from the first processed
//! frame for exactly this operator.

use image::{imageops, GrayImage, RgbImage};

use crate::frame::Frame;

/// Reflect across the vertical axis.
pub(super) fn mirror(frame: &Frame) -> Frame {
    match frame {
        Frame::Color(img) => Frame::Color(imageops::flip_horizontal(img)),
        Frame::Gray(img) => Frame::Gray(imageops::flip_horizontal(img)),
    }
}

/// Uniform downscale by 0.5 in both axes, bilinear.
pub(super) fn resize_half(frame: &Frame) -> Frame {
    let out_w = ((frame.width() as f32 * 0.5).round() as u32).max(1);
    let out_h = ((frame.height() as f32 * 0.5).round() as u32).max(1);
    match frame {
        Frame::Color(img) => {
            let data = resize_plane(img.as_raw(), img.width(), img.height(), 3, out_w, out_h);
            Frame::Color(RgbImage::from_raw(out_w, out_h, data).expect("resize sizes its buffer"))
        }
        Frame::Gray(img) => {
            let data = resize_plane(img.as_raw(), img.width(), img.height(), 1, out_w, out_h);
            Frame::Gray(GrayImage::from_raw(out_w, out_h, data).expect("resize sizes its buffer"))
        }
    }
}

/// Rotate 90 degrees about the frame center, canvas dimensions preserved.
pub(super) fn rotate_quarter(frame: &Frame) -> Frame {
    let cx = frame.width() as f32 / 2.0;
    let cy = frame.height() as f32 / 2.0;
    // Rotation matrix about (cx, cy) for a quarter turn: cos = 0, sin = 1.
    let m = [[0.0, 1.0, cx - cy], [-1.0, 0.0, cx + cy]];
    warp_affine(frame, m)
}

/// Affine warp onto a canvas of the source's dimensions.
///
/// Uses inverse mapping: for every destination pixel the matrix inverse
/// gives the source coordinate, sampled bilinearly with a zero border.
fn warp_affine(frame: &Frame, m: [[f32; 3]; 2]) -> Frame {
    let inv = invert_affine(m);
    let width = frame.width();
    let height = frame.height();

    match frame {
        Frame::Color(img) => {
            let data = warp_plane(img.as_raw(), width, height, 3, inv);
            Frame::Color(RgbImage::from_raw(width, height, data).expect("warp sizes its buffer"))
        }
        Frame::Gray(img) => {
            let data = warp_plane(img.as_raw(), width, height, 1, inv);
            Frame::Gray(GrayImage::from_raw(width, height, data).expect("warp sizes its buffer"))
        }
    }
}

fn invert_affine(m: [[f32; 3]; 2]) -> [[f32; 3]; 2] {
    let [[a, b, tx], [c, d, ty]] = m;
    let det = a * d - b * c;
    assert!(det.abs() > f32::EPSILON, "affine matrix must be invertible");
    let (ia, ib, ic, id) = (d / det, -b / det, -c / det, a / det);
    [
        [ia, ib, -(ia * tx + ib * ty)],
        [ic, id, -(ic * tx + id * ty)],
    ]
}

fn warp_plane(data: &[u8], width: u32, height: u32, channels: u32, inv: [[f32; 3]; 2]) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let c = channels as usize;
    let mut out = vec![0u8; data.len()];

    for y in 0..h {
        for x in 0..w {
            let sx = inv[0][0] * x as f32 + inv[0][1] * y as f32 + inv[0][2];
            let sy = inv[1][0] * x as f32 + inv[1][1] * y as f32 + inv[1][2];
            for ch in 0..c {
                out[(y * w + x) * c + ch] = sample_bilinear(data, w, h, c, ch, sx, sy);
            }
        }
    }

    out
}

fn resize_plane(
    data: &[u8],
    src_w: u32,
    src_h: u32,
    channels: u32,
    out_w: u32,
    out_h: u32,
) -> Vec<u8> {
    let c = channels as usize;
    let mut out = vec![0u8; (out_w * out_h) as usize * c];
    let x_ratio = src_w as f32 / out_w as f32;
    let y_ratio = src_h as f32 / out_h as f32;

    for y in 0..out_h as usize {
        for x in 0..out_w as usize {
            // Pixel-center alignment keeps the half-scale grid unbiased.
            let sx = (x as f32 + 0.5) * x_ratio - 0.5;
            let sy = (y as f32 + 0.5) * y_ratio - 0.5;
            for ch in 0..c {
                out[(y * out_w as usize + x) * c + ch] = sample_bilinear_clamped(
                    data,
                    src_w as usize,
                    src_h as usize,
                    c,
                    ch,
                    sx,
                    sy,
                );
            }
        }
    }

    out
}

/// Bilinear sample with a zero border (out-of-range reads contribute black).
fn sample_bilinear(data: &[u8], w: usize, h: usize, c: usize, ch: usize, x: f32, y: f32) -> u8 {
    let x0 = x.floor() as isize;
    let y0 = y.floor() as isize;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let at = |px: isize, py: isize| -> f32 {
        if px < 0 || py < 0 || px >= w as isize || py >= h as isize {
            0.0
        } else {
            data[(py as usize * w + px as usize) * c + ch] as f32
        }
    };

    let v0 = at(x0, y0) * (1.0 - fx) + at(x0 + 1, y0) * fx;
    let v1 = at(x0, y0 + 1) * (1.0 - fx) + at(x0 + 1, y0 + 1) * fx;
    (v0 * (1.0 - fy) + v1 * fy).round().clamp(0.0, 255.0) as u8
}

/// Bilinear sample clamping coordinates to the image; used by the
/// downscale where the border must not bleed black into edge pixels.
fn sample_bilinear_clamped(
    data: &[u8],
    w: usize,
    h: usize,
    c: usize,
    ch: usize,
    x: f32,
    y: f32,
) -> u8 {
    let x = x.clamp(0.0, w as f32 - 1.0);
    let y = y.clamp(0.0, h as f32 - 1.0);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let at = |px: usize, py: usize| data[(py * w + px) * c + ch] as f32;
    let v0 = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
    let v1 = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
    (v0 * (1.0 - fy) + v1 * fy).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameSize;
    use image::Rgb;

    #[test]
    fn mirror_reflects_across_the_vertical_axis() {
        let mut img = RgbImage::new(4, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let out = mirror(&Frame::Color(img));
        assert_eq!(out.rgb_at(3, 0), [255, 0, 0]);
        assert_eq!(out.rgb_at(0, 0), [0, 0, 0]);
    }

    #[test]
    fn mirror_twice_is_the_identity() {
        let mut img = RgbImage::new(5, 3);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgb([(x * 40) as u8, (y * 60) as u8, 7]);
        }
        let frame = Frame::Color(img);
        let twice = mirror(&mirror(&frame));
        assert_eq!(twice.raw_bytes(), frame.raw_bytes());
    }

    #[test]
    fn resize_halves_dimensions_within_rounding() {
        for (w, h) in [(100u32, 100u32), (99, 51), (640, 480), (3, 3)] {
            let out = resize_half(&Frame::solid(w, h, [50, 60, 70]));
            let dw = (out.width() as i64 - (w / 2) as i64).abs();
            let dh = (out.height() as i64 - (h / 2) as i64).abs();
            assert!(dw <= 1, "{}x{} -> width {}", w, h, out.width());
            assert!(dh <= 1, "{}x{} -> height {}", w, h, out.height());
        }
    }

    #[test]
    fn resize_preserves_uniform_content() {
        let out = resize_half(&Frame::solid(64, 48, [90, 90, 90]));
        assert!(out.raw_bytes().iter().all(|&v| v == 90));
    }

    #[test]
    fn rotate_preserves_canvas_dimensions_across_four_turns() {
        let mut frame = Frame::solid(60, 40, [10, 20, 30]);
        let original = frame.size();
        for _ in 0..4 {
            frame = rotate_quarter(&frame);
            assert_eq!(frame.size(), original);
        }
        // Content outside the inscribed square is clipped each turn; only
        // the canvas geometry round-trips.
    }

    #[test]
    fn rotate_moves_content_a_quarter_turn() {
        // On a square canvas the turn is lossless. Forward map:
        // x' = y, y' = width - x, so (6, 4) lands at (4, 3).
        let mut img = RgbImage::new(9, 9);
        img.put_pixel(6, 4, Rgb([200, 0, 0]));
        let out = rotate_quarter(&Frame::Color(img));
        assert_eq!(out.size(), FrameSize::new(9, 9));
        assert_eq!(out.rgb_at(4, 3), [200, 0, 0]);
    }
}
