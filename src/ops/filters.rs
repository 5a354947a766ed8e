// ============================================================================
// FILTERS: separable Gaussian blur and the circular redaction brush
// ============================================================================

use egui::Pos2;
use image::RgbaImage;
use rayon::prelude::*;

use super::paint::{blend_over, coverage};

/// Build a normalised 1-D Gaussian kernel for the given sigma.
///
/// The radius is `ceil(3σ)`, capped at `max_radius`: with clamped edges taps
/// further out than the image extent only re-read the border pixels.
fn build_gaussian_kernel(sigma: f32, max_radius: usize) -> Vec<f32> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = ((sigma * 3.0).ceil() as usize).min(max_radius);
    if radius == 0 {
        return vec![1.0];
    }
    let len = radius * 2 + 1;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..len)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / s2).exp()
        })
        .collect();
    let inv = 1.0 / kernel.iter().sum::<f32>();
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

/// Rayon-parallelised separable Gaussian blur with clamped edges.
pub fn gaussian_blur(src: &RgbaImage, sigma: f32) -> RgbaImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 || sigma <= 0.0 {
        return src.clone();
    }

    let kernel = build_gaussian_kernel(sigma, w.max(h));
    let radius = kernel.len() / 2;
    let buf_in: Vec<f32> = src.as_raw().iter().map(|&b| b as f32).collect();
    let pixel_count = w * h * 4;

    // Horizontal pass
    let mut buf_h = vec![0.0f32; pixel_count];
    buf_h.par_chunks_mut(w * 4).enumerate().for_each(|(y, row_out)| {
        let row_in_start = y * w * 4;
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = (x as isize + ki as isize - radius as isize).clamp(0, w as isize - 1) as usize;
                let idx = row_in_start + sx * 4;
                for c in 0..4 {
                    acc[c] += buf_in[idx + c] * kv;
                }
            }
            row_out[x * 4..x * 4 + 4].copy_from_slice(&acc);
        }
    });

    // Vertical pass
    let mut buf_v = vec![0.0f32; pixel_count];
    buf_v.par_chunks_mut(w * 4).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = (y as isize + ki as isize - radius as isize).clamp(0, h as isize - 1) as usize;
                let idx = sy * w * 4 + x * 4;
                for c in 0..4 {
                    acc[c] += buf_h[idx + c] * kv;
                }
            }
            row_out[x * 4..x * 4 + 4].copy_from_slice(&acc);
        }
    });

    let dst_raw: Vec<u8> = buf_v.iter().map(|&v| v.round().clamp(0.0, 255.0) as u8).collect();
    RgbaImage::from_raw(w as u32, h as u32, dst_raw).unwrap_or_else(|| src.clone())
}

/// Region of a blur dab: `size × size` centred on the point, clamped to the image.
/// Returns `(x, y, w, h)` or `None` when nothing of the square is on the image.
pub fn blur_region(center: Pos2, size: u32, img_w: u32, img_h: u32) -> Option<(u32, u32, u32, u32)> {
    if size == 0 || !center.x.is_finite() || !center.y.is_finite() {
        return None;
    }
    let half = size as f32 / 2.0;
    let x0 = (center.x - half).floor().max(0.0);
    let y0 = (center.y - half).floor().max(0.0);
    let x1 = (center.x - half).floor() + size as f32;
    let y1 = (center.y - half).floor() + size as f32;
    let x1 = x1.min(img_w as f32);
    let y1 = y1.min(img_h as f32);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}

/// Blur the pixels under a circular dab of diameter `size` centred at `center`.
///
/// The square around the point is copied out, blurred with `sigma = intensity`
/// and drawn back through a circular clip of radius `size / 2`. Calling this
/// repeatedly on the same spot compounds the blur.
pub fn blur_dab(img: &mut RgbaImage, center: Pos2, size: u32, intensity: f32) -> bool {
    let (iw, ih) = img.dimensions();
    let Some((rx, ry, rw, rh)) = blur_region(center, size, iw, ih) else {
        return false;
    };
    let region = image::imageops::crop_imm(img, rx, ry, rw, rh).to_image();
    let blurred = gaussian_blur(&region, intensity);
    let radius = size as f32 / 2.0;

    for ly in 0..rh {
        for lx in 0..rw {
            let x = rx + lx;
            let y = ry + ly;
            let dx = x as f32 + 0.5 - center.x;
            let dy = y as f32 + 0.5 - center.y;
            let cov = coverage((dx * dx + dy * dy).sqrt() - radius);
            if cov <= 0.001 {
                continue;
            }
            let src = blurred.get_pixel(lx, ly).0;
            blend_over(&mut img.get_pixel_mut(x, y).0, src, cov);
        }
    }
    true
}
