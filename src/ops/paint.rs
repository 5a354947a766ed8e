// ============================================================================
// PAINT PRIMITIVES: SDF coverage + source-over compositing onto RgbaImage
// ============================================================================
//
// Every stroked or filled primitive the annotation tools draw goes through
// `paint_sdf`: a signed distance function (negative = inside) is evaluated at
// pixel centres inside a padded bounding box, turned into anti-aliased coverage
// with a one-pixel smoothstep, and blended with straight-alpha source-over.

use egui::Pos2;
use image::RgbaImage;
use rayon::prelude::*;

/// Smoothstep between edge0 and edge1.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Anti-aliased coverage for a signed distance.
#[inline]
pub fn coverage(d: f32) -> f32 {
    smoothstep(0.5, -0.5, d)
}

/// Distance from `p` to the segment `a`→`b`.
#[inline]
pub fn sdf_segment(px: f32, py: f32, a: Pos2, b: Pos2) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 1e-12 {
        (((px - a.x) * dx + (py - a.y) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = a.x + t * dx;
    let cy = a.y + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

/// Signed distance to a simple polygon (either winding).
pub fn sdf_polygon(verts: &[Pos2], px: f32, py: f32) -> f32 {
    let n = verts.len();
    if n == 0 {
        return f32::MAX;
    }
    let mut d = (px - verts[0].x) * (px - verts[0].x) + (py - verts[0].y) * (py - verts[0].y);
    let mut s: f32 = 1.0;
    let mut j = n - 1;
    for i in 0..n {
        let ex = verts[j].x - verts[i].x;
        let ey = verts[j].y - verts[i].y;
        let wx = px - verts[i].x;
        let wy = py - verts[i].y;
        let len2 = ex * ex + ey * ey;
        let t = if len2 > 1e-12 {
            ((wx * ex + wy * ey) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let bx = wx - ex * t;
        let by = wy - ey * t;
        d = d.min(bx * bx + by * by);
        let c1 = py >= verts[i].y;
        let c2 = py < verts[j].y;
        let c3 = ex * wy > ey * wx;
        if (c1 && c2 && c3) || (!c1 && !c2 && !c3) {
            s = -s;
        }
        j = i;
    }
    s * d.sqrt()
}

/// Blend `color` over the RGBA pixel at `dst` with the given coverage (0..1).
#[inline]
pub fn blend_over(dst: &mut [u8], color: [u8; 4], coverage: f32) {
    let sa = color[3] as f32 / 255.0 * coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let v = (color[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Axis-aligned float bounds (min_x, min_y, max_x, max_y) in raster space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn around(points: &[Pos2]) -> Option<Self> {
        let first = points.first()?;
        let mut b = Bounds { min_x: first.x, min_y: first.y, max_x: first.x, max_y: first.y };
        for p in &points[1..] {
            b.min_x = b.min_x.min(p.x);
            b.min_y = b.min_y.min(p.y);
            b.max_x = b.max_x.max(p.x);
            b.max_y = b.max_y.max(p.y);
        }
        Some(b)
    }

    pub fn expand(self, pad: f32) -> Self {
        Bounds {
            min_x: self.min_x - pad,
            min_y: self.min_y - pad,
            max_x: self.max_x + pad,
            max_y: self.max_y + pad,
        }
    }

    /// Integer pixel range clamped to the image, or `None` if empty.
    fn pixel_range(&self, w: u32, h: u32) -> Option<(usize, usize, usize, usize)> {
        if !(self.min_x.is_finite() && self.min_y.is_finite() && self.max_x.is_finite() && self.max_y.is_finite()) {
            return None;
        }
        let x0 = (self.min_x.floor() as i64).max(0);
        let y0 = (self.min_y.floor() as i64).max(0);
        let x1 = (self.max_x.ceil() as i64).min(w as i64);
        let y1 = (self.max_y.ceil() as i64).min(h as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as usize, y0 as usize, x1 as usize, y1 as usize))
    }
}

/// Composite `color` into `img` wherever `sdf` reports coverage, scaled by `opacity`.
///
/// Only pixels inside `bounds` are evaluated; rows are processed in parallel.
pub fn paint_sdf<F>(img: &mut RgbaImage, bounds: Bounds, color: [u8; 4], opacity: f32, sdf: F)
where
    F: Fn(f32, f32) -> f32 + Sync,
{
    let (w, h) = img.dimensions();
    let Some((x0, y0, x1, y1)) = bounds.pixel_range(w, h) else {
        return;
    };
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }
    let stride = w as usize * 4;
    let raw: &mut [u8] = &mut **img;
    raw[y0 * stride..y1 * stride]
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(row, row_buf)| {
            let py = (y0 + row) as f32 + 0.5;
            for x in x0..x1 {
                let px = x as f32 + 0.5;
                let cov = coverage(sdf(px, py));
                if cov > 0.001 {
                    let idx = x * 4;
                    blend_over(&mut row_buf[idx..idx + 4], color, cov * opacity);
                }
            }
        });
}

/// Stroke a single round-capped segment.
pub fn stroke_segment(img: &mut RgbaImage, a: Pos2, b: Pos2, width: f32, color: [u8; 4], opacity: f32) {
    let half = (width * 0.5).max(0.5);
    let Some(bounds) = Bounds::around(&[a, b]) else { return };
    paint_sdf(img, bounds.expand(half + 1.5), color, opacity, |px, py| {
        sdf_segment(px, py, a, b) - half
    });
}

/// Stroke an open polyline with round caps and joins as one coverage pass.
pub fn stroke_polyline(img: &mut RgbaImage, points: &[Pos2], width: f32, color: [u8; 4], opacity: f32) {
    stroke_polyline_counted(img, points, width, color, opacity);
}

/// `stroke_polyline`, returning how many pixel/segment distances were evaluated.
///
/// Each segment is only evaluated inside its own padded box. A row keeps the
/// maximum coverage over the segments crossing it and is composited once, so
/// joins are never blended twice.
pub(crate) fn stroke_polyline_counted(
    img: &mut RgbaImage,
    points: &[Pos2],
    width: f32,
    color: [u8; 4],
    opacity: f32,
) -> usize {
    let half = (width * 0.5).max(0.5);
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return 0;
    }
    let (w, h) = img.dimensions();
    let pairs: Vec<(Pos2, Pos2)> = match points {
        [] => return 0,
        [p] => vec![(*p, *p)],
        _ => points.windows(2).map(|s| (s[0], s[1])).collect(),
    };
    // (a, b, x0, y0, x1, y1)
    let segments: Vec<(Pos2, Pos2, usize, usize, usize, usize)> = pairs
        .into_iter()
        .filter_map(|(a, b)| {
            let (x0, y0, x1, y1) = Bounds::around(&[a, b])?.expand(half + 1.5).pixel_range(w, h)?;
            Some((a, b, x0, y0, x1, y1))
        })
        .collect();
    let Some(top) = segments.iter().map(|s| s.3).min() else { return 0 };
    let bottom = segments.iter().map(|s| s.5).max().unwrap_or(top);

    let stride = w as usize * 4;
    let raw: &mut [u8] = &mut **img;
    raw[top * stride..bottom * stride]
        .par_chunks_mut(stride)
        .enumerate()
        .map(|(row, row_buf)| {
            let y = top + row;
            let py = y as f32 + 0.5;
            let crossing: Vec<_> = segments.iter().filter(|s| y >= s.3 && y < s.5).collect();
            let (Some(span_x0), Some(span_x1)) =
                (crossing.iter().map(|s| s.2).min(), crossing.iter().map(|s| s.4).max())
            else {
                return 0;
            };
            let mut cov = vec![0.0f32; span_x1 - span_x0];
            let mut evaluated = 0;
            for &&(a, b, x0, _, x1, _) in &crossing {
                for x in x0..x1 {
                    let c = coverage(sdf_segment(x as f32 + 0.5, py, a, b) - half);
                    let slot = &mut cov[x - span_x0];
                    *slot = slot.max(c);
                }
                evaluated += x1 - x0;
            }
            for (i, &c) in cov.iter().enumerate() {
                if c > 0.001 {
                    let idx = (span_x0 + i) * 4;
                    blend_over(&mut row_buf[idx..idx + 4], color, c * opacity);
                }
            }
            evaluated
        })
        .sum()
}

/// Fill a simple polygon.
pub fn fill_polygon(img: &mut RgbaImage, verts: &[Pos2], color: [u8; 4], opacity: f32) {
    if verts.len() < 3 {
        return;
    }
    let Some(bounds) = Bounds::around(verts) else { return };
    paint_sdf(img, bounds.expand(1.5), color, opacity, |px, py| sdf_polygon(verts, px, py));
}

/// Append a flattened quadratic Bézier from `p0` (exclusive) through control `c` to `p1`.
pub fn flatten_quadratic(out: &mut Vec<Pos2>, p0: Pos2, c: Pos2, p1: Pos2, steps: usize) {
    let steps = steps.max(1);
    for i in 1..=steps {
        let t = i as f32 / steps as f32;
        let mt = 1.0 - t;
        out.push(Pos2::new(
            mt * mt * p0.x + 2.0 * mt * t * c.x + t * t * p1.x,
            mt * mt * p0.y + 2.0 * mt * t * c.y + t * t * p1.y,
        ));
    }
}
