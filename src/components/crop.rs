use egui::Pos2;
use image::RgbaImage;

use crate::canvas::RasterSurface;
use crate::ops::paint::{Bounds, paint_sdf};

/// Selections must exceed this many pixels on both axes.
pub const DEFAULT_MIN_CROP_SIZE: u32 = 10;

const DIM_COLOR: [u8; 4] = [0, 0, 0, 128];
const BORDER_COLOR: [u8; 4] = [0xfc, 0xdf, 0xc2, 0xff];
const BORDER_WIDTH: f32 = 2.0;
const DASH: f32 = 5.0;
const GAP: f32 = 5.0;

/// Integer crop rectangle in raster pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A settled, not yet applied selection plus the pixels under its overlay.
#[derive(Clone, Debug)]
pub struct CropSelection {
    pub rect: CropRect,
    clean: RgbaImage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropPhase {
    Idle,
    Selecting,
    Pending,
}

#[derive(Clone, Debug, Default)]
enum CropState {
    #[default]
    Idle,
    Selecting {
        start: Pos2,
        current: Pos2,
        clean: RgbaImage,
    },
    Pending(CropSelection),
}

/// `Idle → Selecting → Pending → Idle` crop lifecycle.
///
/// Nothing here touches history: the caller snapshots after `apply`.
#[derive(Clone, Debug)]
pub struct CropTool {
    state: CropState,
    min_size: u32,
}

impl Default for CropTool {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CROP_SIZE)
    }
}

impl CropTool {
    pub fn new(min_size: u32) -> Self {
        Self { state: CropState::Idle, min_size }
    }

    pub fn phase(&self) -> CropPhase {
        match self.state {
            CropState::Idle => CropPhase::Idle,
            CropState::Selecting { .. } => CropPhase::Selecting,
            CropState::Pending(_) => CropPhase::Pending,
        }
    }

    pub fn pending(&self) -> Option<&CropSelection> {
        match &self.state {
            CropState::Pending(sel) => Some(sel),
            _ => None,
        }
    }

    /// Start a new selection. A pending one is discarded first.
    pub fn begin(&mut self, surface: &mut RasterSurface, at: Pos2) {
        self.cancel(surface);
        self.state = CropState::Selecting {
            start: at,
            current: at,
            clean: surface.snapshot(),
        };
    }

    /// Redraw the live overlay for `start → at`.
    pub fn update(&mut self, surface: &mut RasterSurface, at: Pos2) {
        if let CropState::Selecting { start, current, clean } = &mut self.state {
            *current = at;
            surface.restore(clean);
            let (x, y, w, h) = float_rect(*start, at);
            draw_overlay(surface.pixels_mut(), x, y, w, h);
        }
    }

    /// End the drag at `at` (or the last known point). Returns the pending
    /// rect, or `None` if the gesture was too small and was discarded.
    pub fn finish(&mut self, surface: &mut RasterSurface, at: Option<Pos2>) -> Option<CropRect> {
        let CropState::Selecting { start, current, clean } = std::mem::take(&mut self.state) else {
            return None;
        };
        let end = at.unwrap_or(current);
        surface.restore(&clean);
        match settle_rect(start, end, surface.width(), surface.height(), self.min_size) {
            Some(rect) => {
                draw_overlay(
                    surface.pixels_mut(),
                    rect.x as f32,
                    rect.y as f32,
                    rect.width as f32,
                    rect.height as f32,
                );
                self.state = CropState::Pending(CropSelection { rect, clean });
                Some(rect)
            }
            None => {
                crate::log_info!("Crop gesture too small, discarded");
                None
            }
        }
    }

    /// Crop the surface to the pending rect. Returns the rect that was applied.
    pub fn apply(&mut self, surface: &mut RasterSurface) -> Option<CropRect> {
        let CropState::Pending(sel) = std::mem::take(&mut self.state) else {
            return None;
        };
        surface.restore(&sel.clean);
        let r = sel.rect;
        let cropped = surface.extract(r.x, r.y, r.width, r.height);
        surface.replace(cropped);
        Some(r)
    }

    /// Drop an in-flight or pending selection and restore the clean pixels.
    pub fn cancel(&mut self, surface: &mut RasterSurface) -> bool {
        match std::mem::take(&mut self.state) {
            CropState::Idle => false,
            CropState::Selecting { clean, .. } => {
                surface.restore(&clean);
                true
            }
            CropState::Pending(sel) => {
                surface.restore(&sel.clean);
                true
            }
        }
    }

    /// Forget all state without touching the surface (image replaced).
    pub fn clear(&mut self) {
        self.state = CropState::Idle;
    }
}

/// Normalised float rect `(x, y, w, h)` spanned by two points.
fn float_rect(a: Pos2, b: Pos2) -> (f32, f32, f32, f32) {
    (a.x.min(b.x), a.y.min(b.y), (b.x - a.x).abs(), (b.y - a.y).abs())
}

/// Snap a drag to whole pixels inside the surface and apply the size threshold.
pub fn settle_rect(a: Pos2, b: Pos2, surface_w: u32, surface_h: u32, min_size: u32) -> Option<CropRect> {
    let snap = |lo: f32, hi: f32, limit: u32| -> Option<(u32, u32)> {
        if !lo.is_finite() || !hi.is_finite() {
            return None;
        }
        let lo = lo.clamp(0.0, limit as f32);
        let hi = hi.clamp(0.0, limit as f32);
        let start = lo.floor();
        let size = (hi - start).round().min(limit as f32 - start);
        Some((start as u32, size.max(0.0) as u32))
    };
    let (x, width) = snap(a.x.min(b.x), a.x.max(b.x), surface_w)?;
    let (y, height) = snap(a.y.min(b.y), a.y.max(b.y), surface_h)?;
    if width > min_size && height > min_size {
        Some(CropRect { x, y, width, height })
    } else {
        None
    }
}

/// Dim everything outside the rect and outline it with a dashed border.
pub fn draw_overlay(img: &mut RgbaImage, x: f32, y: f32, w: f32, h: f32) {
    let (iw, ih) = img.dimensions();
    let (cx, cy, hx, hy) = (x + w / 2.0, y + h / 2.0, w / 2.0, h / 2.0);
    let whole = Bounds { min_x: 0.0, min_y: 0.0, max_x: iw as f32, max_y: ih as f32 };
    paint_sdf(img, whole, DIM_COLOR, 1.0, |px, py| {
        let dx = (px - cx).abs() - hx;
        let dy = (py - cy).abs() - hy;
        // Inside the rect is "outside" the dimmed region.
        -dx.max(dy)
    });

    // Dashes run clockwise from the top-left corner, continuing around corners.
    let corners = [
        Pos2::new(x, y),
        Pos2::new(x + w, y),
        Pos2::new(x + w, y + h),
        Pos2::new(x, y + h),
        Pos2::new(x, y),
    ];
    let mut offset = 0.0f32;
    for edge in corners.windows(2) {
        let (a, b) = (edge[0], edge[1]);
        let len = a.distance(b);
        let mut s = -(offset % (DASH + GAP));
        while s < len {
            let d0 = s.max(0.0);
            let d1 = (s + DASH).min(len);
            if d1 > d0 {
                dash_piece(img, a, b, len, d0, d1);
            }
            s += DASH + GAP;
        }
        offset += len;
    }
}

/// Butt-capped dash covering `[d0, d1]` along the axis-aligned edge `a → b`.
fn dash_piece(img: &mut RgbaImage, a: Pos2, b: Pos2, len: f32, d0: f32, d1: f32) {
    if len <= 0.0 {
        return;
    }
    let dir = ((b.x - a.x) / len, (b.y - a.y) / len);
    let p0 = Pos2::new(a.x + dir.0 * d0, a.y + dir.1 * d0);
    let p1 = Pos2::new(a.x + dir.0 * d1, a.y + dir.1 * d1);
    let half = BORDER_WIDTH / 2.0;
    let (min_x, max_x) = (p0.x.min(p1.x), p0.x.max(p1.x));
    let (min_y, max_y) = (p0.y.min(p1.y), p0.y.max(p1.y));
    let (bx, by) = if dir.0.abs() > dir.1.abs() {
        (min_x, min_y - half)
    } else {
        (min_x - half, min_y)
    };
    let (ex, ey) = if dir.0.abs() > dir.1.abs() {
        (max_x, max_y + half)
    } else {
        (max_x + half, max_y)
    };
    let (cx, cy, hx, hy) = ((bx + ex) / 2.0, (by + ey) / 2.0, (ex - bx) / 2.0, (ey - by) / 2.0);
    let bounds = Bounds { min_x: bx, min_y: by, max_x: ex, max_y: ey }.expand(1.5);
    paint_sdf(img, bounds, BORDER_COLOR, 1.0, |px, py| {
        let dx = (px - cx).abs() - hx;
        let dy = (py - cy).abs() - hy;
        let outside = (dx.max(0.0).powi(2) + dy.max(0.0).powi(2)).sqrt();
        outside + dx.max(dy).min(0.0)
    });
}
