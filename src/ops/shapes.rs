use egui::Pos2;
use image::RgbaImage;
use std::f32::consts::PI;

use super::paint::{Bounds, flatten_quadratic, paint_sdf, stroke_polyline, stroke_segment};

/// Outline shapes the shapes tool can draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ShapeKind {
    #[default]
    Rect,
    Circle,
    HandCircle,
    Line,
}

impl ShapeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Rect => "rect",
            ShapeKind::Circle => "circle",
            ShapeKind::HandCircle => "hand_circle",
            ShapeKind::Line => "line",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "rect" | "rectangle" => Some(ShapeKind::Rect),
            "circle" => Some(ShapeKind::Circle),
            "hand_circle" | "handcircle" | "hand" => Some(ShapeKind::HandCircle),
            "line" => Some(ShapeKind::Line),
            _ => None,
        }
    }

    pub fn all() -> &'static [ShapeKind] {
        &[ShapeKind::Rect, ShapeKind::Circle, ShapeKind::HandCircle, ShapeKind::Line]
    }
}

// ============================================================================
// Randomness for the hand-drawn circle (xorshift64)
// ============================================================================

/// Small xorshift64 PRNG; seeded from the clock unless a seed is given.
#[derive(Clone, Debug)]
pub struct XorShift {
    state: u64,
}

impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self { state: if seed == 0 { 0x517cc1b727220a95 } else { seed } }
    }

    pub fn from_clock() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|t| t.as_nanos() as u64)
            .unwrap_or(0);
        Self::new(nanos ^ 0x517cc1b727220a95)
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut s = self.state;
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        self.state = s;
        s
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}

/// Per-gesture randomisation of a hand-drawn circle.
///
/// Drawn once when the gesture starts so every preview frame of the same drag
/// shows the same wobble, and a new drag gets a new one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandJitter {
    /// Angle where the main arc begins.
    pub start_offset: f32,
    /// Angular length of the main arc, a little short of a full turn.
    pub main_arc: f32,
    /// Phase for the noise function.
    pub seed: f32,
    /// Whole-shape rotation.
    pub tilt: f32,
    /// Angular length of the lead-in tail.
    pub tail_length: f32,
}

impl HandJitter {
    pub fn random(rng: &mut XorShift) -> Self {
        Self {
            start_offset: rng.next_f32() * PI * 2.0,
            main_arc: PI * 2.0 - PI * (0.1 + rng.next_f32() * 0.15),
            seed: rng.next_f32() * 1000.0,
            tilt: (rng.next_f32() - 0.5) * 0.15,
            tail_length: PI * (0.2 + rng.next_f32() * 0.25),
        }
    }

    fn noise(&self, angle: f32) -> f32 {
        let s = self.seed;
        (angle * 2.3 + s).sin() * 3.0 + (angle * 1.1 + s * 0.7).sin() * 2.0 + (angle * 3.7 + s * 1.3).cos() * 1.5
    }

    fn squeeze(&self, angle: f32) -> f32 {
        1.0 + (angle * 2.0 + self.seed).sin() * 0.03
    }
}

const HAND_ARC_POINTS: usize = 60;
const HAND_TAIL_POINTS: usize = 10;
const CURVE_STEPS: usize = 6;

/// Build the flattened path of a hand-drawn ellipse inscribed in the rect.
///
/// The path starts at the tip of a lead-in tail, runs through the tail, then
/// follows the main arc with quadratic smoothing through segment midpoints.
pub fn hand_circle_path(center: Pos2, rx: f32, ry: f32, jitter: &HandJitter) -> Vec<Pos2> {
    let point_at = |angle: f32, noise: f32, inward: f32| {
        let squeeze = jitter.squeeze(angle);
        Pos2::new(
            center.x + (rx * squeeze - inward + noise) * (angle + jitter.tilt).cos(),
            center.y + (ry / squeeze - inward + noise) * (angle + jitter.tilt).sin(),
        )
    };

    let tail: Vec<Pos2> = (0..=HAND_TAIL_POINTS)
        .map(|i| {
            let t = i as f32 / HAND_TAIL_POINTS as f32;
            let angle = jitter.start_offset - jitter.tail_length * (1.0 - t);
            point_at(angle, jitter.noise(angle) * t, (1.0 - t) * rx * 0.15)
        })
        .collect();

    let arc: Vec<Pos2> = (0..=HAND_ARC_POINTS)
        .map(|i| {
            let t = i as f32 / HAND_ARC_POINTS as f32;
            let angle = jitter.start_offset + t * jitter.main_arc;
            point_at(angle, jitter.noise(angle), 0.0)
        })
        .collect();

    let mut path = tail;
    for i in 1..arc.len() - 1 {
        let ctrl = arc[i];
        let next = arc[i + 1];
        let mid = Pos2::new((ctrl.x + next.x) / 2.0, (ctrl.y + next.y) / 2.0);
        let from = *path.last().unwrap_or(&ctrl);
        flatten_quadratic(&mut path, from, ctrl, mid, CURVE_STEPS);
    }
    if let Some(&last) = arc.last() {
        path.push(last);
    }
    path
}

/// Normalised rect spanned by two points: `(x, y, w, h)`.
pub fn span_rect(from: Pos2, to: Pos2) -> (f32, f32, f32, f32) {
    (
        from.x.min(to.x),
        from.y.min(to.y),
        (to.x - from.x).abs(),
        (to.y - from.y).abs(),
    )
}

/// True when the gesture is too small to produce a visible shape.
pub fn is_degenerate(kind: ShapeKind, from: Pos2, to: Pos2) -> bool {
    let (_, _, w, h) = span_rect(from, to);
    match kind {
        ShapeKind::Rect | ShapeKind::Line | ShapeKind::HandCircle => w < 1.0 && h < 1.0,
        ShapeKind::Circle => w.min(h) < 1.0,
    }
}

/// Stroke `kind` spanning `from`→`to`. `jitter` is only read for hand circles.
///
/// Returns false if the geometry was degenerate and nothing was drawn.
pub fn draw_shape(
    img: &mut RgbaImage,
    from: Pos2,
    to: Pos2,
    kind: ShapeKind,
    color: [u8; 4],
    width: f32,
    jitter: &HandJitter,
) -> bool {
    if is_degenerate(kind, from, to) {
        return false;
    }
    let (x, y, w, h) = span_rect(from, to);
    let half = (width * 0.5).max(0.5);
    let center = Pos2::new(x + w / 2.0, y + h / 2.0);
    match kind {
        ShapeKind::Rect => {
            let (hx, hy) = (w / 2.0, h / 2.0);
            let bounds = Bounds { min_x: x, min_y: y, max_x: x + w, max_y: y + h };
            paint_sdf(img, bounds.expand(half + 1.5), color, 1.0, |px, py| {
                sdf_box(px - center.x, py - center.y, hx, hy).abs() - half
            });
        }
        ShapeKind::Circle => {
            let r = w.min(h) / 2.0;
            let bounds = Bounds {
                min_x: center.x - r,
                min_y: center.y - r,
                max_x: center.x + r,
                max_y: center.y + r,
            };
            paint_sdf(img, bounds.expand(half + 1.5), color, 1.0, |px, py| {
                let d = ((px - center.x).powi(2) + (py - center.y).powi(2)).sqrt();
                (d - r).abs() - half
            });
        }
        ShapeKind::HandCircle => {
            let path = hand_circle_path(center, w / 2.0, h / 2.0, jitter);
            stroke_polyline(img, &path, width, color, 1.0);
        }
        ShapeKind::Line => {
            stroke_segment(img, from, to, width, color, 1.0);
        }
    }
    true
}

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}
