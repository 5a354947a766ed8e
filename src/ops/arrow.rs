use egui::Pos2;
use image::RgbaImage;
use std::f32::consts::PI;

use super::paint::{fill_polygon, stroke_segment};

/// Which ends of the arrow carry a head.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ArrowStyle {
    #[default]
    Single,
    Double,
}

impl ArrowStyle {
    pub fn name(&self) -> &'static str {
        match self {
            ArrowStyle::Single => "single",
            ArrowStyle::Double => "double",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "single" => Some(ArrowStyle::Single),
            "double" => Some(ArrowStyle::Double),
            _ => None,
        }
    }
}

/// Half-angle between the shaft and each side of a head.
pub const HEAD_HALF_ANGLE: f32 = PI / 5.0;

/// Length of an arrowhead for a given stroke width.
pub fn head_length(width: f32) -> f32 {
    (width * 3.0).max(20.0)
}

/// Triangle with its apex at `tip`, pointing along `angle`.
pub fn head_triangle(tip: Pos2, angle: f32, head_len: f32) -> [Pos2; 3] {
    [
        tip,
        Pos2::new(
            tip.x - head_len * (angle - HEAD_HALF_ANGLE).cos(),
            tip.y - head_len * (angle - HEAD_HALF_ANGLE).sin(),
        ),
        Pos2::new(
            tip.x - head_len * (angle + HEAD_HALF_ANGLE).cos(),
            tip.y - head_len * (angle + HEAD_HALF_ANGLE).sin(),
        ),
    ]
}

/// Shaft endpoints after pulling back half a head length at each headed end.
pub fn shaft(from: Pos2, to: Pos2, width: f32, style: ArrowStyle) -> (Pos2, Pos2) {
    let angle = (to.y - from.y).atan2(to.x - from.x);
    let pull = head_length(width) * 0.5;
    let (dx, dy) = (pull * angle.cos(), pull * angle.sin());
    let end = Pos2::new(to.x - dx, to.y - dy);
    let start = match style {
        ArrowStyle::Double => Pos2::new(from.x + dx, from.y + dy),
        ArrowStyle::Single => from,
    };
    (start, end)
}

/// Draw an arrow from `from` to `to`. Zero-length arrows are skipped.
pub fn draw_arrow(img: &mut RgbaImage, from: Pos2, to: Pos2, color: [u8; 4], width: f32, style: ArrowStyle) -> bool {
    if from.distance(to) < 1.0 {
        return false;
    }
    let angle = (to.y - from.y).atan2(to.x - from.x);
    let head_len = head_length(width);

    let (start, end) = shaft(from, to, width, style);
    stroke_segment(img, start, end, width, color, 1.0);

    fill_polygon(img, &head_triangle(to, angle, head_len), color, 1.0);
    if style == ArrowStyle::Double {
        fill_polygon(img, &head_triangle(from, angle + PI, head_len), color, 1.0);
    }
    true
}
