use ab_glyph::{Font, FontArc, Glyph, GlyphId, OutlinedGlyph, PxScale, ScaleFont, point};
use egui::Pos2;
use image::RgbaImage;

use super::paint::blend_over;

/// Line advance as a multiple of the font size.
pub const LINE_HEIGHT: f32 = 1.2;

/// Weight of committed text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

impl FontWeight {
    pub fn name(&self) -> &'static str {
        match self {
            FontWeight::Normal => "normal",
            FontWeight::Bold => "bold",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "normal" | "regular" | "400" => Some(FontWeight::Normal),
            "bold" | "700" => Some(FontWeight::Bold),
            _ => None,
        }
    }

    /// CSS-style numeric weight.
    pub fn css_weight(&self) -> u16 {
        match self {
            FontWeight::Normal => 400,
            FontWeight::Bold => 700,
        }
    }
}

// ============================================================================
// Fonts
// ============================================================================

/// Faces used by the text tool and the emoji brush.
///
/// Any slot may be empty (no matching system font); rendering through an
/// empty slot draws nothing.
#[derive(Clone, Default)]
pub struct FontSet {
    pub regular: Option<FontArc>,
    /// A genuinely bold face. When absent, bold text uses the regular face
    /// with a one-pixel horizontal dilation.
    pub bold: Option<FontArc>,
    pub emoji: Option<FontArc>,
}

const FALLBACK_FAMILIES: &[&str] = &["DejaVu Sans", "Liberation Sans", "Arial", "Helvetica"];
const EMOJI_FAMILIES: &[&str] = &["Noto Emoji", "Twemoji", "Segoe UI Emoji", "Symbola", "Noto Color Emoji"];

impl FontSet {
    /// Resolve faces for `family` from the installed system fonts.
    pub fn load_system(family: &str) -> Self {
        let mut families: Vec<&str> = vec![family];
        families.extend(FALLBACK_FAMILIES.iter().copied());

        let regular = families.iter().find_map(|f| load_system_font(f, 400));
        let bold = families
            .iter()
            .find_map(|f| load_face(f, 700).filter(|(_, weight)| *weight >= 600.0))
            .map(|(font, _)| font);
        let emoji = EMOJI_FAMILIES.iter().find_map(|f| load_system_font(f, 400));

        if regular.is_none() {
            crate::log_warn!("No usable system font for family '{}'; text will not render", family);
        }
        Self { regular, bold, emoji }
    }

    pub fn from_regular(font: FontArc) -> Self {
        Self { regular: Some(font), bold: None, emoji: None }
    }

    pub fn is_empty(&self) -> bool {
        self.regular.is_none() && self.bold.is_none() && self.emoji.is_none()
    }

    /// Face for `weight` plus whether bold must be synthesised.
    pub fn face(&self, weight: FontWeight) -> Option<(&FontArc, bool)> {
        match weight {
            FontWeight::Bold => match &self.bold {
                Some(font) => Some((font, false)),
                None => self.regular.as_ref().map(|f| (f, true)),
            },
            FontWeight::Normal => self.regular.as_ref().map(|f| (f, false)),
        }
    }
}

/// Load an upright font by family name and weight from the system.
/// `weight` is a CSS-style weight value (400=Regular, 700=Bold).
/// `"sans-serif"`, `"serif"` and `"monospace"` select the generic families.
pub fn load_system_font(family: &str, weight: u16) -> Option<FontArc> {
    load_face(family, weight).map(|(font, _)| font)
}

/// Returns the face and the weight it actually has.
fn load_face(family: &str, weight: u16) -> Option<(FontArc, f32)> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Weight};
    use font_kit::source::SystemSource;

    let name = match family.trim().to_ascii_lowercase().as_str() {
        "sans-serif" | "sans" => FamilyName::SansSerif,
        "serif" => FamilyName::Serif,
        "monospace" => FamilyName::Monospace,
        _ => FamilyName::Title(family.to_string()),
    };

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);

    let handle = SystemSource::new().select_best_match(&[name], &props).ok()?;
    let font_data = handle.load().ok()?;
    let actual_weight = font_data.properties().weight.0;
    let bytes: Vec<u8> = (*font_data.copy_font_data()?).clone();
    FontArc::try_from_vec(bytes).ok().map(|f| (f, actual_weight))
}

/// Scale so that `size_px` is the em size, as CSS font sizes are.
pub fn em_scale(font: &FontArc, size_px: f32) -> PxScale {
    font.pt_to_px_scale(size_px).unwrap_or(PxScale::from(size_px))
}

// ============================================================================
// Layout + rasterisation
// ============================================================================

/// Lay out one line left-aligned at x = 0 with the baseline at y = 0.
/// Returns `(glyph ids with x positions, total advance width)`.
fn layout_line(font: &FontArc, scale: PxScale, text: &str) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(scale);
    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut last: Option<GlyphId> = None;
    for ch in text.chars() {
        if ch.is_control() {
            continue;
        }
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            cursor_x += scaled.kern(prev, id);
        }
        glyphs.push((id, cursor_x));
        cursor_x += scaled.h_advance(id);
        last = Some(id);
    }
    (glyphs, cursor_x)
}

/// Rasterise positioned glyphs into a shared coverage buffer, then composite.
fn composite_glyphs(img: &mut RgbaImage, outlines: &[OutlinedGlyph], color: [u8; 4], opacity: f32, faux_bold: bool) -> bool {
    let (w, h) = img.dimensions();
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for g in outlines {
        let b = g.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x + if faux_bold { 1.0 } else { 0.0 });
        max_y = max_y.max(b.max.y);
    }
    let x0 = (min_x.floor() as i64).max(0);
    let y0 = (min_y.floor() as i64).max(0);
    let x1 = (max_x.ceil() as i64).min(w as i64);
    let y1 = (max_y.ceil() as i64).min(h as i64);
    if x1 <= x0 || y1 <= y0 {
        return false;
    }
    let buf_w = (x1 - x0) as usize;
    let buf_h = (y1 - y0) as usize;
    let mut cov = vec![0.0f32; buf_w * buf_h];

    for g in outlines {
        let b = g.px_bounds();
        g.draw(|gx, gy, c| {
            let ix = (b.min.x as i64 + gx as i64) - x0;
            let iy = (b.min.y as i64 + gy as i64) - y0;
            if ix < 0 || iy < 0 || ix as usize >= buf_w || iy as usize >= buf_h {
                return;
            }
            let idx = iy as usize * buf_w + ix as usize;
            cov[idx] = cov[idx].max(c);
            if faux_bold && (ix as usize) + 1 < buf_w {
                cov[idx + 1] = cov[idx + 1].max(c);
            }
        });
    }

    let mut any = false;
    for row in 0..buf_h {
        for col in 0..buf_w {
            let c = cov[row * buf_w + col];
            if c > 0.001 {
                let px = img.get_pixel_mut(x0 as u32 + col as u32, y0 as u32 + row as u32);
                blend_over(&mut px.0, color, c.min(1.0) * opacity);
                any = true;
            }
        }
    }
    any
}

/// Draw `text` with its top-left at `anchor`, one line per `\n`,
/// advancing `LINE_HEIGHT × font_size` per line.
///
/// Returns true if any pixel was touched.
pub fn draw_text(
    img: &mut RgbaImage,
    font: &FontArc,
    text: &str,
    anchor: Pos2,
    font_size: f32,
    color: [u8; 4],
    faux_bold: bool,
) -> bool {
    if font_size <= 0.0 {
        return false;
    }
    let scale = em_scale(font, font_size);
    let ascent = font.as_scaled(scale).ascent();
    let mut outlines = Vec::new();
    for (line_idx, line) in text.split('\n').enumerate() {
        let baseline = anchor.y + line_idx as f32 * font_size * LINE_HEIGHT + ascent;
        let (glyphs, _) = layout_line(font, scale, line);
        outlines.extend(glyphs.into_iter().filter_map(|(id, x)| {
            let glyph: Glyph = id.with_scale_and_position(scale, point(anchor.x + x, baseline));
            font.outline_glyph(glyph)
        }));
    }
    if outlines.is_empty() {
        return false;
    }
    composite_glyphs(img, &outlines, color, 1.0, faux_bold)
}

/// First face with an outline for `ch`, else the first face that maps it at all.
///
/// Bitmap-only faces (colour emoji) map the char but have no outline.
fn face_for<'a>(fonts: &[&'a FontArc], ch: char, size_px: f32) -> Option<&'a FontArc> {
    let outlined = fonts.iter().copied().find(|f| {
        let id = f.glyph_id(ch);
        id.0 != 0 && f.outline_glyph(id.with_scale(em_scale(f, size_px))).is_some()
    });
    outlined.or_else(|| fonts.iter().copied().find(|f| f.glyph_id(ch).0 != 0))
}

/// Stamp a glyph string centred (horizontally and vertically) on `center`.
///
/// Each character is drawn from the first face in `fonts` that maps it to a
/// real glyph with an outline.
pub fn stamp_glyphs(
    img: &mut RgbaImage,
    fonts: &[&FontArc],
    text: &str,
    center: Pos2,
    size_px: f32,
    color: [u8; 4],
    opacity: f32,
) -> bool {
    if size_px <= 0.0 || fonts.is_empty() {
        return false;
    }
    let mut placed: Vec<(&FontArc, GlyphId, PxScale, f32, f32)> = Vec::new();
    let mut cursor_x = 0.0f32;
    for ch in text.chars() {
        if ch.is_control() || ch == '\u{fe0f}' || ch == '\u{200d}' {
            continue;
        }
        let Some(font) = face_for(fonts, ch, size_px) else {
            continue;
        };
        let scale = em_scale(font, size_px);
        let scaled = font.as_scaled(scale);
        let id = font.glyph_id(ch);
        let mid = (scaled.ascent() + scaled.descent()) / 2.0;
        placed.push((font, id, scale, cursor_x, mid));
        cursor_x += scaled.h_advance(id);
    }
    let left = center.x - cursor_x / 2.0;
    let outlines: Vec<OutlinedGlyph> = placed
        .into_iter()
        .filter_map(|(font, id, scale, x, mid)| {
            font.outline_glyph(id.with_scale_and_position(scale, point(left + x, center.y + mid)))
        })
        .collect();
    if outlines.is_empty() {
        return false;
    }
    composite_glyphs(img, &outlines, color, opacity, false)
}
