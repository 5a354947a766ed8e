use crate::ops::arrow::ArrowStyle;
use crate::ops::shapes::ShapeKind;
use crate::ops::text::FontWeight;

/// The single active tool. Pointer input is routed by this value alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Brush,
    Arrow,
    Shapes,
    Blur,
    Crop,
    Text,
    /// Resize/compress panel; the canvas ignores pointer input.
    Resize,
    /// Background removal panel; the canvas ignores pointer input.
    Ai,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Brush => "brush",
            Tool::Arrow => "arrow",
            Tool::Shapes => "shapes",
            Tool::Blur => "blur",
            Tool::Crop => "crop",
            Tool::Text => "text",
            Tool::Resize => "resize",
            Tool::Ai => "ai",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "brush" | "emoji" => Some(Tool::Brush),
            "arrow" => Some(Tool::Arrow),
            "shapes" | "shape" => Some(Tool::Shapes),
            "blur" | "redact" => Some(Tool::Blur),
            "crop" => Some(Tool::Crop),
            "text" => Some(Tool::Text),
            "resize" | "compress" => Some(Tool::Resize),
            "ai" => Some(Tool::Ai),
            _ => None,
        }
    }

    pub fn all() -> &'static [Tool] {
        &[
            Tool::Brush,
            Tool::Arrow,
            Tool::Shapes,
            Tool::Blur,
            Tool::Crop,
            Tool::Text,
            Tool::Resize,
            Tool::Ai,
        ]
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Colour + width shared by the arrow and shapes tools.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeSettings {
    pub color: [u8; 4],
    pub width: f32,
}

impl Default for StrokeSettings {
    fn default() -> Self {
        Self { color: [0xef, 0x44, 0x44, 0xff], width: 3.0 }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrushSettings {
    pub size: f32,
    /// 0–100 %
    pub opacity: u8,
    pub color: [u8; 4],
    /// When set the brush stamps this glyph instead of painting a line.
    pub emoji: Option<String>,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            size: 5.0,
            opacity: 100,
            color: [0xef, 0x44, 0x44, 0xff],
            emoji: None,
        }
    }
}

impl BrushSettings {
    pub fn alpha(&self) -> f32 {
        self.opacity.min(100) as f32 / 100.0
    }

    /// Emoji stamps are drawn at four times the brush size.
    pub fn stamp_size(&self) -> f32 {
        self.size * 4.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub weight: FontWeight,
    pub color: [u8; 4],
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 24.0,
            weight: FontWeight::Normal,
            color: [0, 0, 0, 0xff],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlurSettings {
    /// Dab diameter in pixels.
    pub size: u32,
    /// Gaussian radius (sigma) in pixels.
    pub intensity: f32,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self { size: 32, intensity: 8.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResizeSettings {
    /// Export quality, 1–100.
    pub quality: u8,
    pub keep_aspect: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for ResizeSettings {
    fn default() -> Self {
        Self { quality: 75, keep_aspect: true, width: 100, height: 100 }
    }
}

impl ResizeSettings {
    /// Target size for an image of `source` dimensions. With keep-aspect the
    /// height follows the width.
    pub fn target_for(&self, source: (u32, u32)) -> (u32, u32) {
        let w = self.width.max(1);
        if self.keep_aspect && source.0 > 0 {
            let h = (w as f64 * source.1 as f64 / source.0 as f64).round().max(1.0) as u32;
            (w, h)
        } else {
            (w, self.height.max(1))
        }
    }
}

/// Every tool parameter, replaced wholesale when the UI pushes a change.
///
/// Fields shared between tools (the stroke record) persist across tool
/// switches; `config_for` projects out what one tool needs.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ToolSettings {
    pub stroke: StrokeSettings,
    pub brush: BrushSettings,
    pub text: TextStyle,
    pub arrow_style: ArrowStyle,
    pub shape: ShapeKind,
    pub blur: BlurSettings,
    pub resize: ResizeSettings,
    /// Load-time rotation in degrees (0/90/180/270).
    pub rotation: i32,
}

/// Per-tool view of the settings, captured when a gesture starts.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolConfig {
    Brush(BrushSettings),
    Arrow { stroke: StrokeSettings, style: ArrowStyle },
    Shapes { stroke: StrokeSettings, kind: ShapeKind },
    Blur(BlurSettings),
    Crop,
    Text(TextStyle),
    /// Tools that take no canvas input.
    Passive,
}

impl ToolSettings {
    pub fn config_for(&self, tool: Tool) -> ToolConfig {
        match tool {
            Tool::Brush => ToolConfig::Brush(self.brush.clone()),
            Tool::Arrow => ToolConfig::Arrow { stroke: self.stroke, style: self.arrow_style },
            Tool::Shapes => ToolConfig::Shapes { stroke: self.stroke, kind: self.shape },
            Tool::Blur => ToolConfig::Blur(self.blur),
            Tool::Crop => ToolConfig::Crop,
            Tool::Text => ToolConfig::Text(self.text),
            Tool::Resize | Tool::Ai => ToolConfig::Passive,
        }
    }
}

// ============================================================================
// COLOUR HELPERS
// ============================================================================

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Option<[u8; 4]> {
    let hex = s.trim().trim_start_matches('#');
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => {
            let mut out = [0u8, 0, 0, 255];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => None,
    }
}

/// Format as `#rrggbb`, or `#rrggbbaa` when not opaque.
pub fn to_hex_color(c: [u8; 4]) -> String {
    if c[3] == 255 {
        format!("#{:02x}{:02x}{:02x}", c[0], c[1], c[2])
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", c[0], c[1], c[2], c[3])
    }
}
