use std::path::{Path, PathBuf};

use crate::components::crop::DEFAULT_MIN_CROP_SIZE;
use crate::components::history::DEFAULT_MAX_HISTORY;
use crate::components::text_entry::DEFAULT_TEXT_MEMORY_SLOTS;
use crate::components::tools::{ToolSettings, parse_hex_color, to_hex_color};
use crate::ops::arrow::ArrowStyle;
use crate::ops::shapes::ShapeKind;
use crate::ops::text::FontWeight;

/// Persistent editor preferences, stored as a `key=value` file.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Snapshots kept per image, baseline included.
    pub max_undo_steps: usize,
    /// Extra cap on snapshot memory; 0 disables it.
    pub max_history_memory_mb: usize,
    /// Crop selections must be larger than this on both axes.
    pub crop_min_size: u32,
    pub text_memory_slots: usize,
    /// Family used for the text tool ("sans-serif" picks the system default).
    pub font_family: String,
    /// Tool defaults applied when an editor is created.
    pub tools: ToolSettings,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            max_undo_steps: DEFAULT_MAX_HISTORY,
            max_history_memory_mb: 0,
            crop_min_size: DEFAULT_MIN_CROP_SIZE,
            text_memory_slots: DEFAULT_TEXT_MEMORY_SLOTS,
            font_family: "sans-serif".to_string(),
            tools: ToolSettings::default(),
        }
    }
}

impl EditorSettings {
    /// Platform settings file path (directory is created on demand).
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("photomark");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("photomark_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_default();
            let config_dir = PathBuf::from(appdata).join("PhotoMark");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("photomark_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("PhotoMark");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("photomark_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("photomark_settings.cfg")))
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to the platform path.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            crate::log_warn!("Failed to save settings to {}: {}", path.display(), e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_config_string())
    }

    pub fn to_config_string(&self) -> String {
        let t = &self.tools;
        format!(
            "max_undo_steps={}\n\
             max_history_memory_mb={}\n\
             crop_min_size={}\n\
             text_memory_slots={}\n\
             font_family={}\n\
             stroke_color={}\n\
             stroke_width={}\n\
             brush_size={}\n\
             brush_opacity={}\n\
             brush_color={}\n\
             brush_emoji={}\n\
             font_size={}\n\
             font_weight={}\n\
             text_color={}\n\
             arrow_style={}\n\
             shape={}\n\
             blur_size={}\n\
             blur_intensity={}\n\
             quality={}\n\
             keep_aspect={}\n\
             resize_width={}\n\
             resize_height={}\n\
             rotation={}\n",
            self.max_undo_steps,
            self.max_history_memory_mb,
            self.crop_min_size,
            self.text_memory_slots,
            self.font_family,
            to_hex_color(t.stroke.color),
            t.stroke.width,
            t.brush.size,
            t.brush.opacity,
            to_hex_color(t.brush.color),
            t.brush.emoji.as_deref().unwrap_or(""),
            t.text.font_size,
            t.text.weight.name(),
            to_hex_color(t.text.color),
            t.arrow_style.name(),
            t.shape.name(),
            t.blur.size,
            t.blur.intensity,
            t.resize.quality,
            t.resize.keep_aspect,
            t.resize.width,
            t.resize.height,
            t.rotation,
        )
    }

    /// Parse `key=value` lines. Unknown keys and unparsable values keep the default.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            let t = &mut s.tools;
            match key {
                "max_undo_steps" => set_parsed(&mut s.max_undo_steps, val, |v: &usize| *v >= 1),
                "max_history_memory_mb" => set_parsed(&mut s.max_history_memory_mb, val, |_| true),
                "crop_min_size" => set_parsed(&mut s.crop_min_size, val, |_| true),
                "text_memory_slots" => set_parsed(&mut s.text_memory_slots, val, |_| true),
                "font_family" if !val.is_empty() => s.font_family = val.to_string(),
                "stroke_color" => set_color(&mut t.stroke.color, val),
                "stroke_width" => set_parsed(&mut t.stroke.width, val, |v: &f32| *v > 0.0),
                "brush_size" => set_parsed(&mut t.brush.size, val, |v: &f32| *v > 0.0),
                "brush_opacity" => set_parsed(&mut t.brush.opacity, val, |v: &u8| *v <= 100),
                "brush_color" => set_color(&mut t.brush.color, val),
                "brush_emoji" => t.brush.emoji = (!val.is_empty()).then(|| val.to_string()),
                "font_size" => set_parsed(&mut t.text.font_size, val, |v: &f32| *v > 0.0),
                "font_weight" => {
                    if let Some(w) = FontWeight::from_name(val) {
                        t.text.weight = w;
                    }
                }
                "text_color" => set_color(&mut t.text.color, val),
                "arrow_style" => {
                    if let Some(a) = ArrowStyle::from_name(val) {
                        t.arrow_style = a;
                    }
                }
                "shape" => {
                    if let Some(k) = ShapeKind::from_name(val) {
                        t.shape = k;
                    }
                }
                "blur_size" => set_parsed(&mut t.blur.size, val, |v: &u32| *v > 0),
                "blur_intensity" => set_parsed(&mut t.blur.intensity, val, |v: &f32| v.is_finite() && *v >= 0.0),
                "quality" => set_parsed(&mut t.resize.quality, val, |v: &u8| (1..=100).contains(v)),
                "keep_aspect" => t.resize.keep_aspect = val == "true",
                "resize_width" => set_parsed(&mut t.resize.width, val, |v: &u32| *v > 0),
                "resize_height" => set_parsed(&mut t.resize.height, val, |v: &u32| *v > 0),
                "rotation" => set_parsed(&mut t.rotation, val, |v: &i32| v % 90 == 0),
                _ => {}
            }
        }
        s
    }

    /// History memory cap in bytes, if enabled.
    pub fn history_memory_limit(&self) -> Option<usize> {
        (self.max_history_memory_mb > 0).then(|| self.max_history_memory_mb * 1024 * 1024)
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, val: &str, valid: impl Fn(&T) -> bool) {
    if let Ok(v) = val.parse::<T>()
        && valid(&v)
    {
        *slot = v;
    }
}

fn set_color(slot: &mut [u8; 4], val: &str) {
    if let Some(c) = parse_hex_color(val) {
        *slot = c;
    }
}
