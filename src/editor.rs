//! Editing session for one open image.
//!
//! `Editor` owns the raster surface, its history and all interaction state
//! (active tool, in-flight gesture, crop selection, open text region). Every
//! pointer/keyboard event and every external command goes through it.
//!
//! Gesture protocol:
//!   * brush / blur draw straight into the surface and snapshot on release;
//!   * arrow / shapes / crop capture a preview copy on press and redraw from
//!     it on every move, so the live preview never accumulates;
//!   * leaving the canvas is a release at the last known point;
//!   * switching tools cancels arrow/shape/crop drags, commits brush/blur
//!     strokes, cancels a pending crop and commits an open text region.

use egui::{Pos2, Rect};
use image::RgbaImage;

use crate::canvas::{RasterSurface, client_to_raster};
use crate::components::crop::{CropPhase, CropRect, CropSelection, CropTool};
use crate::components::history::{HistoryListener, HistoryManager, HistoryStatus};
use crate::components::text_entry::{TextEdit, TextEntry, TextKey, TextMemory, TextMemoryList, TextOutcome};
use crate::components::tools::{BlurSettings, BrushSettings, StrokeSettings, Tool, ToolConfig, ToolSettings};
use crate::io::{self, ExportFormat, ImageIoError};
use crate::ops::arrow::{ArrowStyle, draw_arrow};
use crate::ops::filters::blur_dab;
use crate::ops::paint::stroke_segment;
use crate::ops::shapes::{HandJitter, ShapeKind, XorShift, draw_shape};
use crate::ops::text::{FontSet, draw_text, stamp_glyphs};
use crate::ops::transform::{self, quarter_turns};
use crate::settings::EditorSettings;
use crate::{log_info, log_warn};

/// Which pointer button an event came from. Only `Primary` draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

/// In-flight pointer gesture with the tool config captured at press time.
#[derive(Clone, Debug)]
enum Gesture {
    Brush {
        config: BrushSettings,
        last: Pos2,
    },
    Blur {
        config: BlurSettings,
        last: Pos2,
    },
    Arrow {
        stroke: StrokeSettings,
        style: ArrowStyle,
        start: Pos2,
        last: Pos2,
        preview: RgbaImage,
    },
    Shape {
        stroke: StrokeSettings,
        kind: ShapeKind,
        jitter: HandJitter,
        start: Pos2,
        last: Pos2,
        preview: RgbaImage,
    },
    Crop {
        last: Pos2,
    },
}

pub struct Editor {
    surface: Option<RasterSurface>,
    history: HistoryManager,
    settings: ToolSettings,
    tool: Tool,
    gesture: Option<Gesture>,
    crop: CropTool,
    text: TextEntry,
    memory: TextMemoryList,
    fonts: Option<FontSet>,
    font_family: String,
    rng: XorShift,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(&EditorSettings::default())
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("dimensions", &self.dimensions())
            .field("tool", &self.tool)
            .field("history", &self.history)
            .field("crop", &self.crop.phase())
            .field("editing_text", &self.text.is_editing())
            .finish()
    }
}

impl Editor {
    pub fn new(config: &EditorSettings) -> Self {
        Self {
            surface: None,
            history: HistoryManager::new(config.max_undo_steps).with_memory_limit(config.history_memory_limit()),
            settings: config.tools.clone(),
            tool: Tool::default(),
            gesture: None,
            crop: CropTool::new(config.crop_min_size),
            text: TextEntry::default(),
            memory: TextMemoryList::new(config.text_memory_slots),
            fonts: None,
            font_family: config.font_family.clone(),
            rng: XorShift::from_clock(),
        }
    }

    /// Use a fixed seed for hand-drawn shapes (reproducible output).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = XorShift::new(seed);
        self
    }

    /// Use these faces instead of looking up system fonts.
    pub fn set_fonts(&mut self, fonts: FontSet) {
        self.fonts = Some(fonts);
    }

    fn fonts(&mut self) -> &FontSet {
        let family = &self.font_family;
        self.fonts.get_or_insert_with(|| FontSet::load_system(family))
    }

    // ========================================================================
    // Image load / replace / export
    // ========================================================================

    /// Start a new session on `image`, rotated clockwise by `rotation` degrees
    /// (0/90/180/270). Previous history is discarded and a baseline is taken.
    pub fn load_image(&mut self, image: RgbaImage, rotation: i32) {
        let image = match quarter_turns(rotation) {
            Some(_) => transform::rotate_image(&image, rotation),
            None => {
                log_warn!("Ignoring load rotation of {} degrees", rotation);
                image
            }
        };
        self.gesture = None;
        self.crop.clear();
        self.text.clear();
        let surface = RasterSurface::from_image(image);
        log_info!(
            "Loaded image {}x{} (rotation {})",
            surface.width(),
            surface.height(),
            rotation
        );
        self.history.reset();
        self.history.snapshot(&surface, "Open Image");
        self.surface = Some(surface);
    }

    /// Decode an encoded blob and load it.
    pub fn load_image_bytes(&mut self, bytes: &[u8], rotation: i32) -> Result<(), ImageIoError> {
        let image = io::decode_image(bytes)?;
        self.load_image(image, rotation);
        Ok(())
    }

    /// Replace the current image with an externally transformed one
    /// (e.g. background removal). Behaves exactly like a fresh load.
    pub fn replace_image(&mut self, image: RgbaImage) {
        self.load_image(image, 0);
    }

    pub fn has_image(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&RasterSurface> {
        self.surface.as_ref()
    }

    /// Current pixels (what an export would contain).
    pub fn image(&self) -> Option<&RgbaImage> {
        self.surface.as_ref().map(|s| s.pixels())
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.surface.as_ref().map(|s| s.dimensions())
    }

    /// Encode the current pixels. Returns `None` when no image is loaded.
    pub fn export(&self, format: ExportFormat, quality: u8) -> Option<Result<Vec<u8>, ImageIoError>> {
        self.image().map(|img| io::encode_image(img, format, quality))
    }

    // ========================================================================
    // Tool + settings
    // ========================================================================

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    /// Replace all tool settings. In-flight gestures keep the config they
    /// started with; the new values apply from the next gesture.
    pub fn set_settings(&mut self, settings: ToolSettings) {
        self.settings = settings;
    }

    /// Edit a copy of the settings and push it back.
    pub fn update_settings(&mut self, f: impl FnOnce(&mut ToolSettings)) {
        let mut next = self.settings.clone();
        f(&mut next);
        self.set_settings(next);
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if tool == self.tool {
            return;
        }
        self.settle_interaction();
        self.commit_open_text();
        self.tool = tool;
    }

    /// Finish or cancel whatever is in flight so the surface matches history.
    fn settle_interaction(&mut self) {
        match self.gesture.take() {
            Some(Gesture::Brush { config, .. }) => {
                self.commit(if config.emoji.is_some() { "Emoji" } else { "Brush" })
            }
            Some(Gesture::Blur { .. }) => self.commit("Blur"),
            Some(Gesture::Arrow { preview, .. }) | Some(Gesture::Shape { preview, .. }) => {
                if let Some(surface) = &mut self.surface {
                    surface.restore(&preview);
                }
            }
            Some(Gesture::Crop { .. }) | None => {}
        }
        if let Some(surface) = &mut self.surface
            && self.crop.cancel(surface)
        {
            log_info!("Crop selection cancelled");
        }
    }

    fn commit(&mut self, description: &str) {
        if let Some(surface) = &self.surface {
            self.history.snapshot(surface, description);
        }
    }

    // ========================================================================
    // Pointer input
    // ========================================================================

    /// Convert a client-space position on the displayed canvas to raster pixels.
    /// `None` without an image or when the displayed rect has no area.
    pub fn to_raster(&self, client: Pos2, displayed: Rect) -> Option<Pos2> {
        let (w, h) = self.dimensions()?;
        client_to_raster(client, displayed, w, h)
    }

    pub fn pointer_down(&mut self, at: Pos2, button: PointerButton) {
        if button != PointerButton::Primary || self.surface.is_none() {
            return;
        }
        if self.gesture.is_some() {
            // A press without a release in between; finish the old one first.
            self.pointer_leave();
        }
        let config = self.settings.config_for(self.tool);
        if let ToolConfig::Text(_) = config {
            if let Some(previous) = self.text.open(at) {
                self.commit_text(previous);
            }
            return;
        }
        let Some(surface) = self.surface.as_mut() else { return };
        self.gesture = match config {
            ToolConfig::Brush(config) => {
                if let Some(emoji) = &config.emoji {
                    let fonts = self.fonts.get_or_insert_with(|| FontSet::load_system(&self.font_family));
                    stamp_emoji(surface, fonts, emoji, at, &config);
                }
                Some(Gesture::Brush { config, last: at })
            }
            ToolConfig::Blur(config) => {
                blur_dab(surface.pixels_mut(), at, config.size, config.intensity);
                Some(Gesture::Blur { config, last: at })
            }
            ToolConfig::Arrow { stroke, style } => Some(Gesture::Arrow {
                stroke,
                style,
                start: at,
                last: at,
                preview: surface.snapshot(),
            }),
            ToolConfig::Shapes { stroke, kind } => Some(Gesture::Shape {
                stroke,
                kind,
                jitter: HandJitter::random(&mut self.rng),
                start: at,
                last: at,
                preview: surface.snapshot(),
            }),
            ToolConfig::Crop => {
                self.crop.begin(surface, at);
                Some(Gesture::Crop { last: at })
            }
            ToolConfig::Text(_) | ToolConfig::Passive => None,
        };
    }

    pub fn pointer_move(&mut self, at: Pos2) {
        let Some(surface) = self.surface.as_mut() else { return };
        let Some(gesture) = self.gesture.as_mut() else { return };
        match gesture {
            Gesture::Brush { config, last } => {
                match &config.emoji {
                    Some(emoji) => {
                        let fonts = self.fonts.get_or_insert_with(|| FontSet::load_system(&self.font_family));
                        stamp_emoji(surface, fonts, emoji, at, config);
                    }
                    None => stroke_segment(surface.pixels_mut(), *last, at, config.size, config.color, config.alpha()),
                }
                *last = at;
            }
            Gesture::Blur { config, last } => {
                blur_dab(surface.pixels_mut(), at, config.size, config.intensity);
                *last = at;
            }
            Gesture::Arrow { stroke, style, start, last, preview } => {
                *last = at;
                surface.restore(preview);
                draw_arrow(surface.pixels_mut(), *start, at, stroke.color, stroke.width, *style);
            }
            Gesture::Shape { stroke, kind, jitter, start, last, preview } => {
                *last = at;
                surface.restore(preview);
                draw_shape(surface.pixels_mut(), *start, at, *kind, stroke.color, stroke.width, jitter);
            }
            Gesture::Crop { last } => {
                *last = at;
                self.crop.update(surface, at);
            }
        }
    }

    pub fn pointer_up(&mut self, at: Pos2) {
        self.finish_gesture(Some(at));
    }

    /// Pointer left the canvas: release at the last known point.
    pub fn pointer_leave(&mut self) {
        self.finish_gesture(None);
    }

    fn finish_gesture(&mut self, at: Option<Pos2>) {
        let Some(gesture) = self.gesture.take() else { return };
        let Some(surface) = self.surface.as_mut() else { return };
        match gesture {
            Gesture::Brush { config, .. } => {
                let description = if config.emoji.is_some() { "Emoji" } else { "Brush" };
                self.history.snapshot(surface, description);
            }
            Gesture::Blur { .. } => self.history.snapshot(surface, "Blur"),
            Gesture::Arrow { stroke, style, start, last, preview } => {
                let end = at.unwrap_or(last);
                surface.restore(&preview);
                if draw_arrow(surface.pixels_mut(), start, end, stroke.color, stroke.width, style) {
                    self.history.snapshot(surface, "Arrow");
                }
            }
            Gesture::Shape { stroke, kind, jitter, start, last, preview } => {
                let end = at.unwrap_or(last);
                surface.restore(&preview);
                if draw_shape(surface.pixels_mut(), start, end, kind, stroke.color, stroke.width, &jitter) {
                    self.history.snapshot(surface, "Shape");
                }
            }
            Gesture::Crop { last } => {
                self.crop.finish(surface, Some(at.unwrap_or(last)));
            }
        }
    }

    /// Client-space convenience wrappers.
    pub fn client_pointer_down(&mut self, client: Pos2, displayed: Rect, button: PointerButton) {
        if let Some(p) = self.to_raster(client, displayed) {
            self.pointer_down(p, button);
        }
    }

    pub fn client_pointer_move(&mut self, client: Pos2, displayed: Rect) {
        if let Some(p) = self.to_raster(client, displayed) {
            self.pointer_move(p);
        }
    }

    pub fn client_pointer_up(&mut self, client: Pos2, displayed: Rect) {
        if let Some(p) = self.to_raster(client, displayed) {
            self.pointer_up(p);
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.gesture.is_some()
    }

    // ========================================================================
    // Text
    // ========================================================================

    pub fn text_edit(&self) -> Option<&TextEdit> {
        self.text.current()
    }

    /// Append typed text to the open region.
    pub fn text_input(&mut self, s: &str) -> bool {
        self.text.insert_str(s)
    }

    /// Feed a key to the open region. Returns true if text was committed.
    pub fn text_key(&mut self, key: TextKey) -> bool {
        match self.text.key(key) {
            TextOutcome::Commit(edit) => self.commit_text(edit),
            TextOutcome::Discarded => {
                log_info!("Text entry discarded");
                false
            }
            TextOutcome::Editing | TextOutcome::Ignored => false,
        }
    }

    /// Focus left the text region: it commits.
    pub fn text_blur(&mut self) -> bool {
        match self.text.blur() {
            Some(edit) => self.commit_text(edit),
            None => false,
        }
    }

    fn commit_open_text(&mut self) {
        if let Some(edit) = self.text.blur() {
            self.commit_text(edit);
        }
    }

    fn commit_text(&mut self, edit: TextEdit) -> bool {
        if edit.is_blank() || self.surface.is_none() {
            return false;
        }
        let style = self.settings.text;
        let fonts = self.fonts().clone();
        let Some(surface) = self.surface.as_mut() else { return false };
        match fonts.face(style.weight) {
            Some((font, faux_bold)) => {
                draw_text(surface.pixels_mut(), font, &edit.text, edit.anchor, style.font_size, style.color, faux_bold);
            }
            None => log_warn!("No font available; text committed without rendering"),
        }
        self.history.snapshot(surface, "Text");
        self.memory.record(&edit.text, style);
        log_info!("Committed text ({} chars)", edit.text.chars().count());
        true
    }

    /// Recently committed texts, newest first.
    pub fn recent_texts(&self) -> Vec<TextMemory> {
        self.memory.iter().cloned().collect()
    }

    /// Reuse a remembered text: its style becomes the text style and its
    /// string prefills the next text region.
    pub fn use_recent_text(&mut self, slot: usize) -> bool {
        let Some(memory) = self.memory.get(slot).cloned() else {
            return false;
        };
        self.update_settings(|s| s.text = memory.style);
        self.text.set_prefill(memory.text);
        true
    }

    /// Set the one-shot prefill for the next text click.
    pub fn prefill_text(&mut self, text: impl Into<String>) {
        self.text.set_prefill(text);
    }

    // ========================================================================
    // Crop
    // ========================================================================

    pub fn crop_phase(&self) -> CropPhase {
        self.crop.phase()
    }

    pub fn crop_selection(&self) -> Option<&CropSelection> {
        self.crop.pending()
    }

    pub fn has_crop_selection(&self) -> bool {
        self.crop.pending().is_some()
    }

    /// Crop to the pending selection and snapshot.
    pub fn apply_crop(&mut self) -> Option<CropRect> {
        let surface = self.surface.as_mut()?;
        let rect = self.crop.apply(surface)?;
        log_info!("Cropped to {}x{} at ({}, {})", rect.width, rect.height, rect.x, rect.y);
        self.history.snapshot(surface, "Crop");
        Some(rect)
    }

    /// Drop the pending selection and restore the clean pixels. No snapshot.
    pub fn cancel_crop(&mut self) -> bool {
        let Some(surface) = self.surface.as_mut() else { return false };
        if matches!(self.gesture, Some(Gesture::Crop { .. })) {
            self.gesture = None;
        }
        self.crop.cancel(surface)
    }

    // ========================================================================
    // History
    // ========================================================================

    pub fn undo(&mut self) -> bool {
        self.settle_interaction();
        match self.surface.as_mut() {
            Some(surface) => self.history.undo(surface).is_some(),
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        self.settle_interaction();
        match self.surface.as_mut() {
            Some(surface) => self.history.redo(surface).is_some(),
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_status(&self) -> HistoryStatus {
        self.history.status()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Observe `(can_undo, can_redo)` after every history change.
    pub fn subscribe_history(&mut self, listener: HistoryListener) {
        self.history.subscribe(listener);
    }

    // ========================================================================
    // Whole-image transforms
    // ========================================================================

    fn transform_with(&mut self, description: &str, f: impl FnOnce(&RgbaImage) -> Option<RgbaImage>) -> bool {
        self.settle_interaction();
        self.commit_open_text();
        let Some(surface) = self.surface.as_mut() else { return false };
        let Some(next) = f(surface.pixels()) else { return false };
        surface.replace(next);
        self.history.snapshot(surface, description);
        true
    }

    pub fn flip_horizontal(&mut self) -> bool {
        self.transform_with("Flip Horizontal", |img| {
            let mut out = img.clone();
            transform::flip_horizontal(&mut out);
            Some(out)
        })
    }

    pub fn flip_vertical(&mut self) -> bool {
        self.transform_with("Flip Vertical", |img| {
            let mut out = img.clone();
            transform::flip_vertical(&mut out);
            Some(out)
        })
    }

    /// Rotate clockwise by a multiple of 90° (negative = counter-clockwise).
    pub fn rotate(&mut self, degrees: i32) -> bool {
        if quarter_turns(degrees).is_none_or(|q| q == 0) {
            return false;
        }
        self.transform_with(&format!("Rotate {}°", degrees), |img| Some(transform::rotate_image(img, degrees)))
    }

    /// Resample to exactly `width × height`.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        self.transform_with("Resize", |img| transform::resize_image(img, width, height))
    }

    /// Resize to the target in the resize settings (honouring keep-aspect).
    pub fn resize_to_settings(&mut self) -> bool {
        let Some(dims) = self.dimensions() else { return false };
        let (w, h) = self.settings.resize.target_for(dims);
        self.resize(w, h)
    }
}

fn stamp_emoji(surface: &mut RasterSurface, fonts: &FontSet, emoji: &str, at: Pos2, config: &BrushSettings) {
    let faces: Vec<_> = [fonts.emoji.as_ref(), fonts.regular.as_ref()].into_iter().flatten().collect();
    stamp_glyphs(surface.pixels_mut(), &faces, emoji, at, config.stamp_size(), config.color, config.alpha());
}

