//! Editing-session scenarios driven through the public `Editor` API.

use std::sync::{Arc, Mutex};

use egui::{Pos2, Rect};
use image::{Rgba, RgbaImage};

use photomark::components::crop::{CropPhase, CropRect};
use photomark::components::history::HistoryStatus;
use photomark::components::text_entry::TextKey;
use photomark::components::tools::Tool;
use photomark::io::ExportFormat;
use photomark::io::encode_image;
use photomark::ops::text::{FontSet, FontWeight};
use photomark::{Editor, PointerButton};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn editor_with(img: RgbaImage) -> Editor {
    let mut ed = Editor::default().with_seed(42);
    ed.set_fonts(FontSet::default());
    ed.load_image(img, 0);
    ed
}

fn white(w: u32, h: u32) -> Editor {
    editor_with(RgbaImage::from_pixel(w, h, WHITE))
}

fn gradient(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 255 / w) as u8, (y * 255 / h) as u8, 128, 255]))
}

fn pixels(ed: &Editor) -> RgbaImage {
    ed.image().cloned().expect("image loaded")
}

/// Installed sans-serif faces, or `None` (and the test is skipped) without one.
fn system_fonts() -> Option<FontSet> {
    let fonts = FontSet::load_system("sans-serif");
    if fonts.regular.is_none() {
        eprintln!("no system sans-serif font; skipping glyph rendering checks");
        return None;
    }
    Some(fonts)
}

/// Contiguous runs `(first, last)` of rows holding any non-white pixel.
fn ink_row_runs(img: &RgbaImage) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for y in 0..img.height() {
        if !(0..img.width()).any(|x| *img.get_pixel(x, y) != WHITE) {
            continue;
        }
        match runs.last_mut() {
            Some((_, last)) if *last + 1 == y => *last = y,
            _ => runs.push((y, y)),
        }
    }
    runs
}

fn ink_count(img: &RgbaImage) -> usize {
    img.pixels().filter(|p| **p != WHITE).count()
}

fn type_text(ed: &mut Editor, at: (f32, f32), lines: &[&str]) -> bool {
    ed.set_tool(Tool::Text);
    ed.pointer_down(Pos2::new(at.0, at.1), PointerButton::Primary);
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            ed.text_key(TextKey::Enter { shift: true });
        }
        ed.text_input(line);
    }
    ed.text_key(TextKey::Enter { shift: false })
}

fn drag(ed: &mut Editor, from: (f32, f32), to: (f32, f32)) {
    ed.pointer_down(Pos2::new(from.0, from.1), PointerButton::Primary);
    ed.pointer_move(Pos2::new(to.0, to.1));
    ed.pointer_up(Pos2::new(to.0, to.1));
}

#[test]
fn brush_stroke_paints_and_snapshots_once() {
    let mut ed = white(100, 100);
    ed.update_settings(|s| s.brush.size = 5.0);
    drag(&mut ed, (10.0, 10.0), (90.0, 10.0));

    assert_eq!(ed.history().len(), 2);
    let img = pixels(&ed);
    for x in 10..=90 {
        assert_ne!(*img.get_pixel(x, 10), WHITE, "x = {x} not painted");
    }
    assert_eq!(*img.get_pixel(50, 30), WHITE);
    assert_eq!(ed.history().descriptions()[0], "Brush");
}

#[test]
fn arrow_preview_does_not_accumulate() {
    let mut ed = white(100, 100);
    ed.set_tool(Tool::Arrow);
    ed.pointer_down(Pos2::new(10.0, 50.0), PointerButton::Primary);
    ed.pointer_move(Pos2::new(90.0, 50.0));
    ed.pointer_move(Pos2::new(50.0, 90.0));
    assert_eq!(ed.history().len(), 1, "moves never snapshot");
    ed.pointer_up(Pos2::new(50.0, 90.0));

    let img = pixels(&ed);
    assert_eq!(*img.get_pixel(85, 50), WHITE, "first preview was left behind");
    assert_ne!(*img.get_pixel(30, 70), WHITE);
    assert_eq!(ed.history().len(), 2);
}

#[test]
fn degenerate_shape_is_discarded() {
    let mut ed = white(50, 50);
    let before = pixels(&ed);
    ed.set_tool(Tool::Shapes);
    drag(&mut ed, (20.0, 20.0), (20.0, 20.0));
    assert_eq!(pixels(&ed), before);
    assert_eq!(ed.history().len(), 1);
}

#[test]
fn blur_passes_compound() {
    let img = RgbaImage::from_fn(64, 64, |x, _| if x < 32 { Rgba([0, 0, 0, 255]) } else { WHITE });
    let mut once = editor_with(img.clone());
    let mut twice = editor_with(img);
    for ed in [&mut once, &mut twice] {
        ed.set_tool(Tool::Blur);
        ed.update_settings(|s| {
            s.blur.size = 24;
            s.blur.intensity = 8.0;
        });
    }
    once.pointer_down(Pos2::new(32.0, 32.0), PointerButton::Primary);
    once.pointer_up(Pos2::new(32.0, 32.0));
    twice.pointer_down(Pos2::new(32.0, 32.0), PointerButton::Primary);
    twice.pointer_move(Pos2::new(32.0, 32.0));
    twice.pointer_up(Pos2::new(32.0, 32.0));

    let (a, b) = (pixels(&once), pixels(&twice));
    assert_ne!(a, b);
    assert_ne!(a.get_pixel(30, 32)[0], 0, "edge was not softened");
    // Outside the dab circle nothing changes.
    assert_eq!(a.get_pixel(2, 2)[0], 0);
    assert_eq!(once.history().len(), 2);
    assert_eq!(twice.history().len(), 2);
}

#[test]
fn huge_blur_intensity_still_finishes() {
    let img = RgbaImage::from_fn(64, 64, |x, _| if x < 32 { Rgba([0, 0, 0, 255]) } else { WHITE });
    let mut ed = editor_with(img.clone());
    ed.set_tool(Tool::Blur);
    ed.update_settings(|s| {
        s.blur.size = 16;
        s.blur.intensity = 1e20;
    });
    ed.pointer_down(Pos2::new(32.0, 32.0), PointerButton::Primary);
    ed.pointer_move(Pos2::new(34.0, 32.0));
    ed.pointer_up(Pos2::new(34.0, 32.0));
    assert_ne!(pixels(&ed), img);
    assert_eq!(ed.history().len(), 2);
}

#[test]
fn crop_apply_is_deterministic() {
    let original = gradient(120, 90);
    let mut a = editor_with(original.clone());
    let mut b = editor_with(original.clone());
    for ed in [&mut a, &mut b] {
        ed.set_tool(Tool::Crop);
        drag(ed, (60.0, 70.0), (10.0, 20.0));
        assert!(ed.has_crop_selection());
        assert_eq!(
            ed.crop_selection().map(|s| s.rect),
            Some(CropRect { x: 10, y: 20, width: 50, height: 50 })
        );
        assert_eq!(ed.history().len(), 1, "a pending crop takes no snapshot");
        assert_eq!(ed.apply_crop(), Some(CropRect { x: 10, y: 20, width: 50, height: 50 }));
    }
    let expected = image::imageops::crop_imm(&original, 10, 20, 50, 50).to_image();
    assert_eq!(pixels(&a), expected);
    assert_eq!(pixels(&a), pixels(&b));
    assert_eq!(a.history().len(), 2);

    assert!(a.undo());
    assert_eq!(pixels(&a), original);
}

#[test]
fn crop_cancel_restores_clean_pixels() {
    let original = gradient(80, 60);
    let mut ed = editor_with(original.clone());
    ed.set_tool(Tool::Crop);
    drag(&mut ed, (5.0, 5.0), (50.0, 40.0));
    assert_ne!(pixels(&ed), original, "overlay is visible while pending");
    assert!(ed.cancel_crop());
    assert_eq!(pixels(&ed), original);
    assert_eq!(ed.crop_phase(), CropPhase::Idle);
    assert_eq!(ed.history().len(), 1);
}

#[test]
fn tiny_crop_is_dropped() {
    let original = gradient(80, 60);
    let mut ed = editor_with(original.clone());
    ed.set_tool(Tool::Crop);
    drag(&mut ed, (5.0, 5.0), (12.0, 40.0));
    assert!(!ed.has_crop_selection());
    assert_eq!(pixels(&ed), original);
    assert_eq!(ed.apply_crop(), None);
}

#[test]
fn new_edit_after_undo_drops_redo() {
    let mut ed = white(60, 60);
    drag(&mut ed, (5.0, 5.0), (50.0, 5.0));
    drag(&mut ed, (5.0, 30.0), (50.0, 30.0));
    assert!(ed.undo());
    assert!(ed.can_redo());
    drag(&mut ed, (5.0, 50.0), (50.0, 50.0));
    assert!(!ed.can_redo());
    assert_eq!(ed.history().len(), 3);
    assert_eq!(ed.image().map(|i| *i.get_pixel(30, 30)), Some(WHITE));
}

#[test]
fn tool_switch_cancels_previews_and_commits_strokes() {
    let mut ed = white(60, 60);
    let clean = pixels(&ed);
    ed.set_tool(Tool::Arrow);
    ed.pointer_down(Pos2::new(5.0, 5.0), PointerButton::Primary);
    ed.pointer_move(Pos2::new(50.0, 50.0));
    ed.set_tool(Tool::Brush);
    assert_eq!(pixels(&ed), clean);
    assert!(!ed.is_drawing());
    assert_eq!(ed.history().len(), 1);

    ed.pointer_down(Pos2::new(5.0, 30.0), PointerButton::Primary);
    ed.pointer_move(Pos2::new(50.0, 30.0));
    ed.set_tool(Tool::Shapes);
    assert_eq!(ed.history().len(), 2);
    assert_ne!(pixels(&ed), clean);
}

#[test]
fn leaving_the_canvas_finishes_the_shape() {
    let mut ed = white(80, 80);
    ed.set_tool(Tool::Shapes);
    ed.pointer_down(Pos2::new(10.0, 10.0), PointerButton::Primary);
    ed.pointer_move(Pos2::new(60.0, 60.0));
    ed.pointer_leave();
    assert!(!ed.is_drawing());
    assert_eq!(ed.history().len(), 2);
    // Later moves do nothing.
    let after = pixels(&ed);
    ed.pointer_move(Pos2::new(5.0, 70.0));
    assert_eq!(pixels(&ed), after);
}

#[test]
fn only_primary_button_draws() {
    let mut ed = white(40, 40);
    ed.pointer_down(Pos2::new(5.0, 5.0), PointerButton::Secondary);
    ed.pointer_move(Pos2::new(35.0, 5.0));
    ed.pointer_up(Pos2::new(35.0, 5.0));
    assert_eq!(ed.history().len(), 1);
    assert_eq!(ed.image().map(|i| *i.get_pixel(20, 5)), Some(WHITE));
}

#[test]
fn without_an_image_everything_is_a_no_op() {
    let mut ed = Editor::default();
    ed.pointer_down(Pos2::new(1.0, 1.0), PointerButton::Primary);
    ed.pointer_move(Pos2::new(5.0, 5.0));
    ed.pointer_up(Pos2::new(5.0, 5.0));
    assert!(!ed.undo());
    assert!(!ed.redo());
    assert!(!ed.flip_horizontal());
    assert_eq!(ed.apply_crop(), None);
    assert!(ed.export(ExportFormat::Png, 90).is_none());
    assert!(ed.history().is_empty());
}

#[test]
fn text_commit_without_fonts_still_records_history() {
    let mut ed = white(120, 60);
    let clean = pixels(&ed);
    ed.set_tool(Tool::Text);
    ed.pointer_down(Pos2::new(10.0, 10.0), PointerButton::Primary);
    assert!(ed.text_input("Hello"));
    assert!(ed.text_key(TextKey::Enter { shift: false }));
    assert_eq!(ed.history().len(), 2);
    assert_eq!(ed.history().descriptions()[0], "Text");
    let recent = ed.recent_texts();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].text, "Hello");

    assert!(ed.undo());
    assert_eq!(pixels(&ed), clean);
    assert!(ed.can_redo());
}

#[test]
fn committed_text_draws_glyphs_and_undo_restores_bytes() {
    let Some(fonts) = system_fonts() else { return };
    let mut ed = white(240, 100);
    ed.set_fonts(fonts);
    ed.update_settings(|s| s.text.font_size = 24.0);
    let clean = pixels(&ed);

    assert!(type_text(&mut ed, (10.0, 10.0), &["Hello"]));
    let drawn = pixels(&ed);
    assert_ne!(drawn, clean);
    let runs = ink_row_runs(&drawn);
    assert_eq!(runs.len(), 1, "one line of ink: {runs:?}");
    // Anchored at the top: ink starts below y = 10 and within one em of it.
    assert!(runs[0].0 >= 10 && runs[0].0 < 10 + 24, "{runs:?}");

    assert!(ed.undo());
    assert_eq!(pixels(&ed).as_raw(), clean.as_raw());
}

#[test]
fn second_line_starts_one_line_height_lower() {
    let Some(fonts) = system_fonts() else { return };
    let mut ed = white(200, 160);
    ed.set_fonts(fonts);
    ed.update_settings(|s| s.text.font_size = 30.0);
    assert!(type_text(&mut ed, (10.0, 10.0), &["H", "H"]));

    let runs = ink_row_runs(&pixels(&ed));
    assert_eq!(runs.len(), 2, "two separate lines: {runs:?}");
    let advance = runs[1].0 as i64 - runs[0].0 as i64;
    assert!((advance - 36).abs() <= 1, "line advance {advance}, expected 1.2 × 30");
}

#[test]
fn bold_without_a_bold_face_is_thicker() {
    let Some(regular) = system_fonts().and_then(|f| f.regular) else { return };
    let mut normal = white(240, 60);
    let mut bold = white(240, 60);
    for (ed, weight) in [(&mut normal, FontWeight::Normal), (&mut bold, FontWeight::Bold)] {
        ed.set_fonts(FontSet::from_regular(regular.clone()));
        ed.update_settings(|s| {
            s.text.font_size = 24.0;
            s.text.weight = weight;
        });
        assert!(type_text(ed, (10.0, 10.0), &["Hello"]));
    }
    assert!(ink_count(&pixels(&bold)) > ink_count(&pixels(&normal)));
}

#[test]
fn emoji_brush_stamps_glyphs() {
    let Some(fonts) = system_fonts() else { return };
    let mut ed = white(120, 120);
    ed.set_fonts(fonts);
    let clean = pixels(&ed);
    ed.update_settings(|s| {
        s.brush.emoji = Some("A".to_string());
        s.brush.size = 10.0;
    });
    ed.pointer_down(Pos2::new(60.0, 60.0), PointerButton::Primary);
    ed.pointer_up(Pos2::new(60.0, 60.0));

    let stamped = pixels(&ed);
    assert_ne!(stamped, clean);
    // A 40 px glyph centred on the press point.
    assert_eq!(*stamped.get_pixel(5, 5), WHITE);
    assert!(ink_row_runs(&stamped).iter().all(|&(top, bottom)| top >= 30 && bottom <= 90));
    assert_eq!(ed.history().descriptions()[0], "Emoji");
    assert!(ed.undo());
    assert_eq!(pixels(&ed).as_raw(), clean.as_raw());
}

#[test]
fn prefilled_text_opens_with_the_next_click() {
    let mut ed = white(60, 60);
    ed.prefill_text("Note");
    ed.set_tool(Tool::Text);
    ed.pointer_down(Pos2::new(5.0, 5.0), PointerButton::Primary);
    assert_eq!(ed.text_edit().map(|e| e.text.as_str()), Some("Note"));
}

#[test]
fn escape_and_blank_text_take_no_snapshot() {
    let mut ed = white(60, 60);
    ed.set_tool(Tool::Text);
    ed.pointer_down(Pos2::new(5.0, 5.0), PointerButton::Primary);
    ed.text_input("draft");
    assert!(!ed.text_key(TextKey::Escape));
    ed.pointer_down(Pos2::new(5.0, 5.0), PointerButton::Primary);
    ed.text_input("   ");
    assert!(!ed.text_blur());
    assert_eq!(ed.history().len(), 1);
    assert!(ed.recent_texts().is_empty());
}

#[test]
fn recent_text_prefills_next_click() {
    let mut ed = white(60, 60);
    ed.set_tool(Tool::Text);
    ed.update_settings(|s| s.text.font_size = 40.0);
    ed.pointer_down(Pos2::new(5.0, 5.0), PointerButton::Primary);
    ed.text_input("Sold");
    ed.text_blur();
    ed.update_settings(|s| s.text.font_size = 12.0);

    assert!(ed.use_recent_text(0));
    assert_eq!(ed.settings().text.font_size, 40.0);
    ed.pointer_down(Pos2::new(20.0, 20.0), PointerButton::Primary);
    assert_eq!(ed.text_edit().map(|e| e.text.as_str()), Some("Sold"));
    assert!(!ed.use_recent_text(5));
}

#[test]
fn clicking_elsewhere_commits_the_open_text() {
    let mut ed = white(60, 60);
    ed.set_tool(Tool::Text);
    ed.pointer_down(Pos2::new(5.0, 5.0), PointerButton::Primary);
    ed.text_input("one");
    ed.pointer_down(Pos2::new(30.0, 30.0), PointerButton::Primary);
    assert_eq!(ed.history().len(), 2);
    assert!(ed.text_edit().is_some_and(|e| e.text.is_empty()));
}

#[test]
fn load_rotation_swaps_dimensions() {
    let mut ed = Editor::default();
    ed.load_image(gradient(40, 20), 90);
    assert_eq!(ed.dimensions(), Some((20, 40)));
    assert!(!ed.can_undo());
    assert!(!ed.can_redo());
}

#[test]
fn encoded_bytes_load_with_rotation() {
    let bytes = encode_image(&gradient(40, 20), ExportFormat::Png, 90).expect("encode");
    let mut ed = Editor::default();
    assert!(!ed.has_image());
    ed.load_image_bytes(&bytes, 270).expect("decode");
    assert!(ed.has_image());
    assert_eq!(ed.dimensions(), Some((20, 40)));
    let status = ed.history_status();
    assert!(!status.can_undo && !status.can_redo);

    assert!(ed.load_image_bytes(b"not an image", 0).is_err());
    assert_eq!(ed.dimensions(), Some((20, 40)));
}

#[test]
fn replacing_the_image_resets_history() {
    let mut ed = white(50, 50);
    drag(&mut ed, (5.0, 5.0), (40.0, 5.0));
    assert!(ed.can_undo());
    ed.replace_image(gradient(30, 30));
    assert!(!ed.can_undo());
    assert_eq!(ed.history().len(), 1);
    assert_eq!(ed.dimensions(), Some((30, 30)));
}

#[test]
fn history_listener_sees_every_change() {
    let mut ed = white(30, 30);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    ed.subscribe_history(Box::new(move |s: HistoryStatus| {
        if let Ok(mut v) = sink.lock() {
            v.push((s.can_undo, s.can_redo));
        }
    }));
    drag(&mut ed, (2.0, 2.0), (25.0, 2.0));
    ed.undo();
    ed.redo();
    let seen = seen.lock().map(|v| v.clone()).unwrap_or_default();
    assert_eq!(seen, vec![(true, false), (false, true), (true, false)]);
}

#[test]
fn transforms_snapshot_and_undo() {
    let original = gradient(40, 20);
    let mut ed = editor_with(original.clone());
    assert!(ed.rotate(90));
    assert_eq!(ed.dimensions(), Some((20, 40)));
    assert!(ed.flip_horizontal());
    assert!(ed.resize(10, 10));
    assert_eq!(ed.history().len(), 4);
    assert!(!ed.rotate(45));
    ed.undo();
    ed.undo();
    ed.undo();
    assert_eq!(pixels(&ed), original);
}

#[test]
fn resize_to_settings_keeps_aspect() {
    let mut ed = editor_with(gradient(40, 20));
    ed.update_settings(|s| {
        s.resize.width = 20;
        s.resize.keep_aspect = true;
    });
    assert!(ed.resize_to_settings());
    assert_eq!(ed.dimensions(), Some((20, 10)));
}

#[test]
fn client_coordinates_map_through_display_scale() {
    let mut ed = white(100, 50);
    let displayed = Rect::from_min_size(Pos2::new(20.0, 10.0), egui::vec2(200.0, 100.0));
    assert_eq!(ed.to_raster(Pos2::new(120.0, 60.0), displayed), Some(Pos2::new(50.0, 25.0)));
    ed.client_pointer_down(Pos2::new(40.0, 60.0), displayed, PointerButton::Primary);
    ed.client_pointer_move(Pos2::new(200.0, 60.0), displayed);
    ed.client_pointer_up(Pos2::new(200.0, 60.0), displayed);
    assert_ne!(ed.image().map(|i| *i.get_pixel(50, 25)), Some(WHITE));
}

#[test]
fn collapsed_display_rect_ignores_the_pointer() {
    let mut ed = white(40, 40);
    let flat = Rect::from_min_size(Pos2::new(10.0, 10.0), egui::vec2(0.0, 0.0));
    assert_eq!(ed.to_raster(Pos2::new(10.0, 10.0), flat), None);
    ed.client_pointer_down(Pos2::new(10.0, 10.0), flat, PointerButton::Primary);
    ed.client_pointer_move(Pos2::new(30.0, 10.0), flat);
    ed.client_pointer_up(Pos2::new(30.0, 10.0), flat);
    assert!(!ed.is_drawing());
    assert_eq!(ed.history().len(), 1);
    assert_eq!(ed.image().map(|i| *i.get_pixel(0, 0)), Some(WHITE));
}
