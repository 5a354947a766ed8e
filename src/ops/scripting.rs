// ============================================================================
// PhotoMark scripting: Rhai-driven editing sessions
// ============================================================================
//
// A script drives an `Editor` the same way the pointer and keyboard do: pick a
// tool, adjust its settings, press/move/release at raster coordinates, type
// text, crop, undo. Every call goes through the editor, so scripted sessions
// produce the same history and pixels as interactive ones.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use egui::Pos2;
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, Position, Scope};

use crate::components::text_entry::TextKey;
use crate::components::tools::{Tool, parse_hex_color};
use crate::editor::{Editor, PointerButton};
use crate::ops::arrow::ArrowStyle;
use crate::ops::shapes::ShapeKind;
use crate::ops::text::FontWeight;

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScriptError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ScriptError {
    fn at(message: String, pos: Position) -> Self {
        Self {
            message,
            line: pos.line().filter(|&l| l > 0),
            column: pos.position().filter(|&c| c > 0),
        }
    }

    /// Error explanation with location and a hint for the common mistakes.
    pub fn friendly_message(&self) -> String {
        let raw = &self.message;
        let cleaned = raw.split(" (line ").next().unwrap_or(raw).trim();
        let mut parts = Vec::new();

        match (self.line, self.column) {
            (Some(line), Some(col)) => parts.push(format!("Error on line {}, column {}:", line, col)),
            (Some(line), None) => parts.push(format!("Error on line {}:", line)),
            _ => parts.push("Script error:".to_string()),
        }

        if let Some(fn_desc) = raw.strip_prefix("Function not found: ") {
            let fn_desc = fn_desc.split(" (line ").next().unwrap_or(fn_desc);
            parts.push(format!("  Could not find function: {}", fn_desc.trim()));
            parts.push(String::new());
            parts.push("  Tip: check the argument count. Pointer calls take raster".to_string());
            parts.push("  coordinates, e.g. down(10, 20) or drag(0, 0, 50, 50).".to_string());
        } else if let Some(var_part) = raw.split("Variable not found:").nth(1) {
            let var_name = var_part.split('(').next().unwrap_or(var_part).trim();
            parts.push(format!("  Variable '{}' is not defined.", var_name));
            parts.push(String::new());
            parts.push("  Tip: declare it with 'let' before using it:".to_string());
            parts.push(format!("    let {} = 0;", var_name));
        } else if raw.contains("Syntax error") || raw.contains("Expected") {
            parts.push(format!("  Syntax error: {}", cleaned));
            parts.push(String::new());
            parts.push("  Tip: check for missing semicolons, brackets, or typos near this line.".to_string());
        } else if raw.contains("Too many operations") {
            parts.push("  Script exceeded the maximum operation limit.".to_string());
            parts.push(String::new());
            parts.push("  Tip: look for a loop that never ends.".to_string());
        } else if raw.contains("Script cancelled") || raw.contains("terminated") {
            parts.push("  Script was cancelled.".to_string());
        } else {
            parts.push(format!("  {}", cleaned));
        }

        parts.join("\n")
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(f, "Line {}, Col {}: {}", line, col, self.message),
            (Some(line), None) => write!(f, "Line {}: {}", line, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ScriptError {}

// ============================================================================
// Engine construction
// ============================================================================

type SharedEditor = Arc<Mutex<Editor>>;
type Console = Arc<Mutex<Vec<String>>>;
type FnResult<T> = Result<T, Box<EvalAltResult>>;

fn with_editor<R>(ctx: &SharedEditor, f: impl FnOnce(&mut Editor) -> R) -> R {
    let mut lock = ctx.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut lock)
}

/// Accept both Rhai ints and floats wherever a number is expected.
fn number(v: &Dynamic) -> FnResult<f64> {
    if let Ok(f) = v.as_float() {
        return Ok(f);
    }
    if let Ok(i) = v.as_int() {
        return Ok(i as f64);
    }
    Err(format!("Expected a number, got {}", v.type_name()).into())
}

fn point(x: &Dynamic, y: &Dynamic) -> FnResult<Pos2> {
    Ok(Pos2::new(number(x)? as f32, number(y)? as f32))
}

fn color(hex: &str) -> FnResult<[u8; 4]> {
    parse_hex_color(hex).ok_or_else(|| format!("Invalid colour '{}'", hex).into())
}

/// New sandboxed engine bound to `ctx`.
fn create_engine(ctx: SharedEditor, console: Console, cancel: Arc<AtomicBool>) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_operations(5_000_000);
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(10_000);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(1_000);

    engine.on_progress(move |_ops| {
        if cancel.load(Ordering::Relaxed) {
            Some(Dynamic::from("Script cancelled".to_string()))
        } else {
            None
        }
    });

    let c = console.clone();
    engine.on_print(move |msg| {
        c.lock().unwrap_or_else(|e| e.into_inner()).push(msg.to_string());
    });

    register_settings_api(&mut engine, ctx.clone());
    register_pointer_api(&mut engine, ctx.clone());
    register_text_api(&mut engine, ctx.clone());
    register_edit_api(&mut engine, ctx);

    engine
}

// ============================================================================
// Tool + settings API
// ============================================================================

fn register_settings_api(engine: &mut Engine, ctx: SharedEditor) {
    let c = ctx.clone();
    engine.register_fn("width", move || -> i64 {
        with_editor(&c, |ed| ed.dimensions().map_or(0, |(w, _)| w as i64))
    });

    let c = ctx.clone();
    engine.register_fn("height", move || -> i64 {
        with_editor(&c, |ed| ed.dimensions().map_or(0, |(_, h)| h as i64))
    });

    let c = ctx.clone();
    engine.register_fn("tool", move |name: ImmutableString| -> FnResult<()> {
        let tool = Tool::from_name(&name).ok_or_else(|| format!("Unknown tool '{}'", name))?;
        with_editor(&c, |ed| ed.set_tool(tool));
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("set_brush", move |size: Dynamic, opacity: Dynamic| -> FnResult<()> {
        let size = number(&size)?.max(0.5) as f32;
        let opacity = number(&opacity)?.clamp(0.0, 100.0) as u8;
        with_editor(&c, |ed| {
            ed.update_settings(|s| {
                s.brush.size = size;
                s.brush.opacity = opacity;
            })
        });
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("set_brush_color", move |hex: ImmutableString| -> FnResult<()> {
        let rgba = color(&hex)?;
        with_editor(&c, |ed| ed.update_settings(|s| s.brush.color = rgba));
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("set_emoji", move |emoji: ImmutableString| {
        let emoji = (!emoji.is_empty()).then(|| emoji.to_string());
        with_editor(&c, |ed| ed.update_settings(|s| s.brush.emoji = emoji));
    });

    let c = ctx.clone();
    engine.register_fn("clear_emoji", move || {
        with_editor(&c, |ed| ed.update_settings(|s| s.brush.emoji = None));
    });

    let c = ctx.clone();
    engine.register_fn("set_stroke", move |width: Dynamic| -> FnResult<()> {
        let width = number(&width)?.max(0.5) as f32;
        with_editor(&c, |ed| ed.update_settings(|s| s.stroke.width = width));
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("set_stroke_color", move |hex: ImmutableString| -> FnResult<()> {
        let rgba = color(&hex)?;
        with_editor(&c, |ed| ed.update_settings(|s| s.stroke.color = rgba));
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("set_arrow_style", move |name: ImmutableString| -> FnResult<()> {
        let style = ArrowStyle::from_name(&name).ok_or_else(|| format!("Unknown arrow style '{}'", name))?;
        with_editor(&c, |ed| ed.update_settings(|s| s.arrow_style = style));
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("set_shape", move |name: ImmutableString| -> FnResult<()> {
        let kind = ShapeKind::from_name(&name).ok_or_else(|| format!("Unknown shape '{}'", name))?;
        with_editor(&c, |ed| ed.update_settings(|s| s.shape = kind));
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("set_blur", move |size: Dynamic, intensity: Dynamic| -> FnResult<()> {
        let size = number(&size)?.max(1.0) as u32;
        let intensity = number(&intensity)?.max(0.0) as f32;
        with_editor(&c, |ed| {
            ed.update_settings(|s| {
                s.blur.size = size;
                s.blur.intensity = intensity;
            })
        });
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("set_font", move |size: Dynamic, bold: bool| -> FnResult<()> {
        let size = number(&size)?.max(1.0) as f32;
        let weight = if bold { FontWeight::Bold } else { FontWeight::Normal };
        with_editor(&c, |ed| {
            ed.update_settings(|s| {
                s.text.font_size = size;
                s.text.weight = weight;
            })
        });
        Ok(())
    });

    let c = ctx;
    engine.register_fn("set_text_color", move |hex: ImmutableString| -> FnResult<()> {
        let rgba = color(&hex)?;
        with_editor(&c, |ed| ed.update_settings(|s| s.text.color = rgba));
        Ok(())
    });
}

// ============================================================================
// Pointer API (raster coordinates)
// ============================================================================

fn register_pointer_api(engine: &mut Engine, ctx: SharedEditor) {
    let c = ctx.clone();
    engine.register_fn("down", move |x: Dynamic, y: Dynamic| -> FnResult<()> {
        let p = point(&x, &y)?;
        with_editor(&c, |ed| ed.pointer_down(p, PointerButton::Primary));
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("move_to", move |x: Dynamic, y: Dynamic| -> FnResult<()> {
        let p = point(&x, &y)?;
        with_editor(&c, |ed| ed.pointer_move(p));
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("up", move |x: Dynamic, y: Dynamic| -> FnResult<()> {
        let p = point(&x, &y)?;
        with_editor(&c, |ed| ed.pointer_up(p));
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("leave", move || with_editor(&c, |ed| ed.pointer_leave()));

    let c = ctx.clone();
    engine.register_fn(
        "drag",
        move |x1: Dynamic, y1: Dynamic, x2: Dynamic, y2: Dynamic| -> FnResult<()> {
            let from = point(&x1, &y1)?;
            let to = point(&x2, &y2)?;
            with_editor(&c, |ed| {
                ed.pointer_down(from, PointerButton::Primary);
                ed.pointer_move(to);
                ed.pointer_up(to);
            });
            Ok(())
        },
    );

    let c = ctx;
    engine.register_fn("click", move |x: Dynamic, y: Dynamic| -> FnResult<()> {
        let p = point(&x, &y)?;
        with_editor(&c, |ed| {
            ed.pointer_down(p, PointerButton::Primary);
            ed.pointer_up(p);
        });
        Ok(())
    });
}

// ============================================================================
// Text API
// ============================================================================

fn register_text_api(engine: &mut Engine, ctx: SharedEditor) {
    let c = ctx.clone();
    engine.register_fn("type_text", move |s: ImmutableString| -> bool {
        with_editor(&c, |ed| ed.text_input(&s))
    });

    let c = ctx.clone();
    engine.register_fn("press_enter", move || -> bool {
        with_editor(&c, |ed| ed.text_key(TextKey::Enter { shift: false }))
    });

    let c = ctx.clone();
    engine.register_fn("press_escape", move || {
        with_editor(&c, |ed| ed.text_key(TextKey::Escape));
    });

    let c = ctx;
    engine.register_fn("recall_text", move |slot: i64| -> bool {
        slot >= 0 && with_editor(&c, |ed| ed.use_recent_text(slot as usize))
    });
}

// ============================================================================
// Crop, history and transform API
// ============================================================================

fn register_edit_api(engine: &mut Engine, ctx: SharedEditor) {
    let c = ctx.clone();
    engine.register_fn("apply_crop", move || -> bool { with_editor(&c, |ed| ed.apply_crop().is_some()) });

    let c = ctx.clone();
    engine.register_fn("cancel_crop", move || -> bool { with_editor(&c, |ed| ed.cancel_crop()) });

    let c = ctx.clone();
    engine.register_fn("undo", move || -> bool { with_editor(&c, |ed| ed.undo()) });

    let c = ctx.clone();
    engine.register_fn("redo", move || -> bool { with_editor(&c, |ed| ed.redo()) });

    let c = ctx.clone();
    engine.register_fn("can_undo", move || -> bool { with_editor(&c, |ed| ed.can_undo()) });

    let c = ctx.clone();
    engine.register_fn("can_redo", move || -> bool { with_editor(&c, |ed| ed.can_redo()) });

    let c = ctx.clone();
    engine.register_fn("flip_horizontal", move || -> bool { with_editor(&c, |ed| ed.flip_horizontal()) });

    let c = ctx.clone();
    engine.register_fn("flip_vertical", move || -> bool { with_editor(&c, |ed| ed.flip_vertical()) });

    let c = ctx.clone();
    engine.register_fn("rotate", move |degrees: i64| -> FnResult<bool> {
        if degrees % 90 != 0 {
            return Err(format!("rotate() takes a multiple of 90 degrees, got {}", degrees).into());
        }
        Ok(with_editor(&c, |ed| ed.rotate(degrees as i32)))
    });

    let c = ctx;
    engine.register_fn("resize", move |w: i64, h: i64| -> FnResult<bool> {
        if w <= 0 || h <= 0 {
            return Err(format!("resize() needs a positive size, got {}x{}", w, h).into());
        }
        Ok(with_editor(&c, |ed| ed.resize(w as u32, h as u32)))
    });
}

// ============================================================================
// Public execution API
// ============================================================================

/// Check a script for syntax errors without running it.
pub fn compile_script(source: &str) -> Result<(), ScriptError> {
    Engine::new()
        .compile(source)
        .map(|_| ())
        .map_err(|e| ScriptError::at(e.to_string(), e.position()))
}

/// Run `source` against `editor` on the calling thread.
/// Returns the lines the script printed.
pub fn run_script(editor: &mut Editor, source: &str) -> Result<Vec<String>, ScriptError> {
    run_script_cancellable(editor, source, Arc::new(AtomicBool::new(false)))
}

/// Like [`run_script`], but aborts as soon as `cancel` is set.
///
/// Edits made before an error or cancellation stay applied.
pub fn run_script_cancellable(
    editor: &mut Editor,
    source: &str,
    cancel: Arc<AtomicBool>,
) -> Result<Vec<String>, ScriptError> {
    let ctx: SharedEditor = Arc::new(Mutex::new(std::mem::take(editor)));
    let console: Console = Arc::new(Mutex::new(Vec::new()));

    let result = {
        let engine = create_engine(ctx.clone(), console.clone(), cancel);
        let mut scope = Scope::new();
        engine
            .compile(source)
            .map_err(|e| ScriptError::at(e.to_string(), e.position()))
            .and_then(|ast| {
                engine
                    .run_ast_with_scope(&mut scope, &ast)
                    .map_err(|e| ScriptError::at(e.to_string(), e.position()))
            })
    };

    *editor = std::mem::take(&mut *ctx.lock().unwrap_or_else(|e| e.into_inner()));
    let lines = std::mem::take(&mut *console.lock().unwrap_or_else(|e| e.into_inner()));

    match &result {
        Ok(()) => crate::log_info!("Script finished ({} console lines)", lines.len()),
        Err(e) => crate::log_err!("Script failed: {}", e),
    }
    result.map(|()| lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn white_editor(w: u32, h: u32) -> Editor {
        let mut ed = Editor::default().with_seed(7);
        ed.load_image(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])), 0);
        ed
    }

    #[test]
    fn script_draws_through_the_editor() {
        let mut ed = white_editor(100, 100);
        let out = run_script(
            &mut ed,
            r##"
                tool("brush");
                set_brush(6, 100);
                set_brush_color("#0000ff");
                drag(10, 50, 90, 50);
                print(`w=${width()} undo=${can_undo()}`);
            "##,
        )
        .expect("script runs");
        assert_eq!(out, vec!["w=100 undo=true".to_string()]);
        let px = ed.image().expect("image").get_pixel(50, 50);
        assert!(px[2] > 200 && px[0] < 60, "stroke not painted: {:?}", px);
        assert_eq!(ed.history().len(), 2);
    }

    #[test]
    fn crop_and_undo_from_script() {
        let mut ed = white_editor(100, 80);
        run_script(
            &mut ed,
            r#"
                tool("crop");
                drag(10, 10, 60, 40);
                apply_crop();
            "#,
        )
        .expect("script runs");
        assert_eq!(ed.dimensions(), Some((50, 30)));
        run_script(&mut ed, "undo();").expect("undo runs");
        assert_eq!(ed.dimensions(), Some((100, 80)));
        assert!(ed.can_redo());
    }

    #[test]
    fn unknown_tool_reports_location() {
        let mut ed = white_editor(10, 10);
        let err = run_script(&mut ed, "let a = 1;\ntool(\"lasso\");").expect_err("must fail");
        assert!(err.message.contains("lasso"));
        // The editor survives a failed script.
        assert_eq!(ed.dimensions(), Some((10, 10)));
    }

    #[test]
    fn syntax_errors_are_caught_before_running() {
        let err = compile_script("let x = ;").expect_err("syntax error");
        assert_eq!(err.line, Some(1));
        assert!(err.friendly_message().starts_with("Error on line 1"));
    }

    #[test]
    fn cancelled_script_stops() {
        let mut ed = white_editor(10, 10);
        let cancel = Arc::new(AtomicBool::new(true));
        let err = run_script_cancellable(&mut ed, "loop { }", cancel).expect_err("cancelled");
        assert!(err.friendly_message().contains("cancelled"));
    }
}
