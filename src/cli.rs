// ============================================================================
// PhotoMark CLI: headless annotation via command-line arguments
// ============================================================================
//
// Usage examples:
//   photomark --input shot.png --script callouts.rhai --output annotated.png
//   photomark -i photo.jpg --rotate 90 -o upright.jpg --quality 85
//   photomark -i "shots/*.png" --script redact.rhai --output-dir out/ --format webp
//   photomark -i diagram.png --script arrows.rhai --copy
//
// Each input is loaded into a fresh editor session, the script (if any) drives
// the editor exactly like pointer/keyboard input would, and the final pixels
// are exported.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::editor::Editor;
use crate::io::{ExportFormat, encode_and_write, load_image_file};
use crate::ops::scripting::{compile_script, run_script};
use crate::settings::EditorSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PhotoMark headless annotator.
#[derive(Parser, Debug)]
#[command(
    name = "photomark",
    about = "PhotoMark headless photo annotator",
    long_about = "Annotate images with Rhai scripts (brush, arrows, shapes, blur,\n\
                  crop, text) and export them without opening an editor window.\n\n\
                  Example:\n  \
                  photomark --input shot.png --script callouts.rhai --output out.png\n  \
                  photomark -i *.jpg --script redact.rhai --output-dir out/ --format png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Rhai script that drives the editor for each input.
    /// If omitted, images are only loaded (and rotated) and re-exported.
    #[arg(short, long, value_name = "SCRIPT.rhai")]
    pub script: Option<PathBuf>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing (original stem, new extension).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, webp (lossless).
    /// When omitted it is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Rotate each image clockwise on load: 0, 90, 180 or 270.
    /// Defaults to the `rotation` entry of the settings file.
    #[arg(long, value_name = "DEGREES", allow_negative_numbers = true)]
    pub rotate: Option<i32>,

    /// Also copy the last result to the system clipboard.
    #[arg(long)]
    pub copy: bool,

    /// Print script console output and per-file timing; mirror the log to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// Success only when every file succeeded.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let settings = EditorSettings::load();
    let rotation = load_rotation(args.rotate, &settings);
    if rotation % 90 != 0 {
        eprintln!("error: --rotate must be a multiple of 90, got {}.", rotation);
        return ExitCode::FAILURE;
    }

    let format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let script_source = match &args.script {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(src) => Some(src),
            Err(e) => {
                eprintln!("error: could not read script '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    // Fail fast on syntax errors instead of once per file.
    if let Some(src) = &script_source
        && let Err(e) = compile_script(src)
    {
        eprintln!("error: {}", e.friendly_message());
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;
    let mut last_result = None;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref(), format)
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        let job = Job {
            input: input_path,
            output: &output_path,
            script: script_source.as_deref(),
            format,
            quality: args.quality,
            rotation,
            verbose: args.verbose,
        };
        match run_one(&job, &settings) {
            Ok(editor) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
                last_result = Some(editor);
            }
            Err(e) => {
                crate::log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if args.copy
        && let Some(img) = last_result.as_ref().and_then(|ed| ed.image())
        && let Err(e) = crate::io::copy_to_system_clipboard(img)
    {
        eprintln!("warning: {}", e);
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

struct Job<'a> {
    input: &'a Path,
    output: &'a Path,
    script: Option<&'a str>,
    format: ExportFormat,
    quality: u8,
    rotation: i32,
    verbose: bool,
}

fn run_one(job: &Job<'_>, settings: &EditorSettings) -> Result<Editor, String> {
    let image = load_image_file(job.input).map_err(|e| format!("load failed: {}", e))?;
    let mut editor = Editor::new(settings);
    editor.load_image(image, job.rotation);

    if let Some(src) = job.script {
        let console = run_script(&mut editor, src).map_err(|e| format!("script error: {}", e.friendly_message()))?;
        if job.verbose {
            for line in &console {
                println!("  [script] {}", line);
            }
        }
    }

    let image = editor.image().ok_or_else(|| "no image to export".to_string())?;
    encode_and_write(image, job.output, job.format, job.quality).map_err(|e| format!("save failed: {}", e))?;
    Ok(editor)
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);
        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => eprintln!("warning: invalid glob '{}': {}", pattern, e),
        }
    }

    result
}

/// `--rotate` wins over the saved load rotation.
fn load_rotation(arg: Option<i32>, settings: &EditorSettings) -> i32 {
    arg.unwrap_or(settings.tools.rotation)
}

/// `--format` wins; otherwise the output extension; otherwise PNG.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<ExportFormat, String> {
    if let Some(f) = format_arg {
        return ExportFormat::from_name(f).ok_or_else(|| format!("unknown output format '{}'", f));
    }
    Ok(output.and_then(ExportFormat::from_path).unwrap_or_default())
}

/// Output path for one input.
///
/// Priority: `--output`, then `--output-dir/<stem>.<ext>`, then a sibling of
/// the input (`<stem>_out.<ext>` if that would overwrite the input).
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>, format: ExportFormat) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));
    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_resolution_order() {
        assert_eq!(parse_format(Some("jpg"), Some(Path::new("a.png"))), Ok(ExportFormat::Jpeg));
        assert_eq!(parse_format(None, Some(Path::new("a.webp"))), Ok(ExportFormat::Webp));
        assert_eq!(parse_format(None, None), Ok(ExportFormat::Png));
        assert!(parse_format(Some("gif"), None).is_err());
    }

    #[test]
    fn output_path_never_overwrites_input() {
        let input = Path::new("shots/photo.png");
        assert_eq!(
            build_output_path(input, None, None, ExportFormat::Png),
            Some(PathBuf::from("shots/photo_out.png"))
        );
        assert_eq!(
            build_output_path(input, None, None, ExportFormat::Jpeg),
            Some(PathBuf::from("shots/photo.jpg"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), ExportFormat::Webp),
            Some(PathBuf::from("out/photo.webp"))
        );
    }

    #[test]
    fn args_parse() {
        let args = CliArgs::try_parse_from(["photomark", "-i", "a.png", "--rotate", "-90", "--copy"]).expect("parse");
        assert_eq!(args.input, vec!["a.png".to_string()]);
        assert_eq!(args.rotate, Some(-90));
        assert!(args.copy);
        assert_eq!(args.quality, 90);
    }

    #[test]
    fn saved_rotation_applies_without_flag() {
        let settings = EditorSettings::parse("rotation=270\n");
        assert_eq!(load_rotation(None, &settings), 270);
        assert_eq!(load_rotation(Some(90), &settings), 90);
        let args = CliArgs::try_parse_from(["photomark", "-i", "a.png"]).expect("parse");
        assert_eq!(load_rotation(args.rotate, &EditorSettings::default()), 0);
    }

    #[test]
    fn single_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        image::RgbaImage::from_pixel(40, 30, image::Rgba([255, 255, 255, 255]))
            .save(&input)
            .expect("write input");
        let job = Job {
            input: &input,
            output: &output,
            script: Some("tool(\"crop\"); drag(0, 0, 20, 15); apply_crop();"),
            format: ExportFormat::Png,
            quality: 90,
            rotation: 90,
            verbose: false,
        };
        let editor = run_one(&job, &EditorSettings::default()).expect("run");
        assert_eq!(editor.dimensions(), Some((20, 15)));
        assert_eq!(load_image_file(&output).expect("read").dimensions(), (20, 15));
    }
}
