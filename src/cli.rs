// ============================================================================
// GridPaint CLI: headless batch processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   GridPaint -i sprite.gpx -o sprite.png --size 512
//   GridPaint -i *.png --grid 32 --output-dir icons/ --format ico
//   GridPaint -i art.json --macros outline.json --play outline -o art.gpx
//
// Everything runs synchronously on the current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::DEFAULT_GRID_SIZE;
use crate::io;
use crate::ops::macros::MacroRecorder;
use crate::project::Project;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// GridPaint headless converter.
#[derive(Parser, Debug)]
#[command(
    name = "GridPaint",
    about = "GridPaint headless batch exporter",
    long_about = "Load GridPaint projects (.gpx / .json) or raster images, optionally\n\
                  replay a recorded macro, and write PNG, ICO or project files\n\
                  without opening the editor.\n\n\
                  Example:\n  \
                  GridPaint -i sprite.gpx -o sprite.png --size 512\n  \
                  GridPaint -i *.png --output-dir out/ --format gpx"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.gpx", "art/*.png").
    /// Project files keep their layers; images are imported onto a fresh canvas.
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, ico, gpx, json.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// PNG export edge in pixels (16–2048).
    #[arg(long, default_value_t = io::DEFAULT_EXPORT_SIZE, value_name = "N")]
    pub size: u32,

    /// Composite onto opaque white instead of keeping transparency.
    #[arg(long)]
    pub opaque: bool,

    /// Grid size used when importing raster images (16–64).
    #[arg(long, default_value_t = DEFAULT_GRID_SIZE, value_name = "N")]
    pub grid: u32,

    /// Macro file (JSON) to load.
    #[arg(long, value_name = "FILE", requires = "play")]
    pub macros: Option<PathBuf>,

    /// Name of the macro to replay on every input.
    #[arg(long, value_name = "NAME", requires = "macros")]
    pub play: Option<String>,

    /// Print per-file timing information and echo the log to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Ico,
    Gpx,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Ico => "ico",
            OutputFormat::Gpx => "gpx",
            OutputFormat::Json => "json",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "ico" => Some(OutputFormat::Ico),
            "gpx" => Some(OutputFormat::Gpx),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
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

    let format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut recorder = MacroRecorder::new();
    if let Some(path) = &args.macros {
        let loaded = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|json| recorder.import_json(&json).map_err(|e| e.to_string()));
        if let Err(e) = loaded {
            eprintln!("error: could not read macros '{}': {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            format,
        ) else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, format, &args, &recorder) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                crate::log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    format: OutputFormat,
    args: &CliArgs,
    recorder: &MacroRecorder,
) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let mut project = if is_project_path(input) {
        Project::open(input).map_err(|e| format!("load failed: {}", e))?
    } else {
        let img = io::load_image_file(input).map_err(|e| format!("load failed: {}", e))?;
        let mut project = Project::new_untitled(1, args.grid);
        project.add_layer("Image");
        project.import_image(&img);
        project
    };

    // -- Step 2: Replay macro (optional) ---------------------------------
    if let Some(name) = &args.play {
        project.macros = recorder.clone();
        project
            .play_macro(name)
            .map_err(|e| format!("macro failed: {}", e))?;
    }

    // -- Step 3: Save ----------------------------------------------------
    match format {
        OutputFormat::Gpx | OutputFormat::Json => project
            .save_as(output)
            .map_err(|e| format!("project save failed: {}", e))?,
        OutputFormat::Png => {
            let img = project.export_png_image(!args.opaque, args.size);
            io::write_png(&img, output).map_err(|e| format!("save failed: {}", e))?;
        }
        OutputFormat::Ico => {
            let img = project.export_icon_image();
            io::write_ico(&img, output).map_err(|e| format!("save failed: {}", e))?;
        }
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn is_project_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gpx") || e.eq_ignore_ascii_case("json"))
}

/// Every input file named by `patterns`, in argument order, each listed once.
/// A pattern naming an existing file is taken literally; anything else is a
/// glob whose matches are sorted.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut inputs: Vec<PathBuf> = Vec::new();
    for path in patterns.iter().flat_map(|p| expand_pattern(p)) {
        if !inputs.contains(&path) {
            inputs.push(path);
        }
    }
    inputs
}

fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    let literal = PathBuf::from(pattern);
    if literal.is_file() {
        return vec![literal];
    }
    let entries = match glob::glob(pattern) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("warning: skipping invalid pattern '{pattern}': {e}");
            return Vec::new();
        }
    };
    let mut matched: Vec<PathBuf> = entries.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    matched.sort();
    if matched.is_empty() {
        eprintln!("warning: nothing matches '{pattern}'");
    }
    matched
}

/// Choose the output format from `--format` or the output file extension.
/// Defaults to PNG when neither is given.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<OutputFormat, String> {
    if let Some(f) = format_arg {
        return OutputFormat::from_name(f).ok_or_else(|| format!("unsupported format '{}'", f));
    }
    let ext = output
        .and_then(|o| o.extension())
        .and_then(|e| e.to_str())
        .unwrap_or("");
    Ok(OutputFormat::from_name(ext).unwrap_or(OutputFormat::Png))
}

/// Where the result for `input` is written.  `--output` wins; otherwise the
/// input's stem with the format's extension goes into `--output-dir` or next
/// to the input.  A name that would overwrite the input gets an `_out` suffix.
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: OutputFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }
    let stem = input.file_stem()?.to_string_lossy();
    let ext = format.extension();
    let dir = output_dir.unwrap_or_else(|| input.parent().unwrap_or(Path::new(".")));

    let mut path = dir.join(format!("{stem}.{ext}"));
    if path == input {
        path.set_file_name(format!("{stem}_out.{ext}"));
    }
    Some(path)
}
