// ============================================================================
// ThumbCraft CLI: replay session scripts headlessly and export thumbnails
// ============================================================================
//
// Usage examples:
//   thumbcraft --script promo.toml                       (writes ./thumbnail.png)
//   thumbcraft -s promo.toml --output-dir out/
//   thumbcraft -s "scripts/*.toml" --output-dir out/     (out/<stem>/thumbnail.png)
//
// Everything runs on the current thread except image decodes, which use
// the rayon pool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::script::{SessionScript, run_script};
use crate::settings::EditorSettings;
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// ThumbCraft headless thumbnail composer.
///
/// Replays session scripts (image uploads, text layers, moves, fills,
/// outlines) and exports each composition as a 2x PNG.
#[derive(Parser, Debug)]
#[command(
    name = "thumbcraft",
    about = "Compose image and text layers into PNG thumbnails",
    long_about = "Replay TOML session scripts against the layer editor and export the\n\
                  result as thumbnail.png at twice the stage resolution.\n\n\
                  Example:\n  \
                  thumbcraft --script promo.toml --output-dir out/"
)]
pub struct CliArgs {
    /// Session script(s). Glob patterns accepted (e.g. "scripts/*.toml").
    #[arg(short, long, required = true, num_args = 1..)]
    pub script: Vec<String>,

    /// Directory receiving thumbnail.png. With several scripts, each one
    /// gets a sub-directory named after the script's file stem.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Settings file. Defaults to the platform settings location.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Echo the session log to stderr and print per-script timing.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all scripts and return an OS exit code.
/// `0` = all scripts succeeded, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.script);
    if inputs.is_empty() {
        eprintln!("error: no script files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    let settings = match &args.config {
        Some(path) => match EditorSettings::load_from(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: could not load settings '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => EditorSettings::load(),
    };

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, script_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, script_path.display());
        }
        let started = Instant::now();
        let output_dir = output_dir_for(script_path, &args.output_dir, multi);

        match run_one(script_path, &output_dir, settings.clone()) {
            Ok(exports) => {
                for path in exports {
                    println!("  → {}", path.display());
                }
                if args.verbose {
                    println!("  ({:.0}ms)", started.elapsed().as_secs_f64() * 1000.0);
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                log_err!("{}: {}", script_path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-script pipeline
// ============================================================================

fn run_one(
    script_path: &Path,
    output_dir: &Path,
    settings: EditorSettings,
) -> Result<Vec<PathBuf>, String> {
    let script = SessionScript::load(script_path).map_err(|e| e.to_string())?;
    let base_dir = script_path.parent().unwrap_or(Path::new("."));
    log_info!(
        "Running {} ({} actions)",
        script_path.display(),
        script.actions.len()
    );

    let (_, report) =
        run_script(&script, base_dir, output_dir, settings).map_err(|e| e.to_string())?;
    for warning in &report.warnings {
        eprintln!("  warning: {}", warning);
    }
    Ok(report.exports)
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
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Single script: export straight into `base`. Batch: `base/<stem>/`.
fn output_dir_for(script: &Path, base: &Path, multi: bool) -> PathBuf {
    if !multi {
        return base.to_path_buf();
    }
    let stem = script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string());
    base.join(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_outputs_get_own_directory() {
        let out = Path::new("out");
        assert_eq!(output_dir_for(Path::new("a/promo.toml"), out, false), PathBuf::from("out"));
        assert_eq!(
            output_dir_for(Path::new("a/promo.toml"), out, true),
            PathBuf::from("out/promo")
        );
    }

    #[test]
    fn unmatched_pattern_yields_nothing() {
        assert!(resolve_inputs(&["/definitely/not/here/*.toml".to_string()]).is_empty());
    }

    #[test]
    fn parses_arguments() {
        let args = CliArgs::parse_from(["thumbcraft", "-s", "a.toml", "b.toml", "-o", "out", "-v"]);
        assert_eq!(args.script, vec!["a.toml", "b.toml"]);
        assert_eq!(args.output_dir, PathBuf::from("out"));
        assert!(args.verbose);
        assert!(args.config.is_none());
    }
}
