use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

use review_range::PathPair;
use review_range::cli::{self, ApplyArgs, Commands, FileIdAction};
use review_range::file_id::{self, ClientFileId};
use review_range::matrix::{FileMatrix, History};
use review_range::patch::{LinePatch, apply_patches};
use review_range::review::find_files_to_review;

fn main() -> Result<()> {
    let args = cli::parse_args();
    init_logging(args.verbose);

    match args.command {
        Commands::Build(args) => {
            let history: History = read_json(&args.history)?;
            let matrix = FileMatrix::from_history(&history)
                .with_context(|| format!("Failed to build matrix from {}", args.history.display()))?;
            print_json(&matrix)?;
        }
        Commands::Ranges(args) => {
            let matrix: FileMatrix = read_json(&args.matrix)?;
            handle_ranges(&matrix, &args.reviewer)?;
        }
        Commands::Stats(args) => {
            let matrix: FileMatrix = read_json(&args.matrix)?;
            let stats = matrix.statistics();
            println!("Reviewed at latest revision:   {}", stats.reviewed_at_latest);
            println!("Unreviewed at latest revision: {}", stats.unreviewed_at_latest);
        }
        Commands::FileId { action } => handle_file_id(action)?,
        Commands::Apply(args) => handle_apply(&args)?,
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve every file for the reviewer and print the ranges that succeeded.
///
/// Files that fail are reported on stderr and make the command fail after the
/// successful ranges have been printed.
fn handle_ranges(matrix: &FileMatrix, reviewer: &str) -> Result<()> {
    let mut ranges = Vec::new();
    let mut failed = 0;

    for result in find_files_to_review(matrix, reviewer) {
        match result {
            Ok(range) => ranges.push(range),
            Err(e) => {
                eprintln!("✗ {e}");
                failed += 1;
            }
        }
    }

    info!(reviewer, files = ranges.len(), failed, "resolved review ranges");
    print_json(&ranges)?;

    if failed > 0 {
        bail!("{failed} file(s) could not be resolved");
    }
    Ok(())
}

fn handle_file_id(action: FileIdAction) -> Result<()> {
    match action {
        FileIdAction::Encode { old_path, new_path } => {
            let path = match new_path {
                Some(new_path) => PathPair::new(old_path, new_path),
                None => PathPair::single(old_path),
            };
            println!("{}", file_id::write(&ClientFileId::provisional(path)));
        }
        FileIdAction::Decode { id } => match file_id::parse(&id)? {
            ClientFileId::Persistent(id) => println!("persistent {id}"),
            ClientFileId::Provisional(path) => println!("provisional {path}"),
        },
    }
    Ok(())
}

/// Apply stored patches to the target text, one `ok`/`stale` line per patch.
fn handle_apply(args: &ApplyArgs) -> Result<()> {
    let patches: Vec<LinePatch> = read_json(&args.patches)?;
    let text = fs::read_to_string(&args.target)
        .with_context(|| format!("Failed to read {}", args.target.display()))?;
    let (mut lines, trailing_newline) = split_lines(&text);

    let results = apply_patches(&patches, &mut lines);
    for (index, applied) in results.iter().enumerate() {
        println!("{index}: {}", if *applied { "ok" } else { "stale" });
    }

    if let Some(output) = &args.output {
        let mut patched = lines.join("\n");
        if trailing_newline {
            patched.push('\n');
        }
        fs::write(output, patched)
            .with_context(|| format!("Failed to write {}", output.display()))?;
    }

    let stale = results.iter().filter(|applied| !**applied).count();
    if stale > 0 {
        bail!("{stale} of {} patch(es) no longer match, re-diff required", results.len());
    }
    Ok(())
}

/// Split on `'\n'` only. A `'\r'` before the newline stays part of the line,
/// so patch context must match the file byte for byte and CRLF survives the
/// write back.
fn split_lines(text: &str) -> (Vec<String>, bool) {
    if text.is_empty() {
        return (Vec::new(), false);
    }
    let (body, trailing_newline) = match text.strip_suffix('\n') {
        Some(body) => (body, true),
        None => (text, false),
    };
    (body.split('\n').map(str::to_owned).collect(), trailing_newline)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
