use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "review-range",
    about = "Work out which file revisions a reviewer still has to look at"
)]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides this).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a file matrix from a review history document.
    Build(BuildArgs),
    /// Print the unreviewed range of every file for a reviewer.
    Ranges(RangesArgs),
    /// Print how many files are reviewed at their latest change.
    Stats(StatsArgs),
    /// Encode or decode client file ids.
    FileId {
        #[command(subcommand)]
        action: FileIdAction,
    },
    /// Check stored patches against a file and apply the ones that still match.
    Apply(ApplyArgs),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// JSON history: revisions, per-revision file changes and reviewer marks.
    #[arg(long)]
    pub history: PathBuf,
}

#[derive(Args, Debug)]
pub struct RangesArgs {
    /// JSON file matrix (as printed by `build`).
    #[arg(short, long)]
    pub matrix: PathBuf,
    /// Reviewer to compute ranges for.
    #[arg(short, long)]
    pub reviewer: String,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// JSON file matrix (as printed by `build`).
    #[arg(short, long)]
    pub matrix: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum FileIdAction {
    /// Print the provisional id for a path pair.
    Encode {
        /// Path before the change.
        old_path: String,
        /// Path after the change. Defaults to the old path.
        new_path: Option<String>,
    },
    /// Print the parts of a client file id.
    Decode {
        /// Persistent UUID or `PROV_` id.
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// JSON array of line patches.
    #[arg(short, long)]
    pub patches: PathBuf,
    /// Text file the patches were computed against.
    #[arg(short, long)]
    pub target: PathBuf,
    /// Where to write the patched text.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
