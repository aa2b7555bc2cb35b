use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Documents root used for default export/extract locations.
    #[arg(long, default_value = ".", global = true)]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Package a whole session directory into one timestamped zip archive.
    #[command(alias = "p")]
    Pack {
        /// The session directory to package. Defaults to HSC-SESSIONS under the root.
        source: Option<PathBuf>,

        /// Directory where the archive is written. Defaults to the root.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print bytes-written progress to stderr while packing.
        #[arg(long)]
        progress: bool,
    },

    /// Package an explicit list of files described by a JSON manifest.
    #[command(alias = "m")]
    PackManifest {
        /// JSON file holding an array of { absolutePath, originalName } entries.
        #[arg(required = true)]
        manifest: PathBuf,

        /// Directory where the archive is written. Defaults to the root.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print bytes-written progress to stderr while packing.
        #[arg(long)]
        progress: bool,
    },

    /// Extract an archive recursively and group shapefile components.
    #[command(alias = "x")]
    Extract {
        /// The zip archive to extract.
        #[arg(required = true)]
        archive: PathBuf,

        /// Destination directory. Defaults to HSC-SESSIONS/FILES under the root.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Nested-archive recursion bound.
        #[arg(long, default_value_t = 10)]
        max_depth: usize,
    },
}

/// Parses command-line arguments using `clap`.
///
/// This is the main entry point for the CLI logic. It handles parsing and
/// returns the parsed `Args`, or an error if parsing fails.
pub fn run() -> Result<Args, Box<dyn std::error::Error>> {
    Ok(Args::parse())
}
