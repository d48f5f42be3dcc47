use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::checksum::ChecksumAlgorithm;
use crate::formats::Format;
use crate::options::OverwritePolicy;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Create a new archive from specified files and directories.
    #[command(alias = "c")]
    Create {
        /// One or more input files or directories to add to the archive.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// The path for the output archive file (e.g. backup.tar.gz).
        #[arg(short, long)]
        output: PathBuf,

        /// Archive format. Derived from the output suffix when omitted.
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Compression level (1-9). Ignored for uncompressed tar.
        #[arg(long, default_value_t = 6)]
        level: u32,

        /// Digest algorithm embedded per file where the format supports it.
        #[arg(long, value_enum, default_value_t = ChecksumAlgorithm::Sha256)]
        checksum: ChecksumAlgorithm,

        /// Archive the targets of symlinks instead of skipping them.
        #[arg(long)]
        follow_symlinks: bool,

        /// Glob pattern an entry must match to be included. Repeatable.
        #[arg(long = "include")]
        include_patterns: Vec<String>,

        /// Glob pattern that excludes matching entries. Repeatable.
        #[arg(long = "exclude")]
        exclude_patterns: Vec<String>,
    },

    /// Extract files from an archive.
    #[command(alias = "x")]
    Extract {
        /// The archive file to extract.
        #[arg(required = true)]
        archive: PathBuf,

        /// The directory where files will be extracted. Defaults to the current directory.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// What to do when a destination file already exists.
        #[arg(long, value_enum, default_value_t = OverwritePolicy::Error)]
        overwrite: OverwritePolicy,

        /// Ceiling for cumulative extracted bytes.
        #[arg(long, default_value_t = crate::guard::DEFAULT_MAX_BYTES)]
        max_size: u64,

        /// Ceiling for archive entry count.
        #[arg(long, default_value_t = crate::guard::DEFAULT_MAX_ENTRIES)]
        max_entries: u64,

        /// Skip recomputing embedded checksums while writing.
        #[arg(long)]
        no_verify_checksums: bool,

        /// Glob pattern an entry must match to be extracted. Repeatable.
        #[arg(long = "include")]
        include_patterns: Vec<String>,
    },

    /// List the contents of an archive without extracting it.
    #[command(alias = "l")]
    List {
        /// The archive file to list contents of.
        #[arg(required = true)]
        archive: PathBuf,

        /// Emit the entry list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run the security check suite over an archive.
    Verify {
        /// The archive file to verify.
        #[arg(required = true)]
        archive: PathBuf,

        /// Emit the validation report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print aggregate metadata about an archive.
    Info {
        /// The archive file to inspect.
        #[arg(required = true)]
        archive: PathBuf,

        /// Emit the metadata as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Parses command-line arguments using `clap` and returns the command to execute.
pub fn run() -> Result<Commands, Box<dyn std::error::Error>> {
    let args = Args::parse();
    Ok(args.command)
}
