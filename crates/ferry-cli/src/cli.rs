//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ferry", version, about = "Resumable HTTP downloads")]
pub struct Cli {
    /// URL to download
    pub url: String,

    /// Destination directory (defaults to the configured download directory)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// File name inside the destination directory (defaults to a hash of the URL)
    #[arg(short, long, conflicts_with = "video")]
    pub name: Option<String>,

    /// Expected total length in bytes; 0 or absent probes the server first
    #[arg(short, long, conflicts_with = "video")]
    pub length: Option<u64>,

    /// Save as a timestamped .mp4 in the video directory
    #[arg(long)]
    pub video: bool,

    /// JSON config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}
