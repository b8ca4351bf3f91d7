//! Chunkflow CLI Library
//!
//! Command-line front end for the chunkflow pipeline. `chunkflow ingest`
//! slices a local file, feeds the slices through the upload stage the way a
//! remote client would, and drives the job to object storage.

pub mod commands;
pub mod progress;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Default slice size: 5 MiB
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Chunked file ingestion
#[derive(Parser, Debug)]
#[command(name = "chunkflow")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a local file through the full pipeline
    Ingest {
        /// File to ingest
        path: PathBuf,

        /// Slice size in bytes
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Target bucket (overrides CHUNKFLOW_BUCKET)
        #[arg(long)]
        bucket: Option<String>,

        /// Scratch directory (overrides CHUNKFLOW_WORK_DIR)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Fingerprint mapper applied to the upload id
        #[arg(long, value_enum, default_value_t = MapperKind::None)]
        mapper: MapperKind,

        /// Keep objects in memory instead of S3/MinIO
        #[arg(long)]
        memory: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MapperKind {
    /// Use the upload id verbatim
    None,
    /// SHA-256 of the upload id
    Sha256,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_ingest_defaults() {
        let cli = Cli::try_parse_from(["chunkflow", "ingest", "data.bin"]).unwrap();
        let Commands::Ingest {
            path,
            chunk_size,
            bucket,
            mapper,
            memory,
            ..
        } = cli.command;

        assert_eq!(path, PathBuf::from("data.bin"));
        assert_eq!(chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(bucket, None);
        assert_eq!(mapper, MapperKind::None);
        assert!(!memory);
    }

    #[test]
    fn parses_ingest_options() {
        let cli = Cli::try_parse_from([
            "chunkflow",
            "-v",
            "ingest",
            "data.bin",
            "--chunk-size",
            "1024",
            "--bucket",
            "archive",
            "--mapper",
            "sha256",
            "--memory",
            "--json",
        ])
        .unwrap();

        assert!(cli.verbose);
        let Commands::Ingest {
            chunk_size,
            bucket,
            mapper,
            memory,
            json,
            ..
        } = cli.command;
        assert!(json);
        assert_eq!(chunk_size, 1024);
        assert_eq!(bucket.as_deref(), Some("archive"));
        assert_eq!(mapper, MapperKind::Sha256);
        assert!(memory);
    }

    #[test]
    fn requires_a_subcommand() {
        assert!(Cli::try_parse_from(["chunkflow"]).is_err());
    }
}
