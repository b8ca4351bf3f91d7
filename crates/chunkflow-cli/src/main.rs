//! Chunkflow CLI - Main entry point

use chunkflow_cli::commands::ingest::{self, IngestOptions};
use chunkflow_cli::{Cli, Commands};
use chunkflow_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use clap::Parser;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Console)
        .log_file_prefix("chunkflow-cli")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI still works without logging
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Ingest {
            path,
            chunk_size,
            bucket,
            work_dir,
            mapper,
            memory,
            json,
        } => {
            let report = ingest::run(IngestOptions {
                path,
                chunk_size,
                bucket,
                work_dir,
                mapper,
                memory,
            })
            .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!("job:    {}", report.job_id);
            println!("status: {}", report.status);
            if let Some(checksum) = &report.checksum {
                println!("sha256: {}", checksum);
            }
            for key in &report.stored_keys {
                println!("stored: s3://{}/{}", report.bucket, key);
            }
            Ok(())
        },
    }
}
