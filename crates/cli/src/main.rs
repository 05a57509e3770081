//! Operator CLI for the depot upload service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use depot_client::{HttpTransport, UploadDriver, UploadOptions, UploadRequest, UploadTransport};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "depotctl")]
#[command(about = "Client CLI for the depot upload service")]
#[command(version)]
struct Cli {
    /// Server base URL
    #[arg(long, env = "DEPOT_SERVER", default_value = "http://127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file, resuming if the server already has some chunks
    Push {
        /// File to upload
        file: PathBuf,

        /// Declared mime type
        #[arg(long)]
        mime: Option<String>,

        /// Identifier for resuming an interrupted upload; re-run with the
        /// same value to continue where it left off
        #[arg(long)]
        temp_identifier: Option<String>,

        /// Additional attempts per failed request
        #[arg(long, default_value_t = 2)]
        retries: u32,
    },
    /// Show which chunks the server holds for a session
    Status {
        /// Upload session ID
        upload_id: String,
    },
}

async fn push(
    server: &str,
    file: PathBuf,
    mime: Option<String>,
    temp_identifier: Option<String>,
    retries: u32,
) -> Result<()> {
    let transport = HttpTransport::new(server).context("invalid server URL")?;

    let options = UploadOptions {
        retry_limit: retries,
        on_progress: Some(Arc::new(|pct| {
            eprint!("\r  Uploading: {pct}%");
            if pct == 100 {
                eprintln!();
            }
        })),
        ..Default::default()
    };
    let driver = UploadDriver::new(Arc::new(transport), options);

    let request = UploadRequest {
        path: file,
        mime_type: mime,
        temp_identifier,
    };

    match driver.upload(&request).await {
        Ok(artifact) => {
            println!("Uploaded {}", artifact.original_filename);
            println!("  path: {}", artifact.path);
            if let Some(url) = artifact.url {
                println!("  url:  {url}");
            }
            Ok(())
        }
        Err(err) => {
            eprintln!();
            anyhow::bail!(
                "{err}\nRe-run with the same --temp-identifier to resume from {}%",
                err.percent
            )
        }
    }
}

async fn status(server: &str, upload_id: &str) -> Result<()> {
    let transport = HttpTransport::new(server).context("invalid server URL")?;
    let state = transport
        .status(upload_id)
        .await
        .context("status query failed")?;

    println!("Upload {}", state.upload_id);
    println!(
        "  received: {}/{} chunks ({} bytes each)",
        state.uploaded_chunks.len(),
        state.total_chunks,
        state.chunk_size
    );
    let missing: Vec<String> = (0..state.total_chunks)
        .filter(|index| !state.uploaded_chunks.contains(index))
        .map(|index| index.to_string())
        .collect();
    if missing.is_empty() {
        println!("  ready to complete");
    } else {
        println!("  missing:  {}", missing.join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Push {
            file,
            mime,
            temp_identifier,
            retries,
        } => push(&cli.server, file, mime, temp_identifier, retries).await,
        Commands::Status { upload_id } => status(&cli.server, &upload_id).await,
    }
}
