//! Command-line client for the LFS caching proxy

mod config;
mod constants;
mod download;
mod upload;

use anyhow::Context;
use clap::{Parser, Subcommand};
use common::{BatchRequest, Operation};
use config::{parse_object, ProxyTarget};
use constants::{DEFAULT_HOST_ID, DEFAULT_SERVER_URL};
use std::path::PathBuf;
use upstream::LfsUpstream;

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "Git LFS client for the caching proxy")]
struct Cli {
    /// Proxy URL
    #[arg(short, long, global = true, default_value = DEFAULT_SERVER_URL)]
    server: String,
    /// Upstream host id registered with the proxy
    #[arg(long, global = true, default_value = DEFAULT_HOST_ID)]
    host_id: i64,
    /// Repository path on the upstream host, e.g. group/project.git
    #[arg(short, long, global = true)]
    repo: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a batch request and print the response
    Batch {
        /// download or upload
        #[arg(short, long, default_value = "download")]
        operation: Operation,
        /// Objects as OID:SIZE
        #[arg(required = true)]
        objects: Vec<String>,
    },
    /// Download an object through the proxy and verify its hash
    Download {
        #[arg(long)]
        oid: String,
        #[arg(long)]
        size: i64,
        /// Output file (default: ./<oid>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload a file as an LFS object
    Upload {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let repo = cli.repo.context("--repo is required")?;
    let target = ProxyTarget::new(&cli.server, cli.host_id, &repo);

    match cli.command {
        Commands::Batch { operation, objects } => {
            let objects = objects
                .iter()
                .map(|value| parse_object(value))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let request = BatchRequest::new(operation, objects);
            let transfer = target
                .client
                .request_batch(&target.host, &target.repo, &request)
                .await
                .context("Batch request failed")?;
            println!("{}", common::serialize(&transfer)?);
        }
        Commands::Download { oid, size, output } => {
            let id = common::ObjectId::new(oid, size);
            download::download_object(&target, &id, output).await?;
        }
        Commands::Upload { file } => {
            upload::upload_file(&target, &file).await?;
        }
    }

    Ok(())
}
