use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "fhirsync")]
#[command(about = "fhirsync: upload locally captured FHIR documents to a remote server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the TOML config file (defaults to ./fhirsync.toml)
    #[arg(short, long, global = true, env = "FHIRSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sync invocation (with retries) and exit
    Sync,
    /// Sync periodically until interrupted
    Daemon,
    /// List DocumentReferences waiting for upload
    Pending,
    /// Store a DocumentReference locally with a file to upload
    Attach(AttachArgs),
    /// Import resources (single resource or Bundle) into the local store
    Import(ImportArgs),
    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct AttachArgs {
    /// Path to the DocumentReference JSON
    pub document: PathBuf,
    /// File to upload as the document content
    pub file: PathBuf,
    /// MIME type of the file (kept from the document if omitted)
    #[arg(long)]
    pub content_type: Option<String>,
}

#[derive(clap::Args)]
pub struct ImportArgs {
    /// Path to a JSON resource or Bundle
    pub file: PathBuf,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration (secrets masked)
    Show,
}
