//! Command line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// drrepl: replicate the object versions listed in a manifest between two
/// S3-compatible deployments.
#[derive(Parser)]
#[command(name = "drrepl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Copy the object versions listed in a manifest from source to target.
    Copy(CopyArgs),
    /// Print version information.
    Version,
}

/// Arguments for the copy command.
///
/// Every option overrides the matching value of the configuration file.
#[derive(Args, Debug, Default)]
pub struct CopyArgs {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "DRREPL_CONFIG")]
    pub config: Option<PathBuf>,

    // ========================================================================
    // Target
    // ========================================================================
    /// S3 endpoint URL of the target.
    #[arg(long, env = "DRREPL_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Access key of the target.
    #[arg(long, env = "DRREPL_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// Secret key of the target.
    #[arg(long, env = "DRREPL_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Target bucket. Every record is written into this bucket.
    #[arg(long, env = "DRREPL_BUCKET")]
    pub bucket: Option<String>,

    // ========================================================================
    // Source
    // ========================================================================
    /// S3 endpoint URL of the source.
    #[arg(long, env = "DRREPL_SRC_ENDPOINT")]
    pub src_endpoint: Option<String>,

    /// Access key of the source.
    #[arg(long, env = "DRREPL_SRC_ACCESS_KEY")]
    pub src_access_key: Option<String>,

    /// Secret key of the source.
    #[arg(long, env = "DRREPL_SRC_SECRET_KEY", hide_env_values = true)]
    pub src_secret_key: Option<String>,

    /// Source bucket.
    #[arg(long, env = "DRREPL_SRC_BUCKET")]
    pub src_bucket: Option<String>,

    // ========================================================================
    // Manifest
    // ========================================================================
    /// Working directory holding `object_listing.txt`.
    #[arg(long, env = "DRREPL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Manifest to read instead of `<data-dir>/object_listing.txt`.
    #[arg(long, env = "DRREPL_INPUT_FILE")]
    pub input_file: Option<PathBuf>,

    /// Number of well-formed manifest records to skip.
    ///
    /// Use this to resume a run after the records an earlier run already
    /// processed.
    #[arg(short, long, env = "DRREPL_SKIP")]
    pub skip: Option<u64>,

    // ========================================================================
    // Behavior
    // ========================================================================
    /// Log what would be replicated without touching either deployment.
    #[arg(long, env = "DRREPL_FAKE")]
    pub fake: bool,

    /// Enable debug logging.
    #[arg(long, env = "DRREPL_DEBUG")]
    pub debug: bool,

    /// Keep the source version ids on a MinIO target.
    #[arg(long, env = "DRREPL_VERSIONS")]
    pub versions: bool,

    /// Number of concurrent replication workers.
    #[arg(long, env = "DRREPL_WORKERS")]
    pub workers: Option<usize>,

    /// Capacity of the record queue between the manifest reader and the workers.
    #[arg(long, env = "DRREPL_QUEUE_SIZE")]
    pub queue_size: Option<usize>,

    /// Region used to sign requests on both endpoints.
    #[arg(long, env = "DRREPL_REGION")]
    pub region: Option<String>,
}
