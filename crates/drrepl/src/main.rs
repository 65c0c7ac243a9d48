//! drrepl: replicate the object versions listed in a manifest between two
//! S3-compatible deployments.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use drrepl_replication::{manifest, Gateways, LedgerSnapshot, S3Gateway, Session};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod config;

use cli::{Cli, Commands, CopyArgs};
use config::{Config, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Copy(args) => run_copy(args).await,
        Commands::Version => {
            println!("drrepl {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_copy(args: CopyArgs) -> Result<()> {
    // Load configuration and apply CLI overrides
    let mut config = load_config(args.config.as_deref())?;
    config.apply_overrides(&args);

    init_logging(&config)?;
    config.validate()?;

    let source = S3Gateway::connect(&config.source).context("Failed to configure source")?;
    let target = S3Gateway::connect(&config.target).context("Failed to configure target")?;

    let manifest_path = config.manifest_path()?;
    let reader = manifest::open(&manifest_path).await.context("Failed to open manifest")?;

    info!(
        source = %config.source.endpoint,
        source_bucket = %config.source.bucket,
        target = %config.target.endpoint,
        target_bucket = %config.target.bucket,
        access_key = %config.target.access_key,
        secret_key = %mask_secret(&config.target.secret_key),
        manifest = %manifest_path.display(),
        skip = config.manifest.skip,
        "Starting copy"
    );

    let start = Instant::now();
    let gateways = Gateways::new(Arc::new(source), Arc::new(target));
    let mut session = Session::start(config.session.clone(), gateways)?;

    // A read error still drains what was queued before it is reported.
    let fed = manifest::feed(&session, reader, config.manifest.skip).await;
    let snapshot = session.drain().await;

    println!("{}", summary_line(&snapshot, config.session.dry_run, start.elapsed()));

    fed.context("Failed to read manifest")?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load(path).context("Failed to load configuration")
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry().with(filter).with(fmt_layer.json()).try_init()
        }
        LogFormat::Pretty => tracing_subscriber::registry().with(filter).with(fmt_layer).try_init(),
    }
    .context("Failed to install log subscriber")
}

fn summary_line(snapshot: &LedgerSnapshot, dry_run: bool, elapsed: Duration) -> String {
    if dry_run {
        "copy dry run complete".to_string()
    } else {
        format!(
            "Copied {} / {} objects with latency {} secs",
            with_separators(snapshot.succeeded()),
            with_separators(snapshot.processed),
            with_separators(elapsed.as_secs())
        )
    }
}

/// Formats `n` with comma thousands separators.
fn with_separators(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        "*".repeat(count)
    } else {
        format!("{}****", secret.chars().take(4).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        let snapshot = LedgerSnapshot { processed: 10, failed: 3 };
        assert_eq!(
            summary_line(&snapshot, false, Duration::from_millis(4200)),
            "Copied 7 / 10 objects with latency 4 secs"
        );
        assert_eq!(summary_line(&snapshot, true, Duration::ZERO), "copy dry run complete");

        let snapshot = LedgerSnapshot { processed: 1_234_567, failed: 1_567 };
        assert_eq!(
            summary_line(&snapshot, false, Duration::from_secs(3_600)),
            "Copied 1,233,000 / 1,234,567 objects with latency 3,600 secs"
        );
    }

    #[test]
    fn test_with_separators() {
        assert_eq!(with_separators(0), "0");
        assert_eq!(with_separators(999), "999");
        assert_eq!(with_separators(1_000), "1,000");
        assert_eq!(with_separators(12_345), "12,345");
        assert_eq!(with_separators(1_000_000), "1,000,000");
        assert_eq!(with_separators(u64::MAX), "18,446,744,073,709,551,615");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("minio123"), "mini****");
    }
}
