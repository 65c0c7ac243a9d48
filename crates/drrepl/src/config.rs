//! Configuration file handling and command line overrides.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use drrepl_replication::{GatewayConfig, SessionConfig, MANIFEST_FILE_NAME};
use serde::{Deserialize, Serialize};

use crate::cli::CopyArgs;

/// Top-level configuration of a copy run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployment records are read from.
    pub source: GatewayConfig,
    /// Deployment records are written to.
    pub target: GatewayConfig,
    /// Worker pool and queue settings.
    pub session: SessionConfig,
    /// Manifest location and resume offset.
    pub manifest: ManifestConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content)
    }

    /// Loads configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    /// Loads `path` if given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Applies command line flags on top of the file values.
    pub fn apply_overrides(&mut self, args: &CopyArgs) {
        override_with(&mut self.target.endpoint, &args.endpoint);
        override_with(&mut self.target.access_key, &args.access_key);
        override_with(&mut self.target.secret_key, &args.secret_key);
        override_with(&mut self.target.bucket, &args.bucket);

        override_with(&mut self.source.endpoint, &args.src_endpoint);
        override_with(&mut self.source.access_key, &args.src_access_key);
        override_with(&mut self.source.secret_key, &args.src_secret_key);
        override_with(&mut self.source.bucket, &args.src_bucket);

        if let Some(region) = &args.region {
            self.source.region = region.clone();
            self.target.region = region.clone();
        }

        if args.data_dir.is_some() {
            self.manifest.data_dir = args.data_dir.clone();
        }
        if args.input_file.is_some() {
            self.manifest.input_file = args.input_file.clone();
        }
        if let Some(skip) = args.skip {
            self.manifest.skip = skip;
        }

        if let Some(workers) = args.workers {
            self.session.workers = workers;
        }
        if let Some(queue_size) = args.queue_size {
            self.session.queue_size = queue_size;
        }
        if args.fake {
            self.session.dry_run = true;
        }
        if args.versions {
            self.target.preserve_versions = true;
        }
        if args.debug {
            self.logging.level = "debug".to_string();
        }

        // Records carry source bucket names; writes go to the target bucket.
        if !self.target.bucket.is_empty() {
            self.session.target_bucket = Some(self.target.bucket.clone());
        }
    }

    /// Checks that everything a copy run needs is present.
    pub fn validate(&self) -> Result<()> {
        require(&self.target.endpoint, "--endpoint is not provided for target")?;
        require(&self.target.access_key, "--access-key is not provided for target")?;
        require(&self.target.secret_key, "--secret-key is not provided for target")?;
        require(&self.target.bucket, "--bucket is not provided for target")?;

        require(&self.source.endpoint, "--src-endpoint is not provided for source")?;
        require(&self.source.access_key, "--src-access-key is not provided for source")?;
        require(&self.source.secret_key, "--src-secret-key is not provided for source")?;
        require(&self.source.bucket, "--src-bucket is not provided for source")?;

        if self.manifest.data_dir.is_none() && self.manifest.input_file.is_none() {
            bail!("--data-dir is not provided");
        }

        self.session.validate().context("Invalid session configuration")?;
        Ok(())
    }

    /// Path of the manifest to read.
    pub fn manifest_path(&self) -> Result<PathBuf> {
        match (&self.manifest.input_file, &self.manifest.data_dir) {
            (Some(input_file), _) => Ok(input_file.clone()),
            (None, Some(data_dir)) => Ok(data_dir.join(MANIFEST_FILE_NAME)),
            (None, None) => bail!("--data-dir is not provided"),
        }
    }
}

/// Manifest location and resume offset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Working directory holding `object_listing.txt`.
    pub data_dir: Option<PathBuf>,
    /// Explicit manifest path, taking precedence over `data_dir`.
    pub input_file: Option<PathBuf>,
    /// Number of well-formed records to skip.
    pub skip: u64,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

fn override_with(field: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        field.clone_from(value);
    }
}

fn require(value: &str, message: &'static str) -> Result<()> {
    if value.is_empty() {
        bail!(message);
    }
    Ok(())
}
