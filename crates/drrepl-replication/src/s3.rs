// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! [`ObjectGateway`] over an S3-compatible endpoint.

use std::time::Duration;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{
    BehaviorVersion, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{DateTime, DateTimeFormat};
use aws_sdk_s3::Client;
use tracing::debug;

use super::config::GatewayConfig;
use super::error::{ReplicationError, Result};
use super::gateway::{GatewayOperation, ObjectGateway, ObjectVersion};

/// Timeout for establishing a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// MinIO header carrying the version id a replicated write should keep.
const SOURCE_VERSION_ID_HEADER: &str = "x-minio-source-version-id";

/// MinIO header carrying the modification time a replicated write should keep.
const SOURCE_MTIME_HEADER: &str = "x-minio-source-mtime";

/// An S3 client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct S3Gateway {
    client: Client,
    name: String,
    preserve_versions: bool,
}

impl S3Gateway {
    /// Builds a client for `config`.
    ///
    /// Fails when the endpoint is not an http(s) URL or when credentials or
    /// the bucket are missing. No request is sent.
    pub fn connect(config: &GatewayConfig) -> Result<Self> {
        let invalid = |reason: String| ReplicationError::InvalidGatewayConfig {
            endpoint: config.endpoint.clone(),
            reason,
        };

        let uri: http::Uri = config.endpoint.parse().map_err(|e| invalid(format!("{e}")))?;
        if !matches!(uri.scheme_str(), Some("http" | "https")) {
            return Err(invalid("endpoint must start with http:// or https://".to_string()));
        }
        let Some(authority) = uri.authority() else {
            return Err(invalid("endpoint has no host".to_string()));
        };
        if config.access_key.is_empty() {
            return Err(invalid("access key is missing".to_string()));
        }
        if config.secret_key.is_empty() {
            return Err(invalid("secret key is missing".to_string()));
        }
        if config.bucket.is_empty() {
            return Err(invalid("bucket is missing".to_string()));
        }

        let credentials =
            Credentials::new(&config.access_key, &config.secret_key, None, None, "drrepl");
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(config.timeout_duration())
            .build();

        // Records are attempted once; a failed record is retried by rerunning
        // the manifest.
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .timeout_config(timeouts)
            // Not every S3-compatible store accepts trailing checksums.
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        let name = format!("{}/{}", authority, config.bucket);
        debug!(gateway = %name, preserve_versions = config.preserve_versions, "Configured S3 gateway");

        Ok(Self {
            client: Client::from_conf(s3_config),
            name,
            preserve_versions: config.preserve_versions,
        })
    }
}

#[async_trait]
impl ObjectGateway for S3Gateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_object_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<ObjectVersion> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify(GatewayOperation::Get, bucket, key, version_id, e))?;

        Ok(ObjectVersion {
            body: output.body,
            content_length: output.content_length,
            content_type: output.content_type,
            last_modified: output.last_modified,
            metadata: output.metadata.unwrap_or_default(),
        })
    }

    async fn put_object_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        object: ObjectVersion,
    ) -> Result<()> {
        let metadata = if object.metadata.is_empty() { None } else { Some(object.metadata) };
        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(object.body)
            .set_content_length(object.content_length)
            .set_content_type(object.content_type)
            .set_metadata(metadata);

        let result = if self.preserve_versions {
            let headers = replication_headers(version_id, object.last_modified.as_ref());
            request
                .customize()
                .mutate_request(move |req| {
                    for (name, value) in &headers {
                        req.headers_mut().insert(*name, value.clone());
                    }
                })
                .send()
                .await
        } else {
            request.send().await
        };

        result.map_err(|e| classify(GatewayOperation::Put, bucket, key, version_id, e))?;
        Ok(())
    }

    async fn delete_object_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify(GatewayOperation::Delete, bucket, key, version_id, e))?;
        Ok(())
    }
}

/// Headers asking a MinIO target to keep the source version id and mtime.
fn replication_headers(
    version_id: Option<&str>,
    last_modified: Option<&DateTime>,
) -> Vec<(&'static str, String)> {
    let mut headers = Vec::with_capacity(2);
    if let Some(version_id) = version_id {
        headers.push((SOURCE_VERSION_ID_HEADER, version_id.to_string()));
    }
    if let Some(mtime) = last_modified.and_then(|t| t.fmt(DateTimeFormat::DateTime).ok()) {
        headers.push((SOURCE_MTIME_HEADER, mtime));
    }
    headers
}

/// Maps an SDK error onto the replication error taxonomy.
fn classify<E, R>(
    operation: GatewayOperation,
    bucket: &str,
    key: &str,
    version_id: Option<&str>,
    err: SdkError<E, R>,
) -> ReplicationError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some("NoSuchKey" | "NoSuchVersion" | "NoSuchBucket" | "NotFound") => {
            return ReplicationError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
                version_id: version_id.map(str::to_string),
            };
        }
        Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch") => {
            return ReplicationError::AccessDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: err.message().unwrap_or("access denied").to_string(),
            };
        }
        _ => {}
    }

    let reason = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            ReplicationError::Transport { operation: operation.name(), reason }
        }
        _ => ReplicationError::Gateway { operation: operation.name(), reason },
    }
}
