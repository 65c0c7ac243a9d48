// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Request-level tests for the S3 gateway against a mock HTTP endpoint.

use aws_sdk_s3::primitives::DateTime;
use drrepl_replication::{GatewayConfig, ObjectGateway, ObjectVersion, ReplicationError, S3Gateway};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NO_SUCH_KEY: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
    <Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>";

const ACCESS_DENIED: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
    <Error><Code>AccessDenied</Code><Message>Access Denied.</Message></Error>";

fn gateway(server: &MockServer, preserve_versions: bool) -> S3Gateway {
    let config = GatewayConfig::new(server.uri())
        .credentials("minio", "minio123")
        .bucket("src")
        .preserve_versions(preserve_versions);
    S3Gateway::connect(&config).unwrap()
}

fn object() -> ObjectVersion {
    let mut object = ObjectVersion::from_bytes("hello").with_content_type("text/plain");
    object.last_modified = Some(DateTime::from_secs(1_700_000_000));
    object.metadata.insert("origin".to_string(), "dc1".to_string());
    object
}

// =============================================================================
// Version addressing
// =============================================================================

#[tokio::test]
async fn test_get_sends_version_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/src/k1"))
        .and(query_param("versionId", "v1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("hello")
                .insert_header("x-amz-meta-origin", "dc1")
                .insert_header("last-modified", "Tue, 14 Nov 2023 22:13:20 GMT"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let object = gateway(&server, false).get_object_version("src", "k1", Some("v1")).await.unwrap();

    assert_eq!(object.metadata.get("origin").map(String::as_str), Some("dc1"));
    assert_eq!(object.last_modified, Some(DateTime::from_secs(1_700_000_000)));
    assert!(object.content_type.as_deref().unwrap_or_default().starts_with("text/plain"));
    let body = object.body.collect().await.unwrap().into_bytes();
    assert_eq!(&body[..], b"hello");
}

#[tokio::test]
async fn test_delete_sends_version_id() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/src/k1"))
        .and(query_param("versionId", "v1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    gateway(&server, false).delete_object_version("src", "k1", Some("v1")).await.unwrap();
}

#[tokio::test]
async fn test_current_version_omits_version_id() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/src/k1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    gateway(&server, false).delete_object_version("src", "k1", None).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].url.query_pairs().any(|(name, _)| name == "versionId"));
}

// =============================================================================
// Version-preserving writes
// =============================================================================

#[tokio::test]
async fn test_put_preserving_versions_sends_source_headers() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/src/k1"))
        .and(header("x-minio-source-version-id", "v1"))
        .and(header("x-minio-source-mtime", "2023-11-14T22:13:20Z"))
        .and(header("x-amz-meta-origin", "dc1"))
        .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"5d41402abc4b2a76\""))
        .expect(1)
        .mount(&server)
        .await;

    gateway(&server, true).put_object_version("src", "k1", Some("v1"), object()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, b"hello");
}

#[tokio::test]
async fn test_put_without_preserving_versions_omits_source_headers() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/src/k1"))
        .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"5d41402abc4b2a76\""))
        .expect(1)
        .mount(&server)
        .await;

    gateway(&server, false).put_object_version("src", "k1", Some("v1"), object()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let headers = &requests[0].headers;
    assert!(headers.get("x-minio-source-version-id").is_none());
    assert!(headers.get("x-minio-source-mtime").is_none());
    assert_eq!(headers.get("x-amz-meta-origin").unwrap(), "dc1");
    assert!(!requests[0].url.query_pairs().any(|(name, _)| name == "versionId"));
}

// =============================================================================
// Error classification
// =============================================================================

#[tokio::test]
async fn test_missing_version_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/src/k1"))
        .respond_with(ResponseTemplate::new(404).set_body_raw(NO_SUCH_KEY, "application/xml"))
        .mount(&server)
        .await;

    let err =
        gateway(&server, false).get_object_version("src", "k1", Some("v9")).await.unwrap_err();

    match err {
        ReplicationError::NotFound { bucket, key, version_id } => {
            assert_eq!(bucket, "src");
            assert_eq!(key, "k1");
            assert_eq!(version_id.as_deref(), Some("v9"));
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_forbidden_is_access_denied() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/src/k1"))
        .respond_with(ResponseTemplate::new(403).set_body_raw(ACCESS_DENIED, "application/xml"))
        .mount(&server)
        .await;

    let err = gateway(&server, false)
        .put_object_version("src", "k1", Some("v1"), object())
        .await
        .unwrap_err();

    assert!(matches!(err, ReplicationError::AccessDenied { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_server_error_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = gateway(&server, false).delete_object_version("src", "k1", None).await.unwrap_err();

    assert!(
        matches!(err, ReplicationError::Gateway { operation: "delete_object_version", .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_refused_connection_is_transport_error() {
    let config =
        GatewayConfig::new("http://127.0.0.1:1").credentials("minio", "minio123").bucket("src");
    let gateway = S3Gateway::connect(&config).unwrap();

    let err = gateway.get_object_version("src", "k1", None).await.unwrap_err();

    assert!(matches!(err, ReplicationError::Transport { .. }), "got {err:?}");
}
