use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Lifetime of a presigned video upload URL.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("presigning failed: {0}")]
    Presign(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// StorageService
///
/// Object storage holding uploaded video files. The server never proxies the bytes:
/// it hands out a presigned PUT URL and the client uploads directly.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the configured bucket if missing. Only called in `Env::Local`.
    async fn ensure_bucket_exists(&self);

    /// Presigned PUT URL for `key`, constrained to `content_type`.
    async fn presigned_upload_url(&self, key: &str, content_type: &str)
    -> Result<String, StorageError>;

    /// URL the object will be reachable at once uploaded; stored as the video's `url`.
    fn public_url(&self, key: &str) -> String;
}

/// S3StorageClient
///
/// `StorageService` over the AWS SDK. Path-style addressing keeps it compatible with
/// MinIO in local development.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    endpoint: String,
    bucket_name: String,
}

impl S3StorageClient {
    pub fn new(endpoint: &str, region: &str, access_key: &str, secret_key: &str, bucket: &str) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket fails harmlessly when the bucket is already there.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket {}: {}", self.bucket_name, e);
        }
    }

    async fn presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket_name, sanitize_key(key))
    }
}

/// sanitize_key
///
/// Strips empty, `.` and `..` segments so a key can never climb out of the bucket.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// In-memory `StorageService` for tests; produces deterministic local URLs.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, presigning fails.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Unavailable("simulated outage".to_string()));
        }
        Ok(format!("{}?signature=fake", self.public_url(key)))
    }

    fn public_url(&self, key: &str) -> String {
        format!("http://localhost:9000/mock-bucket/{}", sanitize_key(key))
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_key_drops_traversal_segments() {
        assert_eq!(sanitize_key("videos/../../etc/passwd"), "videos/etc/passwd");
        assert_eq!(sanitize_key("/videos//./a.mp4"), "videos/a.mp4");
    }

    #[tokio::test]
    async fn mock_presigns_under_public_url() {
        let mock = MockStorageService::new();
        let url = mock
            .presigned_upload_url("videos/a.mp4", "video/mp4")
            .await
            .unwrap();
        assert!(url.starts_with(&mock.public_url("videos/a.mp4")));
        assert!(url.ends_with("signature=fake"));
    }

    #[tokio::test]
    async fn failing_mock_reports_unavailable() {
        let mock = MockStorageService::new_failing();
        let result = mock.presigned_upload_url("videos/a.mp4", "video/mp4").await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }
}
