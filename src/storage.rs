use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// 1. MediaStorage Contract
/// MediaStorage
///
/// The contract for the object store that holds cover art. Handlers only see
/// this trait, so the backing client—S3MediaStorage against a live bucket, or
/// MockMediaStorage in the test suite—can change without touching them.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Makes sure the configured bucket is there. Only matters for the
    /// `Env::Local` MinIO setup, where nothing else creates it; in production
    /// the bucket already exists.
    async fn ensure_bucket_exists(&self);

    /// Signs a short-lived URL that lets the browser PUT a file straight into
    /// the bucket, bypassing this server entirely.
    ///
    /// The signature covers both the expiry and the declared content type.
    ///
    /// # Arguments
    /// * `key`: The full object key the upload will land at.
    /// * `content_type`: The MIME type the uploader committed to (e.g., "image/webp").
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String>;
}

// 2. The Production Client (S3-compatible stores)
/// S3MediaStorage
///
/// The AWS SDK client. Everything it talks to speaks the S3 protocol, so the
/// same code serves both environments:
/// - **Local:** the Dockerized MinIO instance.
/// - **Production:** the Supabase Storage S3 gateway.
///
/// Both of those require `force_path_style(true)`; virtual-hosted addressing
/// does not resolve against them.
#[derive(Clone)]
pub struct S3MediaStorage {
    client: s3::Client,
    bucket_name: String,
}

impl S3MediaStorage {
    /// new
    ///
    /// Builds the client from the endpoint and credentials AppConfig resolved.
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // CRITICAL: path-style addressing (http://endpoint/bucket/key).
            // MinIO and the Supabase gateway reject the virtual-hosted form.
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl MediaStorage for S3MediaStorage {
    /// ensure_bucket_exists
    ///
    /// Issues a CreateBucket and ignores the outcome: if the bucket is
    /// already there the call is a no-op, which makes this safe to run on
    /// every startup.
    async fn ensure_bucket_exists(&self) {
        let _ = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await;
    }

    /// get_presigned_upload_url
    ///
    /// The server-side half of the cover upload flow. The browser does the
    /// actual PUT with the signed URL; the database only ever sees the key.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String> {
        // Ten minutes to start the upload, then the link goes stale.
        let expires_in = Duration::from_secs(600);

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            // CRITICAL SECURITY: the signature binds this Content-Type, so a
            // PUT that declares anything else fails verification.
            .content_type(content_type)
            .presigned(PresigningConfig::expires_in(expires_in).unwrap())
            .await
            .map_err(|e| e.to_string())?;

        Ok(presigned_req.uri().to_string())
    }
}

/// cover_key
///
/// Builds the object key for a new cover upload: a fresh UUID prefix keeps
/// keys unique, and the caller-provided filename is sanitized before use.
pub fn cover_key(filename: &str) -> String {
    format!("covers/{}-{}", Uuid::new_v4(), sanitize_key(filename))
}

/// sanitize_key
///
/// Strips the path-traversal components (`..`, `.`, empty segments) out of a
/// caller-supplied filename before it becomes part of an object key.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 3. The Test Double
/// MockMediaStorage
///
/// Test stand-in for `MediaStorage`. The cover upload handler can be driven
/// through both its success and failure branches without any S3 endpoint on
/// the network.
#[derive(Clone)]
pub struct MockMediaStorage {
    /// Flips every operation into its failure branch.
    pub should_fail: bool,
}

impl MockMediaStorage {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

impl Default for MockMediaStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaStorage for MockMediaStorage {
    async fn ensure_bucket_exists(&self) {
        // Nothing to provision.
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, String> {
        if self.should_fail {
            return Err("media storage failure requested by the test".to_string());
        }

        // Deterministic local-shaped URL so tests can assert on it.
        Ok(format!(
            "http://localhost:9000/mock-covers/{}?signature=fake",
            key
        ))
    }
}

/// MediaState
///
/// How the rest of the app holds the media store: trait object behind an Arc,
/// cloned into AppState.
pub type MediaState = Arc<dyn MediaStorage>;
