use async_trait::async_trait;
use log::{error, info, warn};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

use crate::config::S3Config;
use crate::models::Id;

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("unsupported media type")]
    Unsupported,
    #[error("not_found")]
    NotFound,
    #[error("other: {0}")]
    Other(String),
}

pub const IMAGE_SIZE_LIMIT: usize = 10 * 1024 * 1024; // 10 MB

const ALLOWED_MIME: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// An image accepted from a request, not yet uploaded.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub extension: String,
}

impl ImageUpload {
    /// Sniff the bytes; only still images are accepted.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImageStoreError> {
        let kind = infer::get(&bytes).ok_or(ImageStoreError::Unsupported)?;
        if !ALLOWED_MIME.contains(&kind.mime_type()) {
            return Err(ImageStoreError::Unsupported);
        }
        Ok(Self {
            mime: kind.mime_type().to_string(),
            extension: kind.extension().to_string(),
            bytes,
        })
    }

    /// Content-addressed key scoped to the owning board.
    pub fn object_key(&self, board_id: Id) -> String {
        let hash = hex::encode(Sha256::digest(&self.bytes));
        format!("images/{board_id}/{hash}.{}", self.extension)
    }
}

/// Object storage for board attachments. Boards only ever hold the URL.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Upload (or overwrite) `key`; returns the public URL.
    async fn put(&self, key: &str, mime: &str, bytes: &[u8]) -> Result<String, ImageStoreError>;
    /// Remove the object behind a URL previously returned by `put`.
    async fn delete(&self, url: &str) -> Result<(), ImageStoreError>;
    /// Object key for a URL this store issued, if it recognises it.
    fn key_for_url(&self, url: &str) -> Option<String>;
}

pub struct S3ImageStore {
    bucket: String,
    client: aws_sdk_s3::Client,
    public_base: String,
}

impl S3ImageStore {
    pub async fn new(cfg: &S3Config) -> anyhow::Result<Self> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(cfg.region.clone()));
        if let Some(endpoint) = &cfg.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access), Some(secret)) = (&cfg.access_key, &cfg.secret_key) {
            let creds = Credentials::new(access, secret, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
        }
        let conf = loader.load().await;
        // Path-style addressing for MinIO and other custom endpoints
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf)
            .force_path_style(cfg.endpoint.is_some())
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);
        info!("initialized S3 client bucket={} region={}", cfg.bucket, cfg.region);

        if let Err(e) = client.head_bucket().bucket(&cfg.bucket).send().await {
            // Creating buckets is only attempted against a custom endpoint (local MinIO).
            if cfg.endpoint.is_none() {
                return Err(anyhow::anyhow!("bucket '{}' is not reachable: {e}", cfg.bucket));
            }
            warn!("head_bucket failed for '{}' (will attempt create): {e:?}", cfg.bucket);
            client
                .create_bucket()
                .bucket(&cfg.bucket)
                .send()
                .await
                .map_err(|e2| anyhow::anyhow!("failed to ensure bucket '{}': {e2}", cfg.bucket))?;
            info!("created bucket '{}'", cfg.bucket);
        }

        Ok(Self {
            bucket: cfg.bucket.clone(),
            client,
            public_base: cfg.public_base_url(),
        })
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn put(&self, key: &str, mime: &str, bytes: &[u8]) -> Result<String, ImageStoreError> {
        use aws_sdk_s3::primitives::ByteStream;
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(mime);
        if let Err(e) = put.send().await {
            error!("put_object failed key={key} bucket={} err={:?}", self.bucket, e);
            let hint = if e.to_string().contains("NoSuchBucket") {
                " (bucket missing)"
            } else if e.to_string().contains("AccessDenied") {
                " (check AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY permissions)"
            } else {
                ""
            };
            return Err(ImageStoreError::Other(format!("{e}{hint}")));
        }
        Ok(format!("{}/{}", self.public_base, key))
    }

    async fn delete(&self, url: &str) -> Result<(), ImageStoreError> {
        let key = self.key_for_url(url).ok_or(ImageStoreError::NotFound)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| ImageStoreError::Other(e.to_string()))?;
        Ok(())
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        key_under(&self.public_base, url)
    }
}

/// Strip `base/` from `url`.
pub fn key_under(base: &str, url: &str) -> Option<String> {
    url.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

pub async fn build_image_store(cfg: &S3Config) -> anyhow::Result<Arc<dyn ImageStore>> {
    Ok(Arc::new(S3ImageStore::new(cfg).await?))
}
