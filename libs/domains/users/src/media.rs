//! Profile-picture storage.

use async_trait::async_trait;
use bytes::Bytes;
use core_config::{ConfigError, FromEnv, env_optional, env_or_default, env_parse, env_required};
use object_store::{
    ObjectStore, PutPayload,
    aws::{AmazonS3, AmazonS3Builder},
    path::Path,
    signer::Signer,
};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media storage is not configured")]
    NotConfigured,

    #[error(transparent)]
    Store(#[from] object_store::Error),
}

/// Object store holding profile pictures, addressed by key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), MediaError>;

    async fn exists(&self, key: &str) -> Result<bool, MediaError>;

    /// Time-boxed, credential-free GET URL.
    async fn presign(&self, key: &str, expires_in: Duration) -> Result<String, MediaError>;
}

/// S3 settings.
///
/// - `S3_BUCKET` (required)
/// - `S3_REGION` (default: us-east-1)
/// - `S3_ENDPOINT` (optional, e.g. MinIO)
/// - `S3_ACCESS_KEY_ID` / `S3_SECRET_ACCESS_KEY` (optional, falls back to the AWS chain)
/// - `S3_ALLOW_HTTP` (default: false)
/// - `S3_PROFILE_PICTURES_FOLDER` (default: profile-pictures/)
#[derive(Clone, Debug)]
pub struct S3MediaConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub allow_http: bool,
    pub folder: String,
}

impl FromEnv for S3MediaConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bucket: env_required("S3_BUCKET")?,
            region: env_or_default("S3_REGION", "us-east-1"),
            endpoint: env_optional("S3_ENDPOINT"),
            access_key_id: env_optional("S3_ACCESS_KEY_ID"),
            secret_access_key: env_optional("S3_SECRET_ACCESS_KEY"),
            allow_http: env_parse("S3_ALLOW_HTTP", "false")?,
            folder: env_or_default("S3_PROFILE_PICTURES_FOLDER", "profile-pictures/"),
        })
    }
}

/// [`MediaStore`] backed by an S3-compatible bucket.
#[derive(Clone, Debug)]
pub struct S3MediaStore {
    store: AmazonS3,
    folder: String,
}

impl S3MediaStore {
    pub fn new(config: &S3MediaConfig) -> Result<Self, MediaError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_allow_http(config.allow_http);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(key) = &config.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }

        let store = builder.build()?;
        tracing::info!(bucket = %config.bucket, folder = %config.folder, "S3 media store initialized");

        Ok(Self {
            store,
            folder: config.folder.clone(),
        })
    }

    fn path(&self, key: &str) -> Path {
        object_path(&self.folder, key)
    }
}

fn object_path(folder: &str, key: &str) -> Path {
    Path::from(format!("{}/{}", folder.trim_end_matches('/'), key))
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), MediaError> {
        let path = self.path(key);
        let size = bytes.len();
        self.store.put(&path, PutPayload::from(bytes)).await?;
        tracing::debug!(%path, size, "Stored object");
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, MediaError> {
        match self.store.head(&self.path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn presign(&self, key: &str, expires_in: Duration) -> Result<String, MediaError> {
        let url = self
            .store
            .signed_url(http::Method::GET, &self.path(key), expires_in)
            .await?;
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_joins_folder() {
        assert_eq!(
            object_path("profile-pictures/", "abc.png").as_ref(),
            "profile-pictures/abc.png"
        );
        assert_eq!(object_path("avatars", "abc.jpeg").as_ref(), "avatars/abc.jpeg");
    }

    #[test]
    fn test_config_defaults() {
        temp_env::with_vars(
            [
                ("S3_BUCKET", Some("media")),
                ("S3_REGION", None),
                ("S3_ENDPOINT", None),
                ("S3_ALLOW_HTTP", None),
                ("S3_PROFILE_PICTURES_FOLDER", None),
            ],
            || {
                let config = S3MediaConfig::from_env().unwrap();
                assert_eq!(config.bucket, "media");
                assert_eq!(config.region, "us-east-1");
                assert!(config.endpoint.is_none());
                assert!(!config.allow_http);
                assert_eq!(config.folder, "profile-pictures/");
            },
        );
    }

    #[test]
    fn test_config_requires_bucket() {
        temp_env::with_var_unset("S3_BUCKET", || {
            assert!(S3MediaConfig::from_env().is_err());
        });
    }

    #[tokio::test]
    async fn test_presign_against_local_endpoint() {
        let config = S3MediaConfig {
            bucket: "media".into(),
            region: "us-east-1".into(),
            endpoint: Some("http://localhost:9000".into()),
            access_key_id: Some("minio".into()),
            secret_access_key: Some("minio-secret".into()),
            allow_http: true,
            folder: "profile-pictures/".into(),
        };
        let store = S3MediaStore::new(&config).unwrap();

        let url = store
            .presign("abc.png", Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(url.contains("profile-pictures/abc.png"));
        assert!(url.contains("X-Amz-Expires=3600"));
    }
}
