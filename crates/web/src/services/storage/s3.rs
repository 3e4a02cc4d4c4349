//! S3-compatible object storage backend.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use secrecy::ExposeSecret;

use super::{StorageBackend, StorageError, content_type, generate_name, validate_upload};
use crate::config::S3Config;

/// Stores files as objects in a bucket.
///
/// References are full object keys, `<prefix>/images/<uuid>.<ext>`.
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    prefix: String,
    region: String,
    endpoint_url: Option<String>,
}

impl S3Storage {
    /// Build a client from configuration.
    ///
    /// Explicit credentials are used when both keys are configured,
    /// otherwise the default AWS provider chain applies. A custom endpoint
    /// switches to path-style addressing for MinIO/LocalStack.
    pub async fn from_config(config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.expose_secret().to_owned(),
                None,
                None,
                "garage-config",
            ));
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(S3Client::from_conf(builder.build()), config)
    }

    /// Wrap an already configured client.
    #[must_use]
    pub fn new(client: S3Client, config: &S3Config) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            region: config.region.clone(),
            endpoint_url: config.endpoint_url.clone(),
        }
    }

    fn object_key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{}/{name}", self.prefix)
        }
    }

    fn check_reference(reference: &str) -> Result<(), StorageError> {
        if reference.is_empty() || reference.starts_with('/') || reference.contains("..") {
            return Err(StorageError::InvalidReference(reference.to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn store(&self, bytes: Bytes, filename_hint: &str) -> Result<String, StorageError> {
        let ext = validate_upload(&bytes, filename_hint)?;
        let key = self.object_key(&generate_name(&ext));
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type(&ext))
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::ObjectStore(DisplayErrorContext(e).to_string()))?;

        tracing::debug!(bucket = %self.bucket, key = %key, size, "Uploaded object");
        Ok(key)
    }

    fn retrieve_url(&self, reference: &str) -> Result<String, StorageError> {
        Self::check_reference(reference)?;
        Ok(object_url(
            &self.bucket,
            &self.region,
            self.endpoint_url.as_deref(),
            reference,
        ))
    }

    async fn delete(&self, reference: &str) -> Result<(), StorageError> {
        Self::check_reference(reference)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(reference)
            .send()
            .await
            .map_err(|e| StorageError::ObjectStore(DisplayErrorContext(e).to_string()))?;

        tracing::debug!(bucket = %self.bucket, key = %reference, "Deleted object");
        Ok(())
    }

    async fn exists(&self, reference: &str) -> Result<bool, StorageError> {
        Self::check_reference(reference)?;
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(reference)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service_err))
                if matches!(service_err.err(), HeadObjectError::NotFound(_)) =>
            {
                Ok(false)
            }
            Err(e) => Err(StorageError::ObjectStore(DisplayErrorContext(e).to_string())),
        }
    }
}

/// Public URL of an object: virtual-hosted style on AWS, path style on a
/// custom endpoint.
fn object_url(bucket: &str, region: &str, endpoint: Option<&str>, key: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/')),
        None => format!("https://{bucket}.s3.{region}.amazonaws.com/{key}"),
    }
}
