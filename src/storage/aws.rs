//! S3-compatible gateway blob store.
//!
//! Forwards store operations to an S3 bucket (AWS S3, Cloudflare R2,
//! MinIO, ...).  Objects live at `{prefix}{key}`; the content type goes
//! into the object's `Content-Type` and the custom metadata into S3 user
//! metadata (`x-amz-meta-*`).
//!
//! Credentials are resolved via the standard AWS credential chain
//! (env vars, `~/.aws/credentials`, IAM role, etc.) unless explicit keys
//! are configured.

use aws_sdk_s3::primitives::ByteStream as S3ByteStream;
use aws_sdk_s3::Client;
use futures::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::backend::{BlobStore, ByteStream, CustomMetadata, StoredObject};

/// Gateway backend that forwards operations to an S3 bucket.
pub struct AwsGatewayBackend {
    /// AWS S3 SDK client.
    client: Client,
    /// The upstream bucket name.
    bucket: String,
    /// Key prefix for all objects in the upstream bucket.
    prefix: String,
}

impl AwsGatewayBackend {
    /// Create a new S3 gateway backend.
    ///
    /// `endpoint_url` points the client at a non-AWS S3 implementation;
    /// explicit credentials, when both are given, override the default
    /// provider chain.
    pub async fn new(
        bucket: String,
        region: String,
        prefix: String,
        endpoint_url: Option<String>,
        use_path_style: bool,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region));

        if let Some(ref endpoint) = endpoint_url {
            config_loader = config_loader.endpoint_url(endpoint);
        }

        if let (Some(ref ak), Some(ref sk)) = (&access_key_id, &secret_access_key) {
            let creds = aws_sdk_s3::config::Credentials::new(ak, sk, None, None, "yeet-config");
            config_loader = config_loader.credentials_provider(creds);
        }

        let sdk_config = config_loader.load().await;

        let s3_config_builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(use_path_style);

        let client = Client::from_conf(s3_config_builder.build());

        info!(
            "S3 gateway backend initialized: bucket={} prefix='{}'",
            bucket, prefix
        );

        Ok(Self {
            client,
            bucket,
            prefix,
        })
    }

    /// Map a relay key to an upstream S3 key.
    fn s3_key(&self, key: &str) -> String {
        upstream_key(&self.prefix, key)
    }

    /// Map an AWS SDK error to an anyhow error with context.
    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> anyhow::Error {
        anyhow::anyhow!("S3 {context}: {err}")
    }
}

fn upstream_key(prefix: &str, key: &str) -> String {
    format!("{prefix}{key}")
}

/// Drain `body` into a temp file so PutObject gets a known length without
/// the whole upload sitting in memory.
async fn spool_to_tempfile(mut body: ByteStream) -> anyhow::Result<tempfile::TempPath> {
    let (file, path) = tempfile::NamedTempFile::new()?.into_parts();
    let mut file = tokio::fs::File::from_std(file);
    while let Some(chunk) = body.next().await {
        tokio::io::AsyncWriteExt::write_all(&mut file, &chunk?).await?;
    }
    tokio::io::AsyncWriteExt::flush(&mut file).await?;
    Ok(path)
}

impl BlobStore for AwsGatewayBackend {
    fn has(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let s3_key = self.s3_key(&key);

            debug!("S3 head_object: bucket={} key={}", self.bucket, s3_key);

            match self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(&s3_key)
                .send()
                .await
            {
                Ok(_) => Ok(true),
                Err(e) => {
                    let service_err = e.into_service_error();
                    if service_err.is_not_found() {
                        Ok(false)
                    } else {
                        Err(Self::map_sdk_error("head_object", service_err))
                    }
                }
            }
        })
    }

    fn put(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
        metadata: CustomMetadata,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            let s3_key = self.s3_key(&key);
            let spooled = spool_to_tempfile(body).await?;

            let upload = S3ByteStream::from_path(&spooled)
                .await
                .map_err(|e| Self::map_sdk_error("put_object body", e))?;

            debug!("S3 put_object: bucket={} key={}", self.bucket, s3_key);

            let mut request = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&s3_key)
                .content_type(content_type)
                .body(upload);
            for (name, value) in metadata.to_map() {
                request = request.metadata(name.to_lowercase(), value);
            }
            request
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("put_object", e))?;

            // `spooled` is dropped here, removing the temp file.
            Ok(())
        })
    }

    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredObject>>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let s3_key = self.s3_key(&key);

            debug!("S3 get_object: bucket={} key={}", self.bucket, s3_key);

            let resp = match self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&s3_key)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    let service_err = e.into_service_error();
                    if service_err.is_no_such_key() {
                        return Ok(None);
                    }
                    return Err(Self::map_sdk_error("get_object", service_err));
                }
            };

            let content_type = resp.content_type().map(str::to_string);
            let user_metadata: HashMap<String, String> =
                resp.metadata().cloned().unwrap_or_default();
            let metadata = CustomMetadata::from_map(&user_metadata);
            let body: ByteStream = Box::pin(ReaderStream::new(resp.body.into_async_read()));

            Ok(Some(StoredObject {
                body,
                content_type,
                metadata,
            }))
        })
    }
}
