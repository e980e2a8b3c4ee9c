//! Local filesystem blob store.
//!
//! Layout under the configured root:
//!
//! ```text
//! objects/<key>       raw body bytes
//! meta/<key>.json     content type + custom metadata
//! .tmp/               in-flight writes
//! ```
//!
//! All writes follow crash-only design: stream to a temp file, fsync,
//! rename.  The sidecar is renamed into place after the body, so a
//! half-finished upload is never visible.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use super::backend::{BlobStore, ByteStream, CustomMetadata, StoredObject};

/// JSON sidecar written next to every body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Sidecar {
    content_type: String,
    custom_metadata: CustomMetadata,
}

/// Stores objects on the local filesystem.
pub struct LocalBackend {
    /// Root directory for all stored objects.
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new `LocalBackend` rooted at `root`.
    ///
    /// The directory tree will be created if it does not exist.
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join("objects"))?;
        std::fs::create_dir_all(root.join("meta"))?;
        std::fs::create_dir_all(root.join(".tmp"))?;
        Ok(Self { root })
    }

    /// Whether `key` may be mapped onto a single file name.
    ///
    /// Keys with separators or dot segments could escape the root, so they
    /// are never found and cannot be written.
    fn is_valid_key(key: &str) -> bool {
        !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\', '\0'])
            && Path::new(key).components().count() == 1
    }

    fn body_path(&self, key: &str) -> PathBuf {
        self.root.join("objects").join(key)
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.root.join("meta").join(format!("{key}.json"))
    }

    /// Generate a temp file path under .tmp/ for atomic writes.
    fn temp_path(&self) -> PathBuf {
        let id = uuid::Uuid::new_v4();
        self.root.join(".tmp").join(format!("tmp-{}", id))
    }

    /// Stream `body` into a fresh temp file and fsync it.  The temp file is
    /// removed if anything fails.
    async fn spool(&self, body: ByteStream) -> anyhow::Result<(PathBuf, u64)> {
        let tmp_path = self.temp_path();
        match write_stream(&tmp_path, body).await {
            Ok(written) => Ok((tmp_path, written)),
            Err(e) => {
                remove_temp_files(&[tmp_path.as_path()]).await;
                Err(e)
            }
        }
    }

    /// Write the sidecar to `sidecar_tmp`, then move body and sidecar into
    /// place.  Body first, then the sidecar that makes the object visible.
    async fn commit(
        &self,
        key: &str,
        body_tmp: &Path,
        sidecar_tmp: &Path,
        sidecar: &Sidecar,
    ) -> anyhow::Result<()> {
        let mut file = tokio::fs::File::create(sidecar_tmp).await?;
        file.write_all(&serde_json::to_vec(sidecar)?).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(body_tmp, self.body_path(key)).await?;
        tokio::fs::rename(sidecar_tmp, self.sidecar_path(key)).await?;
        Ok(())
    }
}

async fn write_stream(path: &Path, mut body: ByteStream) -> anyhow::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.sync_all().await?;
    Ok(written)
}

/// Best-effort removal of temp files left by a failed write.  Paths that
/// were already renamed away are skipped.
async fn remove_temp_files(paths: &[&Path]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove temp file {}: {}", path.display(), e);
            }
        }
    }
}

impl BlobStore for LocalBackend {
    fn has(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            if !Self::is_valid_key(&key) {
                return Ok(false);
            }
            Ok(tokio::fs::try_exists(self.sidecar_path(&key)).await?)
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
            if !Self::is_valid_key(&key) {
                anyhow::bail!("Invalid storage key: {}", key);
            }

            let (body_tmp, size) = self.spool(body).await?;

            let sidecar = Sidecar {
                content_type,
                custom_metadata: metadata,
            };
            let sidecar_tmp = self.temp_path();
            if let Err(e) = self.commit(&key, &body_tmp, &sidecar_tmp, &sidecar).await {
                remove_temp_files(&[body_tmp.as_path(), sidecar_tmp.as_path()]).await;
                return Err(e);
            }

            tracing::debug!("local put: key={} size={}", key, size);
            Ok(())
        })
    }

    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredObject>>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            if !Self::is_valid_key(&key) {
                return Ok(None);
            }

            let raw = match tokio::fs::read(self.sidecar_path(&key)).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            let sidecar: Sidecar = serde_json::from_slice(&raw)?;

            let file = match tokio::fs::File::open(self.body_path(&key)).await {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };

            Ok(Some(StoredObject {
                body: Box::pin(ReaderStream::new(file)),
                content_type: Some(sidecar.content_type),
                metadata: sidecar.custom_metadata,
            }))
        })
    }
}
