//! Abstract blob store trait.
//!
//! Every store backend must implement [`BlobStore`].  The trait works in
//! terms of opaque byte streams so uploads and downloads never have to be
//! held in memory in full, and callers do not need to know the medium.

use bytes::Bytes;
use futures::Stream;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Sentinel stored as `originalFilename` when no filename could be resolved.
pub const UNKNOWN_FILENAME: &str = "unknown";

/// Content type recorded when the uploader did not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata map key for the original filename.
pub const META_ORIGINAL_FILENAME: &str = "originalFilename";

/// Metadata map key for the recorded extension.
pub const META_EXTENSION: &str = "extension";

/// A body flowing into or out of a store.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Small custom-metadata record attached to every stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomMetadata {
    /// Filename supplied by the uploader, or [`UNKNOWN_FILENAME`].
    pub original_filename: String,
    /// Extension recorded for download fallback.  Only the slug key
    /// strategy records one; UUID keys already carry it in the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl CustomMetadata {
    /// The original filename, unless it is the `unknown` sentinel or empty.
    pub fn known_filename(&self) -> Option<&str> {
        match self.original_filename.as_str() {
            "" | UNKNOWN_FILENAME => None,
            name => Some(name),
        }
    }

    /// The recorded extension, if non-empty.
    pub fn recorded_extension(&self) -> Option<&str> {
        self.extension.as_deref().filter(|ext| !ext.is_empty())
    }

    /// Flatten into a string map for stores with plain key/value metadata.
    ///
    /// Values are percent-encoded: S3-style user metadata travels as HTTP
    /// headers and only round-trips ASCII.
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(
            META_ORIGINAL_FILENAME.to_string(),
            encode_metadata_value(&self.original_filename),
        );
        if let Some(ref ext) = self.extension {
            map.insert(META_EXTENSION.to_string(), encode_metadata_value(ext));
        }
        map
    }

    /// Rebuild from a string map written by [`CustomMetadata::to_map`].
    /// Key lookup is case-insensitive because some stores lower-case user
    /// metadata names.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let lookup = |wanted: &str| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(wanted))
                .map(|(_, v)| decode_metadata_value(v))
        };
        Self {
            original_filename: lookup(META_ORIGINAL_FILENAME)
                .unwrap_or_else(|| UNKNOWN_FILENAME.to_string()),
            extension: lookup(META_EXTENSION),
        }
    }
}

/// Characters left as-is in encoded metadata values.
const METADATA_VALUE_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode_metadata_value(value: &str) -> String {
    utf8_percent_encode(value, &METADATA_VALUE_ENCODE_SET).to_string()
}

/// Values that are not valid percent-encoded UTF-8 are kept verbatim.
fn decode_metadata_value(value: &str) -> String {
    match percent_decode_str(value).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}

/// An object read back from a store.
pub struct StoredObject {
    /// Body, streamed from the medium.
    pub body: ByteStream,
    /// Content type recorded at upload, if the store kept one.
    pub content_type: Option<String>,
    /// Custom metadata recorded at upload.
    pub metadata: CustomMetadata,
}

impl std::fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredObject")
            .field("content_type", &self.content_type)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Async key-addressed blob store contract.
pub trait BlobStore: Send + Sync + 'static {
    /// Check whether an object exists at `key` without reading its body.
    fn has(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>>;

    /// Write `body` to `key` along with its content type and metadata.
    /// Overwrites any existing object.
    fn put(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
        metadata: CustomMetadata,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Read the object at `key`, or `None` when nothing is stored there.
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredObject>>> + Send + '_>>;
}

/// Drain a body stream into one contiguous buffer.
pub async fn collect_body(mut body: ByteStream) -> std::io::Result<Bytes> {
    use futures::StreamExt;

    let mut buf = bytes::BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

/// Wrap an in-memory buffer as a single-chunk body stream.
pub fn body_from_bytes(data: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(data) }))
}
