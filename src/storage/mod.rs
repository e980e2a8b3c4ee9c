//! Blob store backends.
//!
//! The [`backend::BlobStore`] trait abstracts over where uploaded bytes
//! physically live.  Implementations include an in-memory map, the local
//! filesystem, and a gateway to any S3-compatible bucket.

pub mod aws;
pub mod backend;
pub mod local;
pub mod memory;
