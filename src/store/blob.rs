//! Blob operations for depot file content.
//!
//! every file revision is stored as a raw git blob. identical content maps
//! to the same blob id, which is how a submit detects unchanged files.

use std::path::Path;

use git2::Repository;

use crate::store::error::{RemoteError, RemoteResult};
pub(crate) use crate::store::types::BlobId;

/// write raw bytes as a blob to the repository
///
/// returns the blob ID (SHA-1 hash of the content)
pub fn write_blob(repo: &Repository, bytes: &[u8]) -> RemoteResult<BlobId> {
    let oid = repo.blob(bytes)?;
    Ok(BlobId::new(oid))
}

/// read a local file into a new blob
pub fn write_blob_from_file(repo: &Repository, path: &Path) -> RemoteResult<BlobId> {
    let bytes = std::fs::read(path).map_err(|e| RemoteError::io(path, e))?;
    write_blob(repo, &bytes)
}

/// read a blob's content from the repository
pub fn read_blob(repo: &Repository, blob_id: BlobId) -> RemoteResult<Vec<u8>> {
    let blob = repo.find_blob(blob_id.raw())?;
    Ok(blob.content().to_vec())
}

/// metadata about a blob without reading its full content
#[derive(Debug, Clone)]
pub struct BlobMetadata {
    pub id: BlobId,
    pub size: usize,
}

impl BlobMetadata {
    /// get the metadata for a blob
    pub fn from_blob(blob: &git2::Blob) -> Self {
        Self {
            id: BlobId::new(blob.id()),
            size: blob.size(),
        }
    }

    /// look up a blob by id
    pub fn load(repo: &Repository, blob_id: BlobId) -> RemoteResult<Self> {
        let blob = repo.find_blob(blob_id.raw())?;
        Ok(Self::from_blob(&blob))
    }
}
