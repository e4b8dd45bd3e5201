use std::{future::Future, io, path::Path};

use thiserror::Error as ThisError;
use tokio::fs;

use crate::types::{FileContractId, StorageProof};

pub mod proof;

pub use proof::SEGMENT_SIZE;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    IO(#[from] io::Error),
    #[error("Segment {index} is out of range for a file of {segments} segments")]
    SegmentOutOfRange { index: u64, segments: u64 },
}

/// Access to the files backing the host's contracts.
pub trait FileStore: Send + Sync + 'static {
    /// Size of the file on disk, in bytes.
    fn stat(&self, path: &Path) -> impl Future<Output = io::Result<u64>> + Send;

    fn remove(&self, path: &Path) -> impl Future<Output = io::Result<()>> + Send;

    fn build_storage_proof(
        &self,
        path: &Path,
        parent_id: FileContractId,
        segment_index: u64,
    ) -> impl Future<Output = Result<StorageProof, Error>> + Send;
}

#[derive(Debug, Clone, Default)]
pub struct LocalFileStore;

impl FileStore for LocalFileStore {
    async fn stat(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }

    async fn build_storage_proof(
        &self,
        path: &Path,
        parent_id: FileContractId,
        segment_index: u64,
    ) -> Result<StorageProof, Error> {
        let data = fs::read(path).await?;
        let (segment, hash_set) = proof::build_proof(&data, segment_index).ok_or(
            Error::SegmentOutOfRange {
                index: segment_index,
                segments: proof::segment_count(data.len()),
            },
        )?;
        Ok(StorageProof {
            parent_id,
            segment,
            hash_set,
        })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_local_file_store() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("contract.dat");
        fs::write(&path, vec![7u8; 200]).await?;

        let store = LocalFileStore;
        assert_eq!(store.stat(&path).await?, 200);

        let id = FileContractId::from_byte_array([1; 32]);
        let proof = store.build_storage_proof(&path, id, 3).await?;
        assert_eq!(proof.parent_id, id);
        assert_eq!(proof.segment, vec![7u8; 200 - 3 * SEGMENT_SIZE]);
        assert!(matches!(
            store.build_storage_proof(&path, id, 4).await,
            Err(Error::SegmentOutOfRange {
                index: 4,
                segments: 4
            })
        ));

        store.remove(&path).await?;
        assert!(store.stat(&path).await.is_err());
        assert!(store.remove(&path).await.is_err());
        Ok(())
    }
}
