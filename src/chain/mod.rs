use std::future::Future;

use crate::types::{BlockId, FileContractId, Transaction, TransactionId};

pub mod client;
pub mod error;
pub mod types;

pub use client::Client;
pub use error::Error;
pub use types::{StorageProofStatus, TransactionStatus};

/// The slice of a consensus node the host needs: the chain tip, block
/// identity for reorg detection, and transaction submission and lookup.
pub trait ChainClient: Send + Sync + Clone + 'static {
    fn current_height(&self) -> impl Future<Output = Result<u64, Error>> + Send;

    fn block_id(&self, height: u64) -> impl Future<Output = Result<BlockId, Error>> + Send;

    /// Hands `txn` to the node's transaction pool for broadcast.
    fn submit_transaction(
        &self,
        txn: &Transaction,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn is_confirmed(&self, id: &TransactionId) -> impl Future<Output = Result<bool, Error>> + Send;

    fn storage_proof_status(
        &self,
        id: &FileContractId,
    ) -> impl Future<Output = Result<StorageProofStatus, Error>> + Send;
}
