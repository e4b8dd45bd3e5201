use bon::Builder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Currency, FileContractId, TransactionId, UnlockHash, sha256};

/// Index of the output that pays the host in both the valid and missed proof
/// output lists of a file contract.
pub const HOST_OUTPUT_INDEX: usize = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiacoinOutput {
    pub value: Currency,
    pub unlock_hash: UnlockHash,
}

impl SiacoinOutput {
    pub fn new(value: impl Into<Currency>, unlock_hash: UnlockHash) -> Self {
        Self {
            value: value.into(),
            unlock_hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct FileContract {
    pub file_size: u64,
    #[builder(default)]
    pub file_merkle_root: [u8; 32],
    pub window_start: u64,
    pub window_end: u64,
    pub payout: Currency,
    pub valid_proof_outputs: Vec<SiacoinOutput>,
    pub missed_proof_outputs: Vec<SiacoinOutput>,
    #[builder(default)]
    pub unlock_hash: UnlockHash,
    #[builder(default)]
    pub revision_number: u64,
}

impl FileContract {
    pub fn has_host_outputs(&self) -> bool {
        self.valid_proof_outputs.len() > HOST_OUTPUT_INDEX
            && self.missed_proof_outputs.len() > HOST_OUTPUT_INDEX
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct FileContractRevision {
    pub parent_id: FileContractId,
    pub new_revision_number: u64,
    pub new_file_size: u64,
    #[builder(default)]
    pub new_file_merkle_root: [u8; 32],
    pub new_window_start: u64,
    pub new_window_end: u64,
    pub new_valid_proof_outputs: Vec<SiacoinOutput>,
    pub new_missed_proof_outputs: Vec<SiacoinOutput>,
    #[builder(default)]
    pub new_unlock_hash: UnlockHash,
}

impl FileContractRevision {
    pub fn has_host_outputs(&self) -> bool {
        self.new_valid_proof_outputs.len() > HOST_OUTPUT_INDEX
            && self.new_missed_proof_outputs.len() > HOST_OUTPUT_INDEX
    }
}

/// Proof that the host still holds one segment of the contracted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProof {
    pub parent_id: FileContractId,
    pub segment: Vec<u8>,
    pub hash_set: Vec<[u8; 32]>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub file_contracts: Vec<FileContract>,
    pub file_contract_revisions: Vec<FileContractRevision>,
    pub storage_proofs: Vec<StorageProof>,
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        let mut hasher = Sha256::new();
        hasher.update(b"transaction");
        hasher.update((self.file_contracts.len() as u64).to_le_bytes());
        for fc in &self.file_contracts {
            hasher.update(fc.file_size.to_le_bytes());
            hasher.update(fc.file_merkle_root);
            hasher.update(fc.window_start.to_le_bytes());
            hasher.update(fc.window_end.to_le_bytes());
            hasher.update(fc.payout.amount().to_le_bytes());
            hash_outputs(&mut hasher, &fc.valid_proof_outputs);
            hash_outputs(&mut hasher, &fc.missed_proof_outputs);
            hasher.update(fc.unlock_hash.as_bytes());
            hasher.update(fc.revision_number.to_le_bytes());
        }
        hasher.update((self.file_contract_revisions.len() as u64).to_le_bytes());
        for rev in &self.file_contract_revisions {
            hasher.update(rev.parent_id.as_bytes());
            hasher.update(rev.new_revision_number.to_le_bytes());
            hasher.update(rev.new_file_size.to_le_bytes());
            hasher.update(rev.new_file_merkle_root);
            hasher.update(rev.new_window_start.to_le_bytes());
            hasher.update(rev.new_window_end.to_le_bytes());
            hash_outputs(&mut hasher, &rev.new_valid_proof_outputs);
            hash_outputs(&mut hasher, &rev.new_missed_proof_outputs);
            hasher.update(rev.new_unlock_hash.as_bytes());
        }
        hasher.update((self.storage_proofs.len() as u64).to_le_bytes());
        for proof in &self.storage_proofs {
            hasher.update(proof.parent_id.as_bytes());
            hasher.update((proof.segment.len() as u64).to_le_bytes());
            hasher.update(&proof.segment);
            hasher.update((proof.hash_set.len() as u64).to_le_bytes());
            for hash in &proof.hash_set {
                hasher.update(hash);
            }
        }
        TransactionId::from_byte_array(hasher.finalize().into())
    }

    /// ID of the file contract at `index` in this transaction.
    pub fn file_contract_id(&self, index: u64) -> FileContractId {
        FileContractId::from_byte_array(sha256(&[
            b"file contract".as_slice(),
            self.id().as_bytes().as_slice(),
            index.to_le_bytes().as_slice(),
        ]))
    }
}

fn hash_outputs(hasher: &mut Sha256, outputs: &[SiacoinOutput]) {
    hasher.update((outputs.len() as u64).to_le_bytes());
    for output in outputs {
        hasher.update(output.value.amount().to_le_bytes());
        hasher.update(output.unlock_hash.as_bytes());
    }
}
