//! The record of a single storage contract the host has agreed to honor.
//!
//! Every term of the contract is read through an accessor that prefers the
//! latest revision over the origin transaction, except the payout, which is
//! fixed when the contract is formed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    types::{
        Currency, FileContract, FileContractId, FileContractRevision, HOST_OUTPUT_INDEX,
        Transaction, UnlockHash,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractObligation {
    id: FileContractId,
    origin_transaction: Transaction,
    revision_transaction: Option<Transaction>,
    pub origin_confirmed: bool,
    pub revision_confirmed: bool,
    pub proof_confirmed: bool,
    pub path: PathBuf,
}

impl ContractObligation {
    /// Creates an obligation for the single file contract carried by
    /// `origin`, stored locally at `path`. Nothing is confirmed yet.
    pub fn new(origin: Transaction, path: impl Into<PathBuf>) -> Result<Self, Error> {
        if origin.file_contracts.len() != 1 {
            return Err(Error::MalformedOrigin(origin.file_contracts.len()));
        }
        let id = origin.file_contract_id(0);
        if !origin.file_contracts[0].has_host_outputs() {
            return Err(Error::MissingHostOutputs(id));
        }
        Ok(Self {
            id,
            origin_transaction: origin,
            revision_transaction: None,
            origin_confirmed: false,
            revision_confirmed: true,
            proof_confirmed: false,
            path: path.into(),
        })
    }

    /// Checks the structural invariants `new` and `apply_revision` establish.
    /// Used for obligations that did not come through either, such as ones
    /// read back from disk.
    pub fn validate(&self) -> Result<(), Error> {
        let origin = &self.origin_transaction;
        if origin.file_contracts.len() != 1 {
            return Err(Error::MalformedOrigin(origin.file_contracts.len()));
        }
        if origin.file_contract_id(0) != self.id || !origin.file_contracts[0].has_host_outputs() {
            return Err(Error::MissingHostOutputs(self.id));
        }
        if let Some(txn) = &self.revision_transaction {
            self.check_revision(txn)?;
        }
        Ok(())
    }

    /// Replaces the tracked revision. The new revision has not been seen on
    /// chain yet.
    pub fn apply_revision(&mut self, txn: Transaction) -> Result<(), Error> {
        self.check_revision(&txn)?;
        self.revision_transaction = Some(txn);
        self.revision_confirmed = false;
        Ok(())
    }

    fn check_revision(&self, txn: &Transaction) -> Result<(), Error> {
        let revision = single_revision(txn)?;
        if revision.parent_id != self.id {
            return Err(Error::MismatchedRevision {
                obligation: self.id,
                revision: revision.parent_id,
            });
        }
        Ok(())
    }

    /// Marks every on-chain fact as unverified after a reorg.
    pub fn reset(&mut self) {
        self.origin_confirmed = false;
        self.proof_confirmed = false;
        // With no revision there is nothing left to confirm.
        self.revision_confirmed = !self.has_revision();
    }

    pub fn id(&self) -> FileContractId {
        self.id
    }

    pub fn origin_transaction(&self) -> &Transaction {
        &self.origin_transaction
    }

    pub fn revision_transaction(&self) -> Option<&Transaction> {
        self.revision_transaction.as_ref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_revision(&self) -> bool {
        self.revision_transaction.is_some()
    }

    pub fn proof_confirmed(&self) -> bool {
        self.proof_confirmed
    }

    pub fn txns_confirmed(&self) -> bool {
        self.origin_confirmed && (!self.has_revision() || self.revision_confirmed)
    }

    fn contract(&self) -> &FileContract {
        &self.origin_transaction.file_contracts[0]
    }

    fn revision(&self) -> Option<&FileContractRevision> {
        self.revision_transaction
            .as_ref()
            .map(|txn| &txn.file_contract_revisions[0])
    }

    pub fn file_size(&self) -> u64 {
        match self.revision() {
            Some(rev) => rev.new_file_size,
            None => self.contract().file_size,
        }
    }

    /// What the host earns if it proves storage, the valid-proof output at
    /// the host's index.
    pub fn value(&self) -> Currency {
        match self.revision() {
            Some(rev) => rev.new_valid_proof_outputs[HOST_OUTPUT_INDEX].value,
            None => self.contract().valid_proof_outputs[HOST_OUTPUT_INDEX].value,
        }
    }

    pub fn payout(&self) -> Currency {
        self.contract().payout
    }

    pub fn unlock_hash(&self) -> UnlockHash {
        match self.revision() {
            Some(rev) => rev.new_unlock_hash,
            None => self.contract().unlock_hash,
        }
    }

    pub fn revision_number(&self) -> u64 {
        match self.revision() {
            Some(rev) => rev.new_revision_number,
            None => self.contract().revision_number,
        }
    }

    pub fn window_start(&self) -> u64 {
        match self.revision() {
            Some(rev) => rev.new_window_start,
            None => self.contract().window_start,
        }
    }

    pub fn window_end(&self) -> u64 {
        match self.revision() {
            Some(rev) => rev.new_window_end,
            None => self.contract().window_end,
        }
    }

    pub fn valid_proof_unlock_hash(&self) -> UnlockHash {
        match self.revision() {
            Some(rev) => rev.new_valid_proof_outputs[HOST_OUTPUT_INDEX].unlock_hash,
            None => self.contract().valid_proof_outputs[HOST_OUTPUT_INDEX].unlock_hash,
        }
    }

    pub fn missed_proof_unlock_hash(&self) -> UnlockHash {
        match self.revision() {
            Some(rev) => rev.new_missed_proof_outputs[HOST_OUTPUT_INDEX].unlock_hash,
            None => self.contract().missed_proof_outputs[HOST_OUTPUT_INDEX].unlock_hash,
        }
    }
}

/// Returns the one revision a revision transaction must carry.
pub(crate) fn single_revision(txn: &Transaction) -> Result<&FileContractRevision, Error> {
    match txn.file_contract_revisions.as_slice() {
        [revision] if revision.has_host_outputs() => Ok(revision),
        [revision] => Err(Error::MissingHostOutputs(revision.parent_id)),
        revisions => Err(Error::MalformedRevision(revisions.len())),
    }
}
