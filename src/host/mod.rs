//! Lifecycle of the host's contract obligations.
//!
//! Two levels of locking guard the bookkeeping. The host-wide `state` mutex
//! protects obligation membership, the ledger, the action items, the block
//! height and the confirmation epoch. It is never held across an await.
//! Each obligation also carries a revision lock that serializes revisions,
//! checks and removal of that one obligation. The revision lock is always
//! taken without holding `state`, and `state` is re-acquired briefly to
//! commit.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError},
};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    chain::ChainClient,
    config::Config,
    error::{Error, invariant_violation},
    ledger::Ledger,
    obligation::{ContractObligation, single_revision},
    schedule::ActionItems,
    storage::FileStore,
    types::{Currency, FileContractId, Transaction},
};

mod actions;
mod snapshot;

pub use snapshot::{Persister, Snapshot};

/// Blocks to wait before resubmitting a transaction that has not been seen
/// on chain.
pub const RESUBMISSION_TIMEOUT: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Blocks past the end of a proof window before its outcome is final.
    pub confirmation_requirement: u64,
    /// Space available to a host with no saved state.
    pub total_storage: i64,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            confirmation_requirement: config.release.confirmation_requirement(),
            total_storage: config.total_storage,
        }
    }
}

struct Entry {
    revision_lock: Arc<Mutex<()>>,
    obligation: ContractObligation,
}

impl Entry {
    fn new(obligation: ContractObligation) -> Self {
        Self {
            revision_lock: Arc::new(Mutex::new(())),
            obligation,
        }
    }
}

#[derive(Default)]
struct State {
    obligations: HashMap<FileContractId, Entry>,
    ledger: Ledger,
    action_items: ActionItems,
    block_height: u64,
    // Bumped on every reset so checks that straddle a rollback are dropped.
    epoch: u64,
}

impl State {
    fn reset_all(&mut self) {
        self.epoch += 1;
        let next = self.block_height + 1;
        for (id, entry) in self.obligations.iter_mut() {
            entry.obligation.reset();
            self.action_items.add(next, *id);
        }
    }

    fn snapshot(&self) -> Snapshot {
        let mut obligations: Vec<ContractObligation> = self
            .obligations
            .values()
            .map(|entry| entry.obligation.clone())
            .collect();
        obligations.sort_by_key(|co| co.id());
        Snapshot {
            block_height: self.block_height,
            ledger: self.ledger.clone(),
            obligations,
            action_items: self.action_items.iter().map(|(h, id)| (h, *id)).collect(),
        }
    }
}

struct Inner<C, F, P> {
    state: StdMutex<State>,
    save_lock: Mutex<()>,
    chain: C,
    files: F,
    persister: P,
    settings: Settings,
}

pub struct Host<C, F, P> {
    inner: Arc<Inner<C, F, P>>,
}

impl<C, F, P> Clone for Host<C, F, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: ChainClient, F: FileStore, P: Persister> Host<C, F, P> {
    pub fn new(chain: C, files: F, persister: P, settings: Settings) -> Self {
        let state = State {
            ledger: Ledger::new(settings.total_storage),
            ..Default::default()
        };
        Self::with_state(chain, files, persister, settings, state)
    }

    /// Rebuilds a host from a saved snapshot. Whatever happened on chain
    /// while the host was down is unknown, so every obligation is reset and
    /// re-verified from the next block.
    pub fn restore(
        chain: C,
        files: F,
        persister: P,
        settings: Settings,
        snapshot: Snapshot,
    ) -> Result<Self, Error> {
        let mut obligations = HashMap::new();
        for obligation in snapshot.obligations {
            obligation.validate()?;
            if obligations.contains_key(&obligation.id()) {
                return Err(Error::DuplicateObligation(obligation.id()));
            }
            obligations.insert(obligation.id(), Entry::new(obligation));
        }

        let expected: Currency = obligations.values().map(|e| e.obligation.value()).sum();
        if expected != snapshot.ledger.anticipated_revenue {
            warn!(
                "Saved anticipated revenue {} does not match obligations total {}",
                snapshot.ledger.anticipated_revenue, expected
            );
        }

        let mut state = State {
            obligations,
            ledger: snapshot.ledger,
            action_items: snapshot.action_items.into_iter().collect(),
            block_height: snapshot.block_height,
            epoch: 0,
        };
        state.reset_all();
        info!(
            "Restored {} obligations at height {}",
            state.obligations.len(),
            state.block_height
        );
        Ok(Self::with_state(chain, files, persister, settings, state))
    }

    fn with_state(chain: C, files: F, persister: P, settings: Settings, state: State) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: StdMutex::new(state),
                save_lock: Mutex::new(()),
                chain,
                files,
                persister,
                settings,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn revision_lock(&self, id: &FileContractId) -> Option<Arc<Mutex<()>>> {
        self.state()
            .obligations
            .get(id)
            .map(|entry| entry.revision_lock.clone())
    }

    /// Starts tracking a newly formed contract. The origin transaction is
    /// checked for on chain after `RESUBMISSION_TIMEOUT` blocks.
    pub async fn add_obligation(&self, obligation: ContractObligation) -> Result<(), Error> {
        obligation.validate().map_err(invariant_violation)?;
        let id = obligation.id();
        if obligation.has_revision() {
            return Err(invariant_violation(Error::RevisionOnAdd(id)));
        }
        let (file_size, value) = (obligation.file_size(), obligation.value());

        {
            let mut state = self.state();
            if state.obligations.contains_key(&id) {
                drop(state);
                return Err(invariant_violation(Error::DuplicateObligation(id)));
            }
            let check_height = state.block_height + RESUBMISSION_TIMEOUT;
            state.action_items.add(check_height, id);
            state.ledger.commit(file_size, value);
            state.obligations.insert(id, Entry::new(obligation));
        }

        info!(
            "Added obligation {} ({} bytes, value {})",
            id, file_size, value
        );
        self.save().await;
        Ok(())
    }

    /// Applies a revision to the obligation it revises, swapping the old
    /// terms out of the ledger for the new ones.
    pub async fn revise_obligation(&self, txn: Transaction) -> Result<(), Error> {
        let id = single_revision(&txn).map_err(invariant_violation)?.parent_id;
        let revision_lock = self
            .revision_lock(&id)
            .ok_or_else(|| invariant_violation(Error::UnknownObligation(id)))?;
        let _guard = revision_lock.lock().await;

        let (file_size, value) = {
            let mut state = self.state();
            let State {
                obligations,
                ledger,
                action_items,
                block_height,
                ..
            } = &mut *state;
            // Removal can win the race for the revision lock.
            let Some(entry) = obligations.get_mut(&id) else {
                return Err(Error::UnknownObligation(id));
            };
            let obligation = &mut entry.obligation;
            let (old_size, old_value) = (obligation.file_size(), obligation.value());
            obligation.apply_revision(txn)?;
            ledger.revise(
                old_size,
                old_value,
                obligation.file_size(),
                obligation.value(),
            );
            action_items.add(*block_height + RESUBMISSION_TIMEOUT, id);
            (obligation.file_size(), obligation.value())
        };

        info!(
            "Revised obligation {} ({} bytes, value {})",
            id, file_size, value
        );
        self.save().await;
        Ok(())
    }

    /// Resolves an obligation: deletes its file, frees the space and books
    /// its value as revenue or lost revenue.
    pub async fn remove_obligation(
        &self,
        id: &FileContractId,
        successful: bool,
    ) -> Result<(), Error> {
        let revision_lock = self
            .revision_lock(id)
            .ok_or(Error::UnknownObligation(*id))?;
        let _guard = revision_lock.lock().await;
        let path = self
            .obligation(id)
            .map(|co| co.path)
            .ok_or(Error::UnknownObligation(*id))?;
        self.finalize(*id, &path, successful, None).await;
        Ok(())
    }

    // Caller holds the obligation's revision lock. With `epoch` set, the
    // resolution is dropped if a rollback has reset the obligations since
    // that epoch. Once the file is gone the resolution is always committed.
    async fn finalize(
        &self,
        id: FileContractId,
        path: &Path,
        successful: bool,
        epoch: Option<u64>,
    ) {
        if let Some(epoch) = epoch {
            if self.state().epoch != epoch {
                debug!("Dropping resolution of obligation {} after a rollback", id);
                return;
            }
        }
        let size = match self.inner.files.stat(path).await {
            Ok(size) => size,
            Err(e) => {
                warn!("Failed to stat file of obligation {}: {}", id, e);
                0
            }
        };
        // Space is only credited once the file is really gone.
        let removed = match self.inner.files.remove(path).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to remove file of obligation {}: {}", id, e);
                false
            }
        };

        let value = {
            let mut state = self.state();
            let State {
                obligations,
                ledger,
                action_items,
                ..
            } = &mut *state;
            let Some(entry) = obligations.remove(&id) else {
                warn!("Obligation {} was already removed", id);
                return;
            };
            let value = entry.obligation.value();
            if removed {
                ledger.release_space(size);
            }
            ledger.resolve(value, successful);
            action_items.remove(&id);
            value
        };

        if successful {
            info!("Obligation {} succeeded, earned {}", id, value);
        } else {
            warn!("Obligation {} failed, lost {}", id, value);
        }
        self.save().await;
    }

    /// Handles a chain reorganization back to `height`: every obligation is
    /// reset and re-verified from the next block.
    pub async fn handle_rollback(&self, height: u64) {
        let count = {
            let mut state = self.state();
            state.block_height = height;
            state.reset_all();
            state.obligations.len()
        };
        info!(
            "Reset {} obligations after rollback to height {}",
            count, height
        );
        self.save().await;
    }

    /// Persists the current state. A failed save is logged and the in-memory
    /// state stays authoritative until the next one succeeds.
    pub async fn save(&self) {
        let _guard = self.inner.save_lock.lock().await;
        let snapshot = self.snapshot();
        if let Err(e) = self.inner.persister.save(&snapshot).await {
            warn!("Failed to save host: {}", e);
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state().snapshot()
    }

    pub fn ledger(&self) -> Ledger {
        self.state().ledger.clone()
    }

    pub fn obligation(&self, id: &FileContractId) -> Option<ContractObligation> {
        self.state()
            .obligations
            .get(id)
            .map(|entry| entry.obligation.clone())
    }

    pub fn obligation_count(&self) -> usize {
        self.state().obligations.len()
    }

    pub fn block_height(&self) -> u64 {
        self.state().block_height
    }

    pub fn action_items(&self) -> Vec<(u64, FileContractId)> {
        self.state()
            .action_items
            .iter()
            .map(|(height, id)| (height, *id))
            .collect()
    }

    pub fn settings(&self) -> Settings {
        self.inner.settings
    }
}
