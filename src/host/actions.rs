use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::{
    chain::ChainClient,
    obligation::ContractObligation,
    storage::FileStore,
    types::{FileContractId, Transaction},
};

use super::{Host, Persister, RESUBMISSION_TIMEOUT, State};

/// What one pass over an obligation learned from the chain, and what to do
/// about it.
#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct Check {
    origin_confirmed: bool,
    revision_confirmed: bool,
    proof_confirmed: bool,
    reschedule: Vec<u64>,
    /// `Some(successful)` once the obligation's outcome is final.
    resolution: Option<bool>,
}

impl Check {
    // Confirmation flags only ever move from false to true here. Rollbacks
    // clear them through `reset`.
    fn apply(&self, obligation: &mut ContractObligation) {
        obligation.origin_confirmed |= self.origin_confirmed;
        obligation.revision_confirmed |= self.revision_confirmed;
        obligation.proof_confirmed |= self.proof_confirmed;
    }
}

#[derive(Debug, Clone, Copy)]
enum TxnKind {
    Origin,
    Revision,
}

impl std::fmt::Display for TxnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxnKind::Origin => write!(f, "origin"),
            TxnKind::Revision => write!(f, "revision"),
        }
    }
}

impl<C: ChainClient, F: FileStore, P: Persister> Host<C, F, P> {
    /// Advances the host to `height` and handles every action item that has
    /// come due.
    pub async fn process_block(&self, height: u64) {
        let due = {
            let mut state = self.state();
            state.block_height = height;
            state.action_items.take_due(height)
        };
        if !due.is_empty() {
            debug!("Handling {} action items at height {}", due.len(), height);
        }

        let mut seen = HashSet::new();
        for (_, id) in due {
            if seen.insert(id) {
                self.handle_action_item(id).await;
            }
        }
        self.save().await;
    }

    async fn handle_action_item(&self, id: FileContractId) {
        let Some(revision_lock) = self.revision_lock(&id) else {
            debug!("Skipping action item for resolved obligation {}", id);
            return;
        };
        let _guard = revision_lock.lock().await;

        let (obligation, height, epoch) = {
            let state = self.state();
            match state.obligations.get(&id) {
                Some(entry) => (entry.obligation.clone(), state.block_height, state.epoch),
                None => return,
            }
        };

        let check = self.check_obligation(&obligation, height).await;
        if let Some(successful) = self.commit_check(&id, epoch, &check) {
            self.finalize(id, obligation.path(), successful, Some(epoch))
                .await;
        }
    }

    /// Records what a check learned, unless a rollback has reset the
    /// obligations since the check started. Returns the resolution to carry
    /// out, if any.
    fn commit_check(&self, id: &FileContractId, epoch: u64, check: &Check) -> Option<bool> {
        let mut state = self.state();
        if state.epoch != epoch {
            debug!("Discarding check of obligation {} from before a rollback", id);
            return None;
        }
        let State {
            obligations,
            action_items,
            ..
        } = &mut *state;
        let entry = obligations.get_mut(id)?;
        check.apply(&mut entry.obligation);
        for height in &check.reschedule {
            action_items.add(*height, *id);
        }
        check.resolution
    }

    /// Works out what the obligation needs at `height` without touching any
    /// shared state. Chain and disk failures are logged and leave the
    /// obligation to be looked at again later.
    pub(super) async fn check_obligation(
        &self,
        obligation: &ContractObligation,
        height: u64,
    ) -> Check {
        let mut check = Check::default();
        let retry_height = height + RESUBMISSION_TIMEOUT;
        let id = obligation.id();

        if !obligation.origin_confirmed {
            check.origin_confirmed = self
                .confirm_or_resubmit(id, obligation.origin_transaction(), TxnKind::Origin)
                .await;
        }
        if let Some(txn) = obligation.revision_transaction() {
            if !obligation.revision_confirmed {
                check.revision_confirmed = self
                    .confirm_or_resubmit(id, txn, TxnKind::Revision)
                    .await;
            }
        }

        let origin_confirmed = obligation.origin_confirmed || check.origin_confirmed;
        let revision_confirmed = !obligation.has_revision()
            || obligation.revision_confirmed
            || check.revision_confirmed;
        let txns_confirmed = origin_confirmed && revision_confirmed;
        if !txns_confirmed {
            check.reschedule.push(retry_height);
        }

        if height < obligation.window_start() {
            if txns_confirmed {
                check.reschedule.push(obligation.window_start());
            }
            return check;
        }

        let mut proof_confirmed = obligation.proof_confirmed();
        // A failed status query says nothing about the proof, so it must
        // never lead to a failed resolution.
        let mut proof_status_known = true;
        if !proof_confirmed {
            match self.inner.chain.storage_proof_status(&id).await {
                Ok(status) if status.confirmed => {
                    debug!("Storage proof for obligation {} confirmed", id);
                    proof_confirmed = true;
                    check.proof_confirmed = true;
                }
                Ok(status) => {
                    if height < obligation.window_end() && txns_confirmed {
                        self.submit_storage_proof(obligation, status.segment_index)
                            .await;
                    }
                }
                Err(e) => {
                    warn!(
                        "Failed to query storage proof status of obligation {}: {}",
                        id, e
                    );
                    proof_status_known = false;
                }
            }
        }

        let settle_height = obligation.window_end() + self.inner.settings.confirmation_requirement;
        if proof_confirmed {
            if height >= settle_height {
                check.resolution = Some(true);
            } else {
                check.reschedule.push(settle_height);
            }
        } else if !proof_status_known || height < obligation.window_end() {
            check.reschedule.push(retry_height);
        } else if height >= settle_height {
            check.resolution = Some(false);
        } else {
            check.reschedule.push(settle_height);
        }
        check
    }

    async fn confirm_or_resubmit(
        &self,
        id: FileContractId,
        txn: &Transaction,
        kind: TxnKind,
    ) -> bool {
        match self.inner.chain.is_confirmed(&txn.id()).await {
            Ok(true) => {
                debug!("{} transaction of obligation {} confirmed", kind, id);
                return true;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(
                    "Failed to look up {} transaction of obligation {}: {}",
                    kind, id, e
                );
                return false;
            }
        }

        info!("Resubmitting {} transaction of obligation {}", kind, id);
        if let Err(e) = self.inner.chain.submit_transaction(txn).await {
            warn!(
                "Failed to resubmit {} transaction of obligation {}: {}",
                kind, id, e
            );
        }
        false
    }

    async fn submit_storage_proof(&self, obligation: &ContractObligation, segment_index: u64) {
        let id = obligation.id();
        let proof = match self
            .inner
            .files
            .build_storage_proof(obligation.path(), id, segment_index)
            .await
        {
            Ok(proof) => proof,
            Err(e) => {
                warn!("Failed to build storage proof for obligation {}: {}", id, e);
                return;
            }
        };

        let txn = Transaction {
            storage_proofs: vec![proof],
            ..Default::default()
        };
        match self.inner.chain.submit_transaction(&txn).await {
            Ok(()) => info!(
                "Submitted storage proof for obligation {} (segment {})",
                id, segment_index
            ),
            Err(e) => warn!("Failed to submit storage proof for obligation {}: {}", id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::{
        test_utils::{add_new_obligation, new_mock_host, new_obligation, test_settings},
        types::Currency,
    };

    #[tokio::test]
    async fn test_check_before_window_waits_for_window_start() -> Result<()> {
        let (host, chain, _, _) = new_mock_host(test_settings());
        let co = new_obligation(1000, 50, 10, 20);
        chain.confirm(co.origin_transaction());

        let check = host.check_obligation(&co, 3).await;
        assert!(check.origin_confirmed);
        assert_eq!(check.reschedule, vec![10]);
        assert_eq!(check.resolution, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_check_resubmits_unconfirmed_origin() -> Result<()> {
        let (host, chain, _, _) = new_mock_host(test_settings());
        let co = new_obligation(1000, 50, 10, 20);

        let check = host.check_obligation(&co, 2).await;
        assert!(!check.origin_confirmed);
        assert_eq!(check.reschedule, vec![2 + RESUBMISSION_TIMEOUT]);
        assert_eq!(chain.submitted(), vec![co.origin_transaction().clone()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_check_after_settle_height_fails_without_proof() -> Result<()> {
        let settings = test_settings();
        let (host, chain, _, _) = new_mock_host(settings);
        let co = new_obligation(1000, 50, 10, 20);
        chain.confirm(co.origin_transaction());

        let check = host.check_obligation(&co, 20 + settings.confirmation_requirement).await;
        assert_eq!(check.resolution, Some(false));
        assert!(chain.submitted().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_check_discarded_after_rollback() -> Result<()> {
        let (host, chain, _, _) = new_mock_host(test_settings());
        let co = new_obligation(1000, 50, 10, 20);
        let id = co.id();
        host.add_obligation(co.clone()).await?;
        chain.confirm(co.origin_transaction());

        let epoch = host.state().epoch;
        let check = host.check_obligation(&co, 2).await;
        assert!(check.origin_confirmed);

        host.handle_rollback(1).await;
        assert_eq!(host.commit_check(&id, epoch, &check), None);
        assert!(!host.obligation(&id).expect("tracked").origin_confirmed);
        assert!(!host.action_items().contains(&(10, id)));

        let epoch = host.state().epoch;
        assert_eq!(host.commit_check(&id, epoch, &check), None);
        assert!(host.obligation(&id).expect("tracked").origin_confirmed);
        assert!(host.action_items().contains(&(10, id)));
        Ok(())
    }

    #[tokio::test]
    async fn test_resolution_dropped_after_rollback() -> Result<()> {
        let (host, _, files, _) = new_mock_host(test_settings());
        let co = add_new_obligation(&host, &files, 1000, 50, 10, 20).await?;
        let epoch = host.state().epoch;

        host.handle_rollback(1).await;
        host.finalize(co.id(), co.path(), false, Some(epoch)).await;
        assert!(host.obligation(&co.id()).is_some());
        assert!(files.contains(co.path()));
        let ledger = host.ledger();
        assert_eq!(ledger.lost_revenue, Currency::ZERO);
        assert_eq!(ledger.anticipated_revenue, Currency::new(50));

        let epoch = host.state().epoch;
        host.finalize(co.id(), co.path(), false, Some(epoch)).await;
        assert_eq!(host.obligation(&co.id()), None);
        assert!(!files.contains(co.path()));
        assert_eq!(host.ledger().lost_revenue, Currency::new(50));
        Ok(())
    }
}
