use std::future::Future;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{ledger::Ledger, obligation::ContractObligation, types::FileContractId};

/// Everything the host needs to pick up where it left off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub block_height: u64,
    pub ledger: Ledger,
    pub obligations: Vec<ContractObligation>,
    pub action_items: Vec<(u64, FileContractId)>,
}

pub trait Persister: Send + Sync + 'static {
    fn save(&self, snapshot: &Snapshot) -> impl Future<Output = Result<()>> + Send;
}
