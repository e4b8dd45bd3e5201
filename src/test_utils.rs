use std::{
    collections::{HashMap, HashSet},
    io,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::{
    chain::{self, ChainClient, StorageProofStatus},
    database::{Reader, Writer},
    host::{Host, Persister, Settings, Snapshot},
    obligation::ContractObligation,
    storage::{self, FileStore, SEGMENT_SIZE},
    types::{
        BlockId, Currency, FileContract, FileContractId, FileContractRevision, SiacoinOutput,
        StorageProof, Transaction, TransactionId, UnlockHash,
    },
};

pub fn unlock_hash(n: u8) -> UnlockHash {
    UnlockHash::from_byte_array([n; 32])
}

pub fn mock_block_id(height: u64, fork: u8) -> BlockId {
    let mut bytes = [fork; 32];
    bytes[..8].copy_from_slice(&height.to_le_bytes());
    BlockId::from_byte_array(bytes)
}

static NONCE: AtomicU64 = AtomicU64::new(0);

/// A transaction forming one file contract that pays `value` to the host.
/// Every call yields a distinct contract ID.
pub fn new_origin_transaction(
    file_size: u64,
    value: u64,
    window_start: u64,
    window_end: u64,
) -> Transaction {
    let mut merkle_root = [0u8; 32];
    merkle_root[..8].copy_from_slice(&NONCE.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let contract = FileContract::builder()
        .file_size(file_size)
        .file_merkle_root(merkle_root)
        .window_start(window_start)
        .window_end(window_end)
        .payout(Currency::new(value as u128 * 2))
        .valid_proof_outputs(vec![
            SiacoinOutput::new(value, unlock_hash(3)),
            SiacoinOutput::new(value, unlock_hash(1)),
        ])
        .missed_proof_outputs(vec![
            SiacoinOutput::new(value, unlock_hash(3)),
            SiacoinOutput::new(0u64, unlock_hash(2)),
        ])
        .unlock_hash(unlock_hash(0))
        .build();
    Transaction {
        file_contracts: vec![contract],
        ..Default::default()
    }
}

/// A revision of `parent_id` that moves its proof window to 120..130.
pub fn new_revision_transaction(
    parent_id: FileContractId,
    revision_number: u64,
    file_size: u64,
    value: u64,
) -> Transaction {
    new_revision_transaction_with_window(parent_id, revision_number, file_size, value, 120, 130)
}

pub fn new_revision_transaction_with_window(
    parent_id: FileContractId,
    revision_number: u64,
    file_size: u64,
    value: u64,
    window_start: u64,
    window_end: u64,
) -> Transaction {
    let revision = FileContractRevision::builder()
        .parent_id(parent_id)
        .new_revision_number(revision_number)
        .new_file_size(file_size)
        .new_window_start(window_start)
        .new_window_end(window_end)
        .new_valid_proof_outputs(vec![
            SiacoinOutput::new(value, unlock_hash(13)),
            SiacoinOutput::new(value, unlock_hash(11)),
        ])
        .new_missed_proof_outputs(vec![
            SiacoinOutput::new(value, unlock_hash(13)),
            SiacoinOutput::new(0u64, unlock_hash(12)),
        ])
        .new_unlock_hash(unlock_hash(10))
        .build();
    Transaction {
        file_contract_revisions: vec![revision],
        ..Default::default()
    }
}

pub fn obligation_path(id: &FileContractId) -> PathBuf {
    PathBuf::from(format!("/obligations/{}.dat", id))
}

pub fn new_obligation(
    file_size: u64,
    value: u64,
    window_start: u64,
    window_end: u64,
) -> ContractObligation {
    let origin = new_origin_transaction(file_size, value, window_start, window_end);
    let path = obligation_path(&origin.file_contract_id(0));
    ContractObligation::new(origin, path).unwrap()
}

#[derive(Debug, Default)]
pub struct MockChainState {
    pub blocks: Vec<BlockId>,
    pub confirmed: HashSet<TransactionId>,
    pub proofs: HashSet<FileContractId>,
    pub segment_index: u64,
    pub submitted: Vec<Transaction>,
    pub fail_submissions: bool,
    pub fail_queries: bool,
}

#[derive(Clone, Debug, Default)]
pub struct MockChain {
    state: Arc<Mutex<MockChainState>>,
}

impl MockChain {
    /// A chain whose tip is at `height`.
    pub fn new(height: u64) -> Self {
        let chain = Self::default();
        chain.state().blocks = (0..=height).map(|h| mock_block_id(h, 0)).collect();
        chain
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockChainState> {
        self.state.lock().unwrap()
    }

    pub fn tip(&self) -> u64 {
        self.state().blocks.len() as u64 - 1
    }

    pub fn block_id_at(&self, height: u64) -> BlockId {
        self.state().blocks[height as usize]
    }

    pub fn mine(&self, n: u64) {
        let mut state = self.state();
        let fork = state.blocks.last().map(|id| id.as_bytes()[31]).unwrap_or(0);
        for _ in 0..n {
            let height = state.blocks.len() as u64;
            state.blocks.push(mock_block_id(height, fork));
        }
    }

    /// Replaces every block above `fork_height` with new ones up to
    /// `new_tip`.
    pub fn reorg(&self, fork_height: u64, new_tip: u64) {
        let mut state = self.state();
        let fork = state.blocks.last().map(|id| id.as_bytes()[31]).unwrap_or(0) + 1;
        state.blocks.truncate(fork_height as usize + 1);
        for height in fork_height + 1..=new_tip {
            state.blocks.push(mock_block_id(height, fork));
        }
    }

    pub fn confirm(&self, txn: &Transaction) {
        self.state().confirmed.insert(txn.id());
    }

    pub fn unconfirm(&self, txn: &Transaction) {
        self.state().confirmed.remove(&txn.id());
    }

    pub fn confirm_proof(&self, id: &FileContractId) {
        self.state().proofs.insert(*id);
    }

    pub fn submitted(&self) -> Vec<Transaction> {
        self.state().submitted.clone()
    }

    pub fn submitted_proofs(&self) -> Vec<StorageProof> {
        self.state()
            .submitted
            .iter()
            .flat_map(|txn| txn.storage_proofs.iter().cloned())
            .collect()
    }

    fn check_queries(&self) -> Result<(), chain::Error> {
        if self.state().fail_queries {
            return Err(chain::Error::Unexpected("node unavailable".to_string()));
        }
        Ok(())
    }
}

impl ChainClient for MockChain {
    async fn current_height(&self) -> Result<u64, chain::Error> {
        self.check_queries()?;
        Ok(self.tip())
    }

    async fn block_id(&self, height: u64) -> Result<BlockId, chain::Error> {
        self.check_queries()?;
        self.state()
            .blocks
            .get(height as usize)
            .copied()
            .ok_or_else(|| chain::Error::Unexpected(format!("no block at height {}", height)))
    }

    async fn submit_transaction(&self, txn: &Transaction) -> Result<(), chain::Error> {
        let mut state = self.state();
        if state.fail_submissions {
            return Err(chain::Error::Rpc {
                code: -26,
                message: "rejected".to_string(),
            });
        }
        state.submitted.push(txn.clone());
        Ok(())
    }

    async fn is_confirmed(&self, id: &TransactionId) -> Result<bool, chain::Error> {
        self.check_queries()?;
        Ok(self.state().confirmed.contains(id))
    }

    async fn storage_proof_status(
        &self,
        id: &FileContractId,
    ) -> Result<StorageProofStatus, chain::Error> {
        self.check_queries()?;
        let state = self.state();
        Ok(StorageProofStatus {
            confirmed: state.proofs.contains(id),
            segment_index: state.segment_index,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockFileStore {
    files: Arc<Mutex<HashMap<PathBuf, u64>>>,
    fail_remove: Arc<AtomicBool>,
}

impl MockFileStore {
    pub fn insert(&self, path: impl Into<PathBuf>, size: u64) {
        self.files.lock().unwrap().insert(path.into(), size);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn set_fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

impl FileStore for MockFileStore {
    async fn stat(&self, path: &Path) -> io::Result<u64> {
        self.size(path)
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    async fn build_storage_proof(
        &self,
        path: &Path,
        parent_id: FileContractId,
        segment_index: u64,
    ) -> Result<StorageProof, storage::Error> {
        let size = self.size(path)?;
        if segment_index * SEGMENT_SIZE as u64 >= size.max(1) {
            return Err(storage::Error::SegmentOutOfRange {
                index: segment_index,
                segments: size.div_ceil(SEGMENT_SIZE as u64),
            });
        }
        Ok(StorageProof {
            parent_id,
            segment: vec![0; SEGMENT_SIZE],
            hash_set: vec![],
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryPersister {
    saved: Arc<Mutex<Option<Snapshot>>>,
    saves: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl MemoryPersister {
    pub fn last(&self) -> Option<Snapshot> {
        self.saved.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Persister for MemoryPersister {
    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("disk full"));
        }
        *self.saved.lock().unwrap() = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub type MockHost = Host<MockChain, MockFileStore, MemoryPersister>;

pub const TEST_TOTAL_STORAGE: i64 = 1 << 30;

pub fn test_settings() -> Settings {
    Settings {
        confirmation_requirement: 3,
        total_storage: TEST_TOTAL_STORAGE,
    }
}

pub fn new_mock_host(settings: Settings) -> (MockHost, MockChain, MockFileStore, MemoryPersister) {
    let chain = MockChain::new(0);
    let files = MockFileStore::default();
    let persister = MemoryPersister::default();
    let host = Host::new(chain.clone(), files.clone(), persister.clone(), settings);
    (host, chain, files, persister)
}

/// Adds a fresh obligation to `host` with its backing file in `files`.
pub async fn add_new_obligation(
    host: &MockHost,
    files: &MockFileStore,
    file_size: u64,
    value: u64,
    window_start: u64,
    window_end: u64,
) -> Result<ContractObligation> {
    let co = new_obligation(file_size, value, window_start, window_end);
    files.insert(co.path(), file_size);
    host.add_obligation(co.clone()).await?;
    Ok(co)
}

/// Checks the ledger against the tracked obligations.
pub fn assert_ledger_consistent(host: &MockHost) {
    let snapshot = host.snapshot();
    let anticipated: Currency = snapshot.obligations.iter().map(|co| co.value()).sum();
    assert_eq!(snapshot.ledger.anticipated_revenue, anticipated);
}

pub async fn new_test_db() -> Result<(Reader, Writer, TempDir)> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("host.db");
    let writer = Writer::new(&path).await?;
    let reader = Reader::new(&path).await?;
    Ok((reader, writer, temp_dir))
}
