use std::{collections::BTreeMap, time::Duration};

use anyhow::Result;
use tokio::{select, sync::mpsc::Sender, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    chain::ChainClient,
    retry::{new_backoff_unlimited, retry},
    types::BlockId,
};

pub mod events;

pub use events::Event;

/// Walks the chain one block at a time and notices when blocks it already
/// reported have been replaced.
pub struct Follower<C> {
    chain: C,
    next_height: u64,
    reorg_window: u64,
    recent: BTreeMap<u64, BlockId>,
}

impl<C: ChainClient> Follower<C> {
    pub fn new(chain: C, start_height: u64, reorg_window: u64) -> Self {
        Self {
            chain,
            next_height: start_height,
            reorg_window: reorg_window.max(1),
            recent: BTreeMap::new(),
        }
    }

    pub fn next_height(&self) -> u64 {
        self.next_height
    }

    async fn tip(&self, cancel_token: &CancellationToken) -> Result<u64> {
        retry(
            || self.chain.current_height(),
            "get current height",
            new_backoff_unlimited(),
            cancel_token.clone(),
        )
        .await
    }

    async fn block_id(&self, height: u64, cancel_token: &CancellationToken) -> Result<BlockId> {
        retry(
            || self.chain.block_id(height),
            "get block id",
            new_backoff_unlimited(),
            cancel_token.clone(),
        )
        .await
    }

    /// Highest recorded height still on the chain, or `None` when nothing
    /// recorded survived.
    async fn find_fork(&self, tip: u64, cancel_token: &CancellationToken) -> Result<Option<u64>> {
        for (&height, id) in self.recent.iter().rev() {
            if height > tip {
                continue;
            }
            if self.block_id(height, cancel_token).await? == *id {
                return Ok(Some(height));
            }
        }
        Ok(None)
    }

    /// Catches up with the chain tip and returns what happened, in order.
    pub async fn sync(&mut self, cancel_token: &CancellationToken) -> Result<Vec<Event>> {
        let mut events = vec![];
        let tip = self.tip(cancel_token).await?;

        if let Some((&last, _)) = self.recent.last_key_value() {
            let fork = match self.find_fork(tip, cancel_token).await? {
                Some(height) => height,
                None => {
                    let first = self.recent.keys().next().copied().unwrap_or(last);
                    error!(
                        "Reorganization deeper than the {} block window, rolling back to {}",
                        self.reorg_window,
                        first.saturating_sub(1)
                    );
                    first.saturating_sub(1)
                }
            };
            if fork < last {
                warn!("Chain reorganized, rolling back from {} to {}", last, fork);
                self.recent.retain(|height, _| *height <= fork);
                self.next_height = fork + 1;
                events.push(Event::Rollback(fork));
            }
        }

        while self.next_height <= tip {
            if cancel_token.is_cancelled() {
                break;
            }
            let height = self.next_height;
            let id = self.block_id(height, cancel_token).await?;
            self.recent.insert(height, id);
            if let Some(floor) = height.checked_sub(self.reorg_window) {
                self.recent = self.recent.split_off(&(floor + 1));
            }
            self.next_height = height + 1;
            events.push(Event::Block { height, id });
        }

        Ok(events)
    }
}

pub fn run<C: ChainClient>(
    mut follower: Follower<C>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
    tx: Sender<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Following chain from height {}", follower.next_height());
        'outer: loop {
            match follower.sync(&cancel_token).await {
                Ok(events) => {
                    for event in events {
                        if tx.send(event).await.is_err() {
                            info!("Event channel closed, exiting");
                            break 'outer;
                        }
                    }
                }
                Err(e) => {
                    if cancel_token.is_cancelled() {
                        break;
                    }
                    error!("Failed to sync with chain: {}", e);
                }
            }

            select! {
                _ = cancel_token.cancelled() => {
                    info!("Follower cancelled");
                    break;
                }
                _ = sleep(poll_interval) => {}
            }
        }
        info!("Exited");
    })
}
