use std::path::Path;

use anyhow::{Context, Result};
use deadpool::managed::{Object, Pool};

use crate::host::Snapshot;

use super::{
    pool::{Manager, new_pool},
    queries,
};

#[derive(Clone)]
pub struct Reader {
    pool: Pool<Manager>,
}

impl Reader {
    pub async fn new(path: &Path) -> Result<Self> {
        let pool = new_pool(path).await?;
        Ok(Self { pool })
    }

    async fn get_connection(&self) -> Result<Object<Manager>> {
        self.pool
            .get()
            .await
            .context("Failed to get connection for database reader pool")
    }

    /// The last saved snapshot, or `None` if the host has never saved.
    pub async fn load_snapshot(&self) -> Result<Option<Snapshot>> {
        let conn = self.get_connection().await?;
        let Some(state) = queries::select_host_state(&conn).await? else {
            return Ok(None);
        };
        Ok(Some(Snapshot {
            block_height: state.block_height,
            ledger: state.ledger,
            obligations: queries::select_obligations(&conn).await?,
            action_items: queries::select_action_items(&conn).await?,
        }))
    }
}
