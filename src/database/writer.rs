use std::path::Path;

use anyhow::Result;
use libsql::Connection;

use crate::host::{Persister, Snapshot};

use super::{
    connection::new_connection,
    queries::{self, HostStateRow},
};

#[derive(Clone)]
pub struct Writer {
    conn: Connection,
}

impl Writer {
    pub async fn new(path: &Path) -> Result<Self> {
        let conn = new_connection(path).await?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> Connection {
        self.conn.clone()
    }

    /// Replaces the saved host state with `snapshot` in one transaction.
    pub async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), queries::Error> {
        let tx = self.conn.transaction().await?;
        queries::replace_host_state(
            &tx,
            &HostStateRow {
                block_height: snapshot.block_height,
                ledger: snapshot.ledger.clone(),
            },
        )
        .await?;
        queries::delete_obligations(&tx).await?;
        for obligation in &snapshot.obligations {
            queries::insert_obligation(&tx, obligation).await?;
        }
        queries::delete_action_items(&tx).await?;
        for (height, id) in &snapshot.action_items {
            queries::insert_action_item(&tx, *height, id).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

impl Persister for Writer {
    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        Ok(self.write_snapshot(snapshot).await?)
    }
}
