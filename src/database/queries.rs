use libsql::{Connection, params};
use thiserror::Error as ThisError;

use crate::{
    ledger::Ledger,
    obligation::ContractObligation,
    types::{Currency, FileContractId},
};

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("LibSQL error: {0}")]
    LibSQL(#[from] libsql::Error),
    #[error("Failed to encode obligation {0}: {1}")]
    Encode(FileContractId, String),
    #[error("Failed to decode obligation: {0}")]
    Decode(String),
    #[error("Invalid currency amount: {0}")]
    InvalidCurrency(#[from] std::num::ParseIntError),
    #[error("Invalid obligation ID: {0}")]
    InvalidId(#[from] hex::FromHexError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStateRow {
    pub block_height: u64,
    pub ledger: Ledger,
}

pub async fn replace_host_state(conn: &Connection, row: &HostStateRow) -> Result<(), Error> {
    conn.execute(
        "INSERT OR REPLACE INTO host_state
            (id, block_height, space_remaining, anticipated_revenue, revenue, lost_revenue)
            VALUES (0, ?, ?, ?, ?, ?)",
        params![
            row.block_height,
            row.ledger.space_remaining,
            row.ledger.anticipated_revenue.to_string(),
            row.ledger.revenue.to_string(),
            row.ledger.lost_revenue.to_string(),
        ],
    )
    .await?;
    Ok(())
}

pub async fn select_host_state(conn: &Connection) -> Result<Option<HostStateRow>, Error> {
    let mut rows = conn
        .query(
            "SELECT block_height, space_remaining, anticipated_revenue, revenue, lost_revenue
                FROM host_state WHERE id = 0",
            params![],
        )
        .await?;
    let Some(row) = rows.next().await? else {
        return Ok(None);
    };
    Ok(Some(HostStateRow {
        block_height: row.get(0)?,
        ledger: Ledger {
            space_remaining: row.get(1)?,
            anticipated_revenue: row.get::<String>(2)?.parse::<Currency>()?,
            revenue: row.get::<String>(3)?.parse::<Currency>()?,
            lost_revenue: row.get::<String>(4)?.parse::<Currency>()?,
        },
    }))
}

pub async fn delete_obligations(conn: &Connection) -> Result<u64, Error> {
    Ok(conn.execute("DELETE FROM obligations", params![]).await?)
}

pub async fn insert_obligation(conn: &Connection, obligation: &ContractObligation) -> Result<(), Error> {
    let mut data = vec![];
    ciborium::into_writer(obligation, &mut data)
        .map_err(|e| Error::Encode(obligation.id(), e.to_string()))?;
    conn.execute(
        "INSERT INTO obligations (id, data) VALUES (?, ?)",
        params![obligation.id().to_string(), data],
    )
    .await?;
    Ok(())
}

pub async fn select_obligations(conn: &Connection) -> Result<Vec<ContractObligation>, Error> {
    let mut rows = conn
        .query("SELECT data FROM obligations ORDER BY id", params![])
        .await?;
    let mut obligations = vec![];
    while let Some(row) = rows.next().await? {
        let data: Vec<u8> = row.get(0)?;
        let obligation: ContractObligation = ciborium::from_reader(data.as_slice())
            .map_err(|e| Error::Decode(e.to_string()))?;
        obligations.push(obligation);
    }
    Ok(obligations)
}

pub async fn delete_action_items(conn: &Connection) -> Result<u64, Error> {
    Ok(conn.execute("DELETE FROM action_items", params![]).await?)
}

pub async fn insert_action_item(
    conn: &Connection,
    height: u64,
    id: &FileContractId,
) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO action_items (height, obligation_id) VALUES (?, ?)",
        params![height, id.to_string()],
    )
    .await?;
    Ok(())
}

pub async fn select_action_items(conn: &Connection) -> Result<Vec<(u64, FileContractId)>, Error> {
    let mut rows = conn
        .query(
            "SELECT height, obligation_id FROM action_items ORDER BY height, rowid",
            params![],
        )
        .await?;
    let mut items = vec![];
    while let Some(row) = rows.next().await? {
        let height: u64 = row.get(0)?;
        let id = row.get::<String>(1)?.parse::<FileContractId>()?;
        items.push((height, id));
    }
    Ok(items)
}
