use std::path::Path;

use libsql::{Builder, Connection, Error};

use super::tables::initialize_database;

/// Opens the database at `path`, creating the schema on first use.
pub async fn new_connection(path: &Path) -> Result<Connection, Error> {
    let db = Builder::new_local(path).build().await?;
    let conn = db.connect()?;
    initialize_database(&conn).await?;
    Ok(conn)
}
