pub const CREATE_HOST_STATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS host_state (
        id INTEGER PRIMARY KEY CHECK (id = 0),
        block_height INTEGER NOT NULL,
        space_remaining INTEGER NOT NULL,
        anticipated_revenue TEXT NOT NULL,
        revenue TEXT NOT NULL,
        lost_revenue TEXT NOT NULL
    )";

pub const CREATE_OBLIGATIONS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS obligations (
        id TEXT PRIMARY KEY,
        data BLOB NOT NULL
    )";

pub const CREATE_ACTION_ITEMS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS action_items (
        height INTEGER NOT NULL,
        obligation_id TEXT NOT NULL,
        PRIMARY KEY (height, obligation_id)
    )";

pub async fn initialize_database(conn: &libsql::Connection) -> Result<(), libsql::Error> {
    conn.execute(CREATE_HOST_STATE_TABLE, ()).await?;
    conn.execute(CREATE_OBLIGATIONS_TABLE, ()).await?;
    conn.execute(CREATE_ACTION_ITEMS_TABLE, ()).await?;
    conn.query("PRAGMA journal_mode = WAL;", ()).await?;
    conn.query("PRAGMA synchronous = NORMAL;", ()).await?;
    Ok(())
}
