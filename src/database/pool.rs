use std::path::{Path, PathBuf};

use anyhow::Context;
use deadpool::managed::{self, Pool, RecycleError};
use libsql::{Error, params};

use super::connection::new_connection;

#[derive(Debug)]
pub struct Manager {
    path: PathBuf,
}

impl Manager {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl managed::Manager for Manager {
    type Type = libsql::Connection;
    type Error = Error;

    async fn create(&self) -> Result<Self::Type, Error> {
        new_connection(&self.path).await
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _: &managed::Metrics,
    ) -> managed::RecycleResult<Error> {
        conn.query("SELECT 1", params![])
            .await
            .map_err(|e| RecycleError::Message(format!("{}", e).into()))?
            .next()
            .await
            .map_err(|e| RecycleError::Message(format!("{}", e).into()))?
            .ok_or_else(|| RecycleError::Message("No rows returned".into()))?;
        Ok(())
    }
}

pub async fn new_pool(path: &Path) -> anyhow::Result<Pool<Manager>> {
    let manager = Manager::new(path);
    Pool::builder(manager)
        .max_size(4)
        .build()
        .context("Failed to build database pool")
}
