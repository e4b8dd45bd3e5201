use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::logging;

/// Build flavour the host runs as. Decides how many blocks must pass after
/// a proof window closes before its outcome is treated as final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Release {
    Testing,
    Dev,
    Standard,
}

impl Release {
    pub fn confirmation_requirement(self) -> u64 {
        match self {
            Release::Testing => 3,
            Release::Dev => 6,
            Release::Standard => 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[clap(
    version = "0.1.0",
    about = "Storage host obligation tracker",
    long_about = r#"Tracks the storage contracts a host has accepted until each one is proven or lost"#
)]
pub struct Config {
    #[clap(
        long,
        env = "LOG_FORMAT",
        help = "Log format (plain, json)",
        default_value = "plain"
    )]
    pub log_format: logging::Format,

    #[clap(
        long,
        env = "CHAIN_RPC_URL",
        help = "URL of the consensus node's RPC server (e.g., http://localhost:9980)"
    )]
    pub chain_rpc_url: String,

    #[clap(
        long,
        env = "CHAIN_RPC_USER",
        help = "User for chain RPC authentication"
    )]
    pub chain_rpc_user: String,

    #[clap(
        long,
        env = "CHAIN_RPC_PASSWORD",
        help = "Password for chain RPC authentication"
    )]
    pub chain_rpc_password: String,

    #[clap(
        long,
        env = "DATA_DIR",
        help = "Directory path for host data and the database"
    )]
    pub data_dir: PathBuf,

    #[clap(
        long,
        env = "RELEASE",
        help = "Release the host is built for (testing, dev, standard)",
        default_value = "standard"
    )]
    pub release: Release,

    #[clap(
        long,
        env = "TOTAL_STORAGE",
        help = "Bytes of storage the host offers when starting without saved state",
        default_value = "0",
        value_parser = clap::value_parser!(i64).range(0..)
    )]
    pub total_storage: i64,

    #[clap(
        long,
        env = "STARTING_BLOCK_HEIGHT",
        help = "Block height to begin following at when there is no saved state",
        default_value = "0"
    )]
    pub starting_block_height: u64,

    #[clap(
        long,
        env = "POLL_INTERVAL_SECS",
        help = "Seconds between polls of the chain tip",
        default_value = "10"
    )]
    pub poll_interval_secs: u64,

    #[clap(
        long,
        env = "REORG_WINDOW",
        help = "Number of recent block IDs kept for reorganization detection",
        default_value = "144"
    )]
    pub reorg_window: u64,
}

impl Config {
    pub fn new_na() -> Self {
        let na = "n/a".to_string();
        Self {
            log_format: logging::Format::Plain,
            chain_rpc_url: na.clone(),
            chain_rpc_user: na.clone(),
            chain_rpc_password: na,
            data_dir: "will be set".into(),
            release: Release::Testing,
            total_storage: 0,
            starting_block_height: 0,
            poll_interval_secs: 1,
            reorg_window: 10,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("host.db")
    }
}
