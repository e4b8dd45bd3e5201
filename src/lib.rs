pub mod chain;
pub mod config;
pub mod database;
pub mod error;
pub mod follower;
pub mod host;
pub mod ledger;
pub mod logging;
pub mod obligation;
pub mod reactor;
pub mod retry;
pub mod schedule;
pub mod stopper;
pub mod storage;
pub mod test_utils;
pub mod types;
