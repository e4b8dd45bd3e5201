use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use host_obligations::{
    chain,
    config::Config,
    database,
    follower::{self, Follower},
    host::{Host, Settings},
    logging, reactor, stopper,
    storage::LocalFileStore,
};
use tokio::{fs, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::try_parse()?;
    logging::setup(config.log_format);
    info!("Host obligations");
    info!("{:#?}", config);

    let cancel_token = CancellationToken::new();
    let mut handles = vec![];
    handles.push(stopper::run(cancel_token.clone())?);

    fs::create_dir_all(&config.data_dir).await?;
    let db_path = config.database_path();
    let writer = database::Writer::new(&db_path).await?;
    let reader = database::Reader::new(&db_path).await?;
    let chain = chain::Client::new_from_config(&config)?;
    let settings = Settings::from(&config);

    let (host, start_height) = match reader.load_snapshot().await? {
        Some(snapshot) => {
            let start_height = snapshot.block_height + 1;
            let host = Host::restore(chain.clone(), LocalFileStore, writer, settings, snapshot)?;
            (host, start_height)
        }
        None => {
            info!("No saved state, starting fresh");
            let host = Host::new(chain.clone(), LocalFileStore, writer, settings);
            (host, config.starting_block_height)
        }
    };

    let (tx, rx) = mpsc::channel(10);
    handles.push(reactor::run(cancel_token.clone(), host, rx));
    handles.push(follower::run(
        Follower::new(chain, start_height, config.reorg_window),
        Duration::from_secs(config.poll_interval_secs),
        cancel_token.clone(),
        tx,
    ));

    for handle in handles {
        let _ = handle.await;
    }
    info!("Exited");
    Ok(())
}
