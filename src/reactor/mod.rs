use tokio::{select, sync::mpsc::Receiver, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    chain::ChainClient,
    follower::Event,
    host::{Host, Persister},
    storage::FileStore,
};

/// Feeds follower events to the host: due action items run on every block
/// and a rollback resets every obligation.
pub fn run<C: ChainClient, F: FileStore, P: Persister>(
    cancel_token: CancellationToken,
    host: Host<C, F, P>,
    mut rx: Receiver<Event>,
) -> JoinHandle<()> {
    tokio::spawn({
        let mut option_last_height = None;
        async move {
            loop {
                select! {
                    _ = cancel_token.cancelled() => {
                        info!("Reactor cancelled");
                        break;
                    }
                    option_event = rx.recv() => {
                        match option_event {
                            Some(Event::Block { height, id }) => {
                                if let Some(last_height) = option_last_height {
                                    if height != last_height + 1 {
                                        error!("Order exception: block {} after {}", height, last_height);
                                        cancel_token.cancel();
                                        break;
                                    }
                                }
                                option_last_height = Some(height);
                                host.process_block(height).await;
                                info!("Block {} {}", height, id);
                            }
                            Some(Event::Rollback(height)) => {
                                host.handle_rollback(height).await;
                                option_last_height = Some(height);
                                info!("Rollback {}", height);
                            }
                            None => {
                                info!("Received None event, exiting");
                                break;
                            }
                        }
                    }
                }
            }

            rx.close();
            while rx.recv().await.is_some() {}

            host.save().await;
            info!("Exited");
        }
    })
}
