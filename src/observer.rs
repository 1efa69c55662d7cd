use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::controller::ScanController;
use crate::feed::MutationBatch;

/// Rescans the feed once per mutation batch until the feed stops publishing.
pub fn spawn_rescan_trigger(
    controller: Arc<ScanController>,
    mut mutations: UnboundedReceiver<MutationBatch>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(batch) = mutations.recv().await {
            debug!("Feed changed (+{} / -{}), rescanning", batch.added, batch.removed);
            controller.scan();
        }
        debug!("Mutation stream closed, rescan trigger stopping");
    })
}
