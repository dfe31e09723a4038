//! Background task bridging store change notifications into fanout.

use crate::fanout::FanoutDispatcher;
use crate::store::MessageStore;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Spawn the task that forwards store appends to the fanout dispatcher.
///
/// This is what makes live delivery happen for messages appended to the
/// store by other producers; appends that went through the dispatcher's
/// own publish path were delivered there and are skipped. The task ends
/// when the store drops its notification channel.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_notification_task(
    store: Arc<dyn MessageStore>,
    fanout: Arc<FanoutDispatcher>,
) -> tokio::task::JoinHandle<()> {
    let mut changes = store.subscribe_changes();
    tokio::spawn(async move {
        tracing::info!("store notification task started");
        loop {
            match changes.recv().await {
                Ok(stored) => fanout.on_store_notification(stored).await,
                Err(RecvError::Lagged(skipped)) => {
                    // Fan-out is at-least-once from the store's history;
                    // skipped live notifications are recoverable via sync.
                    tracing::warn!(skipped, "store notification stream lagged");
                }
                Err(RecvError::Closed) => {
                    tracing::info!("store notification stream closed");
                    break;
                }
            }
        }
    })
}
